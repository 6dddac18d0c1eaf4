//! The `reconcile` subcommand: apply pending blobs to the database.

use anyhow::{bail, Result};
use clap::Args;
use ipotracker_lib::{drain, BlobStore, Db, DirBlobStore, PipelineConfig, ReconcileOptions};

/// Arguments for the `reconcile` subcommand.
#[derive(Args, Clone, Debug, Default)]
pub struct ReconcileArgs {
    /// Move blobs left claimed by an interrupted run back to pending first
    #[arg(long)]
    pub requeue: bool,

    /// Delete upcoming IPOs missing from the latest calendar blob
    #[arg(long)]
    pub reap_upcoming: bool,
}

pub fn run(args: &ReconcileArgs, config: &PipelineConfig) -> Result<()> {
    let store = DirBlobStore::open(&config.bucket_dir)?;
    let mut db = Db::open(&config.database_path)?;
    db.init()?;

    if args.requeue {
        let moved = store.requeue_inflight()?;
        if moved > 0 {
            eprintln!("Requeued {} in-flight blobs", moved);
        }
    }

    let options = ReconcileOptions {
        reap_upcoming: args.reap_upcoming || config.reap_upcoming,
    };

    eprintln!(
        "Reconciling {} into {}",
        config.bucket_dir.display(),
        config.database_path.display()
    );
    let stats = drain(&mut db, &store, options)?;
    stats.log_summary();

    eprintln!(
        "Reconcile complete: {} blobs, {} inserted, {} updated, {} unchanged",
        stats.blobs, stats.inserted, stats.updated, stats.skipped
    );
    if stats.reaped > 0 {
        eprintln!("  {} stale upcoming IPOs removed", stats.reaped);
    }
    if stats.unrecognized > 0 {
        eprintln!("  {} blobs with unrecognized names left in place", stats.unrecognized);
    }
    if stats.failed > 0 {
        bail!(
            "{} blobs could not be applied and were left in the bucket",
            stats.failed
        );
    }
    Ok(())
}
