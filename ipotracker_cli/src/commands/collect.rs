//! The `collect` subcommand: scrape both listings into the bucket.

use anyhow::Result;
use ipotracker_lib::{collect, Client, CollectReport, DirBlobStore, PipelineConfig};

pub async fn run(config: &PipelineConfig) -> Result<CollectReport> {
    let client = Client::with_base_url(&config.source_url)?;
    let store = DirBlobStore::open(&config.bucket_dir)?;

    eprintln!(
        "Collecting listings from {} into {}",
        config.source_url,
        config.bucket_dir.display()
    );
    let report = collect(&client, &store).await?;

    for upload in &report.uploads {
        eprintln!(
            "  {} -> {} ({} rows)",
            upload.category, upload.name, upload.rows
        );
    }
    eprintln!(
        "Collect complete: {} blobs, {} rows",
        report.uploads.len(),
        report.total_rows()
    );
    Ok(report)
}
