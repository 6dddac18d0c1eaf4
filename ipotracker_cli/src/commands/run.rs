//! The `run` subcommand: collect, then reconcile.

use anyhow::Result;
use ipotracker_lib::PipelineConfig;

use super::reconcile::ReconcileArgs;

pub async fn run(args: &ReconcileArgs, config: &PipelineConfig) -> Result<()> {
    super::collect::run(config).await?;
    super::reconcile::run(args, config)
}
