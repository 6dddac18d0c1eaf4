//! CLI subcommand implementations.

pub mod collect;
pub mod query;
pub mod reconcile;
pub mod run;
pub mod serve;
