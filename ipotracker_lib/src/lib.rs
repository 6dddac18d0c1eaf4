//! Library layer for the IPO tracker: listing collection, blob
//! reconciliation into SQLite, and the JSON query service.
//!
//! Wraps the `iposcoop_api` scraper crate. The collector turns each listing
//! page into a CSV blob, the reconciler applies pending blobs row by row,
//! and the query layer serves the stored tables.

pub mod blob;
pub mod collector;
pub mod config;
pub mod db;
pub mod error;
pub mod normalize;
pub mod query;
pub mod records;
pub mod reconcile;
pub mod service;

pub use iposcoop_api;
pub use iposcoop_api::{Client, Listing, ListingTable};

pub use blob::{BlobError, BlobStore, ClaimedBlob, DirBlobStore};
pub use collector::{collect, encode_listing, CollectError, CollectReport, UploadedBlob};
pub use config::{ConfigError, PipelineConfig};
pub use db::{Db, DbError, RecentIpoRow, UpcomingIpoRow};
pub use error::ParseError;
pub use query::{recent_ipos_response, upcoming_ipos_response, QueryResponse};
pub use records::{Category, CompletedIpo, IpoRecord, UpcomingIpo};
pub use reconcile::{
    apply_blob, drain, reconcile_record, ReconcileError, ReconcileOptions, ReconcileStats,
    RowOutcome,
};
pub use service::{open_router, router};
