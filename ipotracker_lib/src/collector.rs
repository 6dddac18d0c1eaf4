//! Fetches both listing pages and uploads them to the bucket as CSV blobs.
//!
//! Both pages are fetched and encoded before anything is uploaded, so a
//! failure on either page leaves the bucket untouched.

use iposcoop_api::{Client, ListingTable};

use crate::blob::{BlobError, BlobStore};
use crate::error::ParseError;
use crate::normalize::clean_header;
use crate::records::{Category, ColumnMap};

#[derive(thiserror::Error, Debug)]
pub enum CollectError {
    #[error("fetching {category} listing failed: {source}")]
    Fetch {
        category: Category,
        source: iposcoop_api::Error,
    },
    #[error("{category} listing header: {source}")]
    Header {
        category: Category,
        source: ParseError,
    },
    #[error("{category} listing row {row}: {source}")]
    Row {
        category: Category,
        row: usize,
        source: ParseError,
    },
    #[error("csv encoding failed: {0}")]
    Encode(#[from] csv::Error),
    #[error("upload failed: {0}")]
    Storage(#[from] BlobError),
}

/// A listing encoded as CSV, ready to upload.
#[derive(Debug)]
pub struct EncodedListing {
    pub category: Category,
    pub blob_name: String,
    pub rows: usize,
    pub csv: Vec<u8>,
}

/// One uploaded blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedBlob {
    pub category: Category,
    pub name: String,
    pub rows: usize,
}

#[derive(Debug, Default)]
pub struct CollectReport {
    pub uploads: Vec<UploadedBlob>,
}

impl CollectReport {
    pub fn total_rows(&self) -> usize {
        self.uploads.iter().map(|u| u.rows).sum()
    }
}

/// Truncates, validates and normalizes a listing table, then encodes it.
///
/// The header row keeps the page's own header text; cell values are
/// normalized (see [`ColumnMap::normalize_row`]).
pub fn encode_listing(
    category: Category,
    mut table: ListingTable,
) -> Result<EncodedListing, CollectError> {
    table.truncate(category.column_count());

    let cleaned: Vec<String> = table.headers.iter().map(|h| clean_header(h)).collect();
    let map = ColumnMap::new(category, &cleaned)
        .map_err(|source| CollectError::Header { category, source })?;

    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    wtr.write_record(&table.headers)?;

    for (i, row) in table.rows.iter().enumerate() {
        let normalized = map.normalize_row(row).map_err(|source| CollectError::Row {
            category,
            row: i + 1,
            source,
        })?;
        wtr.write_record(&normalized)?;
    }

    let csv = wtr
        .into_inner()
        .map_err(|e| CollectError::Encode(e.into_error().into()))?;

    Ok(EncodedListing {
        category,
        blob_name: category.new_blob_name(),
        rows: table.rows.len(),
        csv,
    })
}

/// Fetches the upcoming and last-100 listings and uploads one blob each.
pub async fn collect<S: BlobStore>(
    client: &Client,
    store: &S,
) -> Result<CollectReport, CollectError> {
    let mut encoded = Vec::with_capacity(Category::ALL.len());

    for category in Category::ALL {
        tracing::info!(category = %category, "Fetching listing");
        let table = client
            .get_listing(category.listing())
            .await
            .map_err(|source| CollectError::Fetch { category, source })?;
        let listing = encode_listing(category, table).map_err(|e| {
            tracing::error!(category = %category, error = %e, "Listing could not be encoded");
            e
        })?;
        tracing::info!(category = %category, rows = listing.rows, "Listing parsed");
        encoded.push(listing);
    }

    let mut report = CollectReport::default();
    for listing in encoded {
        store.put(&listing.blob_name, &listing.csv)?;
        tracing::info!(
            blob = %listing.blob_name,
            rows = listing.rows,
            "Uploaded listing blob"
        );
        report.uploads.push(UploadedBlob {
            category: listing.category,
            name: listing.blob_name,
            rows: listing.rows,
        });
    }

    Ok(report)
}
