//! Applies pending CSV blobs to the IPO tables.
//!
//! Each data row is fingerprinted over its raw line text and compared with
//! the fingerprint stored under the same symbol: unseen symbols are
//! inserted, changed rows replaced, identical rows skipped. Every row
//! commits on its own, so a blob that fails halfway can be retried and the
//! rows already applied will be skipped.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::blob::{BlobError, BlobStore};
use crate::db::{Db, DbError};
use crate::error::ParseError;
use crate::normalize::{clean_header, fingerprint};
use crate::records::{Category, ColumnMap, IpoRecord};

#[derive(thiserror::Error, Debug)]
pub enum ReconcileError {
    #[error("blob store error: {0}")]
    Storage(#[from] BlobError),
    #[error("blob {blob} is not valid UTF-8")]
    Decode { blob: String },
    #[error("blob {blob} has no header line")]
    Empty { blob: String },
    #[error("blob {blob} is not routed to any table")]
    Unrouted { blob: String },
    #[error("blob {blob} header: {source}")]
    Header { blob: String, source: ParseError },
    #[error("blob {blob} line {line}: {source}")]
    Row {
        blob: String,
        line: usize,
        source: ParseError,
    },
    #[error("blob {blob} line {line}: write failed after {applied} rows were applied: {source}")]
    Persistence {
        blob: String,
        line: usize,
        applied: usize,
        source: DbError,
    },
}

impl ReconcileError {
    /// Whether retrying the same blob later could succeed without changes to
    /// the blob itself. Content errors are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Persistence { .. })
    }
}

/// What happened to a single row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Inserted,
    Updated,
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Delete upcoming records whose symbol is absent from a fully applied
    /// upcoming blob.
    pub reap_upcoming: bool,
}

/// Counters for a reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    /// Blobs fully applied and acknowledged.
    pub blobs: usize,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    /// Upcoming records removed by reaping.
    pub reaped: usize,
    /// Blobs left in place because their name matches no table.
    pub unrecognized: usize,
    /// Blobs released after a content error.
    pub failed: usize,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl ReconcileStats {
    pub fn record(&mut self, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Inserted => self.inserted += 1,
            RowOutcome::Updated => self.updated += 1,
            RowOutcome::Skipped => self.skipped += 1,
        }
    }

    /// Rows inserted or updated.
    pub fn applied(&self) -> usize {
        self.inserted + self.updated
    }

    fn merge(&mut self, other: &ReconcileStats) {
        self.blobs += other.blobs;
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.reaped += other.reaped;
        self.unrecognized += other.unrecognized;
        self.failed += other.failed;
    }

    pub fn log_summary(&self) {
        tracing::info!(
            blobs = self.blobs,
            inserted = self.inserted,
            updated = self.updated,
            skipped = self.skipped,
            reaped = self.reaped,
            unrecognized = self.unrecognized,
            failed = self.failed,
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "Reconciliation complete"
        );
    }
}

/// Inserts, replaces or skips one record by comparing fingerprints.
pub fn reconcile_record(db: &mut Db, record: &IpoRecord) -> Result<RowOutcome, DbError> {
    match db.stored_fingerprint(record.category(), record.symbol())? {
        None => {
            db.insert_record(record)?;
            Ok(RowOutcome::Inserted)
        }
        Some(stored) if stored != record.fingerprint() => {
            db.replace_record(record)?;
            Ok(RowOutcome::Updated)
        }
        Some(_) => Ok(RowOutcome::Skipped),
    }
}

fn split_fields(line: &str) -> Result<Vec<String>, ParseError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    let mut record = csv::StringRecord::new();
    if !rdr.read_record(&mut record)? {
        return Ok(Vec::new());
    }
    Ok(record.iter().map(str::to_string).collect())
}

/// Applies the text of one blob to the database.
///
/// `name` routes the blob to a table by prefix. Rows are applied in order
/// and committed one by one; the first failing row stops the blob.
pub fn apply_blob(
    db: &mut Db,
    name: &str,
    body: &str,
    options: ReconcileOptions,
) -> Result<ReconcileStats, ReconcileError> {
    let category = Category::from_blob_name(name).ok_or_else(|| ReconcileError::Unrouted {
        blob: name.to_string(),
    })?;

    let mut lines = body
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| !line.trim().is_empty());

    let (_, header_line) = lines.next().ok_or_else(|| ReconcileError::Empty {
        blob: name.to_string(),
    })?;
    let headers: Vec<String> = split_fields(header_line)
        .map_err(|source| ReconcileError::Header {
            blob: name.to_string(),
            source,
        })?
        .iter()
        .map(|h| clean_header(h))
        .collect();
    let map = ColumnMap::new(category, &headers).map_err(|source| ReconcileError::Header {
        blob: name.to_string(),
        source,
    })?;

    let mut stats = ReconcileStats::default();
    let mut seen: HashSet<String> = HashSet::new();

    for (line_no, line) in lines {
        let record = split_fields(line)
            .and_then(|fields| map.to_record(&fields, fingerprint(line)))
            .map_err(|source| ReconcileError::Row {
                blob: name.to_string(),
                line: line_no,
                source,
            })?;

        let outcome = reconcile_record(db, &record).map_err(|source| {
            tracing::error!(
                blob = name,
                line = line_no,
                symbol = record.symbol(),
                applied = stats.applied(),
                error = %source,
                "Row write failed"
            );
            ReconcileError::Persistence {
                blob: name.to_string(),
                line: line_no,
                applied: stats.applied(),
                source,
            }
        })?;

        match outcome {
            RowOutcome::Skipped => {
                tracing::debug!(blob = name, symbol = record.symbol(), "Skipped unchanged row")
            }
            _ => tracing::info!(
                blob = name,
                symbol = record.symbol(),
                outcome = ?outcome,
                "Applied row"
            ),
        }
        stats.record(outcome);
        seen.insert(record.symbol().to_string());
    }

    if options.reap_upcoming && category == Category::Upcoming {
        if seen.is_empty() {
            tracing::warn!(blob = name, "Upcoming blob has no rows, not reaping");
        } else {
            let removed = db
                .reap_upcoming(&seen)
                .map_err(|source| ReconcileError::Persistence {
                    blob: name.to_string(),
                    line: 0,
                    applied: stats.applied(),
                    source,
                })?;
            for symbol in &removed {
                tracing::info!(blob = name, symbol = %symbol, "Reaped stale upcoming record");
            }
            stats.reaped = removed.len();
        }
    }

    Ok(stats)
}

/// Drains every pending blob from `store` into `db`.
///
/// Each blob is claimed before processing and acknowledged (deleted) only
/// after all of its rows are applied. Blobs with unrecognized names are
/// left unclaimed. A blob with bad content is released and counted in
/// `failed`, and the run moves on; a write or storage failure releases the
/// blob and stops the run.
pub fn drain<S: BlobStore>(
    db: &mut Db,
    store: &S,
    options: ReconcileOptions,
) -> Result<ReconcileStats, ReconcileError> {
    let start = Instant::now();
    let mut stats = ReconcileStats::default();

    let pending = store.list_pending()?;
    tracing::info!(pending = pending.len(), "Reconciliation started");

    for name in pending {
        if Category::from_blob_name(&name).is_none() {
            tracing::warn!(blob = %name, "Unrecognized blob prefix, leaving in place");
            stats.unrecognized += 1;
            continue;
        }

        let Some(claim) = store.claim(&name)? else {
            tracing::info!(blob = %name, "Blob already claimed by another run");
            continue;
        };

        let result = store.read(&claim).map_err(ReconcileError::from).and_then(|bytes| {
            let body = String::from_utf8(bytes).map_err(|_| ReconcileError::Decode {
                blob: name.clone(),
            })?;
            apply_blob(db, &name, &body, options)
        });

        match result {
            Ok(blob_stats) => {
                store.ack(claim)?;
                tracing::info!(
                    blob = %name,
                    inserted = blob_stats.inserted,
                    updated = blob_stats.updated,
                    skipped = blob_stats.skipped,
                    "Blob applied and removed"
                );
                stats.merge(&blob_stats);
                stats.blobs += 1;
            }
            Err(e) if e.is_transient() => {
                tracing::error!(blob = %name, error = %e, "Reconciliation aborted, blob released");
                if let Err(release_err) = store.release(claim) {
                    tracing::error!(
                        blob = %name,
                        error = %release_err,
                        "Blob could not be released, it stays claimed until requeued"
                    );
                }
                return Err(e);
            }
            Err(e) => {
                tracing::error!(blob = %name, error = %e, "Blob rejected, released for inspection");
                store.release(claim)?;
                stats.failed += 1;
            }
        }
    }

    stats.elapsed = start.elapsed();
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::{ClaimedBlob, DirBlobStore};
    use chrono::NaiveDate;

    const LAST_100_BLOB: &str = "Symbol,Company,Industry,Offer Date,Shares(millions),Offer Price,1st Day Close\n\
ABCD,Acme Co,Tech,01/02/2023,5.0,$10.00,$12.50\n\
EFGH,EFGH Holdings Corp.,Financial,2023-03-15,20.25,21.00,19.75\n";

    const UPCOMING_BLOB: &str = "Company,Symbol proposed,Lead Managers,Shares (Millions),Price Low,Price High,Est. $ Volume,Expected to Trade\n\
Northwind Robotics Inc.,NWRB,Goldman Sachs/ Morgan Stanley,12.5,18.00,20.00,$237.5 mil,2026-10-22\n\
Harbor Bancorp,HRBC,\"Keefe, Bruyette & Woods\",3,9.00,11.00,$30.0 mil,2026-10-26\n";

    fn open_test_db() -> Db {
        let db = Db::open_in_memory().expect("open in-memory db");
        db.init().expect("init schema");
        db
    }

    #[test]
    fn first_pass_inserts_every_row() {
        let mut db = open_test_db();
        let stats =
            apply_blob(&mut db, "last_100_a.csv", LAST_100_BLOB, ReconcileOptions::default())
                .unwrap();
        assert_eq!(stats.inserted, 2);
        assert_eq!(stats.updated, 0);
        assert_eq!(db.completed_count().unwrap(), 2);

        let ipo = db.get_completed("ABCD").unwrap().unwrap();
        assert_eq!(ipo.offer_price, 10.0);
        assert_eq!(ipo.first_day_close, 12.5);
        assert_eq!(ipo.offer_date, NaiveDate::from_ymd_opt(2023, 1, 2).unwrap());
        assert_eq!(
            ipo.fingerprint,
            fingerprint("ABCD,Acme Co,Tech,01/02/2023,5.0,$10.00,$12.50")
        );
    }

    #[test]
    fn second_pass_skips_everything() {
        let mut db = open_test_db();
        apply_blob(&mut db, "last_100_a.csv", LAST_100_BLOB, ReconcileOptions::default())
            .unwrap();
        let stats =
            apply_blob(&mut db, "last_100_b.csv", LAST_100_BLOB, ReconcileOptions::default())
                .unwrap();
        assert_eq!(stats.inserted + stats.updated, 0);
        assert_eq!(stats.skipped, 2);
        assert_eq!(db.completed_count().unwrap(), 2);
    }

    #[test]
    fn changed_row_replaces_in_place() {
        let mut db = open_test_db();
        apply_blob(&mut db, "last_100_a.csv", LAST_100_BLOB, ReconcileOptions::default())
            .unwrap();

        let changed = LAST_100_BLOB.replace("$12.50", "$13.00");
        let stats =
            apply_blob(&mut db, "last_100_b.csv", &changed, ReconcileOptions::default()).unwrap();
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(db.completed_count().unwrap(), 2);
        let ipo = db.get_completed("ABCD").unwrap().unwrap();
        assert_eq!(ipo.first_day_close, 13.0);
    }

    #[test]
    fn upcoming_blob_routes_by_proposed_symbol() {
        let mut db = open_test_db();
        let stats =
            apply_blob(&mut db, "upcoming_a.csv", UPCOMING_BLOB, ReconcileOptions::default())
                .unwrap();
        assert_eq!(stats.inserted, 2);
        assert_eq!(db.upcoming_count().unwrap(), 2);
        assert_eq!(db.completed_count().unwrap(), 0);
        let ipo = db.get_upcoming("HRBC").unwrap().unwrap();
        assert_eq!(ipo.lead_managers, "Keefe, Bruyette & Woods");
    }

    #[test]
    fn unrecognized_prefix_is_rejected() {
        let mut db = open_test_db();
        let err = apply_blob(&mut db, "misc_a.csv", LAST_100_BLOB, ReconcileOptions::default())
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Unrouted { .. }));
    }

    #[test]
    fn empty_blob_is_rejected() {
        let mut db = open_test_db();
        let err =
            apply_blob(&mut db, "last_100_a.csv", "\n\n", ReconcileOptions::default()).unwrap_err();
        assert!(matches!(err, ReconcileError::Empty { .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn header_only_blob_applies_nothing() {
        let mut db = open_test_db();
        let header = LAST_100_BLOB.lines().next().unwrap();
        let stats =
            apply_blob(&mut db, "last_100_a.csv", header, ReconcileOptions::default()).unwrap();
        assert_eq!(stats, ReconcileStats::default());
    }

    #[test]
    fn bad_row_stops_the_blob_after_earlier_rows_commit() {
        let mut db = open_test_db();
        let body = format!("{}ZZZZ,Broken,Tech,someday,1,1,1\n", LAST_100_BLOB);
        let err = apply_blob(&mut db, "last_100_a.csv", &body, ReconcileOptions::default())
            .unwrap_err();
        match err {
            ReconcileError::Row { line, .. } => assert_eq!(line, 4),
            other => panic!("expected row error, got {:?}", other),
        }
        assert_eq!(db.completed_count().unwrap(), 2);
    }

    #[test]
    fn reaping_removes_symbols_missing_from_calendar() {
        let mut db = open_test_db();
        let options = ReconcileOptions {
            reap_upcoming: true,
        };
        apply_blob(&mut db, "upcoming_a.csv", UPCOMING_BLOB, options).unwrap();

        let without_harbor: String = UPCOMING_BLOB
            .lines()
            .filter(|l| !l.contains("HRBC"))
            .map(|l| format!("{}\n", l))
            .collect();
        let stats = apply_blob(&mut db, "upcoming_b.csv", &without_harbor, options).unwrap();

        assert_eq!(stats.reaped, 1);
        assert_eq!(stats.skipped, 1);
        assert!(db.get_upcoming("HRBC").unwrap().is_none());
        assert!(db.get_upcoming("NWRB").unwrap().is_some());
    }

    #[test]
    fn non_finite_price_is_stored_as_zero() {
        let mut db = open_test_db();
        let body = LAST_100_BLOB.replace("$10.00", "NaN").replace("$12.50", "inf");
        let stats =
            apply_blob(&mut db, "last_100_a.csv", &body, ReconcileOptions::default()).unwrap();
        assert_eq!(stats.inserted, 2);
        let ipo = db.get_completed("ABCD").unwrap().unwrap();
        assert_eq!(ipo.offer_price, 0.0);
        assert_eq!(ipo.first_day_close, 0.0);
    }

    /// Delegates to a directory store but refuses to release claims.
    struct StuckReleaseStore(DirBlobStore);

    impl BlobStore for StuckReleaseStore {
        fn put(&self, name: &str, data: &[u8]) -> Result<(), BlobError> {
            self.0.put(name, data)
        }
        fn list_pending(&self) -> Result<Vec<String>, BlobError> {
            self.0.list_pending()
        }
        fn claim(&self, name: &str) -> Result<Option<ClaimedBlob>, BlobError> {
            self.0.claim(name)
        }
        fn read(&self, claim: &ClaimedBlob) -> Result<Vec<u8>, BlobError> {
            self.0.read(claim)
        }
        fn ack(&self, claim: ClaimedBlob) -> Result<(), BlobError> {
            self.0.ack(claim)
        }
        fn release(&self, _claim: ClaimedBlob) -> Result<(), BlobError> {
            Err(BlobError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "release refused",
            )))
        }
        fn requeue_inflight(&self) -> Result<usize, BlobError> {
            self.0.requeue_inflight()
        }
    }

    #[test]
    fn write_failure_is_returned_even_when_release_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = StuckReleaseStore(DirBlobStore::open(dir.path()).unwrap());
        store.put("last_100_a.csv", LAST_100_BLOB.as_bytes()).unwrap();
        // No schema, so the first fingerprint lookup fails.
        let mut db = Db::open_in_memory().unwrap();

        let err = drain(&mut db, &store, ReconcileOptions::default()).unwrap_err();
        match err {
            ReconcileError::Persistence { blob, line, applied, .. } => {
                assert_eq!(blob, "last_100_a.csv");
                assert_eq!(line, 2);
                assert_eq!(applied, 0);
            }
            other => panic!("expected persistence error, got {:?}", other),
        }
    }

    #[test]
    fn without_reaping_missing_symbols_stay() {
        let mut db = open_test_db();
        apply_blob(&mut db, "upcoming_a.csv", UPCOMING_BLOB, ReconcileOptions::default())
            .unwrap();
        let header = UPCOMING_BLOB.lines().next().unwrap();
        apply_blob(&mut db, "upcoming_b.csv", header, ReconcileOptions::default()).unwrap();
        assert_eq!(db.upcoming_count().unwrap(), 2);
    }
}
