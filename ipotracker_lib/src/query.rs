//! Read-only queries wrapped in the JSON response envelope.
//!
//! Every call opens its own connection and returns an envelope; failures
//! become a 400 envelope with an error message body instead of an `Err`.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::{Db, DbError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    /// JSON-encoded payload, or an error message on failure.
    pub body: String,
    pub is_base64_encoded: bool,
}

impl QueryResponse {
    pub fn ok(body: String) -> Self {
        Self {
            status_code: 200,
            headers: BTreeMap::new(),
            body,
            is_base64_encoded: false,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status_code: 400,
            headers: BTreeMap::new(),
            body: message.into(),
            is_base64_encoded: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

#[derive(thiserror::Error, Debug)]
enum QueryError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

fn respond<T, F>(db_path: &Path, query: &str, run: F) -> QueryResponse
where
    T: Serialize,
    F: FnOnce(&Db) -> Result<Vec<T>, DbError>,
{
    let result = Db::open(db_path)
        .and_then(|db| run(&db))
        .map_err(QueryError::from)
        .and_then(|rows| {
            let body = serde_json::to_string(&rows)?;
            Ok((rows.len(), body))
        });

    match result {
        Ok((count, body)) => {
            tracing::info!(query, rows = count, "Query served");
            QueryResponse::ok(body)
        }
        Err(e) => {
            tracing::error!(query, db = %db_path.display(), error = %e, "Query failed");
            QueryResponse::bad_request(e.to_string())
        }
    }
}

/// All completed IPOs, most recent offer date first.
pub fn recent_ipos_response(db_path: &Path) -> QueryResponse {
    respond(db_path, "recent", |db| db.recent_ipos())
}

/// Upcoming IPOs trading on or after `today`, soonest first.
pub fn upcoming_ipos_response(db_path: &Path, today: NaiveDate) -> QueryResponse {
    respond(db_path, "upcoming", |db| db.upcoming_ipos(today))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{RecentIpoRow, UpcomingIpoRow};
    use crate::reconcile::{apply_blob, ReconcileOptions};

    fn seeded_db(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("ipos.db");
        let mut db = Db::open(&path).unwrap();
        db.init().unwrap();
        apply_blob(
            &mut db,
            "last_100_seed.csv",
            "Symbol,Company,Industry,Offer Date,Shares(millions),Offer Price,1st Day Close\n\
ABCD,Acme Co,Tech,2023-01-02,5,10.00,12.50\n\
EFGH,EFGH Holdings Corp.,Financial,2023-03-15,20.25,21.00,19.75\n",
            ReconcileOptions::default(),
        )
        .unwrap();
        apply_blob(
            &mut db,
            "upcoming_seed.csv",
            "Company,Symbol proposed,Lead Managers,Shares (Millions),Price Low,Price High,Est. $ Volume,Expected to Trade\n\
Northwind Robotics Inc.,NWRB,Goldman Sachs,12.5,18.00,20.00,$237.5 mil,2026-10-22\n\
Old Mill Corp.,OMIL,Jefferies,2,5.00,6.00,$11.0 mil,2026-10-01\n\
Quiet Pharma Ltd.,QPHM,Jefferies,4.2,0.00,0.00,n/a,\n",
            ReconcileOptions::default(),
        )
        .unwrap();
        path
    }

    #[test]
    fn envelope_uses_camel_case_keys() {
        let json = serde_json::to_value(QueryResponse::ok("[]".into())).unwrap();
        assert_eq!(json["statusCode"], 200);
        assert_eq!(json["isBase64Encoded"], false);
        assert_eq!(json["body"], "[]");
        assert!(json["headers"].as_object().unwrap().is_empty());
    }

    #[test]
    fn recent_returns_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = seeded_db(dir.path());

        let response = recent_ipos_response(&path);
        assert!(response.is_success());
        let rows: Vec<RecentIpoRow> = serde_json::from_str(&response.body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].symbol, "EFGH");
        assert_eq!(rows[1].symbol, "ABCD");
        assert_eq!(rows[1].offer_date, "2023-01-02");
        assert_eq!(rows[1].first_day_close, 12.5);
    }

    #[test]
    fn recent_body_keys_follow_column_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = seeded_db(dir.path());

        let body = recent_ipos_response(&path).body;
        let first = body.find("\"symbol\"").unwrap();
        let last = body.find("\"first_day_close\"").unwrap();
        assert!(first < last);
        assert!(body.starts_with("[{\"symbol\":\"EFGH\",\"company\":"));
    }

    #[test]
    fn upcoming_excludes_past_and_undated() {
        let dir = tempfile::tempdir().unwrap();
        let path = seeded_db(dir.path());
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();

        let response = upcoming_ipos_response(&path, today);
        assert!(response.is_success());
        let rows: Vec<UpcomingIpoRow> = serde_json::from_str(&response.body).unwrap();
        let symbols: Vec<&str> = rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["NWRB"]);
        assert_eq!(rows[0].expected_to_trade, "2026-10-22");
    }

    #[test]
    fn empty_tables_return_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.db");
        Db::open(&path).unwrap().init().unwrap();

        let response = recent_ipos_response(&path);
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, "[]");
    }

    #[test]
    fn missing_tables_yield_400() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uninitialized.db");

        let response = recent_ipos_response(&path);
        assert_eq!(response.status_code, 400);
        assert!(response.body.contains("no such table"));
        assert!(!response.is_base64_encoded);
    }
}
