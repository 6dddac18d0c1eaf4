//! SQLite storage for completed and upcoming IPOs.

use std::collections::HashSet;
use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::records::{Category, CompletedIpo, IpoRecord, UpcomingIpo};

#[derive(thiserror::Error, Debug)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("date parse error: {0}")]
    Date(#[from] chrono::ParseError),
}

/// A row of the recent-IPOs query, in response key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentIpoRow {
    pub symbol: String,
    pub company: String,
    pub industry: String,
    pub offer_date: String,
    pub offer_price: f64,
    pub first_day_close: f64,
}

/// A row of the upcoming-IPOs query, in response key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpcomingIpoRow {
    pub symbol: String,
    pub company: String,
    pub lead_managers: String,
    pub shares_millions: f64,
    pub price_low: f64,
    pub price_high: f64,
    pub expected_to_trade: String,
}

pub struct Db {
    conn: Connection,
}

impl Db {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Creates both tables if they are absent.
    pub fn init(&self) -> Result<(), DbError> {
        let schema = include_str!("../../schema/sqlite.sql");
        self.conn.execute_batch(schema)?;
        Ok(())
    }

    /// Fingerprint stored for `symbol` in the category's table, if any.
    pub fn stored_fingerprint(
        &self,
        category: Category,
        symbol: &str,
    ) -> Result<Option<String>, DbError> {
        let sql = format!(
            "SELECT fingerprint FROM {} WHERE symbol = ?1",
            category.table()
        );
        self.conn
            .query_row(&sql, params![symbol], |row| row.get(0))
            .optional()
            .map_err(DbError::from)
    }

    /// Inserts a record seen for the first time. Commits immediately.
    pub fn insert_record(&mut self, record: &IpoRecord) -> Result<(), DbError> {
        match record {
            IpoRecord::Completed(ipo) => insert_completed(&self.conn, ipo),
            IpoRecord::Upcoming(ipo) => insert_upcoming(&self.conn, ipo),
        }
    }

    /// Replaces the stored record with the same symbol: delete then insert,
    /// committed together.
    pub fn replace_record(&mut self, record: &IpoRecord) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;
        let sql = format!("DELETE FROM {} WHERE symbol = ?1", record.category().table());
        tx.execute(&sql, params![record.symbol()])?;
        match record {
            IpoRecord::Completed(ipo) => insert_completed(&tx, ipo)?,
            IpoRecord::Upcoming(ipo) => insert_upcoming(&tx, ipo)?,
        }
        tx.commit()?;
        Ok(())
    }

    /// Deletes upcoming records whose symbol is not in `keep`.
    /// Returns the removed symbols.
    pub fn reap_upcoming(&mut self, keep: &HashSet<String>) -> Result<Vec<String>, DbError> {
        let tx = self.conn.transaction()?;
        let stale: Vec<String> = {
            let mut stmt = tx.prepare("SELECT symbol FROM upcoming_ipos ORDER BY symbol")?;
            let symbols = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            symbols.into_iter().filter(|s| !keep.contains(s)).collect()
        };
        {
            let mut stmt = tx.prepare("DELETE FROM upcoming_ipos WHERE symbol = ?1")?;
            for symbol in &stale {
                stmt.execute(params![symbol])?;
            }
        }
        tx.commit()?;
        Ok(stale)
    }

    pub fn completed_count(&self) -> Result<i64, DbError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(1) FROM ipos", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn upcoming_count(&self) -> Result<i64, DbError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(1) FROM upcoming_ipos", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn get_completed(&self, symbol: &str) -> Result<Option<CompletedIpo>, DbError> {
        let row = self
            .conn
            .query_row(
                "SELECT symbol, company, industry, offer_date, shares_millions,
                        offer_price, first_day_close, fingerprint
                 FROM ipos WHERE symbol = ?1",
                params![symbol],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, f64>(4)?,
                        row.get::<_, f64>(5)?,
                        row.get::<_, f64>(6)?,
                        row.get::<_, String>(7)?,
                    ))
                },
            )
            .optional()?;
        let Some((symbol, company, industry, offer_date, shares, offer, close, fingerprint)) = row
        else {
            return Ok(None);
        };
        Ok(Some(CompletedIpo {
            symbol,
            company,
            industry,
            offer_date: NaiveDate::parse_from_str(&offer_date, "%Y-%m-%d")?,
            shares_millions: shares,
            offer_price: offer,
            first_day_close: close,
            fingerprint,
        }))
    }

    pub fn get_upcoming(&self, symbol: &str) -> Result<Option<UpcomingIpo>, DbError> {
        let row = self
            .conn
            .query_row(
                "SELECT symbol, company, lead_managers, shares_millions, price_low,
                        price_high, est_volume, expected_to_trade, fingerprint
                 FROM upcoming_ipos WHERE symbol = ?1",
                params![symbol],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, f64>(4)?,
                        row.get::<_, f64>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, Option<String>>(7)?,
                        row.get::<_, String>(8)?,
                    ))
                },
            )
            .optional()?;
        let Some((symbol, company, lead, shares, low, high, volume, expected, fingerprint)) = row
        else {
            return Ok(None);
        };
        let expected_to_trade = match expected {
            Some(text) => Some(NaiveDate::parse_from_str(&text, "%Y-%m-%d")?),
            None => None,
        };
        Ok(Some(UpcomingIpo {
            symbol,
            company,
            lead_managers: lead,
            shares_millions: shares,
            price_low: low,
            price_high: high,
            est_volume: volume,
            expected_to_trade,
            fingerprint,
        }))
    }

    /// All completed IPOs, most recent offer date first.
    pub fn recent_ipos(&self) -> Result<Vec<RecentIpoRow>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT symbol, company, industry, offer_date, offer_price, first_day_close
             FROM ipos
             ORDER BY offer_date DESC, symbol",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(RecentIpoRow {
                    symbol: row.get(0)?,
                    company: row.get(1)?,
                    industry: row.get(2)?,
                    offer_date: row.get(3)?,
                    offer_price: row.get(4)?,
                    first_day_close: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Upcoming IPOs expected to trade on or after `today`, soonest first.
    /// Records without a known trade date are excluded.
    pub fn upcoming_ipos(&self, today: NaiveDate) -> Result<Vec<UpcomingIpoRow>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT symbol, company, lead_managers, shares_millions, price_low,
                    price_high, expected_to_trade
             FROM upcoming_ipos
             WHERE expected_to_trade >= ?1
             ORDER BY expected_to_trade ASC, symbol",
        )?;
        let rows = stmt
            .query_map(params![today.format("%Y-%m-%d").to_string()], |row| {
                Ok(UpcomingIpoRow {
                    symbol: row.get(0)?,
                    company: row.get(1)?,
                    lead_managers: row.get(2)?,
                    shares_millions: row.get(3)?,
                    price_low: row.get(4)?,
                    price_high: row.get(5)?,
                    expected_to_trade: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn insert_completed(conn: &Connection, ipo: &CompletedIpo) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO ipos (
           symbol, company, industry, offer_date, shares_millions,
           offer_price, first_day_close, fingerprint
         )
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            ipo.symbol,
            ipo.company,
            ipo.industry,
            ipo.offer_date.format("%Y-%m-%d").to_string(),
            ipo.shares_millions,
            ipo.offer_price,
            ipo.first_day_close,
            ipo.fingerprint,
        ],
    )?;
    Ok(())
}

fn insert_upcoming(conn: &Connection, ipo: &UpcomingIpo) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO upcoming_ipos (
           symbol, company, lead_managers, shares_millions, price_low,
           price_high, est_volume, expected_to_trade, fingerprint
         )
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            ipo.symbol,
            ipo.company,
            ipo.lead_managers,
            ipo.shares_millions,
            ipo.price_low,
            ipo.price_high,
            ipo.est_volume,
            ipo.expected_to_trade
                .map(|d| d.format("%Y-%m-%d").to_string()),
            ipo.fingerprint,
        ],
    )?;
    Ok(())
}
