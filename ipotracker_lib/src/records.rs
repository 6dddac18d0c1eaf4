//! Typed IPO records and the header-to-field mapping for each listing.

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use iposcoop_api::Listing;
use serde::Serialize;

use crate::error::ParseError;
use crate::normalize::{
    extract_trade_date, parse_offer_date, parse_price, parse_shares, parse_stored_date,
};

/// How a column's raw text is coerced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Shares,
    Price,
    /// Strict `MM/DD/YYYY` on the source page.
    OfferDate,
    /// A date embedded somewhere in free text, optional.
    TradeDate,
}

const COMPLETED_COLUMNS: &[(&str, FieldKind)] = &[
    ("symbol", FieldKind::Text),
    ("company", FieldKind::Text),
    ("industry", FieldKind::Text),
    ("offer_date", FieldKind::OfferDate),
    ("shares_millions", FieldKind::Shares),
    ("offer_price", FieldKind::Price),
    ("1st_day_close", FieldKind::Price),
];

const UPCOMING_COLUMNS: &[(&str, FieldKind)] = &[
    ("company", FieldKind::Text),
    ("symbol_proposed", FieldKind::Text),
    ("lead_managers", FieldKind::Text),
    ("shares_millions", FieldKind::Shares),
    ("price_low", FieldKind::Price),
    ("price_high", FieldKind::Price),
    ("est_volume", FieldKind::Text),
    ("expected_to_trade", FieldKind::TradeDate),
];

/// Which listing a row or blob belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    /// IPO calendar rows, stored in `upcoming_ipos`.
    Upcoming,
    /// Last-100 rows, stored in `ipos`.
    LastHundred,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Upcoming, Category::LastHundred];

    /// Prefix of blob names carrying this category.
    pub fn blob_prefix(&self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::LastHundred => "last_100",
        }
    }

    /// Routes a blob to its category by name prefix.
    pub fn from_blob_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| name.starts_with(c.blob_prefix()))
    }

    /// A fresh, globally unique blob name: `<prefix>_<uuid>.csv`.
    pub fn new_blob_name(&self) -> String {
        format!("{}_{}.csv", self.blob_prefix(), uuid::Uuid::new_v4())
    }

    pub fn listing(&self) -> Listing {
        match self {
            Self::Upcoming => Listing::Upcoming,
            Self::LastHundred => Listing::LastHundred,
        }
    }

    /// Number of leading source columns kept from the page table.
    pub fn column_count(&self) -> usize {
        self.columns().len()
    }

    /// Cleaned header of the natural-key column.
    pub fn key_column(&self) -> &'static str {
        match self {
            Self::Upcoming => "symbol_proposed",
            Self::LastHundred => "symbol",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming_ipos",
            Self::LastHundred => "ipos",
        }
    }

    fn columns(&self) -> &'static [(&'static str, FieldKind)] {
        match self {
            Self::Upcoming => UPCOMING_COLUMNS,
            Self::LastHundred => COMPLETED_COLUMNS,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.blob_prefix())
    }
}

/// Position of every required column in a header row.
///
/// Built once per table or blob; construction fails on the first missing
/// column so a layout change surfaces before any row is touched.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    category: Category,
    index: HashMap<&'static str, usize>,
    kinds: Vec<Option<FieldKind>>,
}

impl ColumnMap {
    /// `headers` must already be cleaned with [`crate::normalize::clean_header`].
    pub fn new<S: AsRef<str>>(category: Category, headers: &[S]) -> Result<Self, ParseError> {
        let mut index = HashMap::new();
        let mut kinds = vec![None; headers.len()];
        for &(name, kind) in category.columns() {
            let pos = headers
                .iter()
                .position(|h| h.as_ref() == name)
                .ok_or_else(|| ParseError::MissingColumn(name.to_string()))?;
            index.insert(name, pos);
            kinds[pos] = Some(kind);
        }
        Ok(Self {
            category,
            index,
            kinds,
        })
    }

    pub fn category(&self) -> Category {
        self.category
    }

    fn cell<'r, S: AsRef<str>>(&self, row: &'r [S], column: &str) -> Result<&'r str, ParseError> {
        let pos = *self
            .index
            .get(column)
            .ok_or_else(|| ParseError::MissingColumn(column.to_string()))?;
        row.get(pos)
            .map(|c| c.as_ref().trim())
            .ok_or(ParseError::ShortRow {
                expected: pos + 1,
                found: row.len(),
            })
    }

    fn key<'r, S: AsRef<str>>(&self, row: &'r [S]) -> Result<&'r str, ParseError> {
        let column = self.category.key_column();
        let value = self.cell(row, column)?;
        if value.is_empty() {
            return Err(ParseError::EmptyField(column.to_string()));
        }
        Ok(value)
    }

    /// Coerces a source row into the text written to a blob.
    ///
    /// Prices and share counts become plain decimals at full precision and
    /// dates `YYYY-MM-DD` (an unreadable trade date becomes empty). Text
    /// has its whitespace runs collapsed so every blob row stays on one line.
    pub fn normalize_row<S: AsRef<str>>(&self, row: &[S]) -> Result<Vec<String>, ParseError> {
        if row.len() < self.kinds.len() {
            return Err(ParseError::ShortRow {
                expected: self.kinds.len(),
                found: row.len(),
            });
        }
        self.key(row)?;
        row.iter()
            .enumerate()
            .map(|(i, cell)| {
                let raw = cell.as_ref().trim();
                match self.kinds.get(i).copied().flatten() {
                    None | Some(FieldKind::Text) => {
                        Ok(raw.split_whitespace().collect::<Vec<_>>().join(" "))
                    }
                    Some(FieldKind::Shares) => parse_shares(raw).map(|v| v.to_string()),
                    Some(FieldKind::Price) => Ok(parse_price(raw).to_string()),
                    Some(FieldKind::OfferDate) => {
                        parse_offer_date(raw).map(|d| d.format("%Y-%m-%d").to_string())
                    }
                    Some(FieldKind::TradeDate) => Ok(extract_trade_date(raw)
                        .map(|d| d.format("%Y-%m-%d").to_string())
                        .unwrap_or_default()),
                }
            })
            .collect()
    }

    /// Builds a typed record from a blob row.
    ///
    /// Accepts both normalized values and raw source formatting.
    pub fn to_record<S: AsRef<str>>(
        &self,
        row: &[S],
        fingerprint: String,
    ) -> Result<IpoRecord, ParseError> {
        let symbol = self.key(row)?.to_string();
        match self.category {
            Category::LastHundred => {
                let offer_raw = self.cell(row, "offer_date")?;
                let offer_date =
                    parse_stored_date(offer_raw).ok_or_else(|| ParseError::InvalidDate {
                        field: "offer_date".into(),
                        value: offer_raw.to_string(),
                    })?;
                Ok(IpoRecord::Completed(CompletedIpo {
                    symbol,
                    company: self.cell(row, "company")?.to_string(),
                    industry: self.cell(row, "industry")?.to_string(),
                    offer_date,
                    shares_millions: parse_shares(self.cell(row, "shares_millions")?)?,
                    offer_price: parse_price(self.cell(row, "offer_price")?),
                    first_day_close: parse_price(self.cell(row, "1st_day_close")?),
                    fingerprint,
                }))
            }
            Category::Upcoming => {
                let trade_raw = self.cell(row, "expected_to_trade")?;
                let expected_to_trade =
                    parse_stored_date(trade_raw).or_else(|| extract_trade_date(trade_raw));
                Ok(IpoRecord::Upcoming(UpcomingIpo {
                    symbol,
                    company: self.cell(row, "company")?.to_string(),
                    lead_managers: self.cell(row, "lead_managers")?.to_string(),
                    shares_millions: parse_shares(self.cell(row, "shares_millions")?)?,
                    price_low: parse_price(self.cell(row, "price_low")?),
                    price_high: parse_price(self.cell(row, "price_high")?),
                    est_volume: self.cell(row, "est_volume")?.to_string(),
                    expected_to_trade,
                    fingerprint,
                }))
            }
        }
    }
}

/// A completed offering from the last-100 page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedIpo {
    pub symbol: String,
    pub company: String,
    pub industry: String,
    pub offer_date: NaiveDate,
    pub shares_millions: f64,
    pub offer_price: f64,
    pub first_day_close: f64,
    pub fingerprint: String,
}

/// An offering from the IPO calendar. The symbol is the proposed ticker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpcomingIpo {
    pub symbol: String,
    pub company: String,
    pub lead_managers: String,
    pub shares_millions: f64,
    pub price_low: f64,
    pub price_high: f64,
    pub est_volume: String,
    pub expected_to_trade: Option<NaiveDate>,
    pub fingerprint: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IpoRecord {
    Completed(CompletedIpo),
    Upcoming(UpcomingIpo),
}

impl IpoRecord {
    pub fn category(&self) -> Category {
        match self {
            Self::Completed(_) => Category::LastHundred,
            Self::Upcoming(_) => Category::Upcoming,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Self::Completed(r) => &r.symbol,
            Self::Upcoming(r) => &r.symbol,
        }
    }

    pub fn fingerprint(&self) -> &str {
        match self {
            Self::Completed(r) => &r.fingerprint,
            Self::Upcoming(r) => &r.fingerprint,
        }
    }
}
