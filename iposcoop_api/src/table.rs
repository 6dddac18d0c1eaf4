//! Extraction of the listing table from a page's HTML.

use scraper::{ElementRef, Html, Selector};

/// Header cells and body rows of the first table on a listing page.
///
/// Every cell holds the concatenated text of its descendants, trimmed.
/// Rows without any `<td>` (spacers, ad slots) are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ListingTable {
    /// Parses the first `<thead>` and first `<tbody>` of the document.
    ///
    /// Returns `None` when either is missing.
    pub fn from_html(html: &str) -> Option<Self> {
        let document = Html::parse_document(html);
        let thead_selector = Selector::parse("thead").ok()?;
        let tbody_selector = Selector::parse("tbody").ok()?;
        let th_selector = Selector::parse("th").ok()?;
        let tr_selector = Selector::parse("tr").ok()?;
        let td_selector = Selector::parse("td").ok()?;

        let thead = document.select(&thead_selector).next()?;
        let tbody = document.select(&tbody_selector).next()?;

        let headers: Vec<String> = thead.select(&th_selector).map(cell_text).collect();

        let rows: Vec<Vec<String>> = tbody
            .select(&tr_selector)
            .map(|tr| tr.select(&td_selector).map(cell_text).collect::<Vec<_>>())
            .filter(|cells| !cells.is_empty())
            .collect();

        Some(Self { headers, rows })
    }

    /// Keeps only the first `columns` headers and cells of every row.
    pub fn truncate(&mut self, columns: usize) {
        self.headers.truncate(columns);
        for row in &mut self.rows {
            row.truncate(columns);
        }
    }
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}
