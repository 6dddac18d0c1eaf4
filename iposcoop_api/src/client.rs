//! HTTP client for the iposcoop.com listing pages.

use std::time::Duration;

use url::Url;

use crate::{listing::Listing, table::ListingTable, user_agent::get_user_agent, Error};

/// Request timeout for page fetches.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the iposcoop.com listing pages.
///
/// Sends requests with browser-like headers and a randomized user agent.
pub struct Client {
    /// Site root. Defaults to `https://www.iposcoop.com`.
    base_url: String,
    http: reqwest::Client,
}

impl Client {
    /// Creates a new client pointing at the production site.
    pub fn new() -> Result<Self, Error> {
        Self::with_base_url("https://www.iposcoop.com")
    }

    /// Creates a new client with a custom base URL. Used for testing with wiremock.
    pub fn with_base_url(base_url: &str) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .user_agent(get_user_agent())
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn page_url(&self, listing: Listing) -> Result<Url, Error> {
        Ok(Url::parse(&format!("{}{}", self.base_url, listing.path()))?)
    }

    async fn fetch_html(&self, url: Url) -> Result<String, Error> {
        let resp = self
            .http
            .get(url.clone())
            .header("accept", "text/html,application/xhtml+xml")
            .header("accept-language", "en-US,en;q=0.9")
            .header("cache-control", "no-cache")
            .header("pragma", "no-cache")
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch {}: {}", url, e);
                Error::from(e)
            })?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let snippet = truncate_body(&body);
            tracing::error!("Request to {} failed with status {}: {}", url, status, snippet);
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body: snippet,
            });
        }

        Ok(body)
    }

    /// Fetches a listing page and extracts its table.
    pub async fn get_listing(&self, listing: Listing) -> Result<ListingTable, Error> {
        let url = self.page_url(listing)?;
        let html = self.fetch_html(url).await?;
        let table = ListingTable::from_html(&html).ok_or_else(|| {
            tracing::error!("No table found on {} page", listing);
            Error::MissingTable {
                page: listing.to_string(),
            }
        })?;
        tracing::debug!(
            page = %listing,
            headers = table.headers.len(),
            rows = table.rows.len(),
            "Parsed listing table"
        );
        Ok(table)
    }

    /// Fetches the IPO calendar.
    pub async fn get_upcoming(&self) -> Result<ListingTable, Error> {
        self.get_listing(Listing::Upcoming).await
    }

    /// Fetches the last 100 completed IPOs.
    pub async fn get_last_hundred(&self) -> Result<ListingTable, Error> {
        self.get_listing(Listing::LastHundred).await
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 2000;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...[truncated]", &body[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = Client::with_base_url("http://localhost:1234/").unwrap();
        let url = client.page_url(Listing::Upcoming).unwrap();
        assert_eq!(url.as_str(), "http://localhost:1234/ipo-calendar/");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let client = Client::with_base_url("not a url").unwrap();
        assert!(matches!(
            client.page_url(Listing::LastHundred),
            Err(Error::InvalidUrl(_))
        ));
    }

    #[test]
    fn truncate_body_keeps_short_bodies() {
        assert_eq!(truncate_body("oops"), "oops");
        let long = "x".repeat(2500);
        let out = truncate_body(&long);
        assert!(out.ends_with("...[truncated]"));
        assert_eq!(out.len(), 2000 + "...[truncated]".len());
    }
}
