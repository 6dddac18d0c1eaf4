//! Error types for the listing client.

/// Errors that can occur while fetching or reading a listing page.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The HTTP request failed (network error, timeout, or body read).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// The site returned a non-success status with a body snippet.
    #[error("Request failed with status {status}")]
    HttpStatus { status: u16, body: String },
    /// The base URL and page path did not form a valid URL.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The page loaded but carried no `<thead>`/`<tbody>` table.
    #[error("no listing table found on {page}")]
    MissingTable { page: String },
}
