//! Error types for row and field normalization.

use std::fmt;

/// Errors raised while turning a source or blob row into typed values.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// A required column is absent from the header row.
    MissingColumn(String),
    /// A row has fewer cells than the header requires.
    ShortRow { expected: usize, found: usize },
    /// A required text field (the natural key) is blank.
    EmptyField(String),
    /// A numeric field could not be parsed.
    InvalidNumber { field: String, value: String },
    /// A date field could not be parsed.
    InvalidDate { field: String, value: String },
    /// A CSV line could not be split into fields.
    Csv(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingColumn(name) => write!(f, "missing required column '{}'", name),
            Self::ShortRow { expected, found } => {
                write!(f, "row has {} cells, expected at least {}", found, expected)
            }
            Self::EmptyField(name) => write!(f, "required field '{}' is empty", name),
            Self::InvalidNumber { field, value } => {
                write!(f, "invalid number for {}: '{}'", field, value)
            }
            Self::InvalidDate { field, value } => {
                write!(f, "invalid date for {}: '{}'", field, value)
            }
            Self::Csv(msg) => write!(f, "malformed CSV line: {}", msg),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<csv::Error> for ParseError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e.to_string())
    }
}
