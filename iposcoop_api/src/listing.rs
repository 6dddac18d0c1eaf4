//! The two listing pages published by iposcoop.com.

use std::fmt;

/// A listing page on the source site.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Listing {
    /// The IPO calendar: offerings expected to price soon.
    Upcoming,
    /// The last 100 completed offerings.
    LastHundred,
}

impl Listing {
    /// Path of the page relative to the site root.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Upcoming => "/ipo-calendar/",
            Self::LastHundred => "/last-100-ipos/",
        }
    }
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upcoming => write!(f, "ipo-calendar"),
            Self::LastHundred => write!(f, "last-100-ipos"),
        }
    }
}
