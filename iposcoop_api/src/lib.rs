mod client;
mod errors;
mod listing;
pub mod table;
mod user_agent;
pub use self::client::Client;
pub use self::errors::Error;
pub use self::listing::Listing;
pub use self::table::ListingTable;
