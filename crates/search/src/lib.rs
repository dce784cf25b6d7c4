pub mod client;
pub mod query;

pub use client::{SearchClient, SearchParams};
pub use query::build_advanced;
