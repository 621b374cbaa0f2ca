//! Data ingestion module - fetch, parse, normalize and rank open-data feeds

pub mod address;
pub mod fallback;
pub mod fetch;
pub mod parse;
pub mod pipeline;
pub mod rank;
pub mod types;
pub mod utils;

pub use types::*;
