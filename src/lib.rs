//! Korean real-estate dashboard feeds: apartment trades, subscription
//! listings and population migration, with static fallback data

pub mod api;
pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod regions;

#[cfg(test)]
mod test_support;
