//! Scrape per-country SMS guideline tables into ordered flat records and
//! upsert them into a table keyed by ISO code.

pub mod discovery;
pub mod error;
pub mod export;
pub mod extract;
pub mod fetch;
pub mod normalize;
pub mod outcome;
pub mod pipeline;
pub mod record;
pub mod settings;
pub mod store;
