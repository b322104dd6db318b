//! pipestock - idempotent product scraper with multi-sink persistence
//!
//! Searches a storefront, collects product links across result pages,
//! extracts each product and stores it in any combination of a local
//! folder, an object store, a relational table and an image folder.
//! Products already present in a sink are never written to it again.

pub mod collector;
pub mod config;
pub mod credentials;
pub mod error;
pub mod extractor;
pub mod models;
pub mod persister;
pub mod pipeline;
pub mod report;
pub mod site;
pub mod store;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use credentials::Credentials;
pub use models::{LinkSet, ProductRecord};
pub use persister::{PersistReport, Persister, SinkOutcome};
pub use pipeline::{Pipeline, RunSummary, Stage};
pub use site::{HttpNavigator, Market, PageNavigator};
pub use store::SinkKind;
