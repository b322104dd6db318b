//! Error taxonomy for the pipeline.
//!
//! The variants map onto how far a failure reaches:
//! - [`StoreError`] from an image download skips that image only.
//! - [`ExtractError`] (and navigation failures on a product link) skip that product.
//! - [`StoreError`] from a sink write skips that sink for that product.
//! - [`PipelineError`] aborts the run.

use crate::store::SinkKind;
use std::path::PathBuf;
use thiserror::Error;

/// Invalid or incomplete configuration. Always fatal, raised before navigation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing credential `{key}` required by the {sink} sink")]
    MissingCredential { sink: SinkKind, key: &'static str },

    #[error("invalid table name `{0}`: use letters, digits and underscores only")]
    InvalidTableName(String),

    #[error("invalid folder name `{0}`")]
    InvalidFolder(String),

    #[error("pages must be at least 1")]
    NoPages,

    #[error("failed to read credentials file {path}: {source}")]
    ReadCredentials {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse credentials file {path}: {source}")]
    ParseCredentials {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Failures of the page navigation capability.
#[derive(Debug, Error)]
pub enum NavigatorError {
    #[error("no element matches `{0}`")]
    ElementNotFound(String),

    #[error("element `{locator}` did not appear within {waited_ms}ms")]
    Timeout { locator: String, waited_ms: u64 },

    #[error("invalid locator `{0}`")]
    InvalidLocator(String),

    #[error("no page loaded")]
    NoPage,

    #[error("invalid url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("rate limited while loading {0}; increase the delay or use a proxy")]
    RateLimited(String),

    #[error("request for {url} failed with status {status}")]
    Status { url: String, status: u16 },

    #[error("request failed: {0}")]
    Request(String),

    #[error("browser error: {0}")]
    Browser(String),
}

/// A product page could not be turned into a record.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("field `{field}` not found on product page")]
    MissingField {
        field: &'static str,
        #[source]
        source: NavigatorError,
    },

    #[error("field `{0}` is empty on product page")]
    EmptyField(&'static str),
}

/// Failures while writing to, or listing, a sink.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to download {url}: {reason}")]
    Download { url: String, reason: String },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to load seen records for the {sink} sink: {source}")]
    SeenSet {
        sink: SinkKind,
        #[source]
        source: StoreError,
    },

    #[error("failed to connect the {sink} sink: {source}")]
    Connect {
        sink: SinkKind,
        #[source]
        source: StoreError,
    },

    #[error("navigation failed during {stage}: {source}")]
    Navigation {
        stage: &'static str,
        #[source]
        source: NavigatorError,
    },
}

/// Why a single product link was skipped.
#[derive(Debug, Error)]
pub enum ProductError {
    #[error("could not open product page: {0}")]
    Navigation(#[from] NavigatorError),

    #[error(transparent)]
    Extract(#[from] ExtractError),
}
