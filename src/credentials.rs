//! Sink credentials, kept apart from the run configuration.

use crate::error::ConfigError;
use crate::store::SinkKind;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Credentials for the object store and the relational database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub s3: Option<ObjectStoreCredentials>,

    #[serde(default)]
    pub database: Option<DatabaseCredentials>,
}

/// S3-compatible object store access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStoreCredentials {
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
    #[serde(default)]
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible services
    #[serde(default)]
    pub endpoint: Option<String>,
}

fn default_region() -> String {
    "eu-west-2".to_string()
}

impl Default for ObjectStoreCredentials {
    fn default() -> Self {
        Self {
            access_key_id: String::new(),
            secret_access_key: String::new(),
            bucket: String::new(),
            region: default_region(),
            endpoint: None,
        }
    }
}

/// Relational database access, either a full URL or its parts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseCredentials {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub database_type: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub database: String,
}

impl DatabaseCredentials {
    /// Builds the connection URL, preferring an explicit `url`.
    pub fn connection_url(&self) -> Option<String> {
        if let Some(url) = self.url.as_ref().filter(|u| !u.is_empty()) {
            return Some(url.clone());
        }

        if self.database_type.is_empty() || self.endpoint.is_empty() {
            return None;
        }

        let auth = match (self.user.is_empty(), self.password.is_empty()) {
            (true, _) => String::new(),
            (false, true) => format!("{}@", urlencoding::encode(&self.user)),
            (false, false) => format!(
                "{}:{}@",
                urlencoding::encode(&self.user),
                urlencoding::encode(&self.password)
            ),
        };
        let port = self.port.map(|p| format!(":{}", p)).unwrap_or_default();

        Some(format!(
            "{}://{}{}{}/{}",
            self.database_type, auth, self.endpoint, port, self.database
        ))
    }
}

impl Credentials {
    /// Loads credentials from a TOML file. A missing file yields empty credentials.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No credentials file at {}", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| {
            ConfigError::ReadCredentials { path: path.to_path_buf(), source }
        })?;

        toml::from_str(&content)
            .map_err(|source| ConfigError::ParseCredentials { path: path.to_path_buf(), source })
    }

    /// Applies environment variable overrides.
    pub fn with_env(mut self) -> Self {
        let access_key = std::env::var("AWS_ACCESS_KEY_ID").ok();
        let secret_key = std::env::var("AWS_SECRET_ACCESS_KEY").ok();
        let bucket = std::env::var("PIPESTOCK_BUCKET").ok();

        if access_key.is_some() || secret_key.is_some() || bucket.is_some() {
            let s3 = self.s3.get_or_insert_with(Default::default);
            if let Some(v) = access_key {
                s3.access_key_id = v;
            }
            if let Some(v) = secret_key {
                s3.secret_access_key = v;
            }
            if let Some(v) = bucket {
                s3.bucket = v;
            }
        }

        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.get_or_insert_with(Default::default).url = Some(url);
        }

        self
    }

    /// Returns the object store credentials, failing on any missing key.
    pub fn require_object_store(&self) -> Result<&ObjectStoreCredentials, ConfigError> {
        let missing = |key| ConfigError::MissingCredential { sink: SinkKind::ObjectStore, key };

        let s3 = self.s3.as_ref().ok_or_else(|| missing("s3.access_key_id"))?;
        if s3.access_key_id.is_empty() {
            return Err(missing("s3.access_key_id"));
        }
        if s3.secret_access_key.is_empty() {
            return Err(missing("s3.secret_access_key"));
        }
        if s3.bucket.is_empty() {
            return Err(missing("s3.bucket"));
        }
        Ok(s3)
    }

    /// Returns the database connection URL, failing if none can be built.
    pub fn require_database(&self) -> Result<String, ConfigError> {
        self.database.as_ref().and_then(DatabaseCredentials::connection_url).ok_or(
            ConfigError::MissingCredential { sink: SinkKind::Table, key: "database.url" },
        )
    }
}
