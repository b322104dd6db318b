//! Configuration management with TOML, environment variables, and CLI overrides.

use crate::credentials::Credentials;
use crate::error::ConfigError;
use crate::site::{Locators, Market, Pacer};
use crate::store::SinkKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Run configuration with layered loading.
///
/// The pipeline only ever sees this value; how it was assembled (file,
/// environment, flags) stays in `main`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Store records on the local filesystem
    #[serde(default)]
    pub local: bool,

    /// Store records in the object store
    #[serde(default)]
    pub s3: bool,

    /// Store records in the relational table
    #[serde(default)]
    pub rds: bool,

    /// Download product images
    #[serde(default)]
    pub imgs: bool,

    /// Root directory (and object key prefix) for stored records
    #[serde(default = "default_folder")]
    pub folder: String,

    /// Search term
    #[serde(default = "default_word")]
    pub word: String,

    /// Destination table name
    #[serde(default = "default_table")]
    pub table: String,

    /// Number of result pages to collect
    #[serde(default = "default_pages")]
    pub pages: u32,

    /// Only visit the first N collected links
    #[serde(default)]
    pub max_products: Option<usize>,

    /// Storefront market
    #[serde(default)]
    pub market: Market,

    /// Overrides the market's base URL
    #[serde(default)]
    pub base_url: Option<String>,

    /// Run the browser without a window (browser feature only)
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Proxy URL (e.g., socks5://host:port)
    #[serde(default)]
    pub proxy: Option<String>,

    /// Base delay between page interactions in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Random jitter added to delay (0 to this value)
    #[serde(default = "default_delay_jitter_ms")]
    pub delay_jitter_ms: u64,

    /// How long to wait for the cookie-consent banner
    #[serde(default = "default_consent_timeout_ms")]
    pub consent_timeout_ms: u64,

    /// Scroll steps after searching
    #[serde(default = "default_scroll_steps")]
    pub scroll_steps: u32,

    /// Pixels scrolled per step
    #[serde(default = "default_scroll_speed")]
    pub scroll_speed: u32,

    /// Path to the credentials file
    #[serde(default = "default_credentials")]
    pub credentials: PathBuf,

    /// Output format for the run summary
    #[serde(default)]
    pub format: OutputFormat,

    /// Page locators
    #[serde(default)]
    pub locators: Locators,
}

fn default_folder() -> String {
    "raw_data".to_string()
}

fn default_word() -> String {
    "desk".to_string()
}

fn default_table() -> String {
    "table_name".to_string()
}

fn default_pages() -> u32 {
    2
}

fn default_headless() -> bool {
    true
}

fn default_delay_ms() -> u64 {
    1000
}

fn default_delay_jitter_ms() -> u64 {
    500
}

fn default_consent_timeout_ms() -> u64 {
    3000
}

fn default_scroll_steps() -> u32 {
    1
}

fn default_scroll_speed() -> u32 {
    300
}

fn default_credentials() -> PathBuf {
    PathBuf::from("credentials.toml")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            local: false,
            s3: false,
            rds: false,
            imgs: false,
            folder: default_folder(),
            word: default_word(),
            table: default_table(),
            pages: default_pages(),
            max_products: None,
            market: Market::Gb,
            base_url: None,
            headless: default_headless(),
            proxy: None,
            delay_ms: default_delay_ms(),
            delay_jitter_ms: default_delay_jitter_ms(),
            consent_timeout_ms: default_consent_timeout_ms(),
            scroll_steps: default_scroll_steps(),
            scroll_speed: default_scroll_speed(),
            credentials: default_credentials(),
            format: OutputFormat::Table,
            locators: Locators::default(),
        }
    }
}

impl Config {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading config from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Loads configuration with fallback to default locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        // 1. Explicit path takes precedence
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }

        // 2. Try current directory
        let local_config = Path::new("pipestock.toml");
        if local_config.exists() {
            debug!("Found pipestock.toml in current directory");
            return Self::from_file(local_config);
        }

        // 3. Try XDG config directory
        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("pipestock").join("config.toml");
            if xdg_config.exists() {
                debug!("Found config in XDG config directory");
                return Self::from_file(xdg_config);
            }
        }

        // 4. Return default config
        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Applies environment variable overrides.
    pub fn with_env(mut self) -> Self {
        if let Ok(market) = std::env::var("PIPESTOCK_MARKET") {
            if let Ok(m) = market.parse() {
                self.market = m;
            }
        }

        if let Ok(proxy) = std::env::var("PIPESTOCK_PROXY") {
            self.proxy = Some(proxy);
        }

        if let Ok(delay) = std::env::var("PIPESTOCK_DELAY") {
            if let Ok(d) = delay.parse() {
                self.delay_ms = d;
            }
        }

        if let Ok(folder) = std::env::var("PIPESTOCK_FOLDER") {
            if !folder.is_empty() {
                self.folder = folder;
            }
        }

        if let Ok(credentials) = std::env::var("PIPESTOCK_CREDENTIALS") {
            self.credentials = PathBuf::from(credentials);
        }

        self
    }

    /// Returns the storefront base URL, always ending in a slash.
    pub fn base_url(&self) -> String {
        match &self.base_url {
            Some(url) if url.ends_with('/') => url.clone(),
            Some(url) => format!("{}/", url),
            None => self.market.base_url(),
        }
    }

    /// Returns the pacing policy for page interactions.
    pub fn pacer(&self) -> Pacer {
        Pacer::new(self.delay_ms, self.delay_jitter_ms)
    }

    /// Returns the bound on the cookie-consent wait.
    pub fn consent_timeout(&self) -> Duration {
        Duration::from_millis(self.consent_timeout_ms)
    }

    /// Returns the sinks this run writes to.
    pub fn enabled_sinks(&self) -> Vec<SinkKind> {
        let mut sinks = Vec::new();
        if self.local {
            sinks.push(SinkKind::Local);
        }
        if self.s3 {
            sinks.push(SinkKind::ObjectStore);
        }
        if self.rds {
            sinks.push(SinkKind::Table);
        }
        if self.imgs {
            sinks.push(SinkKind::Images);
        }
        sinks
    }

    /// Checks the configuration against the credentials before any navigation.
    pub fn validate(&self, credentials: &Credentials) -> Result<(), ConfigError> {
        if self.pages == 0 {
            return Err(ConfigError::NoPages);
        }

        if self.folder.trim().is_empty()
            || self.folder.split(['/', '\\']).any(|part| part == "..")
        {
            return Err(ConfigError::InvalidFolder(self.folder.clone()));
        }

        if self.s3 {
            credentials.require_object_store()?;
        }

        if self.rds {
            if !is_identifier(&self.table) {
                return Err(ConfigError::InvalidTableName(self.table.clone()));
            }
            credentials.require_database()?;
        }

        Ok(())
    }
}

/// True for names safe to splice into SQL as a quoted identifier.
fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

/// Output format for the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use: table, json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{DatabaseCredentials, ObjectStoreCredentials};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn s3_credentials() -> Credentials {
        Credentials {
            s3: Some(ObjectStoreCredentials {
                access_key_id: "AKIA".to_string(),
                secret_access_key: "secret".to_string(),
                bucket: "bucket".to_string(),
                ..Default::default()
            }),
            database: None,
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.local);
        assert!(!config.s3);
        assert!(!config.rds);
        assert!(!config.imgs);
        assert_eq!(config.folder, "raw_data");
        assert_eq!(config.word, "desk");
        assert_eq!(config.table, "table_name");
        assert_eq!(config.pages, 2);
        assert!(config.max_products.is_none());
        assert_eq!(config.market, Market::Gb);
        assert!(config.headless);
        assert_eq!(config.consent_timeout(), Duration::from_millis(3000));
        assert_eq!(config.format, OutputFormat::Table);
        assert!(config.enabled_sinks().is_empty());
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("table".parse::<OutputFormat>().unwrap(), OutputFormat::Table);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);

        let err = "csv".parse::<OutputFormat>().unwrap_err();
        assert!(err.contains("Unknown format"));
        assert_eq!(OutputFormat::Json.to_string(), "json");
    }

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
            local = true
            imgs = true
            folder = "desks"
            word = "office chair"
            pages = 3
            max_products = 5
            market = "ie"
            delay_ms = 0

            [locators]
            load_more = "button.next"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.local);
        assert!(config.imgs);
        assert!(!config.s3);
        assert_eq!(config.folder, "desks");
        assert_eq!(config.word, "office chair");
        assert_eq!(config.pages, 3);
        assert_eq!(config.max_products, Some(5));
        assert_eq!(config.market, Market::Ie);
        assert_eq!(config.locators.load_more, "button.next");
        assert_eq!(config.locators.name, Locators::default().name);
        assert_eq!(config.enabled_sinks(), vec![SinkKind::Local, SinkKind::Images]);
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            s3 = true
            table = "products"
            "#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert!(config.s3);
        assert_eq!(config.table, "products");
    }

    #[test]
    fn test_config_from_file_not_found() {
        let err = Config::from_file("/nonexistent/path/pipestock.toml").unwrap_err().to_string();
        assert!(err.contains("Failed to read config file"));
    }

    #[test]
    fn test_config_from_file_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid toml {{{{").unwrap();

        let err = Config::from_file(file.path()).unwrap_err().to_string();
        assert!(err.contains("Failed to parse config file"));
    }

    #[test]
    fn test_config_load_explicit_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "word = \"bed\"").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.word, "bed");
    }

    #[test]
    fn test_config_with_env() {
        let orig_market = std::env::var("PIPESTOCK_MARKET").ok();
        let orig_delay = std::env::var("PIPESTOCK_DELAY").ok();

        std::env::set_var("PIPESTOCK_MARKET", "de");
        std::env::set_var("PIPESTOCK_DELAY", "not_a_number");

        let config = Config::new().with_env();
        assert_eq!(config.market, Market::De);
        // Invalid values are ignored
        assert_eq!(config.delay_ms, 1000);

        match orig_market {
            Some(v) => std::env::set_var("PIPESTOCK_MARKET", v),
            None => std::env::remove_var("PIPESTOCK_MARKET"),
        }
        match orig_delay {
            Some(v) => std::env::set_var("PIPESTOCK_DELAY", v),
            None => std::env::remove_var("PIPESTOCK_DELAY"),
        }
    }

    #[test]
    fn test_base_url_override() {
        let mut config = Config::default();
        assert_eq!(config.base_url(), "https://www.ikea.com/gb/en/");

        config.base_url = Some("http://127.0.0.1:8080".to_string());
        assert_eq!(config.base_url(), "http://127.0.0.1:8080/");
    }

    #[test]
    fn test_validate_requires_s3_credentials() {
        let config = Config { s3: true, ..Config::default() };

        let err = config.validate(&Credentials::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential { sink: SinkKind::ObjectStore, .. }));
        assert!(config.validate(&s3_credentials()).is_ok());
    }

    #[test]
    fn test_validate_requires_database() {
        let config = Config { rds: true, ..Config::default() };

        let err = config.validate(&s3_credentials()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential { sink: SinkKind::Table, .. }));

        let credentials = Credentials {
            s3: None,
            database: Some(DatabaseCredentials {
                url: Some("sqlite::memory:".to_string()),
                ..Default::default()
            }),
        };
        assert!(config.validate(&credentials).is_ok());
    }

    #[test]
    fn test_validate_table_name() {
        let credentials = Credentials {
            s3: None,
            database: Some(DatabaseCredentials {
                url: Some("sqlite::memory:".to_string()),
                ..Default::default()
            }),
        };

        for bad in ["", "products; DROP TABLE x", "my-table", "1products"] {
            let config = Config { rds: true, table: bad.to_string(), ..Config::default() };
            assert!(matches!(
                config.validate(&credentials),
                Err(ConfigError::InvalidTableName(_))
            ));
        }
    }

    #[test]
    fn test_validate_pages_and_folder() {
        let config = Config { pages: 0, ..Config::default() };
        assert!(matches!(config.validate(&Credentials::default()), Err(ConfigError::NoPages)));

        let config = Config { folder: "../escape".to_string(), ..Config::default() };
        assert!(matches!(
            config.validate(&Credentials::default()),
            Err(ConfigError::InvalidFolder(_))
        ));

        // Local-only runs need no credentials at all
        let config = Config { local: true, imgs: true, ..Config::default() };
        assert!(config.validate(&Credentials::default()).is_ok());
    }
}
