use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory of the attachment store
    pub root: PathBuf,
    /// HMAC secret for signed read references
    pub signing_key: String,
}

/// Tuning for the document access gateway, the `[access]` config section
#[derive(Debug, Clone, Deserialize)]
pub struct AccessConfig {
    /// Server-side TTL on a signed reference, in seconds
    #[serde(default = "default_signed_ttl_secs")]
    pub signed_ttl_secs: u64,
    /// Where fetched copies are materialized
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    /// How long a scratch copy may live before the sweeper reclaims it
    #[serde(default = "default_scratch_ttl_secs")]
    pub scratch_ttl_secs: u64,
}

fn default_signed_ttl_secs() -> u64 {
    300
}

fn default_scratch_ttl_secs() -> u64 {
    1800
}

fn default_scratch_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("quorum")
        .join("scratch")
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            signed_ttl_secs: default_signed_ttl_secs(),
            scratch_dir: default_scratch_dir(),
            scratch_ttl_secs: default_scratch_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Directory for daily rolling log files; stdout only when unset
    #[serde(default)]
    pub file_dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("database.max_connections", 5)?
            .set_default("access.signed_ttl_secs", 300)?
            .set_default("access.scratch_ttl_secs", 1800)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("QUORUM_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (QUORUM_DATABASE__URL, etc.)
            .add_source(
                Environment::with_prefix("QUORUM")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Create a default configuration for CLI usage
    pub fn default_config(database_url: &str, storage_root: &Path) -> Self {
        Self {
            database: DatabaseConfig {
                url: database_url.to_string(),
                max_connections: 5,
            },
            storage: StorageConfig {
                root: storage_root.to_path_buf(),
                signing_key: String::new(),
            },
            access: AccessConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.database.url.is_empty() {
            errors.push("database.url must be set".to_string());
        }

        if self.database.max_connections == 0 {
            errors.push("database.max_connections must be positive".to_string());
        }

        if self.storage.root.as_os_str().is_empty() {
            errors.push("storage.root must be set".to_string());
        }

        // An empty or trivially short key makes signed references forgeable
        if self.storage.signing_key.len() < 16 {
            errors.push("storage.signing_key must be at least 16 bytes".to_string());
        }

        if self.access.signed_ttl_secs == 0 {
            errors.push("access.signed_ttl_secs must be positive".to_string());
        }

        if self.access.scratch_ttl_secs == 0 {
            errors.push("access.scratch_ttl_secs must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
