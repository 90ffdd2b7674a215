//! Configuration loading and management

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use userhub_db::DATE_FORMAT;

/// Longest accepted token lifetime (365 days)
pub const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Lifetime of an access token and of its cache entry
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
    /// Upper bound on live sessions held by the token cache
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            token_ttl_secs: default_token_ttl_secs(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

/// Admin account created on first start when the store is empty
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    #[serde(default = "default_admin_first_name")]
    pub admin_first_name: String,
    #[serde(default = "default_admin_last_name")]
    pub admin_last_name: String,
    /// Date of birth stored for the admin, `YYYY-MM-DD`
    #[serde(default = "default_admin_dob")]
    pub admin_dob: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            admin_email: None,
            admin_password: None,
            admin_first_name: default_admin_first_name(),
            admin_last_name: default_admin_last_name(),
            admin_dob: default_admin_dob(),
        }
    }
}

impl BootstrapConfig {
    /// Email and password, when both are configured
    pub fn admin_credentials(&self) -> Option<(&str, &str)> {
        match (&self.admin_email, &self.admin_password) {
            (Some(email), Some(password)) => Some((email, password)),
            _ => None,
        }
    }

    /// Parsed `admin_dob`
    pub fn admin_dob(&self) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(&self.admin_dob, DATE_FORMAT).with_context(|| {
            format!(
                "bootstrap.admin_dob must be a YYYY-MM-DD date, got \"{}\"",
                self.admin_dob
            )
        })
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    10010
}

fn default_db_path() -> String {
    "./data/userhub.db".to_string()
}

fn default_jwt_secret() -> String {
    "change-me-in-production".to_string()
}

fn default_token_ttl_secs() -> u64 {
    86400 // 24 hours
}

fn default_cache_capacity() -> u64 {
    100_000
}

fn default_admin_first_name() -> String {
    "Admin".to_string()
}

fn default_admin_last_name() -> String {
    "User".to_string()
}

fn default_admin_dob() -> String {
    "1970-01-01".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &str) -> Result<Self> {
        let config_path = Path::new(path);

        // Check if config file exists
        if !config_path.exists() {
            info!("Config file not found at {}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        info!("Loaded configuration from {}", path);
        Ok(config)
    }

    fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.trim().is_empty() {
            bail!("auth.jwt_secret must not be empty");
        }
        if self.auth.token_ttl_secs == 0 {
            bail!("auth.token_ttl_secs must be greater than zero");
        }
        if self.auth.token_ttl_secs > MAX_TOKEN_TTL_SECS {
            bail!(
                "auth.token_ttl_secs must be at most {} (365 days), got {}",
                MAX_TOKEN_TTL_SECS,
                self.auth.token_ttl_secs
            );
        }
        if self.auth.cache_capacity == 0 {
            bail!("auth.cache_capacity must be greater than zero");
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            bail!(
                "logging.format must be \"pretty\" or \"json\", got \"{}\"",
                self.logging.format
            );
        }
        if let Some(password) = &self.bootstrap.admin_password {
            if password.chars().count() < 8 {
                bail!("bootstrap.admin_password must be at least 8 characters long");
            }
        }
        self.bootstrap.admin_dob()?;
        Ok(())
    }

    /// SQLite connection URL for the configured database path
    pub fn database_url(&self) -> String {
        format!("sqlite:{}?mode=rwc", self.database.path)
    }
}
