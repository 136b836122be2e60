//! Configuration loading, validation, and management for Hearthmind.
//!
//! Loads configuration from a TOML file with environment variable
//! overrides. Validates all settings at startup.

use hearthmind_core::domain;
use hearthmind_core::error::Error;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// The root configuration structure.
///
/// Maps directly to `hearthmind.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Server identity
    #[serde(default)]
    pub server: ServerConfig,

    /// Knowledge/session store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Budget and cost tracking configuration
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Pattern detection configuration
    #[serde(default)]
    pub patterns: PatternsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The domain this server runs (financial, family, ...)
    #[serde(default = "default_domain")]
    pub domain: String,

    /// User identity for session records
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            user_id: default_user_id(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store backend: "sqlite" or "memory"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// SQLite database path
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached entries
    #[serde(default = "default_cache_entries")]
    pub max_entries: u64,

    /// Default TTL for cached values, in seconds
    #[serde(default = "default_cache_ttl")]
    pub default_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_cache_entries(),
            default_ttl_secs: default_cache_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Daily budget limit in USD
    #[serde(default = "default_daily_limit")]
    pub daily_limit: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            daily_limit: default_daily_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternsConfig {
    /// How many days of trigger history to keep
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

impl Default for PatternsConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
        }
    }
}

fn default_domain() -> String {
    "financial".into()
}
fn default_user_id() -> String {
    "hearthmind_user".into()
}
fn default_store_backend() -> String {
    "sqlite".into()
}
fn default_store_path() -> String {
    "hearthmind.db".into()
}
fn default_cache_entries() -> u64 {
    10_000
}
fn default_cache_ttl() -> u64 {
    3_600
}
fn default_daily_limit() -> f64 {
    10.0
}
fn default_retention_days() -> i64 {
    30
}

impl AppConfig {
    /// Load configuration from a TOML file, then apply environment
    /// variable overrides and validate.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let mut config: AppConfig = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
                message: format!("Failed to read {}: {e}", path.display()),
            })?;
            toml::from_str(&raw).map_err(|e| Error::Config {
                message: format!("Failed to parse {}: {e}", path.display()),
            })?
        } else {
            warn!("Config file {} not found, using defaults", path.display());
            AppConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Environment variables take precedence over file values.
    fn apply_env_overrides(&mut self) {
        if let Ok(domain) = std::env::var("HEARTHMIND_DOMAIN") {
            self.server.domain = domain;
        }
        if let Ok(path) = std::env::var("HEARTHMIND_DB_PATH") {
            self.store.path = path;
        }
        if let Ok(limit) = std::env::var("HEARTHMIND_BUDGET_LIMIT") {
            match limit.parse::<f64>() {
                Ok(limit) => self.budget.daily_limit = limit,
                Err(_) => warn!("Ignoring non-numeric HEARTHMIND_BUDGET_LIMIT: {limit}"),
            }
        }
    }

    /// Validate all settings.
    pub fn validate(&self) -> Result<(), Error> {
        if !domain::is_known(&self.server.domain) {
            return Err(Error::Config {
                message: format!(
                    "Unknown domain '{}', expected one of: {}",
                    self.server.domain,
                    domain::KNOWN_DOMAINS.join(", ")
                ),
            });
        }
        if !matches!(self.store.backend.as_str(), "sqlite" | "memory") {
            return Err(Error::Config {
                message: format!(
                    "Unknown store backend '{}', expected sqlite or memory",
                    self.store.backend
                ),
            });
        }
        if self.budget.daily_limit <= 0.0 {
            return Err(Error::Config {
                message: "budget.daily_limit must be positive".into(),
            });
        }
        if self.cache.default_ttl_secs == 0 {
            return Err(Error::Config {
                message: "cache.default_ttl_secs must be positive".into(),
            });
        }
        if self.patterns.retention_days <= 0 {
            return Err(Error::Config {
                message: "patterns.retention_days must be positive".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.domain, "financial");
        assert_eq!(config.cache.max_entries, 10_000);
        assert!((config.budget.daily_limit - 10.0).abs() < 1e-10);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
domain = "family"

[store]
backend = "memory"

[budget]
daily_limit = 25.0
"#
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.server.domain, "family");
        assert_eq!(config.store.backend, "memory");
        assert!((config.budget.daily_limit - 25.0).abs() < 1e-10);
        // Unspecified sections keep their defaults.
        assert_eq!(config.cache.default_ttl_secs, 3_600);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let config = AppConfig::load(Path::new("/nonexistent/hearthmind.toml")).unwrap();
        assert_eq!(config.server.domain, "financial");
    }

    #[test]
    fn unknown_domain_fails_validation() {
        let mut config = AppConfig::default();
        config.server.domain = "gardening".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_backend_fails_validation() {
        let mut config = AppConfig::default();
        config.store.backend = "redis".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn nonpositive_budget_fails_validation() {
        let mut config = AppConfig::default();
        config.budget.daily_limit = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not [valid toml").unwrap();
        assert!(AppConfig::load(file.path()).is_err());
    }
}
