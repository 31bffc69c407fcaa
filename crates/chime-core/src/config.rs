use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 18620;
pub const DEFAULT_BIND: &str = "127.0.0.1";

/// Top-level config (chime.toml + CHIME_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChimeConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl Default for ChimeConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            scheduler: SchedulerConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

/// Scheduling policy knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Gateway self-throttle window, in units: the opportunistic entry point
    /// attempts at most one pass per `cache_timeout * default_unit` seconds.
    /// Override with env var: CHIME_SCHEDULER__CACHE_TIMEOUT=5
    #[serde(default = "default_cache_timeout")]
    pub cache_timeout: i64,

    /// Seconds per unit for tasks whose params omit an explicit `unit`
    /// field. 60 means `cache_timeout` values are minutes.
    #[serde(default = "default_unit")]
    pub default_unit: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cache_timeout: default_cache_timeout(),
            default_unit: default_unit(),
        }
    }
}

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

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_cache_timeout() -> i64 {
    1
}
fn default_unit() -> i64 {
    60
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.chime/chime.db", home)
}

impl ChimeConfig {
    /// Load config from a TOML file with CHIME_* env var overrides.
    ///
    /// Checks the explicit path argument first, then ~/.chime/chime.toml.
    /// Nested keys use a double underscore in the environment, e.g.
    /// CHIME_GATEWAY__PORT=8080.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: ChimeConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("CHIME_").split("__"))
            .extract()
            .map_err(|e| crate::error::ChimeError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Create the parent directory of the configured database path.
    pub fn ensure_db_dir(&self) -> crate::error::Result<()> {
        if let Some(parent) = std::path::Path::new(&self.database.path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.chime/chime.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ChimeConfig::default();
        assert_eq!(config.gateway.port, DEFAULT_PORT);
        assert_eq!(config.scheduler.cache_timeout, 1);
        assert_eq!(config.scheduler.default_unit, 60);
        assert!(config.database.path.ends_with("chime.db"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = ChimeConfig::load(Some("/nonexistent/chime.toml")).unwrap();
        assert_eq!(config.scheduler.default_unit, 60);
    }
}
