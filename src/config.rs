use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use thiserror::Error;

/// Environment variable that overrides `postgres_url`
pub const POSTGRES_URL_ENV: &str = "BANK_POSTGRES_URL";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config yaml {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("postgres_url is not set (config file or BANK_POSTGRES_URL)")]
    MissingPostgresUrl,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL for the ledger
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LedgerConfig {
    /// Deadline for one transfer's unit of work; 0 disables it
    pub tx_timeout_ms: u64,
    pub allow_overdraft: bool,
    pub max_connections: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            tx_timeout_ms: 5_000,
            allow_overdraft: false,
            max_connections: 10,
        }
    }
}

impl LedgerConfig {
    pub fn tx_deadline(&self) -> Option<Duration> {
        (self.tx_timeout_ms > 0).then(|| Duration::from_millis(self.tx_timeout_ms))
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;
        let mut config = Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: config_path,
            source,
        })?;

        if let Ok(url) = std::env::var(POSTGRES_URL_ENV) {
            config.postgres_url = Some(url);
        }
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    pub fn postgres_url(&self) -> Result<&str, ConfigError> {
        self.postgres_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::MissingPostgresUrl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
log_level: info
log_dir: ./logs
log_file: bank.log
use_json: false
rotation: daily
gateway:
  host: 0.0.0.0
  port: 8080
"#;

    #[test]
    fn test_ledger_defaults() {
        let config = AppConfig::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.gateway.port, 8080);
        assert!(!config.ledger.allow_overdraft);
        assert_eq!(config.ledger.tx_deadline(), Some(Duration::from_secs(5)));
        assert!(matches!(
            config.postgres_url(),
            Err(ConfigError::MissingPostgresUrl)
        ));
    }

    #[test]
    fn test_ledger_section() {
        let yaml = format!(
            "{MINIMAL}postgres_url: postgresql://localhost/bank\nledger:\n  tx_timeout_ms: 0\n  allow_overdraft: true\n  max_connections: 4\n"
        );
        let config = AppConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config.postgres_url().unwrap(), "postgresql://localhost/bank");
        assert!(config.ledger.allow_overdraft);
        assert_eq!(config.ledger.max_connections, 4);
        assert_eq!(config.ledger.tx_deadline(), None);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            AppConfig::load("does-not-exist"),
            Err(ConfigError::Read { .. })
        ));
    }
}
