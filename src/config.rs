//! Configuration module for the claimdrop distributor
//!
//! This module handles all configuration loading from TOML files,
//! environment variables, and provides structured configuration types.

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Ledger endpoint configuration
    pub horizon: HorizonConfig,

    /// Distributor account configuration
    pub distributor: DistributorConfig,

    /// Distribution engine tuning
    #[serde(default)]
    pub distribution: DistributionConfig,

    /// Asset catalog configuration
    pub catalog: CatalogConfig,

    /// Monitoring and metrics
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HorizonConfig {
    /// Base URL of the Horizon-compatible endpoint
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_horizon_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributorConfig {
    /// Name of the environment variable holding the signing seed.
    /// The seed itself never lives in the config file.
    #[serde(default = "default_secret_env")]
    pub secret_env: String,

    /// Network passphrase transaction hashes are bound to
    pub network_passphrase: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionConfig {
    /// Fee per operation in stroops
    #[serde(default = "default_base_fee")]
    pub base_fee: u32,

    /// Operations per transaction, capped by the ledger at 100
    #[serde(default = "default_max_ops")]
    pub max_ops_per_tx: usize,

    /// Transaction validity window in seconds
    #[serde(default = "default_validity_window")]
    pub validity_window_secs: i64,

    /// Per-requester cooldown window in seconds
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: i64,

    /// Retry budget per batch
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Path to the TOML asset catalog
    pub path: String,

    /// Optional primary asset, distributed first and always preflight-checked
    #[serde(default)]
    pub primary: Option<PrimaryAsset>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryAsset {
    pub code: String,
    #[serde(default)]
    pub issuer: Option<String>,
    pub amount: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

// Default value functions
fn default_horizon_timeout() -> u64 {
    30
}
fn default_secret_env() -> String {
    "DISTRIBUTOR_SECRET".to_string()
}
fn default_base_fee() -> u32 {
    100
}
fn default_max_ops() -> usize {
    crate::tx::MAX_OPS_PER_TX
}
fn default_validity_window() -> i64 {
    180
}
fn default_cooldown() -> i64 {
    60
}
fn default_max_attempts() -> u32 {
    crate::submitter::MAX_ATTEMPTS
}
fn default_metrics_port() -> u16 {
    9090
}
fn default_true() -> bool {
    true
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            base_fee: default_base_fee(),
            max_ops_per_tx: default_max_ops(),
            validity_window_secs: default_validity_window(),
            cooldown_secs: default_cooldown(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: default_true(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides from .env
    pub fn from_file_with_env(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_file(path)
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.horizon.endpoint.is_empty() {
            anyhow::bail!("horizon.endpoint must not be empty");
        }
        if self.distributor.network_passphrase.is_empty() {
            anyhow::bail!("distributor.network_passphrase must not be empty");
        }
        let d = &self.distribution;
        if d.max_ops_per_tx == 0 || d.max_ops_per_tx > crate::tx::MAX_OPS_PER_TX {
            anyhow::bail!(
                "distribution.max_ops_per_tx {} out of valid range (1-{})",
                d.max_ops_per_tx,
                crate::tx::MAX_OPS_PER_TX
            );
        }
        if d.max_attempts == 0 {
            anyhow::bail!("distribution.max_attempts must be at least 1");
        }
        if d.validity_window_secs <= 0 {
            anyhow::bail!("distribution.validity_window_secs must be positive");
        }
        if d.cooldown_secs < 0 {
            anyhow::bail!("distribution.cooldown_secs must not be negative");
        }
        if d.base_fee == 0 {
            anyhow::bail!("distribution.base_fee must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> &'static str {
        r#"
        [horizon]
        endpoint = "https://horizon-testnet.example.org"

        [distributor]
        network_passphrase = "Test SDF Network ; September 2015"

        [catalog]
        path = "assets.toml"
        "#
    }

    #[test]
    fn test_minimal_config_fills_defaults() {
        let config: Config = toml::from_str(minimal_toml()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.distribution.max_ops_per_tx, 100);
        assert_eq!(config.distribution.validity_window_secs, 180);
        assert_eq!(config.distribution.cooldown_secs, 60);
        assert_eq!(config.distribution.max_attempts, 5);
        assert_eq!(config.distributor.secret_env, "DISTRIBUTOR_SECRET");
        assert!(config.monitoring.enable_metrics);
    }

    #[test]
    fn test_validate_rejects_oversized_batches() {
        let mut config: Config = toml::from_str(minimal_toml()).unwrap();
        config.distribution.max_ops_per_tx = 101;
        assert!(config.validate().is_err());
        config.distribution.max_ops_per_tx = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config: Config = toml::from_str(minimal_toml()).unwrap();
        config.distribution.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_primary_asset_parsed() {
        let content = format!(
            "{}\n[catalog.primary]\ncode = \"DROP\"\namount = \"100\"\n",
            minimal_toml()
        );
        let config: Config = toml::from_str(&content).unwrap();
        let primary = config.catalog.primary.unwrap();
        assert_eq!(primary.code, "DROP");
        assert!(primary.issuer.is_none());
    }
}
