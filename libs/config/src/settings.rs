//! Keel Configuration Module
//!
//! Loads [`KeelConfig`] from a base TOML file, an optional environment overlay in
//! `environments/<env>.toml` next to the base file, and `KEEL_*` environment variables
//! (`KEEL_VAULT__MINIMUM_TRADE_AMOUNT=...`). Every field has a production default, so a
//! missing section falls back to [`Default`].

use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File};
use keel_types::{fixed_point, Address};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Top-level configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct KeelConfig {
    pub vault: VaultSettings,
    pub router: RouterSettings,
    pub logging: LoggingConfig,
}

/// Limits enforced by the vault
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct VaultSettings {
    /// Smallest amount a swap or liquidity leg may move (raw units)
    pub minimum_trade_amount: u64,
    /// Smallest amount a buffer wrap/unwrap may move (raw units)
    pub minimum_wrap_amount: u64,
    /// BPT permanently locked when a pool is initialized
    pub pool_minimum_total_supply: u64,
    /// Buffer shares permanently locked when a buffer is initialized
    pub buffer_minimum_total_supply: u64,
    pub min_pool_tokens: usize,
    pub max_pool_tokens: usize,
    /// Upper bound for a pool's static swap fee, as a fraction (0.1 = 10%)
    pub max_swap_fee_percentage: Decimal,
    pub queries_enabled: bool,
}

/// Router settings
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct RouterSettings {
    /// Wrapped native token; native-asset payments are unavailable when unset
    pub weth: Option<Address>,
}

/// Logging settings consumed by [`crate::init_tracing`]
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            minimum_trade_amount: 1_000_000,
            minimum_wrap_amount: 10_000,
            pool_minimum_total_supply: 1_000_000,
            buffer_minimum_total_supply: 10_000,
            min_pool_tokens: 2,
            max_pool_tokens: 8,
            max_swap_fee_percentage: Decimal::new(1, 1),
            queries_enabled: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl VaultSettings {
    /// Maximum swap fee as an 18-decimal fixed point value
    pub fn max_swap_fee_fixed(&self) -> Result<u128> {
        fixed_point::from_decimal(self.max_swap_fee_percentage)
            .context("Invalid max_swap_fee_percentage")
    }

    /// Reject limits the vault cannot operate with
    pub fn validate(&self) -> Result<()> {
        if self.min_pool_tokens < 2 {
            bail!("min_pool_tokens must be at least 2, got {}", self.min_pool_tokens);
        }
        if self.max_pool_tokens < self.min_pool_tokens {
            bail!(
                "max_pool_tokens ({}) is below min_pool_tokens ({})",
                self.max_pool_tokens,
                self.min_pool_tokens
            );
        }
        if self.pool_minimum_total_supply == 0 || self.buffer_minimum_total_supply == 0 {
            bail!("Minimum total supplies must be positive");
        }
        let max_fee = self.max_swap_fee_fixed()?;
        if max_fee >= fixed_point::ONE {
            bail!(
                "max_swap_fee_percentage must be below 1, got {}",
                self.max_swap_fee_percentage
            );
        }
        Ok(())
    }
}

impl KeelConfig {
    /// Load configuration from files with environment overrides
    pub fn load(base_path: Option<&Path>, environment: Option<&str>) -> Result<Self> {
        let base = base_path.unwrap_or(Path::new("config/keel.toml"));

        let mut builder =
            Config::builder().add_source(File::from(base).required(base_path.is_some()));

        // Overlay lives next to the base file
        if let Some(env) = environment {
            let env_file = base
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default()
                .join("environments")
                .join(format!("{}.toml", env));

            if env_file.exists() {
                info!("Loading environment config: {:?}", env_file);
                builder = builder.add_source(File::from(env_file));
            } else {
                warn!("Environment config not found: {:?}", env_file);
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("KEEL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: KeelConfig = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.vault.validate()?;
        Ok(config)
    }

    /// Path of the default base file, for diagnostics
    pub fn default_path() -> PathBuf {
        PathBuf::from("config/keel.toml")
    }
}

/// Convenience function to load configuration with defaults
pub fn load_config(environment: Option<&str>) -> Result<KeelConfig> {
    KeelConfig::load(None, environment)
}
