//! # Keel Configuration
//!
//! Layered configuration for the vault and its routers, plus tracing initialisation.
//!
//! ## Features
//!
//! - **Vault limits**: minimum trade and wrap amounts, minimum BPT and buffer share supplies,
//!   pool token-count bounds, maximum swap fee, query switch
//! - **Router settings**: wrapped native token used when callers pay with the native asset
//! - **Logging**: filter level and JSON output for `tracing-subscriber`
//!
//! ## Usage
//!
//! ```rust
//! use keel_config::KeelConfig;
//!
//! let config = KeelConfig::default();
//! config.vault.validate().unwrap();
//! assert_eq!(config.vault.minimum_trade_amount, 1_000_000);
//! ```

pub mod logging;
pub mod settings;

pub use logging::init_tracing;
pub use settings::{load_config, KeelConfig, LoggingConfig, RouterSettings, VaultSettings};
