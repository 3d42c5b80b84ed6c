//! # Keel Routers - User Entrypoints over the Vault
//!
//! ## Purpose
//!
//! Stateless translators from user intents to vault scopes. Every mutating entrypoint opens one
//! unlock scope, runs the vault operations the intent decomposes into, and pays in or out
//! exactly what the ledger records so the scope closes settled. Each has a `query_*` twin that
//! runs the same hook under a quote.
//!
//! ## Integration Points
//!
//! - **Vault**: any [`keel_vault::Unlocker`], so entrypoints work top-level on a
//!   [`keel_vault::Vault`] or nested inside another hook's [`keel_vault::VaultSession`]
//! - **Configuration**: [`keel_config::RouterSettings`] (wrapped native token)
//! - **Errors**: [`RouterError`], wrapping [`keel_vault::VaultError`] unchanged
//!
//! ## Architecture Role
//!
//! ```text
//!   caller ──► Router / BufferRouter / BatchRouter / CompositeLiquidityRouter
//!                 │  entry guard, deadline
//!                 ▼
//!              vault.unlock(sender, hook)
//!                 │  swap / add / remove / wrap ...   (ledger deltas)
//!                 │  take_token_in / send_token_out   (settle, send_to)
//!                 ▼
//!              scope closes with every delta at zero
//! ```

pub mod batch;
pub mod buffer_router;
pub mod common;
pub mod composite;
pub mod error;
pub mod router;
pub mod token_set;

pub use batch::{
    BatchRouter, BatchSwapResult, NetAmount, PathAggregation, SwapPathExactAmountIn,
    SwapPathExactAmountOut, SwapPathStep,
};
pub use buffer_router::BufferRouter;
pub use common::{EntryGuard, ReentrancyGuard, RouterCommon, RouterContext};
pub use composite::CompositeLiquidityRouter;
pub use error::RouterError;
pub use router::{Router, SingleSwap};
pub use token_set::TokenSet;
