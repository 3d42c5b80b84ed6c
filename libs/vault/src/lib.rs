//! # Keel Vault - Transient Accounting and Settlement Engine
//!
//! ## Purpose
//!
//! A single ledger holding every pool's tokens. All mutating work happens inside an unlock
//! scope: the caller's hook issues swaps, liquidity changes and buffer wraps, each of which only
//! records signed per-token deltas, then pays or collects physically and settles. The scope does
//! not close until every delta is back at zero; if anything fails, the whole scope rolls back.
//!
//! ## Integration Points
//!
//! - **Input Sources**: Router hooks running inside [`Vault::unlock`] / [`Vault::quote`]
//! - **Collaborators**: [`keel_amm::Pool`] for pricing, [`TokenTransfer`] for physical balances,
//!   [`Erc4626`] wrappers behind buffers, [`FeeController`] for aggregate fee splits
//! - **Configuration**: [`keel_config::VaultSettings`] turned into [`VaultLimits`]
//! - **Errors**: [`VaultError`] with an [`ErrorClass`] per variant
//!
//! ## Architecture Role
//!
//! ```text
//!   Router ──unlock(sender, hook)──► Vault ──► VaultSession (only while unlocked)
//!                                                 │
//!             ┌─────────────────┬─────────────────┼──────────────────┬────────────────┐
//!             ▼                 ▼                 ▼                  ▼                ▼
//!           swap        add/remove_liquidity   buffer ops      take_debt /      settle / send_to
//!             │                 │                 │            supply_credit          │
//!             └────────────┬────┴─────────────────┘                  │                │
//!                          ▼                                         ▼                ▼
//!                 TokenDeltaLedger (signed per-token deltas) ◄──────────── Reserves ◄─ TokenTransfer
//!                          │
//!                          ▼
//!             outermost return: nonzero count must be 0, else UnsettledDelta
//! ```
//!
//! ## Sign convention
//!
//! A positive delta is owed to the vault, a negative delta is owed by the vault. `take_debt`
//! adds, `supply_credit` and `settle` subtract, `send_to` adds.

pub mod base_pool_math;
pub mod buffer;
pub mod erc4626;
pub mod error;
pub mod fees;
pub mod ledger;
pub mod liquidity;
pub mod multitoken;
pub mod session;
pub mod settlement;
pub mod state;
pub mod swap;
pub mod tokens;
pub mod transient;
pub mod vault;

pub use buffer::{BufferRemoval, BufferWrapOrUnwrapParams, BufferWrapOrUnwrapResult};
pub use erc4626::{Erc4626, Erc4626Wrapper};
pub use error::{ErrorClass, VaultError};
pub use fees::{FeeController, FeeSplit, ProtocolFeeController};
pub use ledger::TokenDeltaLedger;
pub use liquidity::{
    AddLiquidityParams, AddLiquidityResult, RemoveLiquidityParams, RemoveLiquidityResult,
};
pub use multitoken::MultiToken;
pub use session::{Unlocker, VaultSession};
pub use state::{BufferBalances, VaultLimits};
pub use swap::{SwapResult, VaultSwapParams};
pub use tokens::{Journaled, TokenBank, TokenError, TokenTransfer};
pub use vault::Vault;
