//! # Keel AMM Library - Pool Capability and Reference Math
//!
//! ## Purpose
//!
//! Defines the opaque [`Pool`] capability the vault consults for pricing, plus two reference
//! pools used by tests and demos. The vault never prices anything itself: it hands a pool the
//! current balances and the amount a caller fixed, and books whatever the pool answers against
//! the transient ledger.
//!
//! ## Integration Points
//!
//! - **Input Sources**: Live pool balances held by the vault, amounts fixed by routers
//! - **Output Destinations**: Vault swap and liquidity primitives
//! - **Rounding**: Every answer is rounded in the vault's favour (amounts out down, amounts in
//!   up, invariants as requested by the caller)
//! - **Errors**: Math failures are reported with `anyhow::Result`; the vault wraps them into its
//!   own pool-rejection error carrying the pool id
//!
//! ## Architecture Role
//!
//! ```text
//! Router hook ──► Vault::swap / add_liquidity / remove_liquidity
//!                        │
//!                        ▼
//!                 Pool capability (this crate)
//!                 ├─ compute_invariant
//!                 ├─ compute_balance
//!                 └─ on_swap
//!                        │
//!                        ▼
//!                 amounts booked as ledger deltas
//! ```

pub mod constant_product;
pub mod constant_sum;
pub mod pool_traits;

pub use constant_product::ConstantProductPool;
pub use constant_sum::ConstantSumPool;
pub use pool_traits::{Pool, PoolSwapParams, PoolType};
