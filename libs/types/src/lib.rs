//! # Keel Types Library
//!
//! Shared vocabulary for the Keel vault and its routers.
//!
//! ## Design Philosophy
//!
//! - **One identifier type**: tokens, pools and accounts are all 20-byte [`Address`]es. A pool's
//!   address doubles as the address of its share (BPT) token.
//! - **No Precision Loss**: all amounts are raw `u128` integers; percentages and rates are
//!   18-decimal fixed point values manipulated through [`fixed_point`] with explicit rounding.
//! - **Explicit Rounding**: every division states whether it rounds up or down, so vault
//!   accounting always rounds in the vault's favour.
//!
//! ## Quick Start
//!
//! ```rust
//! use keel_types::{fixed_point, Address, SwapKind};
//!
//! let usdc = Address::from_low_u64(0xa0b8);
//! let fee = fixed_point::mul_up(1_000_000, 3_000_000_000_000_000).unwrap(); // 0.3% of 1e6
//! assert_eq!(fee, 3_000);
//! assert_eq!(SwapKind::ExactIn.opposite(), SwapKind::ExactOut);
//! assert!(!usdc.is_zero());
//! ```

pub mod common;
pub mod kinds;

pub use common::errors::MathError;
pub use common::fixed_point;
pub use common::identifiers::{AccountId, Address, PoolId, TokenId, NATIVE_ASSET};
pub use kinds::{
    AddLiquidityKind, RemoveLiquidityKind, Rounding, SwapKind, WrappingDirection,
};
