//! Pool trait definitions for the vault's pricing capability

use anyhow::Result;
use keel_types::{Rounding, SwapKind};
use std::fmt::Debug;

/// Pool type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolType {
    ConstantProduct,
    ConstantSum,
}

/// Swap request handed to a pool
///
/// `amount_given` has already had the swap fee removed for `ExactIn`; for `ExactOut` it is
/// the exact amount the caller wants out. Balances are the pool's live balances, indexed in
/// registration order.
#[derive(Debug, Clone, Copy)]
pub struct PoolSwapParams<'a> {
    pub kind: SwapKind,
    pub amount_given: u128,
    pub balances: &'a [u128],
    pub index_in: usize,
    pub index_out: usize,
}

/// Unified pool interface consumed by the vault
pub trait Pool: Send + Sync + Debug {
    /// Invariant of the given balances, rounded as requested
    fn compute_invariant(&self, balances: &[u128], rounding: Rounding) -> Result<u128>;

    /// New balance of `token_index` that scales the invariant by `invariant_ratio` (18 decimals)
    /// while every other balance stays fixed. Rounds up.
    fn compute_balance(
        &self,
        balances: &[u128],
        token_index: usize,
        invariant_ratio: u128,
    ) -> Result<u128>;

    /// Amount out (exact in) or amount in (exact out), fees excluded
    fn on_swap(&self, params: &PoolSwapParams<'_>) -> Result<u128>;

    fn pool_type(&self) -> PoolType;
}
