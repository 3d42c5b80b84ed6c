//! Two-token constant product pool (x * y = k)
//!
//! The invariant is reported as √(x·y) so it scales linearly with liquidity, which is what
//! the vault's proportional and unbalanced liquidity math expects.

use crate::pool_traits::{Pool, PoolSwapParams, PoolType};
use anyhow::{bail, Result};
use ethnum::U256;
use keel_types::fixed_point::{self, sqrt_u256};
use keel_types::{Rounding, SwapKind};
use tracing::trace;

/// Constant product math over live vault balances
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantProductPool;

impl ConstantProductPool {
    pub fn new() -> Self {
        Self
    }

    /// Exact output amount for `amount_in` against the given balances, rounded down
    pub fn calculate_output_amount(
        amount_in: u128,
        balance_in: u128,
        balance_out: u128,
    ) -> Result<u128> {
        if balance_in == 0 || balance_out == 0 {
            bail!("Balances must be positive");
        }
        let denominator = fixed_point::add(balance_in, amount_in)?;
        Ok(fixed_point::mul_div_down(balance_out, amount_in, denominator)?)
    }

    /// Required input for the desired output, rounded up
    pub fn calculate_input_amount(
        amount_out: u128,
        balance_in: u128,
        balance_out: u128,
    ) -> Result<u128> {
        if balance_in == 0 || balance_out == 0 {
            bail!("Balances must be positive");
        }
        if amount_out >= balance_out {
            bail!(
                "Insufficient liquidity: output {} exceeds balance {}",
                amount_out,
                balance_out
            );
        }
        Ok(fixed_point::mul_div_up(
            balance_in,
            amount_out,
            balance_out - amount_out,
        )?)
    }

    fn check_two_tokens(balances: &[u128]) -> Result<()> {
        if balances.len() != 2 {
            bail!("Constant product pool expects 2 balances, got {}", balances.len());
        }
        Ok(())
    }
}

impl Pool for ConstantProductPool {
    fn compute_invariant(&self, balances: &[u128], rounding: Rounding) -> Result<u128> {
        Self::check_two_tokens(balances)?;
        let product = U256::from(balances[0]) * U256::from(balances[1]);
        let root = sqrt_u256(product);
        let root = match rounding {
            Rounding::RoundDown => root,
            Rounding::RoundUp if root * root < product => root + U256::ONE,
            Rounding::RoundUp => root,
        };
        // √(u128 · u128) always fits in u128
        Ok(root.as_u128())
    }

    fn compute_balance(
        &self,
        balances: &[u128],
        token_index: usize,
        invariant_ratio: u128,
    ) -> Result<u128> {
        Self::check_two_tokens(balances)?;
        if token_index >= 2 {
            bail!("Token index {} out of range", token_index);
        }
        // Other balance fixed, so the balance scales with the square of the invariant ratio
        let scaled = fixed_point::mul_up(balances[token_index], invariant_ratio)?;
        Ok(fixed_point::mul_up(scaled, invariant_ratio)?)
    }

    fn on_swap(&self, params: &PoolSwapParams<'_>) -> Result<u128> {
        Self::check_two_tokens(params.balances)?;
        let balance_in = params.balances[params.index_in];
        let balance_out = params.balances[params.index_out];
        let calculated = match params.kind {
            SwapKind::ExactIn => {
                Self::calculate_output_amount(params.amount_given, balance_in, balance_out)?
            }
            SwapKind::ExactOut => {
                Self::calculate_input_amount(params.amount_given, balance_in, balance_out)?
            }
        };
        trace!(
            kind = ?params.kind,
            amount_given = params.amount_given,
            balance_in,
            balance_out,
            calculated,
            "Constant product swap"
        );
        Ok(calculated)
    }

    fn pool_type(&self) -> PoolType {
        PoolType::ConstantProduct
    }
}
