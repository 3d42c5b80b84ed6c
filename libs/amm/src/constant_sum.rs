//! N-token constant sum pool: every token trades 1:1 with every other

use crate::pool_traits::{Pool, PoolSwapParams, PoolType};
use anyhow::{bail, Result};
use keel_types::fixed_point;
use keel_types::{Rounding, SwapKind};
use tracing::trace;

#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantSumPool;

impl ConstantSumPool {
    pub fn new() -> Self {
        Self
    }
}

impl Pool for ConstantSumPool {
    fn compute_invariant(&self, balances: &[u128], _rounding: Rounding) -> Result<u128> {
        balances
            .iter()
            .try_fold(0u128, |acc, b| fixed_point::add(acc, *b))
            .map_err(Into::into)
    }

    fn compute_balance(
        &self,
        balances: &[u128],
        token_index: usize,
        invariant_ratio: u128,
    ) -> Result<u128> {
        let Some(balance) = balances.get(token_index) else {
            bail!("Token index {} out of range", token_index);
        };
        let invariant = self.compute_invariant(balances, Rounding::RoundUp)?;
        let new_invariant = fixed_point::mul_up(invariant, invariant_ratio)?;
        let others = invariant - balance;
        Ok(fixed_point::sub(new_invariant, others)?)
    }

    fn on_swap(&self, params: &PoolSwapParams<'_>) -> Result<u128> {
        let balance_out = params.balances[params.index_out];
        match params.kind {
            SwapKind::ExactIn if params.amount_given > balance_out => {
                bail!(
                    "Insufficient liquidity: output {} exceeds balance {}",
                    params.amount_given,
                    balance_out
                );
            }
            SwapKind::ExactOut if params.amount_given > balance_out => {
                bail!(
                    "Insufficient liquidity: output {} exceeds balance {}",
                    params.amount_given,
                    balance_out
                );
            }
            _ => {
                trace!(kind = ?params.kind, amount = params.amount_given, "Constant sum swap");
                Ok(params.amount_given)
            }
        }
    }

    fn pool_type(&self) -> PoolType {
        PoolType::ConstantSum
    }
}
