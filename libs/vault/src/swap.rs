//! Pool swaps and aggregate fee accrual
//!
//! A swap runs the pool's `on_swap` on the net-of-fee amount, moves pool balances and records
//! `take_debt(token_in)` / `supply_credit(token_out)`. The swap fee stays in the pool except for
//! the aggregate share, which is withheld in the vault and split by the fee controller.

use crate::error::VaultError;
use crate::fees::FeeSplit;
use crate::session::VaultSession;
use crate::tokens::{Journaled, TokenTransfer};
use crate::vault::Vault;
use keel_amm::PoolSwapParams;
use keel_types::{fixed_point, PoolId, SwapKind, TokenId};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSwapParams {
    pub kind: SwapKind,
    pub pool: PoolId,
    pub token_in: TokenId,
    pub token_out: TokenId,
    pub amount_given: u128,
    /// Minimum out for exact in, maximum in for exact out
    pub limit: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapResult {
    pub amount_calculated: u128,
    pub amount_in: u128,
    pub amount_out: u128,
}

impl<T: TokenTransfer + Journaled> Vault<T> {
    pub(crate) fn ensure_trade_amount(&self, amount: u128) -> Result<(), VaultError> {
        let minimum = self.limits.minimum_trade_amount;
        if amount != 0 && amount < minimum {
            return Err(VaultError::TradeAmountTooSmall { amount, minimum });
        }
        Ok(())
    }

    /// Ask the controller to split a withheld fee and record it against the pool
    pub(crate) fn accrue_aggregate_fee(
        &mut self,
        pool: PoolId,
        token: TokenId,
        amount: u128,
    ) -> Result<(), VaultError> {
        if amount == 0 {
            return Ok(());
        }
        let split = self
            .fee_controller
            .split_aggregate_fee(pool, token, amount)
            .map_err(|e| VaultError::FeeControllerRejected {
                pool,
                token,
                reason: format!("{:#}", e),
            })?;
        if split.total() != amount {
            return Err(VaultError::FeeControllerRejected {
                pool,
                token,
                reason: format!("split adds up to {}, expected {}", split.total(), amount),
            });
        }
        self.state
            .accrued_fees
            .entry((pool, token))
            .or_default()
            .accumulate(split)?;
        Ok(())
    }
}

impl<'v, T: TokenTransfer + Journaled> VaultSession<'v, T> {
    pub fn swap(&mut self, params: &VaultSwapParams) -> Result<SwapResult, VaultError> {
        self.vault.ensure_unlocked()?;
        if params.amount_given == 0 {
            return Err(VaultError::AmountGivenZero);
        }
        if params.token_in == params.token_out {
            return Err(VaultError::CannotSwapSameToken);
        }

        let pool_data = self.vault.state.live_pool(params.pool)?;
        let index_in = pool_data.token_index(params.pool, params.token_in)?;
        let index_out = pool_data.token_index(params.pool, params.token_out)?;
        let capability = pool_data.capability.clone();
        let mut balances = pool_data.balances.clone();
        let swap_fee_percentage = pool_data.swap_fee_percentage;
        let aggregate_percentage = pool_data.aggregate_swap_fee_percentage;

        self.vault.ensure_trade_amount(params.amount_given)?;

        let reject = |e: anyhow::Error| VaultError::PoolRejected {
            pool: params.pool,
            reason: format!("{:#}", e),
        };

        let (amount_in, amount_out, swap_fee) = match params.kind {
            SwapKind::ExactIn => {
                let fee = fixed_point::mul_up(params.amount_given, swap_fee_percentage)?;
                let net_in = fixed_point::sub(params.amount_given, fee)?;
                let out = capability
                    .on_swap(&PoolSwapParams {
                        kind: SwapKind::ExactIn,
                        amount_given: net_in,
                        balances: &balances,
                        index_in,
                        index_out,
                    })
                    .map_err(reject)?;
                (params.amount_given, out, fee)
            }
            SwapKind::ExactOut => {
                let calculated = capability
                    .on_swap(&PoolSwapParams {
                        kind: SwapKind::ExactOut,
                        amount_given: params.amount_given,
                        balances: &balances,
                        index_in,
                        index_out,
                    })
                    .map_err(reject)?;
                let fee = fixed_point::mul_div_up(
                    calculated,
                    swap_fee_percentage,
                    fixed_point::complement(swap_fee_percentage),
                )?;
                (fixed_point::add(calculated, fee)?, params.amount_given, fee)
            }
        };

        let amount_calculated = match params.kind {
            SwapKind::ExactIn => amount_out,
            SwapKind::ExactOut => amount_in,
        };
        self.vault.ensure_trade_amount(amount_calculated)?;

        match params.kind {
            SwapKind::ExactIn if amount_out < params.limit => {
                return Err(VaultError::AmountOutBelowMin {
                    token: params.token_out,
                    amount: amount_out,
                    min: params.limit,
                });
            }
            SwapKind::ExactOut if amount_in > params.limit => {
                return Err(VaultError::AmountInAboveMax {
                    token: params.token_in,
                    amount: amount_in,
                    max: params.limit,
                });
            }
            _ => {}
        }

        if amount_out > balances[index_out] {
            return Err(VaultError::InsufficientPoolBalance {
                pool: params.pool,
                token: params.token_out,
                balance: balances[index_out],
                needed: amount_out,
            });
        }

        let aggregate_fee = fixed_point::mul_down(swap_fee, aggregate_percentage)?;
        balances[index_in] = fixed_point::add(
            balances[index_in],
            fixed_point::sub(amount_in, aggregate_fee)?,
        )?;
        balances[index_out] -= amount_out;

        self.vault
            .accrue_aggregate_fee(params.pool, params.token_in, aggregate_fee)?;
        self.vault.state.pool_mut(params.pool)?.balances = balances;

        self.vault
            .transient
            .ledger
            .take_debt(params.token_in, amount_in)?;
        self.vault
            .transient
            .ledger
            .supply_credit(params.token_out, amount_out)?;

        debug!(
            pool = %params.pool,
            kind = ?params.kind,
            token_in = %params.token_in,
            token_out = %params.token_out,
            amount_in,
            amount_out,
            swap_fee,
            aggregate_fee,
            "Swap"
        );

        Ok(SwapResult {
            amount_calculated,
            amount_in,
            amount_out,
        })
    }

    /// Credit the caller with every fee withheld for `pool` so far
    ///
    /// The ledger now owes the collected amounts; the collector settles the scope by calling
    /// `send_to` for each token.
    pub fn collect_aggregate_fees(
        &mut self,
        pool: PoolId,
    ) -> Result<Vec<(TokenId, FeeSplit)>, VaultError> {
        self.vault.ensure_unlocked()?;
        let tokens = self.vault.state.pool(pool)?.tokens.clone();

        let mut collected = Vec::new();
        for token in tokens {
            let Some(split) = self.vault.state.accrued_fees.remove(&(pool, token)) else {
                continue;
            };
            self.vault
                .transient
                .ledger
                .supply_credit(token, split.total())?;
            debug!(%pool, %token, protocol = split.protocol, creator = split.creator, "Collected aggregate fees");
            collected.push((token, split));
        }
        Ok(collected)
    }
}
