//! Pool initialization and liquidity
//!
//! ## Ledger effects
//!
//! ```text
//!   initialize / add_liquidity     take_debt(token_i, amount_in_i)     BPT minted to `to`
//!   remove_liquidity               supply_credit(token_i, amount_out_i) BPT burned from `from`
//! ```
//!
//! BPT moves immediately since the vault is its issuer; only the pool tokens go through the
//! ledger and have to be settled by the caller.

use crate::base_pool_math::{self, LiquidityAmounts};
use crate::error::VaultError;
use crate::session::VaultSession;
use crate::state::PoolData;
use crate::tokens::{Journaled, TokenTransfer};
use crate::vault::Vault;
use keel_types::{
    fixed_point, AccountId, Address, AddLiquidityKind, PoolId, RemoveLiquidityKind, Rounding,
    TokenId,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLiquidityParams {
    pub pool: PoolId,
    /// Receiver of the minted BPT
    pub to: AccountId,
    /// Per-token maximum in; the exact amounts for `Unbalanced`
    pub max_amounts_in: Vec<u128>,
    /// Minimum BPT out; the exact BPT for `Proportional` and `SingleTokenExactOut`
    pub min_bpt_amount_out: u128,
    pub kind: AddLiquidityKind,
    /// Token paid in for `SingleTokenExactOut`
    pub single_token: Option<TokenId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLiquidityResult {
    pub amounts_in: Vec<u128>,
    pub bpt_amount_out: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLiquidityParams {
    pub pool: PoolId,
    /// Holder whose BPT is burned
    pub from: AccountId,
    /// Maximum BPT in; the exact BPT for `Proportional` and `SingleTokenExactIn`
    pub max_bpt_amount_in: u128,
    /// Per-token minimum out; the exact amount of `single_token` for `SingleTokenExactOut`
    pub min_amounts_out: Vec<u128>,
    pub kind: RemoveLiquidityKind,
    pub single_token: Option<TokenId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLiquidityResult {
    pub bpt_amount_in: u128,
    pub amounts_out: Vec<u128>,
}

fn single_token_index(pool: PoolId, data: &PoolData, token: Option<TokenId>) -> Result<usize, VaultError> {
    let token = token.ok_or(VaultError::SingleTokenRequired { pool })?;
    data.token_index(pool, token)
}

fn ensure_length(expected: usize, actual: usize) -> Result<(), VaultError> {
    if expected != actual {
        return Err(VaultError::InputLengthMismatch { expected, actual });
    }
    Ok(())
}

impl<T: TokenTransfer + Journaled> Vault<T> {
    /// Move BPT between holders outside of any scope
    pub fn transfer_shares(
        &mut self,
        pool: PoolId,
        from: AccountId,
        to: AccountId,
        amount: u128,
    ) -> Result<(), VaultError> {
        self.state.pool(pool)?;
        self.state.bpt.transfer(pool, from, to, amount)?;
        debug!(%pool, %from, %to, amount, "BPT transfer");
        Ok(())
    }
}

impl<'v, T: TokenTransfer + Journaled> VaultSession<'v, T> {
    /// Seed a registered pool; returns the BPT minted to `to`
    pub fn initialize(
        &mut self,
        pool: PoolId,
        to: AccountId,
        exact_amounts_in: &[u128],
        min_bpt_amount_out: u128,
    ) -> Result<u128, VaultError> {
        self.vault.ensure_unlocked()?;
        let data = self.vault.state.pool(pool)?;
        if data.initialized {
            return Err(VaultError::PoolAlreadyInitialized { pool });
        }
        ensure_length(data.tokens.len(), exact_amounts_in.len())?;
        let tokens = data.tokens.clone();

        let bpt = data
            .capability
            .compute_invariant(exact_amounts_in, Rounding::RoundDown)
            .map_err(|e| VaultError::PoolRejected {
                pool,
                reason: format!("{:#}", e),
            })?;
        let minimum = self.vault.limits.pool_minimum_total_supply;
        if bpt < minimum {
            return Err(VaultError::PoolTotalSupplyTooLow {
                pool,
                total_supply: bpt,
                minimum,
            });
        }
        let issued = bpt - minimum;
        if issued < min_bpt_amount_out {
            return Err(VaultError::BptAmountOutBelowMin {
                amount: issued,
                min: min_bpt_amount_out,
            });
        }

        for (token, amount) in tokens.iter().zip(exact_amounts_in) {
            self.vault.transient.ledger.take_debt(*token, *amount)?;
        }
        self.vault.state.bpt.mint(pool, Address::ZERO, minimum)?;
        self.vault.state.bpt.mint(pool, to, issued)?;

        let data = self.vault.state.pool_mut(pool)?;
        data.balances = exact_amounts_in.to_vec();
        data.initialized = true;

        info!(%pool, %to, bpt, "Initialized pool");
        Ok(issued)
    }

    pub fn add_liquidity(
        &mut self,
        params: &AddLiquidityParams,
    ) -> Result<AddLiquidityResult, VaultError> {
        self.vault.ensure_unlocked()?;
        let pool = params.pool;
        let data = self.vault.state.live_pool(pool)?;
        ensure_length(data.tokens.len(), params.max_amounts_in.len())?;
        let total_supply = self.vault.state.bpt.total_supply(pool);

        let LiquidityAmounts {
            bpt,
            amounts,
            swap_fees,
        } = match params.kind {
            AddLiquidityKind::Proportional => LiquidityAmounts {
                bpt: params.min_bpt_amount_out,
                amounts: base_pool_math::proportional_amounts_in(
                    &data.balances,
                    total_supply,
                    params.min_bpt_amount_out,
                )?,
                swap_fees: vec![0; data.tokens.len()],
            },
            AddLiquidityKind::Unbalanced => base_pool_math::add_liquidity_unbalanced(
                pool,
                data.capability.as_ref(),
                &data.balances,
                &params.max_amounts_in,
                total_supply,
                data.swap_fee_percentage,
            )?,
            AddLiquidityKind::SingleTokenExactOut => {
                let index = single_token_index(pool, data, params.single_token)?;
                base_pool_math::add_liquidity_single_token_exact_out(
                    pool,
                    data.capability.as_ref(),
                    &data.balances,
                    index,
                    params.min_bpt_amount_out,
                    total_supply,
                    data.swap_fee_percentage,
                )?
            }
        };

        if bpt < params.min_bpt_amount_out {
            return Err(VaultError::BptAmountOutBelowMin {
                amount: bpt,
                min: params.min_bpt_amount_out,
            });
        }
        self.vault.ensure_trade_amount(bpt)?;

        let tokens = data.tokens.clone();
        let mut balances = data.balances.clone();
        let aggregate_percentage = data.aggregate_swap_fee_percentage;

        for (i, token) in tokens.iter().enumerate() {
            if amounts[i] > params.max_amounts_in[i] {
                return Err(VaultError::AmountInAboveMax {
                    token: *token,
                    amount: amounts[i],
                    max: params.max_amounts_in[i],
                });
            }
            self.vault.ensure_trade_amount(amounts[i])?;
        }

        for (i, token) in tokens.iter().enumerate() {
            let aggregate_fee = fixed_point::mul_down(swap_fees[i], aggregate_percentage)?;
            self.vault.accrue_aggregate_fee(pool, *token, aggregate_fee)?;
            balances[i] = fixed_point::add(balances[i], fixed_point::sub(amounts[i], aggregate_fee)?)?;
            self.vault.transient.ledger.take_debt(*token, amounts[i])?;
        }
        self.vault.state.pool_mut(pool)?.balances = balances;
        self.vault.state.bpt.mint(pool, params.to, bpt)?;

        debug!(%pool, kind = ?params.kind, to = %params.to, bpt, ?amounts, "Added liquidity");
        Ok(AddLiquidityResult {
            amounts_in: amounts,
            bpt_amount_out: bpt,
        })
    }

    pub fn remove_liquidity(
        &mut self,
        params: &RemoveLiquidityParams,
    ) -> Result<RemoveLiquidityResult, VaultError> {
        self.vault.ensure_unlocked()?;
        let pool = params.pool;
        let data = self.vault.state.live_pool(pool)?;
        ensure_length(data.tokens.len(), params.min_amounts_out.len())?;
        let total_supply = self.vault.state.bpt.total_supply(pool);

        let LiquidityAmounts {
            bpt,
            amounts,
            swap_fees,
        } = match params.kind {
            RemoveLiquidityKind::Proportional => LiquidityAmounts {
                bpt: params.max_bpt_amount_in,
                amounts: base_pool_math::proportional_amounts_out(
                    &data.balances,
                    total_supply,
                    params.max_bpt_amount_in,
                )?,
                swap_fees: vec![0; data.tokens.len()],
            },
            RemoveLiquidityKind::SingleTokenExactIn => {
                let index = single_token_index(pool, data, params.single_token)?;
                base_pool_math::remove_liquidity_single_token_exact_in(
                    pool,
                    data.capability.as_ref(),
                    &data.balances,
                    index,
                    params.max_bpt_amount_in,
                    total_supply,
                    data.swap_fee_percentage,
                )?
            }
            RemoveLiquidityKind::SingleTokenExactOut => {
                let index = single_token_index(pool, data, params.single_token)?;
                base_pool_math::remove_liquidity_single_token_exact_out(
                    pool,
                    data.capability.as_ref(),
                    &data.balances,
                    index,
                    params.min_amounts_out[index],
                    total_supply,
                    data.swap_fee_percentage,
                )?
            }
        };

        if bpt > params.max_bpt_amount_in {
            return Err(VaultError::BptAmountInAboveMax {
                amount: bpt,
                max: params.max_bpt_amount_in,
            });
        }
        self.vault.ensure_trade_amount(bpt)?;

        let tokens = data.tokens.clone();
        let mut balances = data.balances.clone();
        let aggregate_percentage = data.aggregate_swap_fee_percentage;

        for (i, token) in tokens.iter().enumerate() {
            if amounts[i] < params.min_amounts_out[i] {
                return Err(VaultError::AmountOutBelowMin {
                    token: *token,
                    amount: amounts[i],
                    min: params.min_amounts_out[i],
                });
            }
            self.vault.ensure_trade_amount(amounts[i])?;
        }

        if self.vault.transient.query {
            // Lets a query price a removal for an account holding no BPT
            self.vault.state.bpt.mint(pool, params.from, bpt)?;
        }
        let minimum = self.vault.limits.pool_minimum_total_supply;
        self.vault.state.bpt.burn(pool, params.from, bpt, minimum)?;

        for (i, token) in tokens.iter().enumerate() {
            let aggregate_fee = fixed_point::mul_down(swap_fees[i], aggregate_percentage)?;
            let leaving = fixed_point::add(amounts[i], aggregate_fee)?;
            if leaving > balances[i] {
                return Err(VaultError::InsufficientPoolBalance {
                    pool,
                    token: *token,
                    balance: balances[i],
                    needed: leaving,
                });
            }
            self.vault.accrue_aggregate_fee(pool, *token, aggregate_fee)?;
            balances[i] -= leaving;
            self.vault.transient.ledger.supply_credit(*token, amounts[i])?;
        }
        self.vault.state.pool_mut(pool)?.balances = balances;

        debug!(%pool, kind = ?params.kind, from = %params.from, bpt, ?amounts, "Removed liquidity");
        Ok(RemoveLiquidityResult {
            bpt_amount_in: bpt,
            amounts_out: amounts,
        })
    }
}
