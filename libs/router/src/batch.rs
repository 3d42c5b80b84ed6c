//! # Batch Path Router
//!
//! ## Purpose
//!
//! Multi-hop swaps over several paths in one vault scope. A path starts at `token_in` and walks
//! its steps; each step is one of:
//!
//! ```text
//!   is_buffer                        wrap / unwrap through the buffer of `pool` (the wrapped token)
//!   token in == pool                 remove liquidity, single token (BPT in)
//!   token out == pool                add liquidity, single token (BPT out)
//!   otherwise                        swap in `pool`
//! ```
//!
//! ## Settlement
//!
//! Intermediate tokens never leave the vault: a step's credit is consumed by the next step's
//! debt, so they net to zero on the ledger. Only what enters a path at its first step and what
//! leaves at its last step is recorded in a [`PathAggregation`]; once every path has run the
//! aggregation is netted per token and settled with at most one payment per token.
//!
//! A path whose first step is a buffer pays its input before running, since the wrapper may
//! need the tokens physically. That payment is recorded as prepaid and netted like the rest.
//!
//! BPT is the exception because the vault issues it: a first-step removal burns the sender's
//! BPT directly and a last-step addition mints straight to the sender, so neither is
//! aggregated.
//!
//! Exact-out paths are walked backwards from the exact amount out. A removal in the middle of
//! such a path does not know its BPT requirement up front, so it borrows every BPT the vault
//! holds in reserve and returns the unused part.

use crate::common::{RouterCommon, RouterContext};
use crate::error::RouterError;
use crate::token_set::TokenSet;
use keel_config::RouterSettings;
use keel_types::{
    AccountId, AddLiquidityKind, MathError, PoolId, RemoveLiquidityKind, SwapKind, TokenId,
    WrappingDirection,
};
use keel_vault::{
    AddLiquidityParams, BufferWrapOrUnwrapParams, Journaled, RemoveLiquidityParams,
    TokenTransfer, Unlocker, VaultSession, VaultSwapParams,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapPathStep {
    /// Pool to trade in, or the wrapped token for buffer steps
    pub pool: PoolId,
    pub token_out: TokenId,
    pub is_buffer: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapPathExactAmountIn {
    pub token_in: TokenId,
    pub steps: Vec<SwapPathStep>,
    pub exact_amount_in: u128,
    pub min_amount_out: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapPathExactAmountOut {
    pub token_in: TokenId,
    pub steps: Vec<SwapPathStep>,
    pub max_amount_in: u128,
    pub exact_amount_out: u128,
}

/// Per-path amounts plus the netted totals per token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSwapResult {
    /// Amount out (exact in) or amount in (exact out) of each path
    pub path_amounts: Vec<u128>,
    /// Tokens the caller received (exact in) or paid (exact out)
    pub tokens: Vec<TokenId>,
    pub amounts: Vec<u128>,
}

/// Net movement a caller owes or is owed after all paths ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetAmount {
    /// Caller pays the vault
    In(u128),
    /// Vault pays the caller
    Out(u128),
}

/// What the caller owes and is owed at the edges of every path
#[derive(Debug, Clone, Default)]
pub struct PathAggregation {
    amounts_in: TokenSet,
    amounts_out: TokenSet,
    prepaid: TokenSet,
}

impl PathAggregation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owe_in(&mut self, token: TokenId, amount: u128) -> Result<(), MathError> {
        self.amounts_in.add(token, amount)
    }

    pub fn owe_out(&mut self, token: TokenId, amount: u128) -> Result<(), MathError> {
        self.amounts_out.add(token, amount)
    }

    /// Record a payment already made into the vault
    pub fn prepay(&mut self, token: TokenId, amount: u128) -> Result<(), MathError> {
        self.prepaid.add(token, amount)
    }

    pub fn amount_in(&self, token: TokenId) -> u128 {
        self.amounts_in.get(token)
    }

    pub fn amount_out(&self, token: TokenId) -> u128 {
        self.amounts_out.get(token)
    }

    pub fn prepaid(&self, token: TokenId) -> u128 {
        self.prepaid.get(token)
    }

    pub fn contains(&self, token: TokenId) -> bool {
        self.amounts_in.contains(token)
            || self.amounts_out.contains(token)
            || self.prepaid.contains(token)
    }

    pub fn is_empty(&self) -> bool {
        self.amounts_in.is_empty() && self.amounts_out.is_empty() && self.prepaid.is_empty()
    }

    /// One entry per token, inputs first, netting tokens that are both paid and received
    pub fn net(&self) -> Vec<(TokenId, NetAmount)> {
        let mut tokens: Vec<TokenId> = self.amounts_in.tokens().to_vec();
        for token in self.amounts_out.tokens().iter().chain(self.prepaid.tokens()) {
            if !tokens.contains(token) {
                tokens.push(*token);
            }
        }
        tokens
            .into_iter()
            .filter_map(|token| {
                let owed = self.amount_in(token);
                let due = self.amount_out(token).saturating_add(self.prepaid(token));
                if owed > due {
                    Some((token, NetAmount::In(owed - due)))
                } else if due > owed {
                    Some((token, NetAmount::Out(due - owed)))
                } else {
                    None
                }
            })
            .collect()
    }
}

/// A last-step addition mints BPT straight to the sender
fn mints_to_sender(step: &SwapPathStep) -> bool {
    !step.is_buffer && step.token_out == step.pool
}

/// A buffer step either takes the wrapped token in or hands it out, never neither or both
fn buffer_direction(
    step: &SwapPathStep,
    token_in: TokenId,
    index: usize,
) -> Result<WrappingDirection, RouterError> {
    match (token_in == step.pool, step.token_out == step.pool) {
        (true, false) => Ok(WrappingDirection::Unwrap),
        (false, true) => Ok(WrappingDirection::Wrap),
        _ => Err(RouterError::InvalidPath(format!(
            "buffer step {} over {} must wrap into or unwrap out of it",
            index, step.pool
        ))),
    }
}

#[derive(Debug)]
pub struct BatchRouter {
    common: RouterCommon,
}

impl BatchRouter {
    pub fn new(address: AccountId, settings: &RouterSettings) -> Self {
        Self {
            common: RouterCommon::new(address, settings),
        }
    }

    pub fn address(&self) -> AccountId {
        self.common.address()
    }

    pub fn swap_exact_in<V: Unlocker>(
        &self,
        vault: &mut V,
        ctx: &RouterContext,
        paths: &[SwapPathExactAmountIn],
        deadline: u64,
        weth_is_eth: bool,
    ) -> Result<BatchSwapResult, RouterError> {
        let _entered = self.common.enter("swap_exact_in")?;
        self.common.ensure_weth(weth_is_eth)?;
        RouterCommon::check_deadline(vault, deadline)?;
        let result = vault.unlock(ctx.sender, |s| {
            self.common.receive_value(s, ctx)?;
            let mut aggregation = PathAggregation::new();
            let path_amounts =
                self.run_exact_in_paths(s, ctx, paths, &mut aggregation, weth_is_eth)?;
            self.finish(s, ctx, aggregation, path_amounts, SwapKind::ExactIn, weth_is_eth)
        })?;
        info!(sender = %ctx.sender, paths = paths.len(), amounts_out = ?result.path_amounts, "Batch swap exact in");
        Ok(result)
    }

    pub fn swap_exact_out<V: Unlocker>(
        &self,
        vault: &mut V,
        ctx: &RouterContext,
        paths: &[SwapPathExactAmountOut],
        deadline: u64,
        weth_is_eth: bool,
    ) -> Result<BatchSwapResult, RouterError> {
        let _entered = self.common.enter("swap_exact_out")?;
        self.common.ensure_weth(weth_is_eth)?;
        RouterCommon::check_deadline(vault, deadline)?;
        let result = vault.unlock(ctx.sender, |s| {
            self.common.receive_value(s, ctx)?;
            let mut aggregation = PathAggregation::new();
            let path_amounts =
                self.run_exact_out_paths(s, ctx, paths, &mut aggregation, weth_is_eth)?;
            self.finish(s, ctx, aggregation, path_amounts, SwapKind::ExactOut, weth_is_eth)
        })?;
        info!(sender = %ctx.sender, paths = paths.len(), amounts_in = ?result.path_amounts, "Batch swap exact out");
        Ok(result)
    }

    pub fn query_swap_exact_in<V: Unlocker>(
        &self,
        vault: &mut V,
        sender: AccountId,
        paths: &[SwapPathExactAmountIn],
    ) -> Result<BatchSwapResult, RouterError> {
        let ctx = RouterContext::new(sender);
        vault.quote(sender, |s| {
            let mut aggregation = PathAggregation::new();
            let path_amounts = self.run_exact_in_paths(s, &ctx, paths, &mut aggregation, false)?;
            self.finish(s, &ctx, aggregation, path_amounts, SwapKind::ExactIn, false)
        })
    }

    pub fn query_swap_exact_out<V: Unlocker>(
        &self,
        vault: &mut V,
        sender: AccountId,
        paths: &[SwapPathExactAmountOut],
    ) -> Result<BatchSwapResult, RouterError> {
        let ctx = RouterContext::new(sender);
        vault.quote(sender, |s| {
            let mut aggregation = PathAggregation::new();
            let path_amounts =
                self.run_exact_out_paths(s, &ctx, paths, &mut aggregation, false)?;
            self.finish(s, &ctx, aggregation, path_amounts, SwapKind::ExactOut, false)
        })
    }

    /// Settle the aggregation and build the caller-facing result
    fn finish<T: TokenTransfer + Journaled>(
        &self,
        s: &mut VaultSession<'_, T>,
        ctx: &RouterContext,
        aggregation: PathAggregation,
        path_amounts: Vec<u128>,
        kind: SwapKind,
        weth_is_eth: bool,
    ) -> Result<BatchSwapResult, RouterError> {
        let totals = match kind {
            SwapKind::ExactIn => &aggregation.amounts_out,
            SwapKind::ExactOut => &aggregation.amounts_in,
        };
        let (tokens, amounts) = totals.iter().unzip();
        self.settle_paths(s, ctx, &aggregation, weth_is_eth)?;
        Ok(BatchSwapResult {
            path_amounts,
            tokens,
            amounts,
        })
    }

    /// Pay in or out the net amount of every token touched at a path edge
    pub fn settle_paths<T: TokenTransfer + Journaled>(
        &self,
        s: &mut VaultSession<'_, T>,
        ctx: &RouterContext,
        aggregation: &PathAggregation,
        weth_is_eth: bool,
    ) -> Result<(), RouterError> {
        for (token, net) in aggregation.net() {
            match net {
                NetAmount::In(amount) => {
                    self.common
                        .take_token_in(s, ctx, token, amount, weth_is_eth)?
                }
                NetAmount::Out(amount) => {
                    self.common
                        .send_token_out(s, ctx.sender, token, amount, weth_is_eth)?
                }
            }
        }
        self.common.return_eth(s, ctx)
    }

    // ---------------------------------------------------------------------------------------
    // Exact in
    // ---------------------------------------------------------------------------------------

    /// Run every path forwards; returns each path's amount out
    pub fn run_exact_in_paths<T: TokenTransfer + Journaled>(
        &self,
        s: &mut VaultSession<'_, T>,
        ctx: &RouterContext,
        paths: &[SwapPathExactAmountIn],
        aggregation: &mut PathAggregation,
        weth_is_eth: bool,
    ) -> Result<Vec<u128>, RouterError> {
        let mut path_amounts = Vec::with_capacity(paths.len());
        for path in paths {
            let amount_out = self.run_exact_in_path(s, ctx, path, aggregation, weth_is_eth)?;
            path_amounts.push(amount_out);
        }
        Ok(path_amounts)
    }

    fn run_exact_in_path<T: TokenTransfer + Journaled>(
        &self,
        s: &mut VaultSession<'_, T>,
        ctx: &RouterContext,
        path: &SwapPathExactAmountIn,
        aggregation: &mut PathAggregation,
        weth_is_eth: bool,
    ) -> Result<u128, RouterError> {
        let first = path.steps.first().ok_or(RouterError::EmptyPath)?;
        let last_index = path.steps.len() - 1;

        if first.is_buffer {
            self.prepay(s, ctx, aggregation, path.token_in, path.exact_amount_in, weth_is_eth)?;
        }
        if first.is_buffer || path.token_in != first.pool {
            aggregation.owe_in(path.token_in, path.exact_amount_in)?;
        }

        let mut token_in = path.token_in;
        let mut amount_in = path.exact_amount_in;
        for (i, step) in path.steps.iter().enumerate() {
            let is_first = i == 0;
            let is_last = i == last_index;
            let min_amount_out = if is_last { path.min_amount_out } else { 0 };

            let amount_out = if step.is_buffer {
                let direction = buffer_direction(step, token_in, i)?;
                s.erc4626_buffer_wrap_or_unwrap(&BufferWrapOrUnwrapParams {
                    kind: SwapKind::ExactIn,
                    direction,
                    wrapped: step.pool,
                    amount_given: amount_in,
                    limit: min_amount_out,
                })?
                .amount_out
            } else if token_in == step.pool {
                let from = if is_first {
                    ctx.sender
                } else {
                    // BPT produced by the previous step sits in the vault as a credit
                    s.send_to(step.pool, self.address(), amount_in)?;
                    self.address()
                };
                let (tokens, index) = RouterCommon::token_index(s, step.pool, step.token_out)?;
                let mut min_amounts_out = vec![0; tokens.len()];
                min_amounts_out[index] = min_amount_out;
                let result = s.remove_liquidity(&RemoveLiquidityParams {
                    pool: step.pool,
                    from,
                    max_bpt_amount_in: amount_in,
                    min_amounts_out,
                    kind: RemoveLiquidityKind::SingleTokenExactIn,
                    single_token: Some(step.token_out),
                })?;
                result.amounts_out[index]
            } else if step.token_out == step.pool {
                let (tokens, index) = RouterCommon::token_index(s, step.pool, token_in)?;
                let mut max_amounts_in = vec![0; tokens.len()];
                max_amounts_in[index] = amount_in;
                let to = if is_last {
                    ctx.sender
                } else {
                    s.vault_address()
                };
                let bpt = s
                    .add_liquidity(&AddLiquidityParams {
                        pool: step.pool,
                        to,
                        max_amounts_in,
                        min_bpt_amount_out: min_amount_out,
                        kind: AddLiquidityKind::Unbalanced,
                        single_token: None,
                    })?
                    .bpt_amount_out;
                if !is_last {
                    s.settle_exact(step.pool, bpt)?;
                }
                bpt
            } else {
                s.swap(&VaultSwapParams {
                    kind: SwapKind::ExactIn,
                    pool: step.pool,
                    token_in,
                    token_out: step.token_out,
                    amount_given: amount_in,
                    limit: min_amount_out,
                })?
                .amount_out
            };

            debug!(step = i, pool = %step.pool, %token_in, token_out = %step.token_out, amount_in, amount_out, "Exact in step");
            if is_last && !mints_to_sender(step) {
                aggregation.owe_out(step.token_out, amount_out)?;
            }
            token_in = step.token_out;
            amount_in = amount_out;
        }
        Ok(amount_in)
    }

    // ---------------------------------------------------------------------------------------
    // Exact out
    // ---------------------------------------------------------------------------------------

    /// Pay a path's input before its first step runs
    fn prepay<T: TokenTransfer + Journaled>(
        &self,
        s: &mut VaultSession<'_, T>,
        ctx: &RouterContext,
        aggregation: &mut PathAggregation,
        token: TokenId,
        amount: u128,
        weth_is_eth: bool,
    ) -> Result<(), RouterError> {
        self.common
            .take_token_in(s, ctx, token, amount, weth_is_eth)?;
        aggregation.prepay(token, amount)?;
        Ok(())
    }

    /// Run every path backwards; returns each path's amount in
    pub fn run_exact_out_paths<T: TokenTransfer + Journaled>(
        &self,
        s: &mut VaultSession<'_, T>,
        ctx: &RouterContext,
        paths: &[SwapPathExactAmountOut],
        aggregation: &mut PathAggregation,
        weth_is_eth: bool,
    ) -> Result<Vec<u128>, RouterError> {
        let mut path_amounts = Vec::with_capacity(paths.len());
        for path in paths {
            let amount_in = self.run_exact_out_path(s, ctx, path, aggregation, weth_is_eth)?;
            path_amounts.push(amount_in);
        }
        Ok(path_amounts)
    }

    fn run_exact_out_path<T: TokenTransfer + Journaled>(
        &self,
        s: &mut VaultSession<'_, T>,
        ctx: &RouterContext,
        path: &SwapPathExactAmountOut,
        aggregation: &mut PathAggregation,
        weth_is_eth: bool,
    ) -> Result<u128, RouterError> {
        let last = path.steps.last().ok_or(RouterError::EmptyPath)?;
        let last_index = path.steps.len() - 1;
        if !mints_to_sender(last) {
            aggregation.owe_out(last.token_out, path.exact_amount_out)?;
        }

        let mut amount_out = path.exact_amount_out;
        for (i, step) in path.steps.iter().enumerate().rev() {
            let is_first = i == 0;
            let is_last = i == last_index;
            let token_in = if is_first {
                path.token_in
            } else {
                path.steps[i - 1].token_out
            };
            let max_amount_in = if is_first {
                path.max_amount_in
            } else {
                u128::MAX
            };

            let amount_in = if step.is_buffer {
                let direction = buffer_direction(step, token_in, i)?;
                if is_first {
                    self.prepay(s, ctx, aggregation, token_in, path.max_amount_in, weth_is_eth)?;
                }
                s.erc4626_buffer_wrap_or_unwrap(&BufferWrapOrUnwrapParams {
                    kind: SwapKind::ExactOut,
                    direction,
                    wrapped: step.pool,
                    amount_given: amount_out,
                    limit: max_amount_in,
                })?
                .amount_in
            } else if token_in == step.pool {
                let (from, max_bpt_in) = if is_first {
                    (ctx.sender, max_amount_in)
                } else {
                    let borrowed = s.get_reserves_of(step.pool);
                    s.send_to(step.pool, self.address(), borrowed)?;
                    (self.address(), borrowed)
                };
                let (tokens, index) = RouterCommon::token_index(s, step.pool, step.token_out)?;
                let mut min_amounts_out = vec![0; tokens.len()];
                min_amounts_out[index] = amount_out;
                let bpt_in = s
                    .remove_liquidity(&RemoveLiquidityParams {
                        pool: step.pool,
                        from,
                        max_bpt_amount_in: max_bpt_in,
                        min_amounts_out,
                        kind: RemoveLiquidityKind::SingleTokenExactOut,
                        single_token: Some(step.token_out),
                    })?
                    .bpt_amount_in;
                if !is_first {
                    let unused = max_bpt_in - bpt_in;
                    if unused > 0 {
                        let vault = s.vault_address();
                        s.transfer(step.pool, self.address(), vault, unused)?;
                        s.settle_exact(step.pool, unused)?;
                    }
                }
                bpt_in
            } else if step.token_out == step.pool {
                let (tokens, index) = RouterCommon::token_index(s, step.pool, token_in)?;
                let mut max_amounts_in = vec![0; tokens.len()];
                max_amounts_in[index] = max_amount_in;
                let to = if is_last {
                    ctx.sender
                } else {
                    s.vault_address()
                };
                let paid = s
                    .add_liquidity(&AddLiquidityParams {
                        pool: step.pool,
                        to,
                        max_amounts_in,
                        min_bpt_amount_out: amount_out,
                        kind: AddLiquidityKind::SingleTokenExactOut,
                        single_token: Some(token_in),
                    })?
                    .amounts_in[index];
                if !is_last {
                    s.settle_exact(step.pool, amount_out)?;
                }
                paid
            } else {
                s.swap(&VaultSwapParams {
                    kind: SwapKind::ExactOut,
                    pool: step.pool,
                    token_in,
                    token_out: step.token_out,
                    amount_given: amount_out,
                    limit: max_amount_in,
                })?
                .amount_in
            };

            debug!(step = i, pool = %step.pool, %token_in, token_out = %step.token_out, amount_in, amount_out, "Exact out step");
            if is_first && (step.is_buffer || token_in != step.pool) {
                aggregation.owe_in(token_in, amount_in)?;
            }
            amount_out = amount_in;
        }
        Ok(amount_out)
    }
}
