//! # Single-Pool Router
//!
//! ## Purpose
//!
//! User entrypoints for one pool at a time: initialization, the liquidity variants and single
//! swaps. Every entrypoint opens one vault scope, runs a single vault operation, then pays in
//! what the ledger says the caller owes and pays out what the caller is owed, so the scope
//! always closes settled.
//!
//! Each mutating entrypoint has a `query_*` twin that runs the same hook under a quote and
//! returns the amounts without moving anything.
//!
//! ## Native asset
//!
//! With `weth_is_eth` set, the configured wrapped native token is paid from (and paid out as)
//! native value. Leftover native value is returned to the sender before the hook ends.

use crate::common::{RouterCommon, RouterContext};
use crate::error::RouterError;
use keel_config::RouterSettings;
use keel_types::{AccountId, AddLiquidityKind, PoolId, RemoveLiquidityKind, SwapKind, TokenId};
use keel_vault::{
    AddLiquidityParams, AddLiquidityResult, Journaled, RemoveLiquidityParams,
    RemoveLiquidityResult, SwapResult, TokenTransfer, Unlocker, VaultSession, VaultSwapParams,
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// A swap against a single pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleSwap {
    pub pool: PoolId,
    pub token_in: TokenId,
    pub token_out: TokenId,
    /// Exact amount in for exact-in swaps, exact amount out for exact-out swaps
    pub amount_given: u128,
    /// Minimum out for exact-in swaps, maximum in for exact-out swaps
    pub limit: u128,
    pub deadline: u64,
    pub weth_is_eth: bool,
}

#[derive(Debug)]
pub struct Router {
    common: RouterCommon,
}

impl Router {
    pub fn new(address: AccountId, settings: &RouterSettings) -> Self {
        Self {
            common: RouterCommon::new(address, settings),
        }
    }

    pub fn address(&self) -> AccountId {
        self.common.address()
    }

    pub fn common(&self) -> &RouterCommon {
        &self.common
    }

    // ---------------------------------------------------------------------------------------
    // Pool initialization
    // ---------------------------------------------------------------------------------------

    pub fn initialize<V: Unlocker>(
        &self,
        vault: &mut V,
        ctx: &RouterContext,
        pool: PoolId,
        exact_amounts_in: &[u128],
        min_bpt_amount_out: u128,
        weth_is_eth: bool,
    ) -> Result<u128, RouterError> {
        let _entered = self.common.enter("initialize")?;
        self.common.ensure_weth(weth_is_eth)?;
        let bpt = vault.unlock(ctx.sender, |s| {
            self.initialize_hook(s, ctx, pool, exact_amounts_in, min_bpt_amount_out, weth_is_eth)
        })?;
        info!(%pool, sender = %ctx.sender, bpt, "Router initialized pool");
        Ok(bpt)
    }

    pub fn query_initialize<V: Unlocker>(
        &self,
        vault: &mut V,
        sender: AccountId,
        pool: PoolId,
        exact_amounts_in: &[u128],
    ) -> Result<u128, RouterError> {
        let ctx = RouterContext::new(sender);
        vault.quote(sender, |s| {
            self.initialize_hook(s, &ctx, pool, exact_amounts_in, 0, false)
        })
    }

    // ---------------------------------------------------------------------------------------
    // Add liquidity
    // ---------------------------------------------------------------------------------------

    /// Mint exactly `exact_bpt_amount_out`, paying proportional amounts; returns the amounts in
    pub fn add_liquidity_proportional<V: Unlocker>(
        &self,
        vault: &mut V,
        ctx: &RouterContext,
        pool: PoolId,
        max_amounts_in: &[u128],
        exact_bpt_amount_out: u128,
        weth_is_eth: bool,
    ) -> Result<Vec<u128>, RouterError> {
        let _entered = self.common.enter("add_liquidity_proportional")?;
        self.common.ensure_weth(weth_is_eth)?;
        let params = AddLiquidityParams {
            pool,
            to: ctx.sender,
            max_amounts_in: max_amounts_in.to_vec(),
            min_bpt_amount_out: exact_bpt_amount_out,
            kind: AddLiquidityKind::Proportional,
            single_token: None,
        };
        vault
            .unlock(ctx.sender, |s| self.add_liquidity_hook(s, ctx, &params, weth_is_eth))
            .map(|result| result.amounts_in)
    }

    /// Pay exact amounts of any subset of the pool's tokens; returns the BPT minted
    pub fn add_liquidity_unbalanced<V: Unlocker>(
        &self,
        vault: &mut V,
        ctx: &RouterContext,
        pool: PoolId,
        exact_amounts_in: &[u128],
        min_bpt_amount_out: u128,
        weth_is_eth: bool,
    ) -> Result<u128, RouterError> {
        let _entered = self.common.enter("add_liquidity_unbalanced")?;
        self.common.ensure_weth(weth_is_eth)?;
        let params = AddLiquidityParams {
            pool,
            to: ctx.sender,
            max_amounts_in: exact_amounts_in.to_vec(),
            min_bpt_amount_out,
            kind: AddLiquidityKind::Unbalanced,
            single_token: None,
        };
        vault
            .unlock(ctx.sender, |s| self.add_liquidity_hook(s, ctx, &params, weth_is_eth))
            .map(|result| result.bpt_amount_out)
    }

    /// Mint exactly `exact_bpt_amount_out` paying only `token_in`; returns the amount paid
    #[allow(clippy::too_many_arguments)]
    pub fn add_liquidity_single_token_exact_out<V: Unlocker>(
        &self,
        vault: &mut V,
        ctx: &RouterContext,
        pool: PoolId,
        token_in: TokenId,
        max_amount_in: u128,
        exact_bpt_amount_out: u128,
        weth_is_eth: bool,
    ) -> Result<u128, RouterError> {
        let _entered = self.common.enter("add_liquidity_single_token_exact_out")?;
        self.common.ensure_weth(weth_is_eth)?;
        vault.unlock(ctx.sender, |s| {
            self.add_single_token_hook(
                s,
                ctx,
                pool,
                token_in,
                max_amount_in,
                exact_bpt_amount_out,
                weth_is_eth,
            )
        })
    }

    pub fn query_add_liquidity_proportional<V: Unlocker>(
        &self,
        vault: &mut V,
        sender: AccountId,
        pool: PoolId,
        exact_bpt_amount_out: u128,
    ) -> Result<Vec<u128>, RouterError> {
        let ctx = RouterContext::new(sender);
        vault.quote(sender, |s| {
            let tokens = s.vault().get_pool_tokens(pool)?;
            let params = AddLiquidityParams {
                pool,
                to: sender,
                max_amounts_in: vec![u128::MAX; tokens.len()],
                min_bpt_amount_out: exact_bpt_amount_out,
                kind: AddLiquidityKind::Proportional,
                single_token: None,
            };
            self.add_liquidity_hook(s, &ctx, &params, false)
                .map(|result| result.amounts_in)
        })
    }

    pub fn query_add_liquidity_unbalanced<V: Unlocker>(
        &self,
        vault: &mut V,
        sender: AccountId,
        pool: PoolId,
        exact_amounts_in: &[u128],
    ) -> Result<u128, RouterError> {
        let ctx = RouterContext::new(sender);
        let params = AddLiquidityParams {
            pool,
            to: sender,
            max_amounts_in: exact_amounts_in.to_vec(),
            min_bpt_amount_out: 0,
            kind: AddLiquidityKind::Unbalanced,
            single_token: None,
        };
        vault
            .quote(sender, |s| self.add_liquidity_hook(s, &ctx, &params, false))
            .map(|result| result.bpt_amount_out)
    }

    pub fn query_add_liquidity_single_token_exact_out<V: Unlocker>(
        &self,
        vault: &mut V,
        sender: AccountId,
        pool: PoolId,
        token_in: TokenId,
        exact_bpt_amount_out: u128,
    ) -> Result<u128, RouterError> {
        let ctx = RouterContext::new(sender);
        vault.quote(sender, |s| {
            self.add_single_token_hook(
                s,
                &ctx,
                pool,
                token_in,
                u128::MAX,
                exact_bpt_amount_out,
                false,
            )
        })
    }

    // ---------------------------------------------------------------------------------------
    // Remove liquidity
    // ---------------------------------------------------------------------------------------

    /// Burn exactly `exact_bpt_amount_in` for proportional amounts; returns the amounts out
    pub fn remove_liquidity_proportional<V: Unlocker>(
        &self,
        vault: &mut V,
        ctx: &RouterContext,
        pool: PoolId,
        exact_bpt_amount_in: u128,
        min_amounts_out: &[u128],
        weth_is_eth: bool,
    ) -> Result<Vec<u128>, RouterError> {
        let _entered = self.common.enter("remove_liquidity_proportional")?;
        self.common.ensure_weth(weth_is_eth)?;
        let params = RemoveLiquidityParams {
            pool,
            from: ctx.sender,
            max_bpt_amount_in: exact_bpt_amount_in,
            min_amounts_out: min_amounts_out.to_vec(),
            kind: RemoveLiquidityKind::Proportional,
            single_token: None,
        };
        vault
            .unlock(ctx.sender, |s| self.remove_liquidity_hook(s, ctx, &params, weth_is_eth))
            .map(|result| result.amounts_out)
    }

    /// Burn exactly `exact_bpt_amount_in` for `token_out` only; returns the amount out
    #[allow(clippy::too_many_arguments)]
    pub fn remove_liquidity_single_token_exact_in<V: Unlocker>(
        &self,
        vault: &mut V,
        ctx: &RouterContext,
        pool: PoolId,
        exact_bpt_amount_in: u128,
        token_out: TokenId,
        min_amount_out: u128,
        weth_is_eth: bool,
    ) -> Result<u128, RouterError> {
        let _entered = self.common.enter("remove_liquidity_single_token_exact_in")?;
        self.common.ensure_weth(weth_is_eth)?;
        vault.unlock(ctx.sender, |s| {
            self.remove_single_token_hook(
                s,
                ctx,
                pool,
                RemoveLiquidityKind::SingleTokenExactIn,
                exact_bpt_amount_in,
                token_out,
                min_amount_out,
                weth_is_eth,
            )
            .map(|result| result.1)
        })
    }

    /// Receive exactly `exact_amount_out` of `token_out`; returns the BPT burned
    #[allow(clippy::too_many_arguments)]
    pub fn remove_liquidity_single_token_exact_out<V: Unlocker>(
        &self,
        vault: &mut V,
        ctx: &RouterContext,
        pool: PoolId,
        max_bpt_amount_in: u128,
        token_out: TokenId,
        exact_amount_out: u128,
        weth_is_eth: bool,
    ) -> Result<u128, RouterError> {
        let _entered = self.common.enter("remove_liquidity_single_token_exact_out")?;
        self.common.ensure_weth(weth_is_eth)?;
        vault.unlock(ctx.sender, |s| {
            self.remove_single_token_hook(
                s,
                ctx,
                pool,
                RemoveLiquidityKind::SingleTokenExactOut,
                max_bpt_amount_in,
                token_out,
                exact_amount_out,
                weth_is_eth,
            )
            .map(|result| result.0)
        })
    }

    pub fn query_remove_liquidity_proportional<V: Unlocker>(
        &self,
        vault: &mut V,
        sender: AccountId,
        pool: PoolId,
        exact_bpt_amount_in: u128,
    ) -> Result<Vec<u128>, RouterError> {
        let ctx = RouterContext::new(sender);
        vault.quote(sender, |s| {
            let tokens = s.vault().get_pool_tokens(pool)?;
            let params = RemoveLiquidityParams {
                pool,
                from: sender,
                max_bpt_amount_in: exact_bpt_amount_in,
                min_amounts_out: vec![0; tokens.len()],
                kind: RemoveLiquidityKind::Proportional,
                single_token: None,
            };
            self.remove_liquidity_hook(s, &ctx, &params, false)
                .map(|result| result.amounts_out)
        })
    }

    pub fn query_remove_liquidity_single_token_exact_in<V: Unlocker>(
        &self,
        vault: &mut V,
        sender: AccountId,
        pool: PoolId,
        exact_bpt_amount_in: u128,
        token_out: TokenId,
    ) -> Result<u128, RouterError> {
        let ctx = RouterContext::new(sender);
        vault.quote(sender, |s| {
            self.remove_single_token_hook(
                s,
                &ctx,
                pool,
                RemoveLiquidityKind::SingleTokenExactIn,
                exact_bpt_amount_in,
                token_out,
                0,
                false,
            )
            .map(|result| result.1)
        })
    }

    pub fn query_remove_liquidity_single_token_exact_out<V: Unlocker>(
        &self,
        vault: &mut V,
        sender: AccountId,
        pool: PoolId,
        token_out: TokenId,
        exact_amount_out: u128,
    ) -> Result<u128, RouterError> {
        let ctx = RouterContext::new(sender);
        vault.quote(sender, |s| {
            self.remove_single_token_hook(
                s,
                &ctx,
                pool,
                RemoveLiquidityKind::SingleTokenExactOut,
                u128::MAX,
                token_out,
                exact_amount_out,
                false,
            )
            .map(|result| result.0)
        })
    }

    // ---------------------------------------------------------------------------------------
    // Swaps
    // ---------------------------------------------------------------------------------------

    /// Returns the amount out
    pub fn swap_single_token_exact_in<V: Unlocker>(
        &self,
        vault: &mut V,
        ctx: &RouterContext,
        swap: &SingleSwap,
    ) -> Result<u128, RouterError> {
        let _entered = self.common.enter("swap_single_token_exact_in")?;
        self.common.ensure_weth(swap.weth_is_eth)?;
        RouterCommon::check_deadline(vault, swap.deadline)?;
        vault
            .unlock(ctx.sender, |s| self.swap_hook(s, ctx, SwapKind::ExactIn, swap))
            .map(|result| result.amount_out)
    }

    /// Returns the amount in
    pub fn swap_single_token_exact_out<V: Unlocker>(
        &self,
        vault: &mut V,
        ctx: &RouterContext,
        swap: &SingleSwap,
    ) -> Result<u128, RouterError> {
        let _entered = self.common.enter("swap_single_token_exact_out")?;
        self.common.ensure_weth(swap.weth_is_eth)?;
        RouterCommon::check_deadline(vault, swap.deadline)?;
        vault
            .unlock(ctx.sender, |s| self.swap_hook(s, ctx, SwapKind::ExactOut, swap))
            .map(|result| result.amount_in)
    }

    pub fn query_swap_single_token_exact_in<V: Unlocker>(
        &self,
        vault: &mut V,
        sender: AccountId,
        swap: &SingleSwap,
    ) -> Result<u128, RouterError> {
        let ctx = RouterContext::new(sender);
        vault
            .quote(sender, |s| self.swap_hook(s, &ctx, SwapKind::ExactIn, swap))
            .map(|result| result.amount_out)
    }

    pub fn query_swap_single_token_exact_out<V: Unlocker>(
        &self,
        vault: &mut V,
        sender: AccountId,
        swap: &SingleSwap,
    ) -> Result<u128, RouterError> {
        let ctx = RouterContext::new(sender);
        vault
            .quote(sender, |s| self.swap_hook(s, &ctx, SwapKind::ExactOut, swap))
            .map(|result| result.amount_in)
    }

    // ---------------------------------------------------------------------------------------
    // Hooks
    // ---------------------------------------------------------------------------------------

    fn initialize_hook<T: TokenTransfer + Journaled>(
        &self,
        s: &mut VaultSession<'_, T>,
        ctx: &RouterContext,
        pool: PoolId,
        exact_amounts_in: &[u128],
        min_bpt_amount_out: u128,
        weth_is_eth: bool,
    ) -> Result<u128, RouterError> {
        self.common.receive_value(s, ctx)?;
        let bpt = s.initialize(pool, ctx.sender, exact_amounts_in, min_bpt_amount_out)?;
        let tokens = s.vault().get_pool_tokens(pool)?;
        self.pay_in(s, ctx, &tokens, exact_amounts_in, weth_is_eth)?;
        self.common.return_eth(s, ctx)?;
        Ok(bpt)
    }

    fn add_liquidity_hook<T: TokenTransfer + Journaled>(
        &self,
        s: &mut VaultSession<'_, T>,
        ctx: &RouterContext,
        params: &AddLiquidityParams,
        weth_is_eth: bool,
    ) -> Result<AddLiquidityResult, RouterError> {
        self.common.receive_value(s, ctx)?;
        let result = s.add_liquidity(params)?;
        let tokens = s.vault().get_pool_tokens(params.pool)?;
        self.pay_in(s, ctx, &tokens, &result.amounts_in, weth_is_eth)?;
        self.common.return_eth(s, ctx)?;
        Ok(result)
    }

    #[allow(clippy::too_many_arguments)]
    fn add_single_token_hook<T: TokenTransfer + Journaled>(
        &self,
        s: &mut VaultSession<'_, T>,
        ctx: &RouterContext,
        pool: PoolId,
        token_in: TokenId,
        max_amount_in: u128,
        exact_bpt_amount_out: u128,
        weth_is_eth: bool,
    ) -> Result<u128, RouterError> {
        let (tokens, index) = RouterCommon::token_index(s, pool, token_in)?;
        let mut max_amounts_in = vec![0; tokens.len()];
        max_amounts_in[index] = max_amount_in;
        let params = AddLiquidityParams {
            pool,
            to: ctx.sender,
            max_amounts_in,
            min_bpt_amount_out: exact_bpt_amount_out,
            kind: AddLiquidityKind::SingleTokenExactOut,
            single_token: Some(token_in),
        };
        let result = self.add_liquidity_hook(s, ctx, &params, weth_is_eth)?;
        Ok(result.amounts_in[index])
    }

    fn remove_liquidity_hook<T: TokenTransfer + Journaled>(
        &self,
        s: &mut VaultSession<'_, T>,
        ctx: &RouterContext,
        params: &RemoveLiquidityParams,
        weth_is_eth: bool,
    ) -> Result<RemoveLiquidityResult, RouterError> {
        let result = s.remove_liquidity(params)?;
        let tokens = s.vault().get_pool_tokens(params.pool)?;
        for (token, amount) in tokens.iter().zip(&result.amounts_out) {
            self.common
                .send_token_out(s, ctx.sender, *token, *amount, weth_is_eth)?;
        }
        Ok(result)
    }

    /// Returns (BPT in, amount of `token_out` out)
    #[allow(clippy::too_many_arguments)]
    fn remove_single_token_hook<T: TokenTransfer + Journaled>(
        &self,
        s: &mut VaultSession<'_, T>,
        ctx: &RouterContext,
        pool: PoolId,
        kind: RemoveLiquidityKind,
        bpt_amount_in: u128,
        token_out: TokenId,
        amount_out: u128,
        weth_is_eth: bool,
    ) -> Result<(u128, u128), RouterError> {
        let (tokens, index) = RouterCommon::token_index(s, pool, token_out)?;
        let mut min_amounts_out = vec![0; tokens.len()];
        min_amounts_out[index] = amount_out;
        let params = RemoveLiquidityParams {
            pool,
            from: ctx.sender,
            max_bpt_amount_in: bpt_amount_in,
            min_amounts_out,
            kind,
            single_token: Some(token_out),
        };
        let result = self.remove_liquidity_hook(s, ctx, &params, weth_is_eth)?;
        Ok((result.bpt_amount_in, result.amounts_out[index]))
    }

    fn swap_hook<T: TokenTransfer + Journaled>(
        &self,
        s: &mut VaultSession<'_, T>,
        ctx: &RouterContext,
        kind: SwapKind,
        swap: &SingleSwap,
    ) -> Result<SwapResult, RouterError> {
        self.common.receive_value(s, ctx)?;
        let result = s.swap(&VaultSwapParams {
            kind,
            pool: swap.pool,
            token_in: swap.token_in,
            token_out: swap.token_out,
            amount_given: swap.amount_given,
            limit: swap.limit,
        })?;
        self.common
            .take_token_in(s, ctx, swap.token_in, result.amount_in, swap.weth_is_eth)?;
        self.common
            .send_token_out(s, ctx.sender, swap.token_out, result.amount_out, swap.weth_is_eth)?;
        self.common.return_eth(s, ctx)?;
        Ok(result)
    }

    fn pay_in<T: TokenTransfer + Journaled>(
        &self,
        s: &mut VaultSession<'_, T>,
        ctx: &RouterContext,
        tokens: &[TokenId],
        amounts: &[u128],
        weth_is_eth: bool,
    ) -> Result<(), RouterError> {
        for (token, amount) in tokens.iter().zip(amounts) {
            self.common
                .take_token_in(s, ctx, *token, *amount, weth_is_eth)?;
        }
        Ok(())
    }
}
