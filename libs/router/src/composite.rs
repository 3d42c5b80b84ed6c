//! # Composite Liquidity Router
//!
//! Liquidity for pools whose tokens are themselves wrappers or pools.
//!
//! - **ERC4626 pools**: the caller pays and receives underlying tokens; each leg flagged for
//!   wrapping goes through the token's buffer on the way in or out.
//! - **Nested pools**: a parent pool holding the BPT of child pools. Adding pays leaf tokens,
//!   which are added to the children first and their BPT fed into the parent. Removing exits
//!   the parent proportionally and then every child, paying out leaf tokens.
//!
//! Child BPT never leaves the vault: it is minted to the vault and settled, or borrowed from
//! reserves for a child removal, so only leaf tokens are paid for.

use crate::common::{RouterCommon, RouterContext};
use crate::error::RouterError;
use crate::token_set::TokenSet;
use keel_config::RouterSettings;
use keel_types::{
    fixed_point, AccountId, AddLiquidityKind, PoolId, RemoveLiquidityKind, SwapKind, TokenId,
    WrappingDirection,
};
use keel_vault::{
    AddLiquidityParams, BufferWrapOrUnwrapParams, Journaled, RemoveLiquidityParams,
    TokenTransfer, Unlocker, VaultError, VaultSession,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

fn ensure_length(expected: usize, actual: usize) -> Result<(), RouterError> {
    if expected != actual {
        return Err(VaultError::InputLengthMismatch { expected, actual }.into());
    }
    Ok(())
}

fn accumulate(
    leaves: &mut BTreeMap<TokenId, u128>,
    token: TokenId,
    amount: u128,
) -> Result<(), RouterError> {
    let total = leaves.entry(token).or_default();
    *total = fixed_point::add(*total, amount)?;
    Ok(())
}

#[derive(Debug)]
pub struct CompositeLiquidityRouter {
    common: RouterCommon,
}

impl CompositeLiquidityRouter {
    pub fn new(address: AccountId, settings: &RouterSettings) -> Self {
        Self {
            common: RouterCommon::new(address, settings),
        }
    }

    pub fn address(&self) -> AccountId {
        self.common.address()
    }

    // ---------------------------------------------------------------------------------------
    // ERC4626 pools
    // ---------------------------------------------------------------------------------------

    /// Pay exact amounts, wrapping the legs flagged in `wrap_underlying`; returns the BPT minted
    #[allow(clippy::too_many_arguments)]
    pub fn add_liquidity_unbalanced_to_erc4626_pool<V: Unlocker>(
        &self,
        vault: &mut V,
        ctx: &RouterContext,
        pool: PoolId,
        wrap_underlying: &[bool],
        exact_amounts_in: &[u128],
        min_bpt_amount_out: u128,
        weth_is_eth: bool,
    ) -> Result<u128, RouterError> {
        let _entered = self.common.enter("add_liquidity_unbalanced_to_erc4626_pool")?;
        self.common.ensure_weth(weth_is_eth)?;
        let bpt = vault.unlock(ctx.sender, |s| {
            self.erc4626_add_unbalanced_hook(
                s,
                ctx,
                pool,
                wrap_underlying,
                exact_amounts_in,
                min_bpt_amount_out,
                weth_is_eth,
            )
        })?;
        info!(%pool, sender = %ctx.sender, bpt, "Added unbalanced liquidity to ERC4626 pool");
        Ok(bpt)
    }

    /// Mint exactly `exact_bpt_amount_out`; returns what was paid per leg (underlying for
    /// wrapped legs)
    #[allow(clippy::too_many_arguments)]
    pub fn add_liquidity_proportional_to_erc4626_pool<V: Unlocker>(
        &self,
        vault: &mut V,
        ctx: &RouterContext,
        pool: PoolId,
        wrap_underlying: &[bool],
        max_amounts_in: &[u128],
        exact_bpt_amount_out: u128,
        weth_is_eth: bool,
    ) -> Result<Vec<u128>, RouterError> {
        let _entered = self.common.enter("add_liquidity_proportional_to_erc4626_pool")?;
        self.common.ensure_weth(weth_is_eth)?;
        vault.unlock(ctx.sender, |s| {
            self.erc4626_add_proportional_hook(
                s,
                ctx,
                pool,
                wrap_underlying,
                max_amounts_in,
                exact_bpt_amount_out,
                weth_is_eth,
            )
        })
    }

    /// Burn exactly `exact_bpt_amount_in`, unwrapping the legs flagged in `unwrap_wrapped`
    #[allow(clippy::too_many_arguments)]
    pub fn remove_liquidity_proportional_from_erc4626_pool<V: Unlocker>(
        &self,
        vault: &mut V,
        ctx: &RouterContext,
        pool: PoolId,
        unwrap_wrapped: &[bool],
        exact_bpt_amount_in: u128,
        min_amounts_out: &[u128],
        weth_is_eth: bool,
    ) -> Result<Vec<u128>, RouterError> {
        let _entered = self
            .common
            .enter("remove_liquidity_proportional_from_erc4626_pool")?;
        self.common.ensure_weth(weth_is_eth)?;
        vault.unlock(ctx.sender, |s| {
            self.erc4626_remove_proportional_hook(
                s,
                ctx,
                pool,
                unwrap_wrapped,
                exact_bpt_amount_in,
                min_amounts_out,
                weth_is_eth,
            )
        })
    }

    pub fn query_add_liquidity_unbalanced_to_erc4626_pool<V: Unlocker>(
        &self,
        vault: &mut V,
        sender: AccountId,
        pool: PoolId,
        wrap_underlying: &[bool],
        exact_amounts_in: &[u128],
    ) -> Result<u128, RouterError> {
        let ctx = RouterContext::new(sender);
        vault.quote(sender, |s| {
            self.erc4626_add_unbalanced_hook(
                s,
                &ctx,
                pool,
                wrap_underlying,
                exact_amounts_in,
                0,
                false,
            )
        })
    }

    pub fn query_add_liquidity_proportional_to_erc4626_pool<V: Unlocker>(
        &self,
        vault: &mut V,
        sender: AccountId,
        pool: PoolId,
        wrap_underlying: &[bool],
        exact_bpt_amount_out: u128,
    ) -> Result<Vec<u128>, RouterError> {
        let ctx = RouterContext::new(sender);
        let max_amounts_in = vec![u128::MAX; wrap_underlying.len()];
        vault.quote(sender, |s| {
            self.erc4626_add_proportional_hook(
                s,
                &ctx,
                pool,
                wrap_underlying,
                &max_amounts_in,
                exact_bpt_amount_out,
                false,
            )
        })
    }

    pub fn query_remove_liquidity_proportional_from_erc4626_pool<V: Unlocker>(
        &self,
        vault: &mut V,
        sender: AccountId,
        pool: PoolId,
        unwrap_wrapped: &[bool],
        exact_bpt_amount_in: u128,
    ) -> Result<Vec<u128>, RouterError> {
        let ctx = RouterContext::new(sender);
        let min_amounts_out = vec![0; unwrap_wrapped.len()];
        vault.quote(sender, |s| {
            self.erc4626_remove_proportional_hook(
                s,
                &ctx,
                pool,
                unwrap_wrapped,
                exact_bpt_amount_in,
                &min_amounts_out,
                false,
            )
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn erc4626_add_unbalanced_hook<T: TokenTransfer + Journaled>(
        &self,
        s: &mut VaultSession<'_, T>,
        ctx: &RouterContext,
        pool: PoolId,
        wrap_underlying: &[bool],
        exact_amounts_in: &[u128],
        min_bpt_amount_out: u128,
        weth_is_eth: bool,
    ) -> Result<u128, RouterError> {
        let tokens = s.vault().get_pool_tokens(pool)?;
        ensure_length(tokens.len(), wrap_underlying.len())?;
        ensure_length(tokens.len(), exact_amounts_in.len())?;
        self.common.receive_value(s, ctx)?;

        let mut amounts_in = vec![0; tokens.len()];
        for (i, token) in tokens.iter().enumerate() {
            let amount = exact_amounts_in[i];
            if amount == 0 {
                continue;
            }
            if wrap_underlying[i] {
                let underlying = s.vault().get_buffer_asset(*token)?;
                self.common
                    .take_token_in(s, ctx, underlying, amount, weth_is_eth)?;
                amounts_in[i] = s
                    .erc4626_buffer_wrap_or_unwrap(&BufferWrapOrUnwrapParams {
                        kind: SwapKind::ExactIn,
                        direction: WrappingDirection::Wrap,
                        wrapped: *token,
                        amount_given: amount,
                        limit: 0,
                    })?
                    .amount_out;
            } else {
                self.common
                    .take_token_in(s, ctx, *token, amount, weth_is_eth)?;
                amounts_in[i] = amount;
            }
        }

        let bpt = s
            .add_liquidity(&AddLiquidityParams {
                pool,
                to: ctx.sender,
                max_amounts_in: amounts_in,
                min_bpt_amount_out,
                kind: AddLiquidityKind::Unbalanced,
                single_token: None,
            })?
            .bpt_amount_out;
        self.common.return_eth(s, ctx)?;
        Ok(bpt)
    }

    #[allow(clippy::too_many_arguments)]
    fn erc4626_add_proportional_hook<T: TokenTransfer + Journaled>(
        &self,
        s: &mut VaultSession<'_, T>,
        ctx: &RouterContext,
        pool: PoolId,
        wrap_underlying: &[bool],
        max_amounts_in: &[u128],
        exact_bpt_amount_out: u128,
        weth_is_eth: bool,
    ) -> Result<Vec<u128>, RouterError> {
        let tokens = s.vault().get_pool_tokens(pool)?;
        ensure_length(tokens.len(), wrap_underlying.len())?;
        ensure_length(tokens.len(), max_amounts_in.len())?;
        self.common.receive_value(s, ctx)?;

        // Wrapped legs are limited in underlying terms below
        let vault_max: Vec<u128> = wrap_underlying
            .iter()
            .zip(max_amounts_in)
            .map(|(wrap, max)| if *wrap { u128::MAX } else { *max })
            .collect();
        let wrapped_amounts = s
            .add_liquidity(&AddLiquidityParams {
                pool,
                to: ctx.sender,
                max_amounts_in: vault_max,
                min_bpt_amount_out: exact_bpt_amount_out,
                kind: AddLiquidityKind::Proportional,
                single_token: None,
            })?
            .amounts_in;

        let mut paid = vec![0; tokens.len()];
        for (i, token) in tokens.iter().enumerate() {
            let amount = wrapped_amounts[i];
            if amount == 0 {
                continue;
            }
            if wrap_underlying[i] {
                let underlying = s.vault().get_buffer_asset(*token)?;
                let max = max_amounts_in[i];
                self.common
                    .take_token_in(s, ctx, underlying, max, weth_is_eth)?;
                let underlying_in = s
                    .erc4626_buffer_wrap_or_unwrap(&BufferWrapOrUnwrapParams {
                        kind: SwapKind::ExactOut,
                        direction: WrappingDirection::Wrap,
                        wrapped: *token,
                        amount_given: amount,
                        limit: max,
                    })?
                    .amount_in;
                self.common.send_token_out(
                    s,
                    ctx.sender,
                    underlying,
                    max - underlying_in,
                    weth_is_eth,
                )?;
                paid[i] = underlying_in;
            } else {
                self.common
                    .take_token_in(s, ctx, *token, amount, weth_is_eth)?;
                paid[i] = amount;
            }
        }
        self.common.return_eth(s, ctx)?;
        debug!(%pool, bpt = exact_bpt_amount_out, ?paid, "Added proportional liquidity to ERC4626 pool");
        Ok(paid)
    }

    #[allow(clippy::too_many_arguments)]
    fn erc4626_remove_proportional_hook<T: TokenTransfer + Journaled>(
        &self,
        s: &mut VaultSession<'_, T>,
        ctx: &RouterContext,
        pool: PoolId,
        unwrap_wrapped: &[bool],
        exact_bpt_amount_in: u128,
        min_amounts_out: &[u128],
        weth_is_eth: bool,
    ) -> Result<Vec<u128>, RouterError> {
        let tokens = s.vault().get_pool_tokens(pool)?;
        ensure_length(tokens.len(), unwrap_wrapped.len())?;
        ensure_length(tokens.len(), min_amounts_out.len())?;

        let wrapped_amounts = s
            .remove_liquidity(&RemoveLiquidityParams {
                pool,
                from: ctx.sender,
                max_bpt_amount_in: exact_bpt_amount_in,
                min_amounts_out: vec![0; tokens.len()],
                kind: RemoveLiquidityKind::Proportional,
                single_token: None,
            })?
            .amounts_out;

        let mut amounts_out = vec![0; tokens.len()];
        for (i, token) in tokens.iter().enumerate() {
            let amount = wrapped_amounts[i];
            let (token_out, amount_out) = if unwrap_wrapped[i] && amount > 0 {
                let underlying = s.vault().get_buffer_asset(*token)?;
                let out = s
                    .erc4626_buffer_wrap_or_unwrap(&BufferWrapOrUnwrapParams {
                        kind: SwapKind::ExactIn,
                        direction: WrappingDirection::Unwrap,
                        wrapped: *token,
                        amount_given: amount,
                        limit: min_amounts_out[i],
                    })?
                    .amount_out;
                (underlying, out)
            } else {
                (*token, amount)
            };
            if amount_out < min_amounts_out[i] {
                return Err(VaultError::AmountOutBelowMin {
                    token: token_out,
                    amount: amount_out,
                    min: min_amounts_out[i],
                }
                .into());
            }
            self.common
                .send_token_out(s, ctx.sender, token_out, amount_out, weth_is_eth)?;
            amounts_out[i] = amount_out;
        }
        Ok(amounts_out)
    }

    // ---------------------------------------------------------------------------------------
    // Nested pools
    // ---------------------------------------------------------------------------------------

    /// Pay exact amounts of leaf tokens into `parent_pool` and its children; returns the
    /// parent BPT minted
    #[allow(clippy::too_many_arguments)]
    pub fn add_liquidity_unbalanced_nested_pool<V: Unlocker>(
        &self,
        vault: &mut V,
        ctx: &RouterContext,
        parent_pool: PoolId,
        tokens_in: &[TokenId],
        exact_amounts_in: &[u128],
        min_bpt_amount_out: u128,
        weth_is_eth: bool,
    ) -> Result<u128, RouterError> {
        let _entered = self.common.enter("add_liquidity_unbalanced_nested_pool")?;
        self.common.ensure_weth(weth_is_eth)?;
        let bpt = vault.unlock(ctx.sender, |s| {
            self.nested_add_hook(
                s,
                ctx,
                parent_pool,
                tokens_in,
                exact_amounts_in,
                min_bpt_amount_out,
                weth_is_eth,
            )
        })?;
        info!(%parent_pool, sender = %ctx.sender, bpt, "Added liquidity to nested pool");
        Ok(bpt)
    }

    /// Burn exactly `exact_bpt_amount_in` of `parent_pool` for leaf tokens; `tokens_out` must
    /// list every leaf token exactly once and the result follows its order
    #[allow(clippy::too_many_arguments)]
    pub fn remove_liquidity_proportional_nested_pool<V: Unlocker>(
        &self,
        vault: &mut V,
        ctx: &RouterContext,
        parent_pool: PoolId,
        exact_bpt_amount_in: u128,
        tokens_out: &[TokenId],
        min_amounts_out: &[u128],
        weth_is_eth: bool,
    ) -> Result<Vec<u128>, RouterError> {
        let _entered = self.common.enter("remove_liquidity_proportional_nested_pool")?;
        self.common.ensure_weth(weth_is_eth)?;
        vault.unlock(ctx.sender, |s| {
            self.nested_remove_hook(
                s,
                ctx,
                parent_pool,
                exact_bpt_amount_in,
                tokens_out,
                min_amounts_out,
                weth_is_eth,
            )
        })
    }

    pub fn query_add_liquidity_unbalanced_nested_pool<V: Unlocker>(
        &self,
        vault: &mut V,
        sender: AccountId,
        parent_pool: PoolId,
        tokens_in: &[TokenId],
        exact_amounts_in: &[u128],
    ) -> Result<u128, RouterError> {
        let ctx = RouterContext::new(sender);
        vault.quote(sender, |s| {
            self.nested_add_hook(s, &ctx, parent_pool, tokens_in, exact_amounts_in, 0, false)
        })
    }

    pub fn query_remove_liquidity_proportional_nested_pool<V: Unlocker>(
        &self,
        vault: &mut V,
        sender: AccountId,
        parent_pool: PoolId,
        exact_bpt_amount_in: u128,
        tokens_out: &[TokenId],
    ) -> Result<Vec<u128>, RouterError> {
        let ctx = RouterContext::new(sender);
        let min_amounts_out = vec![0; tokens_out.len()];
        vault.quote(sender, |s| {
            self.nested_remove_hook(
                s,
                &ctx,
                parent_pool,
                exact_bpt_amount_in,
                tokens_out,
                &min_amounts_out,
                false,
            )
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn nested_add_hook<T: TokenTransfer + Journaled>(
        &self,
        s: &mut VaultSession<'_, T>,
        ctx: &RouterContext,
        parent_pool: PoolId,
        tokens_in: &[TokenId],
        exact_amounts_in: &[u128],
        min_bpt_amount_out: u128,
        weth_is_eth: bool,
    ) -> Result<u128, RouterError> {
        ensure_length(tokens_in.len(), exact_amounts_in.len())?;
        self.common.receive_value(s, ctx)?;

        let mut payments = TokenSet::new();
        for (token, amount) in tokens_in.iter().zip(exact_amounts_in) {
            payments.add(*token, *amount)?;
        }
        // Each input is consumed by the first leg that names its token
        let mut unused: BTreeMap<TokenId, u128> = payments.iter().collect();

        let parent_tokens = s.vault().get_pool_tokens(parent_pool)?;
        let mut parent_amounts = vec![0; parent_tokens.len()];
        for (i, token) in parent_tokens.iter().enumerate() {
            if !s.vault().is_pool_registered(*token) {
                parent_amounts[i] = unused.remove(token).unwrap_or_default();
                continue;
            }
            let child_tokens = s.vault().get_pool_tokens(*token)?;
            let child_amounts: Vec<u128> = child_tokens
                .iter()
                .map(|child_token| unused.remove(child_token).unwrap_or_default())
                .collect();
            if child_amounts.iter().all(|amount| *amount == 0) {
                continue;
            }
            let vault_address = s.vault_address();
            let child_bpt = s
                .add_liquidity(&AddLiquidityParams {
                    pool: *token,
                    to: vault_address,
                    max_amounts_in: child_amounts,
                    min_bpt_amount_out: 0,
                    kind: AddLiquidityKind::Unbalanced,
                    single_token: None,
                })?
                .bpt_amount_out;
            s.settle_exact(*token, child_bpt)?;
            parent_amounts[i] = child_bpt;
        }
        if let Some(token) = unused.keys().next() {
            return Err(RouterError::UnusedNestedToken { token: *token });
        }

        let bpt = s
            .add_liquidity(&AddLiquidityParams {
                pool: parent_pool,
                to: ctx.sender,
                max_amounts_in: parent_amounts,
                min_bpt_amount_out,
                kind: AddLiquidityKind::Unbalanced,
                single_token: None,
            })?
            .bpt_amount_out;

        for (token, amount) in payments.iter() {
            self.common
                .take_token_in(s, ctx, token, amount, weth_is_eth)?;
        }
        self.common.return_eth(s, ctx)?;
        Ok(bpt)
    }

    #[allow(clippy::too_many_arguments)]
    fn nested_remove_hook<T: TokenTransfer + Journaled>(
        &self,
        s: &mut VaultSession<'_, T>,
        ctx: &RouterContext,
        parent_pool: PoolId,
        exact_bpt_amount_in: u128,
        tokens_out: &[TokenId],
        min_amounts_out: &[u128],
        weth_is_eth: bool,
    ) -> Result<Vec<u128>, RouterError> {
        ensure_length(tokens_out.len(), min_amounts_out.len())?;
        let parent_tokens = s.vault().get_pool_tokens(parent_pool)?;
        let parent_amounts = s
            .remove_liquidity(&RemoveLiquidityParams {
                pool: parent_pool,
                from: ctx.sender,
                max_bpt_amount_in: exact_bpt_amount_in,
                min_amounts_out: vec![0; parent_tokens.len()],
                kind: RemoveLiquidityKind::Proportional,
                single_token: None,
            })?
            .amounts_out;

        let mut leaves: BTreeMap<TokenId, u128> = BTreeMap::new();
        for (token, amount) in parent_tokens.iter().zip(parent_amounts) {
            if !s.vault().is_pool_registered(*token) {
                accumulate(&mut leaves, *token, amount)?;
                continue;
            }
            let child_tokens = s.vault().get_pool_tokens(*token)?;
            if amount == 0 {
                for child_token in child_tokens {
                    leaves.entry(child_token).or_default();
                }
                continue;
            }
            // The parent removal left the child BPT as a credit in the vault
            s.send_to(*token, self.address(), amount)?;
            let child_amounts = s
                .remove_liquidity(&RemoveLiquidityParams {
                    pool: *token,
                    from: self.address(),
                    max_bpt_amount_in: amount,
                    min_amounts_out: vec![0; child_tokens.len()],
                    kind: RemoveLiquidityKind::Proportional,
                    single_token: None,
                })?
                .amounts_out;
            for (child_token, child_amount) in child_tokens.into_iter().zip(child_amounts) {
                accumulate(&mut leaves, child_token, child_amount)?;
            }
        }

        if leaves.len() != tokens_out.len() {
            return Err(RouterError::WrongTokensOut);
        }
        let mut seen = BTreeSet::new();
        let mut amounts_out = Vec::with_capacity(tokens_out.len());
        for (token, min) in tokens_out.iter().zip(min_amounts_out) {
            let amount = match leaves.get(token) {
                Some(amount) if seen.insert(*token) => *amount,
                _ => return Err(RouterError::WrongTokensOut),
            };
            if amount < *min {
                return Err(VaultError::AmountOutBelowMin {
                    token: *token,
                    amount,
                    min: *min,
                }
                .into());
            }
            self.common
                .send_token_out(s, ctx.sender, *token, amount, weth_is_eth)?;
            amounts_out.push(amount);
        }
        debug!(%parent_pool, bpt = exact_bpt_amount_in, ?amounts_out, "Removed liquidity from nested pool");
        Ok(amounts_out)
    }
}
