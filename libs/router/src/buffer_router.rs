//! Buffer liquidity router
//!
//! Deposits and withdrawals of both sides of an ERC4626 buffer. Shares are owned by the
//! sender; the underlying and wrapped tokens go through the ledger like any pool token.

use crate::common::{RouterCommon, RouterContext};
use crate::error::RouterError;
use keel_config::RouterSettings;
use keel_types::{AccountId, TokenId};
use keel_vault::{BufferRemoval, Journaled, TokenTransfer, Unlocker, VaultSession};
use tracing::info;

#[derive(Debug)]
pub struct BufferRouter {
    common: RouterCommon,
}

impl BufferRouter {
    pub fn new(address: AccountId, settings: &RouterSettings) -> Self {
        Self {
            common: RouterCommon::new(address, settings),
        }
    }

    pub fn address(&self) -> AccountId {
        self.common.address()
    }

    /// Returns the shares issued to the sender
    pub fn initialize_buffer<V: Unlocker>(
        &self,
        vault: &mut V,
        ctx: &RouterContext,
        wrapped: TokenId,
        exact_amount_underlying_in: u128,
        exact_amount_wrapped_in: u128,
        min_issued_shares: u128,
    ) -> Result<u128, RouterError> {
        let _entered = self.common.enter("initialize_buffer")?;
        let issued = vault.unlock(ctx.sender, |s| {
            let issued = s.initialize_buffer(
                wrapped,
                exact_amount_underlying_in,
                exact_amount_wrapped_in,
                min_issued_shares,
                ctx.sender,
            )?;
            self.pay_both(s, ctx, wrapped, exact_amount_underlying_in, exact_amount_wrapped_in)?;
            Ok::<_, RouterError>(issued)
        })?;
        info!(%wrapped, sender = %ctx.sender, issued, "Router initialized buffer");
        Ok(issued)
    }

    /// Returns the shares issued to the sender
    pub fn add_liquidity_to_buffer<V: Unlocker>(
        &self,
        vault: &mut V,
        ctx: &RouterContext,
        wrapped: TokenId,
        exact_amount_underlying_in: u128,
        exact_amount_wrapped_in: u128,
        min_issued_shares: u128,
    ) -> Result<u128, RouterError> {
        let _entered = self.common.enter("add_liquidity_to_buffer")?;
        vault.unlock(ctx.sender, |s| {
            let issued = s.add_liquidity_to_buffer(
                wrapped,
                exact_amount_underlying_in,
                exact_amount_wrapped_in,
                min_issued_shares,
                ctx.sender,
            )?;
            self.pay_both(s, ctx, wrapped, exact_amount_underlying_in, exact_amount_wrapped_in)?;
            Ok::<_, RouterError>(issued)
        })
    }

    pub fn remove_liquidity_from_buffer<V: Unlocker>(
        &self,
        vault: &mut V,
        ctx: &RouterContext,
        wrapped: TokenId,
        shares: u128,
        min_amount_underlying_out: u128,
        min_amount_wrapped_out: u128,
    ) -> Result<BufferRemoval, RouterError> {
        let _entered = self.common.enter("remove_liquidity_from_buffer")?;
        vault.unlock(ctx.sender, |s| {
            self.remove_hook(
                s,
                ctx,
                wrapped,
                shares,
                min_amount_underlying_out,
                min_amount_wrapped_out,
            )
        })
    }

    pub fn query_initialize_buffer<V: Unlocker>(
        &self,
        vault: &mut V,
        sender: AccountId,
        wrapped: TokenId,
        exact_amount_underlying_in: u128,
        exact_amount_wrapped_in: u128,
    ) -> Result<u128, RouterError> {
        vault.quote(sender, |s| {
            s.initialize_buffer(
                wrapped,
                exact_amount_underlying_in,
                exact_amount_wrapped_in,
                0,
                sender,
            )
            .map_err(RouterError::from)
        })
    }

    pub fn query_add_liquidity_to_buffer<V: Unlocker>(
        &self,
        vault: &mut V,
        sender: AccountId,
        wrapped: TokenId,
        exact_amount_underlying_in: u128,
        exact_amount_wrapped_in: u128,
    ) -> Result<u128, RouterError> {
        vault.quote(sender, |s| {
            s.add_liquidity_to_buffer(
                wrapped,
                exact_amount_underlying_in,
                exact_amount_wrapped_in,
                0,
                sender,
            )
            .map_err(RouterError::from)
        })
    }

    pub fn query_remove_liquidity_from_buffer<V: Unlocker>(
        &self,
        vault: &mut V,
        sender: AccountId,
        wrapped: TokenId,
        shares: u128,
    ) -> Result<BufferRemoval, RouterError> {
        let ctx = RouterContext::new(sender);
        vault.quote(sender, |s| self.remove_hook(s, &ctx, wrapped, shares, 0, 0))
    }

    fn pay_both<T: TokenTransfer + Journaled>(
        &self,
        s: &mut VaultSession<'_, T>,
        ctx: &RouterContext,
        wrapped: TokenId,
        amount_underlying: u128,
        amount_wrapped: u128,
    ) -> Result<(), RouterError> {
        let underlying = s.vault().get_buffer_asset(wrapped)?;
        self.common
            .take_token_in(s, ctx, underlying, amount_underlying, false)?;
        self.common
            .take_token_in(s, ctx, wrapped, amount_wrapped, false)?;
        Ok(())
    }

    fn remove_hook<T: TokenTransfer + Journaled>(
        &self,
        s: &mut VaultSession<'_, T>,
        ctx: &RouterContext,
        wrapped: TokenId,
        shares: u128,
        min_amount_underlying_out: u128,
        min_amount_wrapped_out: u128,
    ) -> Result<BufferRemoval, RouterError> {
        let removal = s.remove_liquidity_from_buffer(
            wrapped,
            shares,
            min_amount_underlying_out,
            min_amount_wrapped_out,
            ctx.sender,
        )?;
        let underlying = s.vault().get_buffer_asset(wrapped)?;
        self.common
            .send_token_out(s, ctx.sender, underlying, removal.underlying, false)?;
        self.common
            .send_token_out(s, ctx.sender, wrapped, removal.wrapped, false)?;
        Ok(removal)
    }
}
