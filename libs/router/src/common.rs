//! Plumbing shared by every router
//!
//! Each router entrypoint follows the same shape: take the entry guard, check the deadline,
//! open a vault scope and, inside the hook, run vault operations and then pay or collect every
//! token the operations left on the ledger. Payment handling lives here so the routers only
//! describe which operations to run.
//!
//! Physical movements are skipped when the hook runs under a quote; the ledger is discarded
//! anyway and the caller may not hold the tokens being priced.

use crate::error::RouterError;
use keel_config::RouterSettings;
use keel_types::{AccountId, TokenId, NATIVE_ASSET};
use keel_vault::{Journaled, TokenTransfer, Unlocker, VaultError, VaultSession};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Who is calling a router entrypoint and how much native value they attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterContext {
    pub sender: AccountId,
    pub value: u128,
}

impl RouterContext {
    pub fn new(sender: AccountId) -> Self {
        Self { sender, value: 0 }
    }

    pub fn with_value(sender: AccountId, value: u128) -> Self {
        Self { sender, value }
    }
}

/// Per-entrypoint "already executing" flags
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    active: Mutex<BTreeSet<&'static str>>,
}

impl ReentrancyGuard {
    pub fn enter(&self, entrypoint: &'static str) -> Result<EntryGuard<'_>, RouterError> {
        if !self.active.lock().insert(entrypoint) {
            warn!(entrypoint, "Rejected reentrant router call");
            return Err(RouterError::ReentrantCall(entrypoint));
        }
        Ok(EntryGuard {
            guard: self,
            entrypoint,
        })
    }

    pub fn is_entered(&self, entrypoint: &'static str) -> bool {
        self.active.lock().contains(entrypoint)
    }
}

/// Clears the entrypoint flag when dropped
#[derive(Debug)]
pub struct EntryGuard<'a> {
    guard: &'a ReentrancyGuard,
    entrypoint: &'static str,
}

impl Drop for EntryGuard<'_> {
    fn drop(&mut self) {
        self.guard.active.lock().remove(self.entrypoint);
    }
}

/// Identity, native-asset configuration and entry guard of one router instance
#[derive(Debug)]
pub struct RouterCommon {
    address: AccountId,
    weth: Option<TokenId>,
    guard: ReentrancyGuard,
}

impl RouterCommon {
    pub fn new(address: AccountId, settings: &RouterSettings) -> Self {
        Self {
            address,
            weth: settings.weth,
            guard: ReentrancyGuard::default(),
        }
    }

    pub fn address(&self) -> AccountId {
        self.address
    }

    pub fn weth(&self) -> Option<TokenId> {
        self.weth
    }

    pub fn enter(&self, entrypoint: &'static str) -> Result<EntryGuard<'_>, RouterError> {
        self.guard.enter(entrypoint)
    }

    pub fn is_entered(&self, entrypoint: &'static str) -> bool {
        self.guard.is_entered(entrypoint)
    }

    pub fn ensure_weth(&self, weth_is_eth: bool) -> Result<(), RouterError> {
        if weth_is_eth && self.weth.is_none() {
            return Err(RouterError::WethNotConfigured);
        }
        Ok(())
    }

    pub fn check_deadline<V: Unlocker>(vault: &V, deadline: u64) -> Result<(), RouterError> {
        let now = vault.timestamp();
        if now > deadline {
            return Err(RouterError::DeadlineExceeded { deadline, now });
        }
        Ok(())
    }

    fn pays_native(&self, token: TokenId, weth_is_eth: bool) -> bool {
        weth_is_eth && self.weth == Some(token)
    }

    /// Move the native value attached to the call into the router
    pub fn receive_value<T: TokenTransfer + Journaled>(
        &self,
        s: &mut VaultSession<'_, T>,
        ctx: &RouterContext,
    ) -> Result<(), RouterError> {
        if ctx.value == 0 || s.is_query() {
            return Ok(());
        }
        s.transfer(NATIVE_ASSET, ctx.sender, self.address, ctx.value)?;
        Ok(())
    }

    /// Pay `amount` of `token` into the vault on behalf of the sender and settle it
    ///
    /// With `weth_is_eth` and `token` being the wrapped native token, the payment comes out of
    /// the native value the router received and is wrapped on the way in.
    pub fn take_token_in<T: TokenTransfer + Journaled>(
        &self,
        s: &mut VaultSession<'_, T>,
        ctx: &RouterContext,
        token: TokenId,
        amount: u128,
        weth_is_eth: bool,
    ) -> Result<(), RouterError> {
        if amount == 0 || s.is_query() {
            return Ok(());
        }
        let vault = s.vault_address();
        if self.pays_native(token, weth_is_eth) {
            let available = s.vault().balance_of(NATIVE_ASSET, self.address);
            if available < amount {
                return Err(RouterError::InsufficientEth {
                    required: amount,
                    available,
                });
            }
            // Native value is held by the wrapped token contract while wrapped
            s.transfer(NATIVE_ASSET, self.address, token, amount)?;
            s.tokens_mut()
                .mint(token, vault, amount)
                .map_err(VaultError::from)?;
        } else {
            s.transfer(token, ctx.sender, vault, amount)?;
        }
        s.settle_exact(token, amount)?;
        debug!(%token, amount, sender = %ctx.sender, "Took token in");
        Ok(())
    }

    /// Pay `amount` of `token` out of the vault to `to`, unwrapping native if asked
    pub fn send_token_out<T: TokenTransfer + Journaled>(
        &self,
        s: &mut VaultSession<'_, T>,
        to: AccountId,
        token: TokenId,
        amount: u128,
        weth_is_eth: bool,
    ) -> Result<(), RouterError> {
        if amount == 0 || s.is_query() {
            return Ok(());
        }
        if self.pays_native(token, weth_is_eth) {
            s.send_to(token, self.address, amount)?;
            s.tokens_mut()
                .burn(token, self.address, amount)
                .map_err(VaultError::from)?;
            s.transfer(NATIVE_ASSET, token, to, amount)?;
        } else {
            s.send_to(token, to, amount)?;
        }
        debug!(%token, amount, %to, "Sent token out");
        Ok(())
    }

    /// Return whatever native value the router still holds to the sender
    pub fn return_eth<T: TokenTransfer + Journaled>(
        &self,
        s: &mut VaultSession<'_, T>,
        ctx: &RouterContext,
    ) -> Result<(), RouterError> {
        if s.is_query() {
            return Ok(());
        }
        let leftover = s.vault().balance_of(NATIVE_ASSET, self.address);
        if leftover > 0 {
            s.transfer(NATIVE_ASSET, self.address, ctx.sender, leftover)?;
            debug!(leftover, sender = %ctx.sender, "Returned native value");
        }
        Ok(())
    }

    /// Index of `token` among the pool's tokens
    pub fn token_index<T: TokenTransfer + Journaled>(
        s: &VaultSession<'_, T>,
        pool: keel_types::PoolId,
        token: TokenId,
    ) -> Result<(Vec<TokenId>, usize), RouterError> {
        let tokens = s.vault().get_pool_tokens(pool)?;
        let index = tokens
            .iter()
            .position(|t| *t == token)
            .ok_or(VaultError::TokenNotRegistered { pool, token })?;
        Ok((tokens, index))
    }
}
