//! # Settlement
//!
//! The reconciliation primitives every operation is built from.
//!
//! - `take_debt(token, amount)`: the vault is now owed `amount` (delta += amount)
//! - `supply_credit(token, amount)`: the vault now owes `amount` (delta -= amount)
//! - `settle(token, hint)`: credit what physically arrived since the last settle, capped at
//!   `hint`; Reserve grows by exactly the credited amount, so `settle(token, 0)` changes nothing
//!   and unclaimed surplus stays available to a later settle
//! - `send_to(token, to, amount)`: pay out physically, recording the matching debt
//!
//! Physical balances are read through the token capability, except for BPT which the vault
//! holds itself.

use crate::error::VaultError;
use crate::session::VaultSession;
use crate::tokens::{Journaled, TokenTransfer};
use crate::vault::Vault;
use keel_types::{AccountId, TokenId};
use tracing::debug;

impl<T: TokenTransfer + Journaled> Vault<T> {
    /// Move any token, BPT included, between two accounts
    pub(crate) fn move_tokens(
        &mut self,
        token: TokenId,
        from: AccountId,
        to: AccountId,
        amount: u128,
    ) -> Result<(), VaultError> {
        if self.state.is_pool(token) {
            self.state.bpt.transfer(token, from, to, amount)
        } else {
            self.tokens.transfer(token, from, to, amount)?;
            Ok(())
        }
    }

    pub(crate) fn ensure_unlocked(&self) -> Result<(), VaultError> {
        if !self.transient.is_unlocked() {
            return Err(VaultError::VaultIsNotUnlocked);
        }
        Ok(())
    }
}

impl<'v, T: TokenTransfer + Journaled> VaultSession<'v, T> {
    pub fn take_debt(&mut self, token: TokenId, amount: u128) -> Result<(), VaultError> {
        self.vault.ensure_unlocked()?;
        self.vault.transient.ledger.take_debt(token, amount)
    }

    pub fn supply_credit(&mut self, token: TokenId, amount: u128) -> Result<(), VaultError> {
        self.vault.ensure_unlocked()?;
        self.vault.transient.ledger.supply_credit(token, amount)
    }

    /// Credit tokens received since the last settle, up to `amount_hint`
    pub fn settle(&mut self, token: TokenId, amount_hint: u128) -> Result<u128, VaultError> {
        self.vault.ensure_unlocked()?;
        let reserves = self.vault.state.reserves_of(token);
        let balance = self.vault.balance_of(token, self.vault.address);
        let received = balance
            .checked_sub(reserves)
            .ok_or(VaultError::InsufficientReserves {
                token,
                reserves,
                balance,
            })?;

        let credit = received.min(amount_hint);
        if credit > 0 {
            self.vault.transient.ledger.supply_credit(token, credit)?;
            self.vault.state.reserves.insert(token, reserves + credit);
        }
        debug!(%token, received, credit, "Settled");
        Ok(credit)
    }

    /// Settle and require at least `expected` to have arrived
    pub fn settle_exact(&mut self, token: TokenId, expected: u128) -> Result<u128, VaultError> {
        let credited = self.settle(token, expected)?;
        if credited < expected {
            return Err(VaultError::InsufficientPayment {
                token,
                expected,
                actual: credited,
            });
        }
        Ok(credited)
    }

    /// Pay `amount` of `token` out of the vault to `to`
    pub fn send_to(&mut self, token: TokenId, to: AccountId, amount: u128) -> Result<(), VaultError> {
        self.vault.ensure_unlocked()?;
        let reserves = self.vault.state.reserves_of(token);
        let remaining = reserves
            .checked_sub(amount)
            .ok_or(VaultError::InsufficientReserves {
                token,
                reserves,
                balance: self.vault.balance_of(token, self.vault.address),
            })?;

        self.vault.transient.ledger.take_debt(token, amount)?;
        let vault_address = self.vault.address;
        self.vault.move_tokens(token, vault_address, to, amount)?;
        self.vault.state.reserves.insert(token, remaining);
        debug!(%token, %to, amount, "Sent");
        Ok(())
    }

    /// Physical transfer between outside accounts (or into the vault, to be settled)
    pub fn transfer(
        &mut self,
        token: TokenId,
        from: AccountId,
        to: AccountId,
        amount: u128,
    ) -> Result<(), VaultError> {
        self.vault.move_tokens(token, from, to, amount)
    }

    pub fn get_token_delta(&self, token: TokenId) -> i128 {
        self.vault.get_token_delta(token)
    }

    pub fn get_reserves_of(&self, token: TokenId) -> u128 {
        self.vault.get_reserves_of(token)
    }

    pub fn is_unlocked(&self) -> bool {
        self.vault.is_unlocked()
    }

    pub fn get_nonzero_delta_count(&self) -> usize {
        self.vault.get_nonzero_delta_count()
    }
}
