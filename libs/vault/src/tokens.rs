//! Token transfer capability
//!
//! The vault never moves fungible tokens itself; it asks a [`TokenTransfer`] implementation.
//! Transfers either fully succeed or fail, there are no partial movements. Implementations are
//! also [`Journaled`] so a failed scope can roll physical movements back together with the
//! vault's own bookkeeping.

use keel_types::{AccountId, MathError, TokenId};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Account {account} holds {balance} of {token}, needs {needed}")]
    InsufficientBalance {
        token: TokenId,
        account: AccountId,
        balance: u128,
        needed: u128,
    },

    #[error("Supply overflow for token {token}")]
    SupplyOverflow { token: TokenId },

    #[error(transparent)]
    Math(#[from] MathError),
}

/// Balance-keeping capability consumed by the vault and routers
pub trait TokenTransfer {
    fn balance_of(&self, token: TokenId, account: AccountId) -> u128;

    fn total_supply(&self, token: TokenId) -> u128;

    fn transfer(
        &mut self,
        token: TokenId,
        from: AccountId,
        to: AccountId,
        amount: u128,
    ) -> Result<(), TokenError>;

    fn mint(&mut self, token: TokenId, to: AccountId, amount: u128) -> Result<(), TokenError>;

    fn burn(&mut self, token: TokenId, from: AccountId, amount: u128) -> Result<(), TokenError>;
}

/// State that can be captured and put back
pub trait Journaled {
    type Snapshot;

    fn snapshot(&self) -> Self::Snapshot;

    fn restore(&mut self, snapshot: Self::Snapshot);
}

/// In-memory token ledger
#[derive(Debug, Clone, Default)]
pub struct TokenBank {
    balances: BTreeMap<(TokenId, AccountId), u128>,
    supplies: BTreeMap<TokenId, u128>,
}

impl TokenBank {
    pub fn new() -> Self {
        Self::default()
    }

    fn debit(&mut self, token: TokenId, account: AccountId, amount: u128) -> Result<(), TokenError> {
        let balance = self.balance_of(token, account);
        let remaining = balance
            .checked_sub(amount)
            .ok_or(TokenError::InsufficientBalance {
                token,
                account,
                balance,
                needed: amount,
            })?;
        if remaining == 0 {
            self.balances.remove(&(token, account));
        } else {
            self.balances.insert((token, account), remaining);
        }
        Ok(())
    }

    fn credit(&mut self, token: TokenId, account: AccountId, amount: u128) -> Result<(), TokenError> {
        let entry = self.balances.entry((token, account)).or_default();
        *entry = entry
            .checked_add(amount)
            .ok_or(TokenError::SupplyOverflow { token })?;
        Ok(())
    }
}

impl TokenTransfer for TokenBank {
    fn balance_of(&self, token: TokenId, account: AccountId) -> u128 {
        self.balances.get(&(token, account)).copied().unwrap_or(0)
    }

    fn total_supply(&self, token: TokenId) -> u128 {
        self.supplies.get(&token).copied().unwrap_or(0)
    }

    fn transfer(
        &mut self,
        token: TokenId,
        from: AccountId,
        to: AccountId,
        amount: u128,
    ) -> Result<(), TokenError> {
        if amount == 0 || from == to {
            // Still require the balance so a self-transfer cannot mask a shortfall
            let balance = self.balance_of(token, from);
            if balance < amount {
                return Err(TokenError::InsufficientBalance {
                    token,
                    account: from,
                    balance,
                    needed: amount,
                });
            }
            return Ok(());
        }
        self.debit(token, from, amount)?;
        self.credit(token, to, amount)
    }

    fn mint(&mut self, token: TokenId, to: AccountId, amount: u128) -> Result<(), TokenError> {
        let supply = self.supplies.entry(token).or_default();
        *supply = supply
            .checked_add(amount)
            .ok_or(TokenError::SupplyOverflow { token })?;
        self.credit(token, to, amount)
    }

    fn burn(&mut self, token: TokenId, from: AccountId, amount: u128) -> Result<(), TokenError> {
        self.debit(token, from, amount)?;
        if let Some(supply) = self.supplies.get_mut(&token) {
            *supply = supply.saturating_sub(amount);
        }
        Ok(())
    }
}

impl Journaled for TokenBank {
    type Snapshot = TokenBank;

    fn snapshot(&self) -> Self::Snapshot {
        self.clone()
    }

    fn restore(&mut self, snapshot: Self::Snapshot) {
        *self = snapshot;
    }
}
