//! # Token Delta Ledger
//!
//! Per-scope map of token to signed net obligation.
//!
//! ## Sign convention
//!
//! - **positive**: receivable, someone owes the vault (`take_debt`)
//! - **negative**: payable, the vault owes someone (`supply_credit`)
//!
//! Entries exist only while nonzero: an entry that returns to zero is removed, so the map's
//! length is the nonzero-delta count and "reconciled" is simply "empty". The ledger lives inside
//! the scope's transient state and is replaced with a fresh one when the outermost scope opens
//! and closes.

use crate::error::VaultError;
use keel_types::TokenId;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenDeltaLedger {
    deltas: BTreeMap<TokenId, i128>,
    nonzero_count: usize,
}

impl TokenDeltaLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current net obligation, 0 if absent
    pub fn get_delta(&self, token: &TokenId) -> i128 {
        self.deltas.get(token).copied().unwrap_or(0)
    }

    /// Add a signed delta, maintaining the nonzero count
    pub fn add_delta(&mut self, token: TokenId, delta: i128) -> Result<(), VaultError> {
        if delta == 0 {
            return Ok(());
        }
        let current = self.get_delta(&token);
        let next = current
            .checked_add(delta)
            .ok_or(VaultError::DeltaOverflow { token })?;

        if next == 0 {
            self.deltas.remove(&token);
            self.nonzero_count -= 1;
        } else {
            if current == 0 {
                self.nonzero_count += 1;
            }
            self.deltas.insert(token, next);
        }

        debug_assert_eq!(self.nonzero_count, self.deltas.len());
        Ok(())
    }

    /// Record that `amount` of `token` is now owed to the vault
    pub fn take_debt(&mut self, token: TokenId, amount: u128) -> Result<(), VaultError> {
        let delta = i128::try_from(amount).map_err(|_| VaultError::DeltaOverflow { token })?;
        self.add_delta(token, delta)
    }

    /// Record that the vault now owes `amount` of `token`
    pub fn supply_credit(&mut self, token: TokenId, amount: u128) -> Result<(), VaultError> {
        let delta = i128::try_from(amount).map_err(|_| VaultError::DeltaOverflow { token })?;
        self.add_delta(token, -delta)
    }

    /// Number of tokens with an outstanding obligation
    #[inline]
    pub fn nonzero_count(&self) -> usize {
        self.nonzero_count
    }

    pub fn is_settled(&self) -> bool {
        self.nonzero_count == 0
    }

    /// Lowest-ordered token still carrying a delta
    pub fn first_unsettled(&self) -> Option<(TokenId, i128)> {
        self.deltas.iter().next().map(|(t, d)| (*t, *d))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TokenId, &i128)> {
        self.deltas.iter()
    }

    pub fn clear(&mut self) {
        self.deltas.clear();
        self.nonzero_count = 0;
    }
}
