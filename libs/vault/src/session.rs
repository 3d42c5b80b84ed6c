//! # Unlock Scope and Session Manager
//!
//! ## Purpose
//!
//! Opens the scoped transaction inside which the ledger may be mutated, hands the caller's
//! hook a [`VaultSession`] (the only handle through which ledger-affecting primitives can be
//! reached), and refuses to close the outermost scope until every token delta is back to zero.
//!
//! ## State machine
//!
//! ```text
//!   Locked ──unlock(sender, hook)──► Unlocked (depth 1, sender recorded)
//!      ▲                                 │  hook may call session.unlock ──► depth n+1
//!      │                                 │  (sender kept, no close check on return)
//!      │                                 ▼
//!      └──── outermost return: nonzero-delta count must be 0, else UnsettledDelta
//!
//!   quote(sender, hook): depth+1, query flag set, no close check, everything discarded
//! ```
//!
//! ## Atomicity
//!
//! Every frame, nested or outermost, takes a savepoint of persistent state, transient state and
//! the token capability before running its hook. A failing frame restores its savepoint, so a
//! hook that catches a nested failure still observes the state from before that nested frame.
//! A quote frame always restores its savepoint, success or not.
//!
//! Savepoints are whole copies, so opening a frame costs time and memory linear in the number of
//! pools, buffers, ledger entries and token balances, once per nesting level. Pool capabilities
//! and wrappers sit behind `Arc` and are shared rather than copied.

use crate::error::VaultError;
use crate::tokens::{Journaled, TokenBank, TokenTransfer};
use crate::transient::TransientState;
use crate::vault::Vault;
use keel_types::AccountId;
use tracing::{debug, warn};

/// Capability handle for an open scope
pub struct VaultSession<'v, T = TokenBank> {
    pub(crate) vault: &'v mut Vault<T>,
}

/// Anything that can open a scope: the vault itself, or a session that is already inside one
///
/// Routers are generic over this so the same entrypoint works as a top-level call and as a
/// nested call from inside another hook.
pub trait Unlocker {
    type Tokens: TokenTransfer + Journaled;

    fn unlock<R, E, F>(&mut self, sender: AccountId, hook: F) -> Result<R, E>
    where
        F: FnOnce(&mut VaultSession<'_, Self::Tokens>) -> Result<R, E>,
        E: From<VaultError>;

    fn quote<R, E, F>(&mut self, sender: AccountId, hook: F) -> Result<R, E>
    where
        F: FnOnce(&mut VaultSession<'_, Self::Tokens>) -> Result<R, E>,
        E: From<VaultError>;

    /// Timestamp deadlines are checked against
    fn timestamp(&self) -> u64;
}

impl<T: TokenTransfer + Journaled> Vault<T> {
    /// Open a scope, run `hook`, and require every delta to be settled when it returns
    pub fn unlock<R, E, F>(&mut self, sender: AccountId, hook: F) -> Result<R, E>
    where
        F: FnOnce(&mut VaultSession<'_, T>) -> Result<R, E>,
        E: From<VaultError>,
    {
        self.open_scope(sender, hook)
    }

    /// Run `hook` as a read-only simulation; all effects are discarded
    pub fn quote<R, E, F>(&mut self, sender: AccountId, hook: F) -> Result<R, E>
    where
        F: FnOnce(&mut VaultSession<'_, T>) -> Result<R, E>,
        E: From<VaultError>,
    {
        self.open_query(sender, hook)
    }

    pub(crate) fn open_scope<R, E, F>(&mut self, sender: AccountId, hook: F) -> Result<R, E>
    where
        F: FnOnce(&mut VaultSession<'_, T>) -> Result<R, E>,
        E: From<VaultError>,
    {
        let outermost = !self.transient.is_unlocked();
        if outermost {
            self.transient = TransientState::default();
        }
        let savepoint = self.savepoint();

        self.transient.depth += 1;
        let records_sender = self.transient.sender.is_none();
        if records_sender {
            self.transient.sender = Some(sender);
        }
        debug!(%sender, depth = self.transient.depth, "Scope opened");

        let result = {
            let mut session = VaultSession { vault: &mut *self };
            hook(&mut session)
        };

        let result = result.and_then(|value| {
            if outermost {
                self.ensure_settled().map_err(E::from)?;
            }
            Ok(value)
        });

        match result {
            Ok(value) => {
                self.transient.depth -= 1;
                if records_sender {
                    self.transient.sender = None;
                }
                if outermost {
                    self.transient = TransientState::default();
                }
                debug!(%sender, depth = self.transient.depth, "Scope closed");
                Ok(value)
            }
            Err(err) => {
                warn!(
                    %sender,
                    depth = self.transient.depth,
                    nonzero = self.transient.ledger.nonzero_count(),
                    "Scope failed, rolling back"
                );
                self.rollback(savepoint);
                Err(err)
            }
        }
    }

    pub(crate) fn open_query<R, E, F>(&mut self, sender: AccountId, hook: F) -> Result<R, E>
    where
        F: FnOnce(&mut VaultSession<'_, T>) -> Result<R, E>,
        E: From<VaultError>,
    {
        if self.state.query.disabled {
            return Err(VaultError::QueriesDisabled.into());
        }
        if self.transient.is_unlocked() && !self.transient.query {
            return Err(VaultError::NotStaticCall.into());
        }
        if !self.transient.is_unlocked() {
            self.transient = TransientState::default();
        }
        let savepoint = self.savepoint();

        self.transient.depth += 1;
        self.transient.query = true;
        if self.transient.sender.is_none() {
            self.transient.sender = Some(sender);
        }
        debug!(%sender, depth = self.transient.depth, "Query opened");

        let result = {
            let mut session = VaultSession { vault: &mut *self };
            hook(&mut session)
        };

        self.rollback(savepoint);
        debug!(%sender, ok = result.is_ok(), "Query discarded");
        result
    }

    fn ensure_settled(&self) -> Result<(), VaultError> {
        if let Some((token, delta)) = self.transient.ledger.first_unsettled() {
            let nonzero = self.transient.ledger.nonzero_count();
            warn!(%token, delta, nonzero, "Scope closed with unsettled deltas");
            return Err(VaultError::UnsettledDelta {
                token,
                delta,
                nonzero,
            });
        }
        Ok(())
    }
}

impl<T: TokenTransfer + Journaled> Unlocker for Vault<T> {
    type Tokens = T;

    fn unlock<R, E, F>(&mut self, sender: AccountId, hook: F) -> Result<R, E>
    where
        F: FnOnce(&mut VaultSession<'_, T>) -> Result<R, E>,
        E: From<VaultError>,
    {
        self.open_scope(sender, hook)
    }

    fn quote<R, E, F>(&mut self, sender: AccountId, hook: F) -> Result<R, E>
    where
        F: FnOnce(&mut VaultSession<'_, T>) -> Result<R, E>,
        E: From<VaultError>,
    {
        self.open_query(sender, hook)
    }

    fn timestamp(&self) -> u64 {
        self.timestamp
    }
}

impl<'v, T: TokenTransfer + Journaled> VaultSession<'v, T> {
    /// Re-enter the scope from inside a hook
    pub fn unlock<R, E, F>(&mut self, sender: AccountId, hook: F) -> Result<R, E>
    where
        F: FnOnce(&mut VaultSession<'_, T>) -> Result<R, E>,
        E: From<VaultError>,
    {
        self.vault.open_scope(sender, hook)
    }

    /// Nested query; only allowed when the enclosing scope is itself a query
    pub fn quote<R, E, F>(&mut self, sender: AccountId, hook: F) -> Result<R, E>
    where
        F: FnOnce(&mut VaultSession<'_, T>) -> Result<R, E>,
        E: From<VaultError>,
    {
        self.vault.open_query(sender, hook)
    }

    /// Read-only view of the vault
    pub fn vault(&self) -> &Vault<T> {
        &*self.vault
    }

    /// Outermost initiator of the current top-level call
    pub fn sender(&self) -> Option<AccountId> {
        self.vault.transient.sender
    }

    pub fn is_query(&self) -> bool {
        self.vault.transient.query
    }

    pub fn depth(&self) -> usize {
        self.vault.transient.depth
    }

    pub fn timestamp(&self) -> u64 {
        self.vault.timestamp
    }

    pub fn vault_address(&self) -> AccountId {
        self.vault.address
    }

    /// The token capability, for routers moving their own or their callers' tokens
    pub fn tokens_mut(&mut self) -> &mut T {
        &mut self.vault.tokens
    }
}

impl<'v, T: TokenTransfer + Journaled> Unlocker for VaultSession<'v, T> {
    type Tokens = T;

    fn unlock<R, E, F>(&mut self, sender: AccountId, hook: F) -> Result<R, E>
    where
        F: FnOnce(&mut VaultSession<'_, T>) -> Result<R, E>,
        E: From<VaultError>,
    {
        self.vault.open_scope(sender, hook)
    }

    fn quote<R, E, F>(&mut self, sender: AccountId, hook: F) -> Result<R, E>
    where
        F: FnOnce(&mut VaultSession<'_, T>) -> Result<R, E>,
        E: From<VaultError>,
    {
        self.vault.open_query(sender, hook)
    }

    fn timestamp(&self) -> u64 {
        self.vault.timestamp
    }
}
