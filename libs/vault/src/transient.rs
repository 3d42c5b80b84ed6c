//! Scope-local state
//!
//! Replaced with a fresh value when the outermost scope opens and again when it closes, so
//! nothing recorded here can leak from one top-level call into the next.

use crate::ledger::TokenDeltaLedger;
use keel_types::AccountId;

#[derive(Debug, Clone, Default)]
pub struct TransientState {
    pub ledger: TokenDeltaLedger,
    /// Outermost initiator of the current top-level call
    pub sender: Option<AccountId>,
    /// Number of open frames; the vault is unlocked while this is nonzero
    pub depth: usize,
    /// Set while running inside `quote`
    pub query: bool,
}

impl TransientState {
    pub fn is_unlocked(&self) -> bool {
        self.depth > 0
    }
}
