//! Insertion-ordered token amounts
//!
//! Routers accumulate what a caller owes or is owed per token while walking paths, then settle
//! each token once. Iteration follows first insertion so settlement order is deterministic.

use keel_types::{fixed_point, MathError, TokenId};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSet {
    order: Vec<TokenId>,
    amounts: BTreeMap<TokenId, u128>,
}

impl TokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` to `token`; zero amounts leave the set untouched
    pub fn add(&mut self, token: TokenId, amount: u128) -> Result<(), MathError> {
        if amount == 0 {
            return Ok(());
        }
        match self.amounts.get_mut(&token) {
            Some(current) => *current = fixed_point::add(*current, amount)?,
            None => {
                self.order.push(token);
                self.amounts.insert(token, amount);
            }
        }
        Ok(())
    }

    pub fn get(&self, token: TokenId) -> u128 {
        self.amounts.get(&token).copied().unwrap_or_default()
    }

    pub fn contains(&self, token: TokenId) -> bool {
        self.amounts.contains_key(&token)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn tokens(&self) -> &[TokenId] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = (TokenId, u128)> + '_ {
        self.order.iter().map(move |token| (*token, self.get(*token)))
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.amounts.clear();
    }
}
