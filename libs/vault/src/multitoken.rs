//! BPT accounting
//!
//! Every pool's share token is held by the vault itself: balances and total supply live here
//! rather than in the external token capability, so minting and burning roll back with the rest
//! of the vault state.

use crate::error::VaultError;
use keel_types::{AccountId, PoolId};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct MultiToken {
    balances: BTreeMap<(PoolId, AccountId), u128>,
    total_supply: BTreeMap<PoolId, u128>,
}

impl MultiToken {
    pub fn balance_of(&self, pool: PoolId, account: AccountId) -> u128 {
        self.balances.get(&(pool, account)).copied().unwrap_or(0)
    }

    pub fn total_supply(&self, pool: PoolId) -> u128 {
        self.total_supply.get(&pool).copied().unwrap_or(0)
    }

    pub fn mint(&mut self, pool: PoolId, to: AccountId, amount: u128) -> Result<(), VaultError> {
        let supply = self.total_supply(pool);
        let new_supply = keel_types::fixed_point::add(supply, amount)?;
        let balance = self.balance_of(pool, to);
        let new_balance = keel_types::fixed_point::add(balance, amount)?;
        self.total_supply.insert(pool, new_supply);
        self.balances.insert((pool, to), new_balance);
        Ok(())
    }

    /// Burn, refusing to push supply under `minimum`
    pub fn burn(
        &mut self,
        pool: PoolId,
        from: AccountId,
        amount: u128,
        minimum: u128,
    ) -> Result<(), VaultError> {
        let balance = self.balance_of(pool, from);
        if balance < amount {
            return Err(VaultError::InsufficientBptBalance {
                pool,
                account: from,
                balance,
                needed: amount,
            });
        }
        let supply = self.total_supply(pool);
        let new_supply = supply.saturating_sub(amount);
        if new_supply < minimum {
            return Err(VaultError::PoolTotalSupplyTooLow {
                pool,
                total_supply: new_supply,
                minimum,
            });
        }
        self.set_balance(pool, from, balance - amount);
        self.total_supply.insert(pool, new_supply);
        Ok(())
    }

    pub fn transfer(
        &mut self,
        pool: PoolId,
        from: AccountId,
        to: AccountId,
        amount: u128,
    ) -> Result<(), VaultError> {
        let balance = self.balance_of(pool, from);
        if balance < amount {
            return Err(VaultError::InsufficientBptBalance {
                pool,
                account: from,
                balance,
                needed: amount,
            });
        }
        if from == to || amount == 0 {
            return Ok(());
        }
        self.set_balance(pool, from, balance - amount);
        let to_balance = keel_types::fixed_point::add(self.balance_of(pool, to), amount)?;
        self.set_balance(pool, to, to_balance);
        Ok(())
    }

    fn set_balance(&mut self, pool: PoolId, account: AccountId, balance: u128) {
        if balance == 0 {
            self.balances.remove(&(pool, account));
        } else {
            self.balances.insert((pool, account), balance);
        }
    }
}
