//! Persistent vault state
//!
//! Everything here outlives a scope: pool registrations and balances, BPT, buffers and their
//! shares, reserves and accrued fees. The whole structure is `Clone` so a scope can take a
//! savepoint and put it back on failure.

use crate::error::VaultError;
use crate::erc4626::Erc4626;
use crate::fees::FeeSplit;
use crate::multitoken::MultiToken;
use keel_amm::Pool;
use keel_config::VaultSettings;
use keel_types::{AccountId, PoolId, TokenId};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Vault limits in raw units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultLimits {
    pub minimum_trade_amount: u128,
    pub minimum_wrap_amount: u128,
    pub pool_minimum_total_supply: u128,
    pub buffer_minimum_total_supply: u128,
    pub min_pool_tokens: usize,
    pub max_pool_tokens: usize,
    pub max_swap_fee_percentage: u128,
}

impl VaultLimits {
    pub fn from_settings(settings: &VaultSettings) -> Result<Self, VaultError> {
        settings
            .validate()
            .map_err(|e| VaultError::InvalidConfiguration {
                reason: format!("{:#}", e),
            })?;
        let max_swap_fee_percentage =
            settings
                .max_swap_fee_fixed()
                .map_err(|e| VaultError::InvalidConfiguration {
                    reason: format!("{:#}", e),
                })?;
        Ok(Self {
            minimum_trade_amount: settings.minimum_trade_amount.into(),
            minimum_wrap_amount: settings.minimum_wrap_amount.into(),
            pool_minimum_total_supply: settings.pool_minimum_total_supply.into(),
            buffer_minimum_total_supply: settings.buffer_minimum_total_supply.into(),
            min_pool_tokens: settings.min_pool_tokens,
            max_pool_tokens: settings.max_pool_tokens,
            max_swap_fee_percentage,
        })
    }
}

/// A registered pool
#[derive(Debug, Clone)]
pub struct PoolData {
    pub capability: Arc<dyn Pool>,
    pub tokens: Vec<TokenId>,
    pub balances: Vec<u128>,
    pub swap_fee_percentage: u128,
    pub aggregate_swap_fee_percentage: u128,
    pub initialized: bool,
}

impl PoolData {
    pub fn token_index(&self, pool: PoolId, token: TokenId) -> Result<usize, VaultError> {
        self.tokens
            .iter()
            .position(|t| *t == token)
            .ok_or(VaultError::TokenNotRegistered { pool, token })
    }
}

/// Raw balances of an ERC4626 buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferBalances {
    pub underlying: u128,
    pub wrapped: u128,
}

/// An initialized buffer
#[derive(Debug, Clone)]
pub struct BufferState {
    /// Underlying asset recorded at initialization; immutable
    pub asset: TokenId,
    pub balances: BufferBalances,
    pub total_shares: u128,
    pub shares: BTreeMap<AccountId, u128>,
}

impl BufferState {
    pub fn shares_of(&self, owner: &AccountId) -> u128 {
        self.shares.get(owner).copied().unwrap_or(0)
    }
}

/// Query switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryState {
    pub disabled: bool,
    pub disabled_permanently: bool,
}

#[derive(Debug, Clone, Default)]
pub struct VaultState {
    pub pools: BTreeMap<PoolId, PoolData>,
    pub bpt: MultiToken,
    pub buffers: BTreeMap<TokenId, BufferState>,
    pub wrappers: BTreeMap<TokenId, Arc<dyn Erc4626>>,
    pub reserves: BTreeMap<TokenId, u128>,
    pub accrued_fees: BTreeMap<(PoolId, TokenId), FeeSplit>,
    pub query: QueryState,
}

impl VaultState {
    pub fn pool(&self, pool: PoolId) -> Result<&PoolData, VaultError> {
        self.pools
            .get(&pool)
            .ok_or(VaultError::PoolNotRegistered { pool })
    }

    pub fn pool_mut(&mut self, pool: PoolId) -> Result<&mut PoolData, VaultError> {
        self.pools
            .get_mut(&pool)
            .ok_or(VaultError::PoolNotRegistered { pool })
    }

    /// A registered and initialized pool
    pub fn live_pool(&self, pool: PoolId) -> Result<&PoolData, VaultError> {
        let data = self.pool(pool)?;
        if !data.initialized {
            return Err(VaultError::PoolNotInitialized { pool });
        }
        Ok(data)
    }

    pub fn buffer(&self, wrapped: TokenId) -> Result<&BufferState, VaultError> {
        self.buffers
            .get(&wrapped)
            .ok_or(VaultError::BufferNotInitialized { wrapped })
    }

    pub fn buffer_mut(&mut self, wrapped: TokenId) -> Result<&mut BufferState, VaultError> {
        self.buffers
            .get_mut(&wrapped)
            .ok_or(VaultError::BufferNotInitialized { wrapped })
    }

    pub fn wrapper(&self, wrapped: TokenId) -> Result<Arc<dyn Erc4626>, VaultError> {
        self.wrappers
            .get(&wrapped)
            .cloned()
            .ok_or(VaultError::WrappedTokenNotRegistered { wrapped })
    }

    pub fn reserves_of(&self, token: TokenId) -> u128 {
        self.reserves.get(&token).copied().unwrap_or(0)
    }

    pub fn is_pool(&self, token: TokenId) -> bool {
        self.pools.contains_key(&token)
    }
}
