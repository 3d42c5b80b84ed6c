//! The vault service object
//!
//! Owns persistent state, the scope's transient state and the token capability. Everything
//! that mutates the ledger is reachable only through a [`VaultSession`](crate::VaultSession),
//! which exists only while a scope is open; this type carries registration, administration and
//! read-only getters.

use crate::error::VaultError;
use crate::erc4626::Erc4626;
use crate::fees::{FeeController, FeeSplit, ProtocolFeeController};
use crate::state::{BufferBalances, PoolData, VaultLimits, VaultState};
use crate::tokens::{Journaled, TokenBank, TokenTransfer};
use crate::transient::TransientState;
use keel_amm::Pool;
use keel_config::VaultSettings;
use keel_types::{fixed_point, AccountId, PoolId, TokenId};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

pub struct Vault<T = TokenBank> {
    pub(crate) address: AccountId,
    pub(crate) limits: VaultLimits,
    pub(crate) state: VaultState,
    pub(crate) transient: TransientState,
    pub(crate) tokens: T,
    pub(crate) fee_controller: Arc<dyn FeeController>,
    pub(crate) timestamp: u64,
}

/// Everything a failed frame needs to put back
pub(crate) struct Savepoint<S> {
    state: VaultState,
    transient: TransientState,
    tokens: S,
}

impl<T: TokenTransfer + Journaled> Vault<T> {
    /// New vault holding its tokens under `address`
    pub fn new(address: AccountId, settings: &VaultSettings, tokens: T) -> Result<Self, VaultError> {
        let limits = VaultLimits::from_settings(settings)?;
        let mut state = VaultState::default();
        state.query.disabled = !settings.queries_enabled;
        Ok(Self {
            address,
            limits,
            state,
            transient: TransientState::default(),
            tokens,
            fee_controller: Arc::new(ProtocolFeeController::disabled()),
            timestamp: 0,
        })
    }

    pub fn with_fee_controller(mut self, fee_controller: Arc<dyn FeeController>) -> Self {
        self.fee_controller = fee_controller;
        self
    }

    pub fn address(&self) -> AccountId {
        self.address
    }

    pub fn limits(&self) -> &VaultLimits {
        &self.limits
    }

    pub fn tokens(&self) -> &T {
        &self.tokens
    }

    /// Direct access to the token capability, for moving balances between outside accounts
    pub fn tokens_mut(&mut self) -> &mut T {
        &mut self.tokens
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
    }

    // ---------------------------------------------------------------------------------------
    // Registration
    // ---------------------------------------------------------------------------------------

    /// Register a pool; its id doubles as its BPT token
    pub fn register_pool(
        &mut self,
        pool: PoolId,
        tokens: Vec<TokenId>,
        capability: Arc<dyn Pool>,
        swap_fee_percentage: u128,
    ) -> Result<(), VaultError> {
        if self.state.pools.contains_key(&pool) {
            return Err(VaultError::PoolAlreadyRegistered { pool });
        }
        if tokens.len() < self.limits.min_pool_tokens || tokens.len() > self.limits.max_pool_tokens
        {
            return Err(VaultError::InvalidTokenConfiguration {
                reason: format!(
                    "pool {} has {} tokens, allowed {}..={}",
                    pool,
                    tokens.len(),
                    self.limits.min_pool_tokens,
                    self.limits.max_pool_tokens
                ),
            });
        }
        let unique: BTreeSet<_> = tokens.iter().collect();
        if unique.len() != tokens.len() {
            return Err(VaultError::InvalidTokenConfiguration {
                reason: format!("pool {} lists a token twice", pool),
            });
        }
        if tokens.iter().any(|t| t.is_zero() || *t == pool) {
            return Err(VaultError::InvalidTokenConfiguration {
                reason: format!("pool {} lists the zero address or itself", pool),
            });
        }
        if swap_fee_percentage > self.limits.max_swap_fee_percentage {
            return Err(VaultError::SwapFeeTooHigh {
                fee: swap_fee_percentage,
                max: self.limits.max_swap_fee_percentage,
            });
        }

        let aggregate_swap_fee_percentage = self
            .fee_controller
            .aggregate_swap_fee_percentage(pool)
            .min(fixed_point::ONE);

        info!(
            %pool,
            tokens = tokens.len(),
            pool_type = ?capability.pool_type(),
            swap_fee_percentage,
            "Registered pool"
        );

        let balances = vec![0; tokens.len()];
        self.state.pools.insert(
            pool,
            PoolData {
                capability,
                tokens,
                balances,
                swap_fee_percentage,
                aggregate_swap_fee_percentage,
                initialized: false,
            },
        );
        Ok(())
    }

    /// Re-read the pool's aggregate fee percentage from the fee controller
    ///
    /// The percentage is cached at registration; swaps and liquidity use the cached value until
    /// this is called after the controller's configuration changes.
    pub fn update_aggregate_swap_fee_percentage(&mut self, pool: PoolId) -> Result<u128, VaultError> {
        let percentage = self
            .fee_controller
            .aggregate_swap_fee_percentage(pool)
            .min(fixed_point::ONE);
        self.state.pool_mut(pool)?.aggregate_swap_fee_percentage = percentage;
        info!(%pool, aggregate_swap_fee_percentage = percentage, "Updated aggregate swap fee");
        Ok(percentage)
    }

    /// Make an ERC4626 wrapper available for buffers
    pub fn register_wrapper(&mut self, wrapper: Arc<dyn Erc4626>) -> Result<(), VaultError> {
        let wrapped = wrapper.token();
        let asset = wrapper.asset();
        if asset.is_zero() || asset == wrapped {
            return Err(VaultError::InvalidUnderlyingToken { wrapped });
        }
        info!(%wrapped, %asset, "Registered ERC4626 wrapper");
        self.state.wrappers.insert(wrapped, wrapper);
        Ok(())
    }

    // ---------------------------------------------------------------------------------------
    // Query administration
    // ---------------------------------------------------------------------------------------

    pub fn disable_query(&mut self) {
        info!("Queries disabled");
        self.state.query.disabled = true;
    }

    pub fn disable_query_permanently(&mut self) {
        info!("Queries disabled permanently");
        self.state.query.disabled = true;
        self.state.query.disabled_permanently = true;
    }

    pub fn enable_query(&mut self) -> Result<(), VaultError> {
        if self.state.query.disabled_permanently {
            return Err(VaultError::QueriesDisabledPermanently);
        }
        info!("Queries enabled");
        self.state.query.disabled = false;
        Ok(())
    }

    pub fn is_query_disabled(&self) -> bool {
        self.state.query.disabled
    }

    pub fn is_query_disabled_permanently(&self) -> bool {
        self.state.query.disabled_permanently
    }

    // ---------------------------------------------------------------------------------------
    // Getters
    // ---------------------------------------------------------------------------------------

    pub fn get_token_delta(&self, token: TokenId) -> i128 {
        self.transient.ledger.get_delta(&token)
    }

    pub fn get_reserves_of(&self, token: TokenId) -> u128 {
        self.state.reserves_of(token)
    }

    pub fn is_unlocked(&self) -> bool {
        self.transient.is_unlocked()
    }

    pub fn get_nonzero_delta_count(&self) -> usize {
        self.transient.ledger.nonzero_count()
    }

    pub fn sender(&self) -> Option<AccountId> {
        self.transient.sender
    }

    pub fn is_pool_registered(&self, pool: PoolId) -> bool {
        self.state.pools.contains_key(&pool)
    }

    pub fn is_pool_initialized(&self, pool: PoolId) -> bool {
        self.state
            .pools
            .get(&pool)
            .map(|p| p.initialized)
            .unwrap_or(false)
    }

    pub fn get_pool_tokens(&self, pool: PoolId) -> Result<Vec<TokenId>, VaultError> {
        Ok(self.state.pool(pool)?.tokens.clone())
    }

    pub fn get_pool_balances(&self, pool: PoolId) -> Result<Vec<u128>, VaultError> {
        Ok(self.state.pool(pool)?.balances.clone())
    }

    pub fn get_aggregate_swap_fee_percentage(&self, pool: PoolId) -> Result<u128, VaultError> {
        Ok(self.state.pool(pool)?.aggregate_swap_fee_percentage)
    }

    /// Fees withheld for `pool` in `token` and not yet collected
    pub fn get_aggregate_fees(&self, pool: PoolId, token: TokenId) -> FeeSplit {
        self.state
            .accrued_fees
            .get(&(pool, token))
            .copied()
            .unwrap_or_default()
    }

    pub fn total_supply(&self, pool: PoolId) -> u128 {
        self.state.bpt.total_supply(pool)
    }

    /// Balance of any token, BPT included
    pub fn balance_of(&self, token: TokenId, account: AccountId) -> u128 {
        if self.state.is_pool(token) {
            self.state.bpt.balance_of(token, account)
        } else {
            self.tokens.balance_of(token, account)
        }
    }

    pub fn is_buffer_initialized(&self, wrapped: TokenId) -> bool {
        self.state.buffers.contains_key(&wrapped)
    }

    pub fn get_buffer_balance(&self, wrapped: TokenId) -> Result<BufferBalances, VaultError> {
        Ok(self.state.buffer(wrapped)?.balances)
    }

    pub fn get_buffer_total_shares(&self, wrapped: TokenId) -> Result<u128, VaultError> {
        Ok(self.state.buffer(wrapped)?.total_shares)
    }

    pub fn get_buffer_owner_shares(
        &self,
        wrapped: TokenId,
        owner: AccountId,
    ) -> Result<u128, VaultError> {
        Ok(self.state.buffer(wrapped)?.shares_of(&owner))
    }

    pub fn get_buffer_asset(&self, wrapped: TokenId) -> Result<TokenId, VaultError> {
        Ok(self.state.buffer(wrapped)?.asset)
    }

    // ---------------------------------------------------------------------------------------
    // Savepoints
    // ---------------------------------------------------------------------------------------

    /// Full copy of persistent and transient state plus the token capability's snapshot
    pub(crate) fn savepoint(&self) -> Savepoint<T::Snapshot> {
        Savepoint {
            state: self.state.clone(),
            transient: self.transient.clone(),
            tokens: self.tokens.snapshot(),
        }
    }

    pub(crate) fn rollback(&mut self, savepoint: Savepoint<T::Snapshot>) {
        self.state = savepoint.state;
        self.transient = savepoint.transient;
        self.tokens.restore(savepoint.tokens);
    }
}
