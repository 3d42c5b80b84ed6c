//! Fee controller checkpoints
//!
//! On every swap fee the vault keeps the aggregate share (protocol plus pool creator) out of the
//! pool's balance and asks the [`FeeController`] how to split it. The split is recorded in vault
//! state, so it rolls back with the scope; the controller itself stays stateless from the
//! vault's point of view.

use anyhow::{bail, Result};
use keel_types::{fixed_point, PoolId, TokenId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Protocol and pool-creator portions of an aggregate fee
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    pub protocol: u128,
    pub creator: u128,
}

impl FeeSplit {
    pub fn total(&self) -> u128 {
        self.protocol.saturating_add(self.creator)
    }

    pub fn accumulate(&mut self, other: FeeSplit) -> Result<(), keel_types::MathError> {
        self.protocol = fixed_point::add(self.protocol, other.protocol)?;
        self.creator = fixed_point::add(self.creator, other.creator)?;
        Ok(())
    }
}

pub trait FeeController: Send + Sync + Debug {
    /// Share of each swap fee the vault withholds for `pool` (18 decimals)
    fn aggregate_swap_fee_percentage(&self, pool: PoolId) -> u128;

    /// Split an aggregate fee amount; the parts must add up to `amount`
    fn split_aggregate_fee(&self, pool: PoolId, token: TokenId, amount: u128) -> Result<FeeSplit>;
}

#[derive(Debug, Clone, Copy, Default)]
struct PoolFeeConfig {
    protocol_swap_fee_percentage: u128,
    creator_fee_percentage: u128,
}

/// Reference controller: a global protocol percentage with per-pool overrides and a per-pool
/// creator percentage
///
/// Aggregate percentage is `protocol + creator * (1 - protocol)`. The creator's part of an
/// aggregate fee is everything that is not the protocol's, so the split always adds up.
#[derive(Debug, Default)]
pub struct ProtocolFeeController {
    global_protocol_swap_fee_percentage: RwLock<u128>,
    pools: RwLock<BTreeMap<PoolId, PoolFeeConfig>>,
}

impl ProtocolFeeController {
    pub fn new(global_protocol_swap_fee_percentage: u128) -> Self {
        Self {
            global_protocol_swap_fee_percentage: RwLock::new(global_protocol_swap_fee_percentage),
            pools: RwLock::new(BTreeMap::new()),
        }
    }

    /// A controller that withholds nothing
    pub fn disabled() -> Self {
        Self::new(0)
    }

    pub fn set_global_protocol_swap_fee_percentage(&self, percentage: u128) -> Result<()> {
        if percentage > fixed_point::ONE {
            bail!("Protocol fee percentage {} above 100%", percentage);
        }
        *self.global_protocol_swap_fee_percentage.write() = percentage;
        Ok(())
    }

    pub fn set_pool_fees(
        &self,
        pool: PoolId,
        protocol_swap_fee_percentage: u128,
        creator_fee_percentage: u128,
    ) -> Result<()> {
        if protocol_swap_fee_percentage > fixed_point::ONE
            || creator_fee_percentage > fixed_point::ONE
        {
            bail!("Fee percentages for pool {} above 100%", pool);
        }
        self.pools.write().insert(
            pool,
            PoolFeeConfig {
                protocol_swap_fee_percentage,
                creator_fee_percentage,
            },
        );
        Ok(())
    }

    fn config(&self, pool: PoolId) -> PoolFeeConfig {
        self.pools
            .read()
            .get(&pool)
            .copied()
            .unwrap_or(PoolFeeConfig {
                protocol_swap_fee_percentage: *self.global_protocol_swap_fee_percentage.read(),
                creator_fee_percentage: 0,
            })
    }
}

impl FeeController for ProtocolFeeController {
    fn aggregate_swap_fee_percentage(&self, pool: PoolId) -> u128 {
        let config = self.config(pool);
        let creator_part = fixed_point::mul_down(
            config.creator_fee_percentage,
            fixed_point::complement(config.protocol_swap_fee_percentage),
        )
        .unwrap_or(0);
        config
            .protocol_swap_fee_percentage
            .saturating_add(creator_part)
            .min(fixed_point::ONE)
    }

    fn split_aggregate_fee(&self, pool: PoolId, _token: TokenId, amount: u128) -> Result<FeeSplit> {
        let aggregate = self.aggregate_swap_fee_percentage(pool);
        if aggregate == 0 {
            if amount > 0 {
                bail!("Pool {} has no aggregate fee but {} was withheld", pool, amount);
            }
            return Ok(FeeSplit::default());
        }
        let config = self.config(pool);
        let protocol = fixed_point::mul_div_down(
            amount,
            config.protocol_swap_fee_percentage,
            aggregate,
        )?
        .min(amount);
        Ok(FeeSplit {
            protocol,
            creator: amount - protocol,
        })
    }
}
