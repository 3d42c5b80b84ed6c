//! # ERC4626 Buffers
//!
//! ## Purpose
//!
//! A buffer is a two-asset inventory (underlying, wrapped) keyed by the wrapped token. Wraps and
//! unwraps are served from that inventory at the wrapper's own preview rate, so routers can move
//! between a yield-bearing token and its asset without touching a market pool.
//!
//! ## Shares
//!
//! Buffer shares are denominated in underlying units: at initialization
//! `shares = convert_to_assets(wrapped) + underlying`. Later deposits mint shares in proportion
//! to the value they add to the buffer. The first `buffer_minimum_total_supply` shares are
//! locked to the zero address forever.
//!
//! ## Inventory miss
//!
//! ```text
//!   buffer holds enough of the output side?
//!     yes ──► swap inventory: in-side += amount_in, out-side -= amount_out
//!     no  ──► wrap/unwrap against the wrapper for amount + half the buffer's surplus,
//!             check the vault's physical balances against the moved Reserves
//! ```
//!
//! A query never holds the caller's tokens, so on a miss it takes the wrapper's `preview_*`
//! amounts instead of calling it and leaves custody and Reserves alone. The buffer ends in the
//! same state a real call would leave it in.
//!
//! Either way the ledger records `take_debt(token_in)` and `supply_credit(token_out)`.

use crate::error::VaultError;
use crate::erc4626::Erc4626;
use crate::session::VaultSession;
use crate::state::{BufferBalances, BufferState};
use crate::tokens::{Journaled, TokenTransfer};
use crate::vault::Vault;
use keel_types::{fixed_point, AccountId, Address, SwapKind, TokenId, WrappingDirection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferWrapOrUnwrapParams {
    pub kind: SwapKind,
    pub direction: WrappingDirection,
    pub wrapped: TokenId,
    pub amount_given: u128,
    /// Minimum out for exact in, maximum in for exact out
    pub limit: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferWrapOrUnwrapResult {
    pub amount_calculated: u128,
    pub amount_in: u128,
    pub amount_out: u128,
}

/// Amounts removed from a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferRemoval {
    pub underlying: u128,
    pub wrapped: u128,
}

/// Half of whatever the underlying side holds beyond the wrapped side's value
fn underlying_surplus(wrapper: &dyn Erc4626, balances: BufferBalances) -> Result<u128, VaultError> {
    let wrapped_as_underlying = wrapper.convert_to_assets(balances.wrapped)?;
    Ok(balances.underlying.saturating_sub(wrapped_as_underlying) / 2)
}

fn wrapped_surplus(wrapper: &dyn Erc4626, balances: BufferBalances) -> Result<u128, VaultError> {
    let underlying_as_wrapped = wrapper.convert_to_shares(balances.underlying)?;
    Ok(balances.wrapped.saturating_sub(underlying_as_wrapped) / 2)
}

impl<T: TokenTransfer + Journaled> Vault<T> {
    /// The wrapper for an initialized buffer, refusing one whose asset has changed
    fn checked_wrapper(&self, wrapped: TokenId) -> Result<(Arc<dyn Erc4626>, TokenId), VaultError> {
        let asset = self.state.buffer(wrapped)?.asset;
        let wrapper = self.state.wrapper(wrapped)?;
        let actual = wrapper.asset();
        if actual != asset {
            return Err(VaultError::WrongUnderlyingToken {
                wrapped,
                expected: asset,
                actual,
            });
        }
        Ok((wrapper, asset))
    }

    /// Check the physical result of an external wrap/unwrap and move Reserves with it
    ///
    /// `underlying_delta` and `wrapped_delta` are signed from the vault's point of view. The
    /// vault must hold at least the moved Reserves afterwards; anything above stays unsettled.
    fn settle_wrapper_call(
        &mut self,
        wrapped: TokenId,
        asset: TokenId,
        underlying_delta: i128,
        wrapped_delta: i128,
    ) -> Result<(), VaultError> {
        let expected_underlying = apply_delta(self.state.reserves_of(asset), underlying_delta)?;
        let actual_underlying = self.tokens.balance_of(asset, self.address);
        if actual_underlying < expected_underlying {
            return Err(VaultError::WrongUnderlyingAmount {
                wrapped,
                expected: expected_underlying,
                actual: actual_underlying,
            });
        }

        let expected_wrapped = apply_delta(self.state.reserves_of(wrapped), wrapped_delta)?;
        let actual_wrapped = self.tokens.balance_of(wrapped, self.address);
        if actual_wrapped < expected_wrapped {
            return Err(VaultError::WrongWrappedAmount {
                wrapped,
                expected: expected_wrapped,
                actual: actual_wrapped,
            });
        }

        self.state.reserves.insert(asset, expected_underlying);
        self.state.reserves.insert(wrapped, expected_wrapped);
        Ok(())
    }
}

fn apply_delta(value: u128, delta: i128) -> Result<u128, VaultError> {
    let magnitude = delta.unsigned_abs();
    if delta >= 0 {
        Ok(fixed_point::add(value, magnitude)?)
    } else {
        Ok(fixed_point::sub(value, magnitude)?)
    }
}

fn signed(amount: u128) -> Result<i128, VaultError> {
    i128::try_from(amount).map_err(|_| {
        VaultError::Math(keel_types::MathError::Overflow {
            operation: "wrapper delta",
        })
    })
}

impl<'v, T: TokenTransfer + Journaled> VaultSession<'v, T> {
    /// Create a buffer; returns the shares issued to `owner`
    pub fn initialize_buffer(
        &mut self,
        wrapped: TokenId,
        amount_underlying: u128,
        amount_wrapped: u128,
        min_issued_shares: u128,
        owner: AccountId,
    ) -> Result<u128, VaultError> {
        self.vault.ensure_unlocked()?;
        if self.vault.state.buffers.contains_key(&wrapped) {
            return Err(VaultError::BufferAlreadyInitialized { wrapped });
        }
        let wrapper = self.vault.state.wrapper(wrapped)?;
        let asset = wrapper.asset();
        if asset.is_zero() || asset == wrapped {
            return Err(VaultError::InvalidUnderlyingToken { wrapped });
        }

        let shares = fixed_point::add(
            wrapper.convert_to_assets(amount_wrapped)?,
            amount_underlying,
        )?;
        let minimum = self.vault.limits.buffer_minimum_total_supply;
        if shares < minimum {
            return Err(VaultError::BufferTotalSupplyTooLow {
                wrapped,
                total_supply: shares,
                minimum,
            });
        }
        let issued = shares - minimum;
        if issued < min_issued_shares {
            return Err(VaultError::IssuedSharesBelowMin {
                issued,
                min: min_issued_shares,
            });
        }

        self.vault.transient.ledger.take_debt(asset, amount_underlying)?;
        self.vault.transient.ledger.take_debt(wrapped, amount_wrapped)?;

        let mut holders = BTreeMap::new();
        holders.insert(Address::ZERO, minimum);
        if issued > 0 {
            *holders.entry(owner).or_default() += issued;
        }
        self.vault.state.buffers.insert(
            wrapped,
            BufferState {
                asset,
                balances: BufferBalances {
                    underlying: amount_underlying,
                    wrapped: amount_wrapped,
                },
                total_shares: shares,
                shares: holders,
            },
        );

        info!(%wrapped, %asset, %owner, amount_underlying, amount_wrapped, issued, "Initialized buffer");
        Ok(issued)
    }

    /// Deposit into an initialized buffer; returns the shares issued to `owner`
    pub fn add_liquidity_to_buffer(
        &mut self,
        wrapped: TokenId,
        amount_underlying: u128,
        amount_wrapped: u128,
        min_issued_shares: u128,
        owner: AccountId,
    ) -> Result<u128, VaultError> {
        self.vault.ensure_unlocked()?;
        let (wrapper, asset) = self.vault.checked_wrapper(wrapped)?;
        let buffer = self.vault.state.buffer(wrapped)?;

        let added_value = fixed_point::add(
            wrapper.convert_to_assets(amount_wrapped)?,
            amount_underlying,
        )?;
        let buffer_value = fixed_point::add(
            wrapper.convert_to_assets(buffer.balances.wrapped)?,
            buffer.balances.underlying,
        )?;
        let issued = fixed_point::mul_div_down(added_value, buffer.total_shares, buffer_value)?;
        if issued < min_issued_shares {
            return Err(VaultError::IssuedSharesBelowMin {
                issued,
                min: min_issued_shares,
            });
        }

        self.vault.transient.ledger.take_debt(asset, amount_underlying)?;
        self.vault.transient.ledger.take_debt(wrapped, amount_wrapped)?;

        let buffer = self.vault.state.buffer_mut(wrapped)?;
        buffer.balances.underlying = fixed_point::add(buffer.balances.underlying, amount_underlying)?;
        buffer.balances.wrapped = fixed_point::add(buffer.balances.wrapped, amount_wrapped)?;
        buffer.total_shares = fixed_point::add(buffer.total_shares, issued)?;
        let held = buffer.shares_of(&owner);
        buffer.shares.insert(owner, fixed_point::add(held, issued)?);

        debug!(%wrapped, %owner, amount_underlying, amount_wrapped, issued, "Added buffer liquidity");
        Ok(issued)
    }

    /// Burn `shares` of `owner` for a pro-rata part of both balances
    pub fn remove_liquidity_from_buffer(
        &mut self,
        wrapped: TokenId,
        shares: u128,
        min_underlying_out: u128,
        min_wrapped_out: u128,
        owner: AccountId,
    ) -> Result<BufferRemoval, VaultError> {
        self.vault.ensure_unlocked()?;
        let (_, asset) = self.vault.checked_wrapper(wrapped)?;
        let minimum = self.vault.limits.buffer_minimum_total_supply;
        let buffer = self.vault.state.buffer(wrapped)?;

        let balance = buffer.shares_of(&owner);
        if shares > balance {
            return Err(VaultError::NotEnoughBufferShares {
                wrapped,
                owner,
                balance,
                requested: shares,
            });
        }
        let remaining_supply = buffer.total_shares - shares;
        if remaining_supply < minimum {
            return Err(VaultError::BufferTotalSupplyTooLow {
                wrapped,
                total_supply: remaining_supply,
                minimum,
            });
        }

        let removal = BufferRemoval {
            underlying: fixed_point::mul_div_down(
                buffer.balances.underlying,
                shares,
                buffer.total_shares,
            )?,
            wrapped: fixed_point::mul_div_down(buffer.balances.wrapped, shares, buffer.total_shares)?,
        };
        if removal.underlying < min_underlying_out {
            return Err(VaultError::AmountOutBelowMin {
                token: asset,
                amount: removal.underlying,
                min: min_underlying_out,
            });
        }
        if removal.wrapped < min_wrapped_out {
            return Err(VaultError::AmountOutBelowMin {
                token: wrapped,
                amount: removal.wrapped,
                min: min_wrapped_out,
            });
        }

        let buffer = self.vault.state.buffer_mut(wrapped)?;
        buffer.balances.underlying -= removal.underlying;
        buffer.balances.wrapped -= removal.wrapped;
        buffer.total_shares = remaining_supply;
        if balance == shares {
            buffer.shares.remove(&owner);
        } else {
            buffer.shares.insert(owner, balance - shares);
        }

        self.vault.transient.ledger.supply_credit(asset, removal.underlying)?;
        self.vault.transient.ledger.supply_credit(wrapped, removal.wrapped)?;

        debug!(%wrapped, %owner, shares, underlying = removal.underlying, wrapped_out = removal.wrapped, "Removed buffer liquidity");
        Ok(removal)
    }

    pub fn erc4626_buffer_wrap_or_unwrap(
        &mut self,
        params: &BufferWrapOrUnwrapParams,
    ) -> Result<BufferWrapOrUnwrapResult, VaultError> {
        self.vault.ensure_unlocked()?;
        let wrapped = params.wrapped;
        let minimum = self.vault.limits.minimum_wrap_amount;
        if params.amount_given < minimum {
            return Err(VaultError::WrapAmountTooSmall {
                wrapped,
                amount: params.amount_given,
                minimum,
            });
        }
        let (wrapper, asset) = self.vault.checked_wrapper(wrapped)?;

        let (amount_in, amount_out) = match (params.direction, params.kind) {
            (WrappingDirection::Wrap, SwapKind::ExactIn) => {
                (params.amount_given, wrapper.preview_deposit(params.amount_given)?)
            }
            (WrappingDirection::Wrap, SwapKind::ExactOut) => {
                (wrapper.preview_mint(params.amount_given)?, params.amount_given)
            }
            (WrappingDirection::Unwrap, SwapKind::ExactIn) => {
                (params.amount_given, wrapper.preview_redeem(params.amount_given)?)
            }
            (WrappingDirection::Unwrap, SwapKind::ExactOut) => {
                (wrapper.preview_withdraw(params.amount_given)?, params.amount_given)
            }
        };

        let (token_in, token_out) = match params.direction {
            WrappingDirection::Wrap => (asset, wrapped),
            WrappingDirection::Unwrap => (wrapped, asset),
        };
        match params.kind {
            SwapKind::ExactIn if amount_out < params.limit => {
                return Err(VaultError::AmountOutBelowMin {
                    token: token_out,
                    amount: amount_out,
                    min: params.limit,
                });
            }
            SwapKind::ExactOut if amount_in > params.limit => {
                return Err(VaultError::AmountInAboveMax {
                    token: token_in,
                    amount: amount_in,
                    max: params.limit,
                });
            }
            _ => {}
        }

        let balances = self.vault.state.buffer(wrapped)?.balances;
        let new_balances = match params.direction {
            WrappingDirection::Wrap if balances.wrapped >= amount_out => BufferBalances {
                underlying: fixed_point::add(balances.underlying, amount_in)?,
                wrapped: balances.wrapped - amount_out,
            },
            WrappingDirection::Unwrap if balances.underlying >= amount_out => BufferBalances {
                underlying: balances.underlying - amount_out,
                wrapped: fixed_point::add(balances.wrapped, amount_in)?,
            },
            WrappingDirection::Wrap => {
                self.wrap_through_wrapper(wrapper.as_ref(), asset, params.kind, balances, amount_in, amount_out)?
            }
            WrappingDirection::Unwrap => {
                self.unwrap_through_wrapper(wrapper.as_ref(), asset, params.kind, balances, amount_in, amount_out)?
            }
        };
        self.vault.state.buffer_mut(wrapped)?.balances = new_balances;

        self.vault.transient.ledger.take_debt(token_in, amount_in)?;
        self.vault.transient.ledger.supply_credit(token_out, amount_out)?;

        debug!(
            %wrapped,
            direction = ?params.direction,
            kind = ?params.kind,
            amount_in,
            amount_out,
            "Buffer wrap/unwrap"
        );

        let amount_calculated = match params.kind {
            SwapKind::ExactIn => amount_out,
            SwapKind::ExactOut => amount_in,
        };
        Ok(BufferWrapOrUnwrapResult {
            amount_calculated,
            amount_in,
            amount_out,
        })
    }

    /// Deposit into the wrapper for the user's amount plus half the buffer's underlying surplus
    fn wrap_through_wrapper(
        &mut self,
        wrapper: &dyn Erc4626,
        asset: TokenId,
        kind: SwapKind,
        balances: BufferBalances,
        amount_in: u128,
        amount_out: u128,
    ) -> Result<BufferBalances, VaultError> {
        let wrapped = wrapper.token();
        let surplus = underlying_surplus(wrapper, balances)?;
        let vault_address = self.vault.address;
        let query = self.vault.transient.query;

        let (underlying_used, wrapped_received) = match kind {
            SwapKind::ExactIn => {
                let deposit = fixed_point::add(amount_in, surplus)?;
                let shares = if query {
                    wrapper.preview_deposit(deposit)?
                } else {
                    wrapper.deposit(&mut self.vault.tokens, deposit, vault_address)?
                };
                (deposit, shares)
            }
            SwapKind::ExactOut => {
                let surplus_shares = if surplus > 0 {
                    wrapper.convert_to_shares(surplus)?
                } else {
                    0
                };
                let shares = fixed_point::add(amount_out, surplus_shares)?;
                let assets = if query {
                    wrapper.preview_mint(shares)?
                } else {
                    wrapper.mint(&mut self.vault.tokens, shares, vault_address)?
                };
                (assets, shares)
            }
        };
        debug!(%wrapped, surplus, underlying_used, wrapped_received, query, "Wrapped through wrapper");

        if !query {
            self.vault.settle_wrapper_call(
                wrapped,
                asset,
                -signed(underlying_used)?,
                signed(wrapped_received)?,
            )?;
        }

        Ok(BufferBalances {
            underlying: fixed_point::sub(
                fixed_point::add(balances.underlying, amount_in)?,
                underlying_used,
            )?,
            wrapped: fixed_point::sub(
                fixed_point::add(balances.wrapped, wrapped_received)?,
                amount_out,
            )?,
        })
    }

    /// Redeem from the wrapper for the user's amount plus half the buffer's wrapped surplus
    fn unwrap_through_wrapper(
        &mut self,
        wrapper: &dyn Erc4626,
        asset: TokenId,
        kind: SwapKind,
        balances: BufferBalances,
        amount_in: u128,
        amount_out: u128,
    ) -> Result<BufferBalances, VaultError> {
        let wrapped = wrapper.token();
        let surplus = wrapped_surplus(wrapper, balances)?;
        let vault_address = self.vault.address;
        let query = self.vault.transient.query;

        let (wrapped_used, underlying_received) = match kind {
            SwapKind::ExactIn => {
                let shares = fixed_point::add(amount_in, surplus)?;
                let assets = if query {
                    wrapper.preview_redeem(shares)?
                } else {
                    wrapper.redeem(&mut self.vault.tokens, shares, vault_address, vault_address)?
                };
                (shares, assets)
            }
            SwapKind::ExactOut => {
                let surplus_assets = if surplus > 0 {
                    wrapper.convert_to_assets(surplus)?
                } else {
                    0
                };
                let assets = fixed_point::add(amount_out, surplus_assets)?;
                let shares = if query {
                    wrapper.preview_withdraw(assets)?
                } else {
                    wrapper.withdraw(&mut self.vault.tokens, assets, vault_address, vault_address)?
                };
                (shares, assets)
            }
        };
        debug!(%wrapped, surplus, wrapped_used, underlying_received, query, "Unwrapped through wrapper");

        if !query {
            self.vault.settle_wrapper_call(
                wrapped,
                asset,
                signed(underlying_received)?,
                -signed(wrapped_used)?,
            )?;
        }

        Ok(BufferBalances {
            underlying: fixed_point::sub(
                fixed_point::add(balances.underlying, underlying_received)?,
                amount_out,
            )?,
            wrapped: fixed_point::sub(
                fixed_point::add(balances.wrapped, amount_in)?,
                wrapped_used,
            )?,
        })
    }
}
