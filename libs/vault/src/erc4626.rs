//! ERC4626 wrapper capability
//!
//! A wrapped (yield-bearing) token exposes its conversion rate through the `convert_*` and
//! `preview_*` family and performs real wraps/unwraps through `deposit`/`mint`/`withdraw`/
//! `redeem`. The vault only calls the latter when a buffer cannot serve a request from its own
//! inventory.
//!
//! [`Erc4626Wrapper`] is the reference implementation: underlying tokens are held in custody
//! under the wrapper's own address and the rate (assets per share, 18 decimals) can be moved to
//! simulate yield.

use crate::tokens::{TokenError, TokenTransfer};
use keel_types::{fixed_point, AccountId, TokenId};
use parking_lot::RwLock;
use std::fmt::Debug;
use tracing::debug;

pub trait Erc4626: Send + Sync + Debug {
    /// The wrapped token; also the account holding underlying in custody
    fn token(&self) -> TokenId;

    /// The underlying asset
    fn asset(&self) -> TokenId;

    fn convert_to_assets(&self, shares: u128) -> Result<u128, TokenError>;

    fn convert_to_shares(&self, assets: u128) -> Result<u128, TokenError>;

    /// Shares minted for `assets` deposited (rounds down)
    fn preview_deposit(&self, assets: u128) -> Result<u128, TokenError>;

    /// Assets needed to mint `shares` (rounds up)
    fn preview_mint(&self, shares: u128) -> Result<u128, TokenError>;

    /// Shares burned to withdraw `assets` (rounds up)
    fn preview_withdraw(&self, assets: u128) -> Result<u128, TokenError>;

    /// Assets returned for `shares` redeemed (rounds down)
    fn preview_redeem(&self, shares: u128) -> Result<u128, TokenError>;

    fn deposit(
        &self,
        tokens: &mut dyn TokenTransfer,
        assets: u128,
        receiver: AccountId,
    ) -> Result<u128, TokenError>;

    fn mint(
        &self,
        tokens: &mut dyn TokenTransfer,
        shares: u128,
        receiver: AccountId,
    ) -> Result<u128, TokenError>;

    fn withdraw(
        &self,
        tokens: &mut dyn TokenTransfer,
        assets: u128,
        receiver: AccountId,
        owner: AccountId,
    ) -> Result<u128, TokenError>;

    fn redeem(
        &self,
        tokens: &mut dyn TokenTransfer,
        shares: u128,
        receiver: AccountId,
        owner: AccountId,
    ) -> Result<u128, TokenError>;
}

#[derive(Debug)]
struct WrapperState {
    asset: TokenId,
    rate: u128,
}

/// Rate-based ERC4626 wrapper
#[derive(Debug)]
pub struct Erc4626Wrapper {
    token: TokenId,
    state: RwLock<WrapperState>,
}

impl Erc4626Wrapper {
    /// New wrapper at a 1:1 rate
    pub fn new(token: TokenId, asset: TokenId) -> Self {
        Self::with_rate(token, asset, fixed_point::ONE)
    }

    pub fn with_rate(token: TokenId, asset: TokenId, rate: u128) -> Self {
        Self {
            token,
            state: RwLock::new(WrapperState { asset, rate }),
        }
    }

    /// Assets per share, 18 decimals
    pub fn rate(&self) -> u128 {
        self.state.read().rate
    }

    pub fn set_rate(&self, rate: u128) {
        self.state.write().rate = rate;
    }

    /// Point the wrapper at a different asset (a misbehaving wrapper)
    pub fn set_asset(&self, asset: TokenId) {
        self.state.write().asset = asset;
    }

    fn pull_and_mint(
        &self,
        tokens: &mut dyn TokenTransfer,
        assets: u128,
        shares: u128,
        receiver: AccountId,
    ) -> Result<(), TokenError> {
        tokens.transfer(self.asset(), receiver, self.token, assets)?;
        tokens.mint(self.token, receiver, shares)?;
        debug!(wrapped = %self.token, assets, shares, "ERC4626 wrap");
        Ok(())
    }

    fn burn_and_release(
        &self,
        tokens: &mut dyn TokenTransfer,
        assets: u128,
        shares: u128,
        receiver: AccountId,
        owner: AccountId,
    ) -> Result<(), TokenError> {
        tokens.burn(self.token, owner, shares)?;
        tokens.transfer(self.asset(), self.token, receiver, assets)?;
        debug!(wrapped = %self.token, assets, shares, "ERC4626 unwrap");
        Ok(())
    }
}

impl Erc4626 for Erc4626Wrapper {
    fn token(&self) -> TokenId {
        self.token
    }

    fn asset(&self) -> TokenId {
        self.state.read().asset
    }

    fn convert_to_assets(&self, shares: u128) -> Result<u128, TokenError> {
        Ok(fixed_point::mul_down(shares, self.rate())?)
    }

    fn convert_to_shares(&self, assets: u128) -> Result<u128, TokenError> {
        Ok(fixed_point::div_down(assets, self.rate())?)
    }

    fn preview_deposit(&self, assets: u128) -> Result<u128, TokenError> {
        self.convert_to_shares(assets)
    }

    fn preview_mint(&self, shares: u128) -> Result<u128, TokenError> {
        Ok(fixed_point::mul_up(shares, self.rate())?)
    }

    fn preview_withdraw(&self, assets: u128) -> Result<u128, TokenError> {
        Ok(fixed_point::div_up(assets, self.rate())?)
    }

    fn preview_redeem(&self, shares: u128) -> Result<u128, TokenError> {
        self.convert_to_assets(shares)
    }

    fn deposit(
        &self,
        tokens: &mut dyn TokenTransfer,
        assets: u128,
        receiver: AccountId,
    ) -> Result<u128, TokenError> {
        let shares = self.preview_deposit(assets)?;
        self.pull_and_mint(tokens, assets, shares, receiver)?;
        Ok(shares)
    }

    fn mint(
        &self,
        tokens: &mut dyn TokenTransfer,
        shares: u128,
        receiver: AccountId,
    ) -> Result<u128, TokenError> {
        let assets = self.preview_mint(shares)?;
        self.pull_and_mint(tokens, assets, shares, receiver)?;
        Ok(assets)
    }

    fn withdraw(
        &self,
        tokens: &mut dyn TokenTransfer,
        assets: u128,
        receiver: AccountId,
        owner: AccountId,
    ) -> Result<u128, TokenError> {
        let shares = self.preview_withdraw(assets)?;
        self.burn_and_release(tokens, assets, shares, receiver, owner)?;
        Ok(shares)
    }

    fn redeem(
        &self,
        tokens: &mut dyn TokenTransfer,
        shares: u128,
        receiver: AccountId,
        owner: AccountId,
    ) -> Result<u128, TokenError> {
        let assets = self.preview_redeem(shares)?;
        self.burn_and_release(tokens, assets, shares, receiver, owner)?;
        Ok(assets)
    }
}
