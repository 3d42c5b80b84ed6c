//! ERC4626 buffers: shares, inventory wraps and wraps through the wrapper

mod common;

use common::*;
use keel_types::fixed_point::ONE;
use keel_types::{AccountId, Address, SwapKind, TokenId, WrappingDirection};
use keel_vault::{
    BufferBalances, BufferWrapOrUnwrapParams, Erc4626, Erc4626Wrapper, TokenError, TokenTransfer,
    Vault, VaultError,
};
use proptest::prelude::*;
use std::sync::Arc;

const W2: TokenId = Address::from_low_u64(0x22);

fn wrap_params(
    direction: WrappingDirection,
    kind: SwapKind,
    amount_given: u128,
    limit: u128,
) -> BufferWrapOrUnwrapParams {
    BufferWrapOrUnwrapParams {
        kind,
        direction,
        wrapped: WDAI,
        amount_given,
        limit,
    }
}

#[test_log::test]
fn test_initialize_buffer() {
    let mut fx = vault_with_buffer(RATE_TWO, 10_000, 5_000);

    // 5000 wrapped are worth 10000 underlying
    assert_eq!(fx.issued, 19_990);
    assert_eq!(fx.vault.get_buffer_total_shares(WDAI).unwrap(), 20_000);
    assert_eq!(fx.vault.get_buffer_owner_shares(WDAI, ALICE).unwrap(), 19_990);
    assert_eq!(fx.vault.get_buffer_owner_shares(WDAI, Address::ZERO).unwrap(), 10);
    assert_eq!(fx.vault.get_buffer_asset(WDAI).unwrap(), DAI);
    assert_eq!(
        fx.vault.get_buffer_balance(WDAI).unwrap(),
        BufferBalances {
            underlying: 10_000,
            wrapped: 5_000
        }
    );
    assert_reserves_match(&fx.vault, DAI);
    assert_reserves_match(&fx.vault, WDAI);

    let err = fx
        .vault
        .unlock(ALICE, |s| s.initialize_buffer(WDAI, 100, 100, 0, ALICE))
        .unwrap_err();
    assert!(matches!(err, VaultError::BufferAlreadyInitialized { .. }));

    let err = fx
        .vault
        .unlock(ALICE, |s| s.initialize_buffer(Z, 100, 100, 0, ALICE))
        .unwrap_err();
    assert!(matches!(err, VaultError::WrappedTokenNotRegistered { .. }));
}

#[test]
fn test_initialize_buffer_minimum_supply() {
    let mut vault = new_vault();
    vault
        .register_wrapper(Arc::new(Erc4626Wrapper::new(W2, Y)))
        .unwrap();

    let err = vault
        .unlock(ALICE, |s| s.initialize_buffer(W2, 3, 1, 0, ALICE))
        .unwrap_err();
    assert!(matches!(
        err,
        VaultError::BufferTotalSupplyTooLow {
            total_supply: 4,
            minimum: 10,
            ..
        }
    ));
    assert!(!vault.is_buffer_initialized(W2));

    let err = vault
        .register_wrapper(Arc::new(Erc4626Wrapper::new(W2, Address::ZERO)))
        .unwrap_err();
    assert!(matches!(err, VaultError::InvalidUnderlyingToken { .. }));
}

#[test]
fn test_buffer_ops_need_initialized_buffer() {
    let mut vault = new_vault();
    vault
        .register_wrapper(Arc::new(Erc4626Wrapper::new(W2, Y)))
        .unwrap();

    let err = vault
        .unlock(ALICE, |s| {
            s.erc4626_buffer_wrap_or_unwrap(&BufferWrapOrUnwrapParams {
                kind: SwapKind::ExactIn,
                direction: WrappingDirection::Wrap,
                wrapped: W2,
                amount_given: 100,
                limit: 0,
            })
        })
        .unwrap_err();
    assert!(matches!(err, VaultError::BufferNotInitialized { .. }));
}

#[test]
fn test_proportional_deposit_round_trips_exactly() {
    let mut fx = vault_with_buffer(RATE_TWO, 10_000, 5_000);

    let shares = fx
        .vault
        .unlock(BOB, |s| {
            let shares = s.add_liquidity_to_buffer(WDAI, 2_000, 1_000, 4_000, BOB)?;
            pay(s, DAI, BOB, 2_000)?;
            pay(s, WDAI, BOB, 1_000)?;
            Ok::<_, VaultError>(shares)
        })
        .unwrap();
    assert_eq!(shares, 4_000);

    let removal = fx
        .vault
        .unlock(BOB, |s| {
            let removal = s.remove_liquidity_from_buffer(WDAI, shares, 2_000, 1_000, BOB)?;
            s.send_to(DAI, BOB, removal.underlying)?;
            s.send_to(WDAI, BOB, removal.wrapped)?;
            Ok::<_, VaultError>(removal)
        })
        .unwrap();

    assert_eq!((removal.underlying, removal.wrapped), (2_000, 1_000));
    assert_eq!(fx.vault.get_buffer_total_shares(WDAI).unwrap(), 20_000);
    assert_eq!(fx.vault.get_buffer_owner_shares(WDAI, BOB).unwrap(), 0);
}

#[test]
fn test_issued_shares_slippage() {
    let mut fx = vault_with_buffer(RATE_TWO, 10_000, 5_000);

    let err = fx
        .vault
        .unlock(BOB, |s| s.add_liquidity_to_buffer(WDAI, 1_000, 0, 1_001, BOB))
        .unwrap_err();
    assert!(matches!(
        err,
        VaultError::IssuedSharesBelowMin {
            issued: 1_000,
            min: 1_001
        }
    ));
}

#[test]
fn test_remove_respects_shares_and_floor() {
    let mut fx = vault_with_buffer(RATE_TWO, 10_000, 5_000);

    let err = fx
        .vault
        .unlock(ALICE, |s| s.remove_liquidity_from_buffer(WDAI, 19_991, 0, 0, ALICE))
        .unwrap_err();
    assert!(matches!(err, VaultError::NotEnoughBufferShares { .. }));

    fx.vault
        .unlock(ALICE, |s| {
            let removal = s.remove_liquidity_from_buffer(WDAI, 19_990, 0, 0, ALICE)?;
            s.send_to(DAI, ALICE, removal.underlying)?;
            s.send_to(WDAI, ALICE, removal.wrapped)?;
            Ok::<_, VaultError>(())
        })
        .unwrap();
    assert_eq!(fx.vault.get_buffer_total_shares(WDAI).unwrap(), 10);

    let err = fx
        .vault
        .unlock(ALICE, |s| s.remove_liquidity_from_buffer(WDAI, 1, 0, 0, Address::ZERO))
        .unwrap_err();
    assert!(err.is_minimum_supply());
}

#[test]
fn test_wrap_limits_and_minimum() {
    let settings = keel_config::VaultSettings {
        minimum_wrap_amount: 100,
        ..test_settings()
    };
    let mut fx = vault_with_buffer_settings(settings, RATE_TWO, 10_000, 5_000);

    let err = fx
        .vault
        .unlock(ALICE, |s| {
            s.erc4626_buffer_wrap_or_unwrap(&wrap_params(
                WrappingDirection::Wrap,
                SwapKind::ExactIn,
                1_000,
                501,
            ))
        })
        .unwrap_err();
    assert!(matches!(
        err,
        VaultError::AmountOutBelowMin {
            token: WDAI,
            amount: 500,
            min: 501
        }
    ));

    let err = fx
        .vault
        .unlock(ALICE, |s| {
            s.erc4626_buffer_wrap_or_unwrap(&wrap_params(
                WrappingDirection::Wrap,
                SwapKind::ExactOut,
                500,
                999,
            ))
        })
        .unwrap_err();
    assert!(matches!(
        err,
        VaultError::AmountInAboveMax {
            token: DAI,
            amount: 1_000,
            max: 999
        }
    ));

    let err = fx
        .vault
        .unlock(ALICE, |s| {
            s.erc4626_buffer_wrap_or_unwrap(&wrap_params(
                WrappingDirection::Unwrap,
                SwapKind::ExactIn,
                50,
                0,
            ))
        })
        .unwrap_err();
    assert!(matches!(err, VaultError::WrapAmountTooSmall { amount: 50, .. }));
}

#[test]
fn test_exact_in_and_exact_out_agree() {
    let mut fx = vault_with_buffer(RATE_TWO, 10_000, 5_000);

    let exact_in = fx
        .vault
        .quote(ALICE, |s| {
            s.erc4626_buffer_wrap_or_unwrap(&wrap_params(
                WrappingDirection::Wrap,
                SwapKind::ExactIn,
                1_001,
                0,
            ))
        })
        .unwrap();
    assert_eq!(exact_in.amount_out, 500);

    let exact_out = fx
        .vault
        .quote(ALICE, |s| {
            s.erc4626_buffer_wrap_or_unwrap(&wrap_params(
                WrappingDirection::Wrap,
                SwapKind::ExactOut,
                exact_in.amount_out,
                u128::MAX,
            ))
        })
        .unwrap();
    assert_eq!(exact_out.amount_in, 1_000);
    assert!(exact_out.amount_in <= 1_001);
}

#[test]
fn test_changed_asset_rejected() {
    let mut fx = vault_with_buffer(RATE_TWO, 10_000, 5_000);
    fx.wrapper.set_asset(Z);

    let err = fx
        .vault
        .unlock(ALICE, |s| {
            s.erc4626_buffer_wrap_or_unwrap(&wrap_params(
                WrappingDirection::Wrap,
                SwapKind::ExactIn,
                1_000,
                0,
            ))
        })
        .unwrap_err();
    assert!(matches!(
        err,
        VaultError::WrongUnderlyingToken {
            expected: DAI,
            actual: Z,
            ..
        }
    ));

    let err = fx
        .vault
        .unlock(BOB, |s| s.add_liquidity_to_buffer(WDAI, 1_000, 0, 0, BOB))
        .unwrap_err();
    assert!(matches!(err, VaultError::WrongUnderlyingToken { .. }));
}

#[test_log::test]
fn test_wrap_through_wrapper_when_inventory_short() {
    let mut fx = vault_with_buffer(RATE_TWO, 10_000, 5_000);
    let custody_before = fx.vault.tokens().balance_of(DAI, WDAI);

    let result = fx
        .vault
        .unlock(ALICE, |s| {
            pay(s, DAI, ALICE, 20_000)?;
            let result = s.erc4626_buffer_wrap_or_unwrap(&wrap_params(
                WrappingDirection::Wrap,
                SwapKind::ExactIn,
                20_000,
                10_000,
            ))?;
            s.send_to(WDAI, ALICE, result.amount_out)?;
            Ok::<_, VaultError>(result)
        })
        .unwrap();

    assert_eq!(result.amount_out, 10_000);
    assert_eq!(
        fx.vault.get_buffer_balance(WDAI).unwrap(),
        BufferBalances {
            underlying: 10_000,
            wrapped: 5_000
        }
    );
    assert_eq!(fx.vault.tokens().balance_of(DAI, WDAI), custody_before + 20_000);
    assert_reserves_match(&fx.vault, DAI);
    assert_reserves_match(&fx.vault, WDAI);
}

#[test]
fn test_wrap_through_wrapper_rebalances_surplus() {
    let mut fx = vault_with_buffer(RATE_TWO, 30_000, 5_000);

    fx.vault
        .unlock(ALICE, |s| {
            pay(s, DAI, ALICE, 20_000)?;
            let result = s.erc4626_buffer_wrap_or_unwrap(&wrap_params(
                WrappingDirection::Wrap,
                SwapKind::ExactIn,
                20_000,
                0,
            ))?;
            s.send_to(WDAI, ALICE, result.amount_out)?;
            Ok::<_, VaultError>(())
        })
        .unwrap();

    // Half of the 20000 underlying surplus was wrapped along with the user's amount
    assert_eq!(
        fx.vault.get_buffer_balance(WDAI).unwrap(),
        BufferBalances {
            underlying: 20_000,
            wrapped: 10_000
        }
    );
    assert_reserves_match(&fx.vault, DAI);
    assert_reserves_match(&fx.vault, WDAI);
}

#[test]
fn test_unwrap_through_wrapper_exact_out() {
    let mut fx = vault_with_buffer(RATE_TWO, 10_000, 5_000);
    let dai_before = fx.vault.tokens().balance_of(DAI, ALICE);

    let result = fx
        .vault
        .unlock(ALICE, |s| {
            pay(s, WDAI, ALICE, 7_500)?;
            let result = s.erc4626_buffer_wrap_or_unwrap(&wrap_params(
                WrappingDirection::Unwrap,
                SwapKind::ExactOut,
                15_000,
                7_500,
            ))?;
            s.send_to(DAI, ALICE, 15_000)?;
            Ok::<_, VaultError>(result)
        })
        .unwrap();

    assert_eq!(result.amount_in, 7_500);
    assert_eq!(fx.vault.tokens().balance_of(DAI, ALICE), dai_before + 15_000);
    assert_eq!(
        fx.vault.get_buffer_balance(WDAI).unwrap(),
        BufferBalances {
            underlying: 10_000,
            wrapped: 5_000
        }
    );
    assert_reserves_match(&fx.vault, DAI);
    assert_reserves_match(&fx.vault, WDAI);
}

/// Wrapper that reports one more share than it delivers
#[derive(Debug)]
struct OverReportingWrapper(Erc4626Wrapper);

impl Erc4626 for OverReportingWrapper {
    fn token(&self) -> TokenId {
        self.0.token()
    }
    fn asset(&self) -> TokenId {
        self.0.asset()
    }
    fn convert_to_assets(&self, shares: u128) -> Result<u128, TokenError> {
        self.0.convert_to_assets(shares)
    }
    fn convert_to_shares(&self, assets: u128) -> Result<u128, TokenError> {
        self.0.convert_to_shares(assets)
    }
    fn preview_deposit(&self, assets: u128) -> Result<u128, TokenError> {
        self.0.preview_deposit(assets)
    }
    fn preview_mint(&self, shares: u128) -> Result<u128, TokenError> {
        self.0.preview_mint(shares)
    }
    fn preview_withdraw(&self, assets: u128) -> Result<u128, TokenError> {
        self.0.preview_withdraw(assets)
    }
    fn preview_redeem(&self, shares: u128) -> Result<u128, TokenError> {
        self.0.preview_redeem(shares)
    }
    fn deposit(
        &self,
        tokens: &mut dyn TokenTransfer,
        assets: u128,
        receiver: AccountId,
    ) -> Result<u128, TokenError> {
        Ok(self.0.deposit(tokens, assets, receiver)? + 1)
    }
    fn mint(
        &self,
        tokens: &mut dyn TokenTransfer,
        shares: u128,
        receiver: AccountId,
    ) -> Result<u128, TokenError> {
        self.0.mint(tokens, shares, receiver)
    }
    fn withdraw(
        &self,
        tokens: &mut dyn TokenTransfer,
        assets: u128,
        receiver: AccountId,
        owner: AccountId,
    ) -> Result<u128, TokenError> {
        self.0.withdraw(tokens, assets, receiver, owner)
    }
    fn redeem(
        &self,
        tokens: &mut dyn TokenTransfer,
        shares: u128,
        receiver: AccountId,
        owner: AccountId,
    ) -> Result<u128, TokenError> {
        self.0.redeem(tokens, shares, receiver, owner)
    }
}

#[test]
fn test_wrapper_over_reporting_detected() {
    let wrapper = Arc::new(OverReportingWrapper(Erc4626Wrapper::new(WDAI, DAI)));
    let mut bank = funded_bank();
    wrapper.0.deposit(&mut bank, 100_000, ALICE).unwrap();

    let mut vault = Vault::new(VAULT, &test_settings(), bank).unwrap();
    vault.register_wrapper(wrapper).unwrap();
    vault
        .unlock(ALICE, |s| {
            s.initialize_buffer(WDAI, 1_000, 1_000, 0, ALICE)?;
            pay(s, DAI, ALICE, 1_000)?;
            pay(s, WDAI, ALICE, 1_000)
        })
        .unwrap();

    let err = vault
        .unlock(ALICE, |s| {
            pay(s, DAI, ALICE, 5_000)?;
            s.erc4626_buffer_wrap_or_unwrap(&wrap_params(
                WrappingDirection::Wrap,
                SwapKind::ExactIn,
                5_000,
                0,
            ))
        })
        .unwrap_err();
    assert!(matches!(err, VaultError::WrongWrappedAmount { .. }));
    assert_reserves_match(&vault, WDAI);
}

proptest! {
    #[test]
    fn prop_buffer_round_trip_preserves_value(u in 0u128..100_000, w in 0u128..50_000) {
        let mut fx = vault_with_buffer(RATE_TWO, 10_000, 5_000);

        let shares = fx
            .vault
            .unlock(BOB, |s| {
                let shares = s.add_liquidity_to_buffer(WDAI, u, w, 0, BOB)?;
                pay(s, DAI, BOB, u)?;
                pay(s, WDAI, BOB, w)?;
                Ok::<_, VaultError>(shares)
            })
            .unwrap();
        prop_assert_eq!(shares, u + 2 * w);

        let removal = fx
            .vault
            .unlock(BOB, |s| {
                let removal = s.remove_liquidity_from_buffer(WDAI, shares, 0, 0, BOB)?;
                s.send_to(DAI, BOB, removal.underlying)?;
                s.send_to(WDAI, BOB, removal.wrapped)?;
                Ok::<_, VaultError>(removal)
            })
            .unwrap();

        let value_in = u + 2 * w;
        let value_out = removal.underlying + 2 * removal.wrapped;
        prop_assert!(value_out <= value_in);
        prop_assert!(value_in - value_out <= 3);
        prop_assert_eq!(fx.vault.get_buffer_total_shares(WDAI).unwrap(), 20_000);
    }

    #[test]
    fn prop_unwrap_inverts_wrap(rate in ONE..3 * ONE, amount in 10u128..4_000) {
        let mut fx = vault_with_buffer(rate, 10_000, 5_000);

        let (wrapped, back) = fx
            .vault
            .unlock(ALICE, |s| {
                let wrap = s.erc4626_buffer_wrap_or_unwrap(&wrap_params(
                    WrappingDirection::Wrap,
                    SwapKind::ExactIn,
                    amount,
                    0,
                ))?;
                let unwrap = s.erc4626_buffer_wrap_or_unwrap(&wrap_params(
                    WrappingDirection::Unwrap,
                    SwapKind::ExactIn,
                    wrap.amount_out,
                    0,
                ))?;
                pay(s, DAI, ALICE, amount - unwrap.amount_out)?;
                Ok::<_, VaultError>((wrap.amount_out, unwrap.amount_out))
            })
            .unwrap();

        prop_assert!(wrapped > 0);
        prop_assert!(back <= amount);
        prop_assert!(amount - back <= 4);
    }
}
