//! Query mode: simulated operations leave no trace

mod common;

use common::*;
use keel_types::{SwapKind, WrappingDirection};
use keel_vault::{BufferWrapOrUnwrapParams, TokenTransfer, Vault, VaultError, VaultSwapParams};

fn swap_x_for_y(amount: u128) -> VaultSwapParams {
    VaultSwapParams {
        kind: SwapKind::ExactIn,
        pool: POOL_XY,
        token_in: X,
        token_out: Y,
        amount_given: amount,
        limit: 0,
    }
}

#[test_log::test]
fn test_quote_matches_real_swap_and_persists_nothing() {
    let mut vault = vault_with_pool();

    let quoted = vault
        .quote(ALICE, |s| {
            assert!(s.is_query());
            assert!(s.is_unlocked());
            // Unsettled deltas are fine in a query
            s.swap(&swap_x_for_y(100))
        })
        .unwrap();

    assert_eq!(vault.get_pool_balances(POOL_XY).unwrap(), vec![1_000, 1_000]);
    assert!(!vault.is_unlocked());
    assert_eq!(vault.get_nonzero_delta_count(), 0);

    let executed = vault
        .unlock(ALICE, |s| {
            let result = s.swap(&swap_x_for_y(100))?;
            pay(s, X, ALICE, result.amount_in)?;
            s.send_to(Y, ALICE, result.amount_out)?;
            Ok::<_, VaultError>(result)
        })
        .unwrap();

    assert_eq!(quoted, executed);
}

#[test]
fn test_quote_discards_physical_and_buffer_changes() {
    let mut fx = vault_with_buffer(RATE_TWO, 10_000, 5_000);

    fx.vault
        .quote(ALICE, |s| {
            pay(s, DAI, ALICE, 1_000)?;
            s.add_liquidity_to_buffer(WDAI, 1_000, 0, 0, ALICE)?;
            s.erc4626_buffer_wrap_or_unwrap(&BufferWrapOrUnwrapParams {
                kind: SwapKind::ExactIn,
                direction: WrappingDirection::Wrap,
                wrapped: WDAI,
                amount_given: 2_000,
                limit: 0,
            })
        })
        .unwrap();

    assert_eq!(fx.vault.get_buffer_total_shares(WDAI).unwrap(), 20_000);
    assert_eq!(fx.vault.get_buffer_owner_shares(WDAI, ALICE).unwrap(), fx.issued);
    assert_eq!(fx.vault.get_buffer_balance(WDAI).unwrap().underlying, 10_000);
    assert_eq!(fx.vault.tokens().balance_of(DAI, ALICE), FUNDING / 2 - 10_000);
    assert_reserves_match(&fx.vault, DAI);
}

#[test]
fn test_quote_past_buffer_inventory_uses_wrapper_previews() {
    let mut fx = vault_with_buffer(RATE_TWO, 10_000, 5_000);
    let wrap = BufferWrapOrUnwrapParams {
        kind: SwapKind::ExactIn,
        direction: WrappingDirection::Wrap,
        wrapped: WDAI,
        amount_given: 20_000,
        limit: 0,
    };
    let unwrap = BufferWrapOrUnwrapParams {
        kind: SwapKind::ExactOut,
        direction: WrappingDirection::Unwrap,
        wrapped: WDAI,
        amount_given: 12_000,
        limit: 6_000,
    };

    // Nothing is paid in, so the vault holds only the buffer's own inventory
    let (wrapped, unwrapped) = fx
        .vault
        .quote(ALICE, |s| {
            let wrapped = s.erc4626_buffer_wrap_or_unwrap(&wrap)?;
            let unwrapped = s.erc4626_buffer_wrap_or_unwrap(&unwrap)?;
            Ok::<_, VaultError>((wrapped, unwrapped))
        })
        .unwrap();
    assert_eq!(wrapped.amount_out, 10_000);
    assert_eq!(unwrapped.amount_in, 6_000);
    assert_eq!(fx.vault.get_buffer_balance(WDAI).unwrap().wrapped, 5_000);
    assert_reserves_match(&fx.vault, DAI);
    assert_reserves_match(&fx.vault, WDAI);

    let executed = fx
        .vault
        .unlock(ALICE, |s| {
            pay(s, DAI, ALICE, 20_000)?;
            let result = s.erc4626_buffer_wrap_or_unwrap(&wrap)?;
            s.send_to(WDAI, ALICE, result.amount_out)?;
            Ok::<_, VaultError>(result)
        })
        .unwrap();
    assert_eq!(executed, wrapped);
}

#[test]
fn test_quote_inside_unlock_is_rejected() {
    let mut vault = vault_with_pool();

    let err = vault
        .unlock(ALICE, |s| s.quote(ALICE, |_| Ok::<_, VaultError>(())))
        .unwrap_err();
    assert!(matches!(err, VaultError::NotStaticCall));
}

#[test]
fn test_nested_quote_and_unlock_inside_quote() {
    let mut vault = vault_with_pool();

    let depth = vault
        .quote(ALICE, |outer| {
            outer.quote(BOB, |inner| {
                assert_eq!(inner.sender(), Some(ALICE));
                Ok::<_, VaultError>(())
            })?;
            outer.unlock(BOB, |inner| {
                assert!(inner.is_query());
                inner.take_debt(X, 1)?;
                Ok::<_, VaultError>(inner.depth())
            })
        })
        .unwrap();

    assert_eq!(depth, 2);
    assert_eq!(vault.get_token_delta(X), 0);
}

#[test]
fn test_query_switches() {
    let mut vault = vault_with_pool();

    vault.disable_query();
    assert!(vault.is_query_disabled());
    let err = vault
        .quote(ALICE, |_| Ok::<_, VaultError>(()))
        .unwrap_err();
    assert!(matches!(err, VaultError::QueriesDisabled));

    vault.enable_query().unwrap();
    assert!(vault.quote(ALICE, |_| Ok::<_, VaultError>(())).is_ok());

    vault.disable_query_permanently();
    assert!(vault.is_query_disabled_permanently());
    assert!(matches!(
        vault.enable_query(),
        Err(VaultError::QueriesDisabledPermanently)
    ));
    assert!(vault.quote(ALICE, |_| Ok::<_, VaultError>(())).is_err());
}

#[test]
fn test_queries_disabled_by_settings() {
    let settings = keel_config::VaultSettings {
        queries_enabled: false,
        ..test_settings()
    };
    let mut vault = Vault::new(VAULT, &settings, funded_bank()).unwrap();

    assert!(vault.is_query_disabled());
    assert!(matches!(
        vault.quote(ALICE, |_| Ok::<_, VaultError>(())),
        Err(VaultError::QueriesDisabled)
    ));
}
