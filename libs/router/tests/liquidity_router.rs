//! Pool initialization and liquidity through the single-pool router

mod common;

use common::*;
use keel_amm::ConstantProductPool;
use keel_router::{Router, RouterContext, RouterError};
use keel_types::{Address, PoolId};
use keel_vault::VaultError;
use std::sync::Arc;

const POOL_XZ: PoolId = Address::from_low_u64(0x1ff);

fn router() -> Router {
    Router::new(ROUTER, &router_settings())
}

#[test_log::test]
fn test_initialize_through_router() {
    let mut vault = fixture();
    vault
        .register_pool(POOL_XZ, vec![X, Z], Arc::new(ConstantProductPool::new()), 0)
        .unwrap();

    let bpt = router()
        .initialize(&mut vault, &RouterContext::new(ALICE), POOL_XZ, &[1_000, 1_000], 0, false)
        .unwrap();

    // sqrt(1000 * 1000) less the locked minimum supply
    assert_eq!(bpt, 990);
    assert_eq!(vault.balance_of(POOL_XZ, ALICE), 990);
    assert_eq!(vault.balance_of(X, ALICE), FUNDING - 1_000);
    assert_eq!(vault.balance_of(Z, ALICE), FUNDING - 1_000);
    assert_settled(&vault);
}

#[test]
fn test_initialize_below_min_bpt_rolls_back() {
    let mut vault = fixture();
    vault
        .register_pool(POOL_XZ, vec![X, Z], Arc::new(ConstantProductPool::new()), 0)
        .unwrap();

    let err = router()
        .initialize(&mut vault, &RouterContext::new(ALICE), POOL_XZ, &[1_000, 1_000], 991, false)
        .unwrap_err();

    assert!(matches!(
        err,
        RouterError::Vault(VaultError::BptAmountOutBelowMin { amount: 990, min: 991 })
    ));
    assert_eq!(vault.balance_of(X, ALICE), FUNDING);
    assert_eq!(vault.balance_of(POOL_XZ, ALICE), 0);
}

#[test]
fn test_add_proportional_pays_exact_share() {
    let mut vault = fixture();
    let router = router();

    let quoted = router
        .query_add_liquidity_proportional(&mut vault, ALICE, POOL_XY, 100)
        .unwrap();
    let paid = router
        .add_liquidity_proportional(
            &mut vault,
            &RouterContext::new(ALICE),
            POOL_XY,
            &[200, 200],
            100,
            false,
        )
        .unwrap();

    assert_eq!(paid, vec![100, 100]);
    assert_eq!(paid, quoted);
    assert_eq!(vault.balance_of(POOL_XY, ALICE), 100);
    assert_eq!(vault.balance_of(X, ALICE), FUNDING - 100);
    assert_eq!(vault.get_pool_balances(POOL_XY).unwrap(), vec![1_100, 1_100]);
    assert_settled(&vault);
}

#[test]
fn test_add_proportional_above_max_rolls_back() {
    let mut vault = fixture();

    let err = router()
        .add_liquidity_proportional(
            &mut vault,
            &RouterContext::new(ALICE),
            POOL_XY,
            &[99, 200],
            100,
            false,
        )
        .unwrap_err();

    assert!(matches!(
        err,
        RouterError::Vault(VaultError::AmountInAboveMax {
            amount: 100,
            max: 99,
            ..
        })
    ));
    assert_eq!(vault.balance_of(POOL_XY, ALICE), 0);
    assert_eq!(vault.get_pool_balances(POOL_XY).unwrap(), vec![1_000, 1_000]);
}

#[test]
fn test_add_unbalanced_matches_query() {
    let mut vault = fixture();
    let router = router();

    let quoted = router
        .query_add_liquidity_unbalanced(&mut vault, ALICE, POOL_XY, &[100, 0])
        .unwrap();
    let bpt = router
        .add_liquidity_unbalanced(
            &mut vault,
            &RouterContext::new(ALICE),
            POOL_XY,
            &[100, 0],
            quoted,
            false,
        )
        .unwrap();

    assert!(bpt > 0);
    assert_eq!(bpt, quoted);
    assert_eq!(vault.balance_of(POOL_XY, ALICE), bpt);
    assert_eq!(vault.balance_of(X, ALICE), FUNDING - 100);
    assert_eq!(vault.balance_of(Y, ALICE), FUNDING);
    assert_settled(&vault);
}

#[test]
fn test_add_single_token_exact_out_matches_query() {
    let mut vault = fixture();
    let router = router();

    let quoted = router
        .query_add_liquidity_single_token_exact_out(&mut vault, ALICE, POOL_XY, Y, 50)
        .unwrap();
    let paid = router
        .add_liquidity_single_token_exact_out(
            &mut vault,
            &RouterContext::new(ALICE),
            POOL_XY,
            Y,
            quoted,
            50,
            false,
        )
        .unwrap();

    assert_eq!(paid, quoted);
    assert_eq!(vault.balance_of(POOL_XY, ALICE), 50);
    assert_eq!(vault.balance_of(Y, ALICE), FUNDING - paid);
    assert_eq!(vault.balance_of(X, ALICE), FUNDING);
    assert_settled(&vault);
}

#[test]
fn test_remove_proportional_pays_pro_rata() {
    let mut vault = fixture();
    let router = router();
    let before = balances_of(&vault, BOB, &[X, Y]);

    let quoted = router
        .query_remove_liquidity_proportional(&mut vault, BOB, POOL_XY, 100)
        .unwrap();
    let out = router
        .remove_liquidity_proportional(
            &mut vault,
            &RouterContext::new(BOB),
            POOL_XY,
            100,
            &[100, 100],
            false,
        )
        .unwrap();

    assert_eq!(out, vec![100, 100]);
    assert_eq!(out, quoted);
    let after = balances_of(&vault, BOB, &[X, Y]);
    assert_eq!(after[0] - before[0], 100);
    assert_eq!(after[1] - before[1], 100);
    assert_eq!(vault.balance_of(POOL_XY, BOB), 390);
    assert_settled(&vault);
}

#[test]
fn test_remove_single_token_exact_in_quoted_for_account_without_bpt() {
    let mut vault = fixture();
    let router = router();
    assert_eq!(vault.balance_of(POOL_XY, ALICE), 0);

    let quoted = router
        .query_remove_liquidity_single_token_exact_in(&mut vault, ALICE, POOL_XY, 100, X)
        .unwrap();
    let before = vault.balance_of(X, BOB);
    let out = router
        .remove_liquidity_single_token_exact_in(
            &mut vault,
            &RouterContext::new(BOB),
            POOL_XY,
            100,
            X,
            quoted,
            false,
        )
        .unwrap();

    assert!(out > 100);
    assert_eq!(out, quoted);
    assert_eq!(vault.balance_of(X, BOB) - before, out);
    assert_eq!(vault.balance_of(POOL_XY, ALICE), 0);
    assert_settled(&vault);
}

#[test]
fn test_remove_single_token_exact_out_matches_query() {
    let mut vault = fixture();
    let router = router();

    let quoted = router
        .query_remove_liquidity_single_token_exact_out(&mut vault, BOB, POOL_XY, Y, 50)
        .unwrap();
    let before = balances_of(&vault, BOB, &[Y, POOL_XY]);
    let bpt = router
        .remove_liquidity_single_token_exact_out(
            &mut vault,
            &RouterContext::new(BOB),
            POOL_XY,
            quoted,
            Y,
            50,
            false,
        )
        .unwrap();

    assert_eq!(bpt, quoted);
    let after = balances_of(&vault, BOB, &[Y, POOL_XY]);
    assert_eq!(after[0] - before[0], 50);
    assert_eq!(before[1] - after[1], bpt);
    assert_settled(&vault);
}

#[test]
fn test_remove_more_bpt_than_held_fails() {
    let mut vault = fixture();

    let err = router()
        .remove_liquidity_proportional(
            &mut vault,
            &RouterContext::new(ALICE),
            POOL_XY,
            100,
            &[0, 0],
            false,
        )
        .unwrap_err();

    assert!(matches!(err, RouterError::Vault(_)));
    assert_eq!(vault.get_pool_balances(POOL_XY).unwrap(), vec![1_000, 1_000]);
    assert_settled(&vault);
}
