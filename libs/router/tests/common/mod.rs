//! Shared fixture for router scenario tests
//!
//! Two funded users holding native value and every test token, constant-product pools over
//! (X, Y), (Y, Z), (WETH, X) and (WDAI, X), a WDAI buffer, and a pool nesting the (X, Y) BPT
//! next to Z. Every pool is seeded by BOB so ALICE starts with untouched balances.

#![allow(dead_code)]

use keel_amm::{ConstantProductPool, Pool};
use keel_config::{RouterSettings, VaultSettings};
use keel_types::fixed_point::ONE;
use keel_types::{AccountId, Address, PoolId, TokenId, NATIVE_ASSET};
use keel_vault::{Erc4626, Erc4626Wrapper, TokenBank, TokenTransfer, Vault, VaultError, VaultSession};
use std::sync::Arc;

pub const VAULT: AccountId = Address::from_low_u64(0x7a017);
pub const ROUTER: AccountId = Address::from_low_u64(0xb47c4);
pub const BATCH_ROUTER: AccountId = Address::from_low_u64(0xba7c4);
pub const BUFFER_ROUTER: AccountId = Address::from_low_u64(0xbf4c4);
pub const COMPOSITE_ROUTER: AccountId = Address::from_low_u64(0xc0c4);
pub const ALICE: AccountId = Address::from_low_u64(0xa11ce);
pub const BOB: AccountId = Address::from_low_u64(0xb0b);

pub const X: TokenId = Address::from_low_u64(0x10);
pub const Y: TokenId = Address::from_low_u64(0x11);
pub const Z: TokenId = Address::from_low_u64(0x12);
pub const DAI: TokenId = Address::from_low_u64(0x20);
pub const WDAI: TokenId = Address::from_low_u64(0x21);
pub const WETH: TokenId = Address::from_low_u64(0x30);

pub const POOL_XY: PoolId = Address::from_low_u64(0x100);
pub const POOL_YZ: PoolId = Address::from_low_u64(0x101);
pub const POOL_WETH_X: PoolId = Address::from_low_u64(0x102);
pub const POOL_WDAI_X: PoolId = Address::from_low_u64(0x103);
/// Holds (X, Y) BPT next to Z
pub const POOL_NESTED: PoolId = Address::from_low_u64(0x104);

pub const FUNDING: u128 = 1_000_000;
/// Two assets per share
pub const RATE_TWO: u128 = 2 * ONE;

pub const BUFFER_UNDERLYING: u128 = 10_000;
pub const BUFFER_WRAPPED: u128 = 5_000;

pub fn test_settings() -> VaultSettings {
    VaultSettings {
        minimum_trade_amount: 1,
        minimum_wrap_amount: 1,
        pool_minimum_total_supply: 10,
        buffer_minimum_total_supply: 10,
        ..VaultSettings::default()
    }
}

pub fn router_settings() -> RouterSettings {
    RouterSettings { weth: Some(WETH) }
}

/// Every user holds each token, native value and WETH; the WETH contract holds the native
/// value backing the WETH in circulation
pub fn funded_bank() -> TokenBank {
    let mut bank = TokenBank::new();
    for user in [ALICE, BOB] {
        for token in [X, Y, Z, DAI, WETH, NATIVE_ASSET] {
            bank.mint(token, user, FUNDING).unwrap();
        }
    }
    bank.mint(NATIVE_ASSET, WETH, 2 * FUNDING).unwrap();
    bank
}

pub fn pay(
    session: &mut VaultSession<'_>,
    token: TokenId,
    from: AccountId,
    amount: u128,
) -> Result<(), VaultError> {
    if amount == 0 {
        return Ok(());
    }
    session.transfer(token, from, VAULT, amount)?;
    session.settle_exact(token, amount)?;
    Ok(())
}

/// Register a fee-less constant product pool and seed it from BOB
pub fn seed_pool(vault: &mut Vault, pool: PoolId, tokens: [TokenId; 2], balances: [u128; 2]) -> u128 {
    let capability: Arc<dyn Pool> = Arc::new(ConstantProductPool::new());
    vault
        .register_pool(pool, tokens.to_vec(), capability, 0)
        .unwrap();
    vault
        .unlock(BOB, |s| {
            let bpt = s.initialize(pool, BOB, &balances, 0)?;
            for (token, amount) in tokens.iter().zip(balances) {
                pay(s, *token, BOB, amount)?;
            }
            Ok::<_, VaultError>(bpt)
        })
        .unwrap()
}

/// Funded vault with the WDAI wrapper registered and half of each user's DAI wrapped
pub fn base_vault() -> Vault {
    let wrapper = Arc::new(Erc4626Wrapper::with_rate(WDAI, DAI, RATE_TWO));
    let mut bank = funded_bank();
    for user in [ALICE, BOB] {
        wrapper.deposit(&mut bank, FUNDING / 2, user).unwrap();
    }
    let mut vault = Vault::new(VAULT, &test_settings(), bank).unwrap();
    vault.register_wrapper(wrapper).unwrap();
    vault
}

/// The full fixture; all pools at 1000/1000 except the nested pool at 500/500
pub fn fixture() -> Vault {
    let mut vault = base_vault();
    seed_pool(&mut vault, POOL_XY, [X, Y], [1_000, 1_000]);
    seed_pool(&mut vault, POOL_YZ, [Y, Z], [1_000, 1_000]);
    seed_pool(&mut vault, POOL_WETH_X, [WETH, X], [1_000, 1_000]);
    seed_pool(&mut vault, POOL_WDAI_X, [WDAI, X], [1_000, 1_000]);
    seed_pool(&mut vault, POOL_NESTED, [POOL_XY, Z], [500, 500]);

    vault
        .unlock(BOB, |s| {
            s.initialize_buffer(WDAI, BUFFER_UNDERLYING, BUFFER_WRAPPED, 0, BOB)?;
            pay(s, DAI, BOB, BUFFER_UNDERLYING)?;
            pay(s, WDAI, BOB, BUFFER_WRAPPED)?;
            Ok::<_, VaultError>(())
        })
        .unwrap();
    vault
}

/// Snapshot of one account's balances, for before/after comparisons
pub fn balances_of(vault: &Vault, account: AccountId, tokens: &[TokenId]) -> Vec<u128> {
    tokens.iter().map(|t| vault.balance_of(*t, account)).collect()
}

/// The vault is locked again and holds exactly its reserves of every token
pub fn assert_settled(vault: &Vault) {
    assert!(!vault.is_unlocked());
    for token in [X, Y, Z, DAI, WDAI, WETH, POOL_XY] {
        assert_eq!(
            vault.balance_of(token, VAULT),
            vault.get_reserves_of(token),
            "physical balance and reserves of {} diverged",
            token
        );
    }
}

/// Routers hold nothing between calls
pub fn assert_router_empty(vault: &Vault, router: AccountId) {
    for token in [X, Y, Z, DAI, WDAI, WETH, NATIVE_ASSET, POOL_XY] {
        assert_eq!(vault.balance_of(token, router), 0, "router kept {}", token);
    }
}
