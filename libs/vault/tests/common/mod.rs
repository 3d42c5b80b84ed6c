//! Shared fixture for vault scenario tests
//!
//! Two funded users, a constant-product pool over (X, Y) and an ERC4626 buffer for a wrapped
//! DAI, all held by one in-memory token bank.

#![allow(dead_code)]

use keel_amm::{ConstantProductPool, ConstantSumPool, Pool};
use keel_config::VaultSettings;
use keel_types::fixed_point::ONE;
use keel_types::{AccountId, Address, PoolId, TokenId};
use keel_vault::{
    Erc4626, Erc4626Wrapper, FeeController, TokenBank, TokenTransfer, Vault, VaultError,
    VaultSession,
};
use std::sync::Arc;

pub const VAULT: AccountId = Address::from_low_u64(0x7a017);
pub const ALICE: AccountId = Address::from_low_u64(0xa11ce);
pub const BOB: AccountId = Address::from_low_u64(0xb0b);

pub const X: TokenId = Address::from_low_u64(0x10);
pub const Y: TokenId = Address::from_low_u64(0x11);
pub const Z: TokenId = Address::from_low_u64(0x12);
pub const DAI: TokenId = Address::from_low_u64(0x20);
pub const WDAI: TokenId = Address::from_low_u64(0x21);

pub const POOL_XY: PoolId = Address::from_low_u64(0x100);

pub const FUNDING: u128 = 1_000_000;

/// Limits small enough for hand-checked amounts
pub fn test_settings() -> VaultSettings {
    VaultSettings {
        minimum_trade_amount: 1,
        minimum_wrap_amount: 1,
        pool_minimum_total_supply: 10,
        buffer_minimum_total_supply: 10,
        ..VaultSettings::default()
    }
}

pub fn funded_bank() -> TokenBank {
    let mut bank = TokenBank::new();
    for user in [ALICE, BOB] {
        for token in [X, Y, Z, DAI] {
            bank.mint(token, user, FUNDING).unwrap();
        }
    }
    bank
}

pub fn new_vault() -> Vault {
    Vault::new(VAULT, &test_settings(), funded_bank()).unwrap()
}

/// Move `amount` into the vault and credit it against the ledger
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

/// Register and seed a pool, paid for by BOB
pub fn seed_pool(
    vault: &mut Vault,
    pool: PoolId,
    tokens: [TokenId; 2],
    balances: [u128; 2],
    capability: Arc<dyn Pool>,
    swap_fee_percentage: u128,
) -> u128 {
    vault
        .register_pool(pool, tokens.to_vec(), capability, swap_fee_percentage)
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

/// Vault with a fee-less constant product pool over (X, Y) at 1000/1000
pub fn vault_with_pool() -> Vault {
    vault_with_pool_fees(0, None)
}

pub fn vault_with_pool_fees(
    swap_fee_percentage: u128,
    fee_controller: Option<Arc<dyn FeeController>>,
) -> Vault {
    let mut vault = new_vault();
    if let Some(controller) = fee_controller {
        vault = vault.with_fee_controller(controller);
    }
    seed_pool(
        &mut vault,
        POOL_XY,
        [X, Y],
        [1_000, 1_000],
        Arc::new(ConstantProductPool::new()),
        swap_fee_percentage,
    );
    vault
}

/// Vault with a constant sum pool over (X, Y) at 1000/1000
pub fn vault_with_linear_pool() -> Vault {
    let mut vault = new_vault();
    seed_pool(
        &mut vault,
        POOL_XY,
        [X, Y],
        [1_000, 1_000],
        Arc::new(ConstantSumPool::new()),
        0,
    );
    vault
}

pub struct BufferFixture {
    pub vault: Vault,
    pub wrapper: Arc<Erc4626Wrapper>,
    pub issued: u128,
}

/// Vault with a WDAI buffer at `rate` assets per share, seeded by ALICE
pub fn vault_with_buffer(rate: u128, underlying: u128, wrapped: u128) -> BufferFixture {
    vault_with_buffer_settings(test_settings(), rate, underlying, wrapped)
}

pub fn vault_with_buffer_settings(
    settings: VaultSettings,
    rate: u128,
    underlying: u128,
    wrapped: u128,
) -> BufferFixture {
    let wrapper = Arc::new(Erc4626Wrapper::with_rate(WDAI, DAI, rate));
    let mut bank = funded_bank();
    for user in [ALICE, BOB] {
        wrapper.deposit(&mut bank, FUNDING / 2, user).unwrap();
    }

    let mut vault = Vault::new(VAULT, &settings, bank).unwrap();
    vault.register_wrapper(wrapper.clone()).unwrap();
    let issued = vault
        .unlock(ALICE, |s| {
            let issued = s.initialize_buffer(WDAI, underlying, wrapped, 0, ALICE)?;
            pay(s, DAI, ALICE, underlying)?;
            pay(s, WDAI, ALICE, wrapped)?;
            Ok::<_, VaultError>(issued)
        })
        .unwrap();

    BufferFixture {
        vault,
        wrapper,
        issued,
    }
}

/// Rate of two assets per share
pub const RATE_TWO: u128 = 2 * ONE;

/// The vault's physical holdings match its Reserves for `token`
pub fn assert_reserves_match(vault: &Vault, token: TokenId) {
    assert_eq!(
        vault.balance_of(token, VAULT),
        vault.get_reserves_of(token),
        "physical balance and reserves of {} diverged",
        token
    );
}
