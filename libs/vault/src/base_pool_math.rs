//! Liquidity math shared by every pool type
//!
//! Proportional operations need only balances and BPT supply. Unbalanced and single-token
//! operations go through the pool's invariant and charge the swap fee on the part of the
//! operation that is not proportional, since that part is economically a swap.

use crate::error::VaultError;
use keel_amm::Pool;
use keel_types::{fixed_point, PoolId, Rounding};

/// Token amounts with the fee charged on each
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidityAmounts {
    pub bpt: u128,
    pub amounts: Vec<u128>,
    pub swap_fees: Vec<u128>,
}

fn rejected(pool: PoolId) -> impl Fn(anyhow::Error) -> VaultError {
    move |e| VaultError::PoolRejected {
        pool,
        reason: format!("{:#}", e),
    }
}

/// Amounts in for `bpt_out`, rounded up
pub fn proportional_amounts_in(
    balances: &[u128],
    total_supply: u128,
    bpt_out: u128,
) -> Result<Vec<u128>, VaultError> {
    balances
        .iter()
        .map(|b| Ok(fixed_point::mul_div_up(*b, bpt_out, total_supply)?))
        .collect()
}

/// Amounts out for `bpt_in`, rounded down
pub fn proportional_amounts_out(
    balances: &[u128],
    total_supply: u128,
    bpt_in: u128,
) -> Result<Vec<u128>, VaultError> {
    balances
        .iter()
        .map(|b| Ok(fixed_point::mul_div_down(*b, bpt_in, total_supply)?))
        .collect()
}

/// BPT out for exact amounts in
pub fn add_liquidity_unbalanced(
    pool_id: PoolId,
    pool: &dyn Pool,
    balances: &[u128],
    exact_amounts: &[u128],
    total_supply: u128,
    swap_fee_percentage: u128,
) -> Result<LiquidityAmounts, VaultError> {
    let reject = rejected(pool_id);
    let mut new_balances = balances
        .iter()
        .zip(exact_amounts)
        .map(|(b, a)| fixed_point::add(*b, *a))
        .collect::<Result<Vec<_>, _>>()?;

    let current_invariant = pool
        .compute_invariant(balances, Rounding::RoundUp)
        .map_err(&reject)?;
    let new_invariant = pool
        .compute_invariant(&new_balances, Rounding::RoundDown)
        .map_err(&reject)?;
    let invariant_ratio = fixed_point::div_down(new_invariant, current_invariant)?;

    let mut swap_fees = vec![0u128; balances.len()];
    for (i, balance) in balances.iter().enumerate() {
        let proportional = fixed_point::mul_up(invariant_ratio, *balance)?;
        if new_balances[i] > proportional {
            let taxable = new_balances[i] - proportional;
            swap_fees[i] = fixed_point::mul_up(taxable, swap_fee_percentage)?;
            new_balances[i] -= swap_fees[i];
        }
    }

    let invariant_with_fees = pool
        .compute_invariant(&new_balances, Rounding::RoundDown)
        .map_err(&reject)?;
    let growth = invariant_with_fees.saturating_sub(current_invariant);
    let bpt = fixed_point::mul_div_down(total_supply, growth, current_invariant)?;

    Ok(LiquidityAmounts {
        bpt,
        amounts: exact_amounts.to_vec(),
        swap_fees,
    })
}

/// Single token in for exact BPT out
pub fn add_liquidity_single_token_exact_out(
    pool_id: PoolId,
    pool: &dyn Pool,
    balances: &[u128],
    token_index: usize,
    exact_bpt_out: u128,
    total_supply: u128,
    swap_fee_percentage: u128,
) -> Result<LiquidityAmounts, VaultError> {
    let new_supply = fixed_point::add(total_supply, exact_bpt_out)?;
    let invariant_ratio = fixed_point::div_up(new_supply, total_supply)?;
    let new_balance = pool
        .compute_balance(balances, token_index, invariant_ratio)
        .map_err(rejected(pool_id))?;

    let amount_in = fixed_point::sub(new_balance, balances[token_index])?;
    let non_taxable = fixed_point::mul_div_up(new_supply, balances[token_index], total_supply)?;
    let taxable = new_balance.saturating_sub(non_taxable);
    let fee = fixed_point::div_up(taxable, fixed_point::complement(swap_fee_percentage))?
        .saturating_sub(taxable);

    let mut amounts = vec![0u128; balances.len()];
    let mut swap_fees = vec![0u128; balances.len()];
    amounts[token_index] = fixed_point::add(amount_in, fee)?;
    swap_fees[token_index] = fee;
    Ok(LiquidityAmounts {
        bpt: exact_bpt_out,
        amounts,
        swap_fees,
    })
}

/// Single token out for exact BPT in
pub fn remove_liquidity_single_token_exact_in(
    pool_id: PoolId,
    pool: &dyn Pool,
    balances: &[u128],
    token_index: usize,
    exact_bpt_in: u128,
    total_supply: u128,
    swap_fee_percentage: u128,
) -> Result<LiquidityAmounts, VaultError> {
    let new_supply = fixed_point::sub(total_supply, exact_bpt_in)?;
    let invariant_ratio = fixed_point::div_up(new_supply, total_supply)?;
    let new_balance = pool
        .compute_balance(balances, token_index, invariant_ratio)
        .map_err(rejected(pool_id))?;

    let amount_out = fixed_point::sub(balances[token_index], new_balance)?;
    let balance_before_tax = fixed_point::mul_div_up(new_supply, balances[token_index], total_supply)?;
    let taxable = balance_before_tax.saturating_sub(new_balance);
    let fee = fixed_point::mul_up(taxable, swap_fee_percentage)?;

    let mut amounts = vec![0u128; balances.len()];
    let mut swap_fees = vec![0u128; balances.len()];
    amounts[token_index] = fixed_point::sub(amount_out, fee)?;
    swap_fees[token_index] = fee;
    Ok(LiquidityAmounts {
        bpt: exact_bpt_in,
        amounts,
        swap_fees,
    })
}

/// BPT in for an exact single token out
pub fn remove_liquidity_single_token_exact_out(
    pool_id: PoolId,
    pool: &dyn Pool,
    balances: &[u128],
    token_index: usize,
    exact_amount_out: u128,
    total_supply: u128,
    swap_fee_percentage: u128,
) -> Result<LiquidityAmounts, VaultError> {
    let reject = rejected(pool_id);
    let mut new_balances = balances.to_vec();
    new_balances[token_index] = fixed_point::sub(balances[token_index], exact_amount_out)?;

    let current_invariant = pool
        .compute_invariant(balances, Rounding::RoundUp)
        .map_err(&reject)?;
    let invariant_ratio = fixed_point::div_up(
        pool.compute_invariant(&new_balances, Rounding::RoundUp)
            .map_err(&reject)?,
        current_invariant,
    )?;

    let taxable = fixed_point::mul_up(invariant_ratio, balances[token_index])?
        .saturating_sub(new_balances[token_index]);
    let fee = fixed_point::div_up(taxable, fixed_point::complement(swap_fee_percentage))?
        .saturating_sub(taxable);
    new_balances[token_index] = fixed_point::sub(new_balances[token_index], fee)?;

    let invariant_with_fees = pool
        .compute_invariant(&new_balances, Rounding::RoundDown)
        .map_err(&reject)?;
    let bpt = fixed_point::mul_div_up(
        total_supply,
        current_invariant.saturating_sub(invariant_with_fees),
        current_invariant,
    )?;

    let mut amounts = vec![0u128; balances.len()];
    let mut swap_fees = vec![0u128; balances.len()];
    amounts[token_index] = exact_amount_out;
    swap_fees[token_index] = fee;
    Ok(LiquidityAmounts {
        bpt,
        amounts,
        swap_fees,
    })
}
