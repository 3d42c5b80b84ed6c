//! 18-decimal fixed-point arithmetic with explicit rounding
//!
//! Swap fee percentages, protocol fee splits, invariant ratios and token rates are all stored
//! as `u128` values scaled by [`ONE`] (10^18). Products are computed in 256-bit intermediates so
//! `a * b` never overflows before the scale is divided back out.
//!
//! ## Design Principles
//!
//! - **No Precision Loss**: values stay integers end to end
//! - **Overflow Protection**: every operation is checked and returns [`MathError`]
//! - **Rounding is a caller decision**: each operation has a `_down` and an `_up` flavour, and
//!   the vault always picks the one that favours itself
//! - **Decimal boundary**: configuration percentages enter through [`from_decimal`] and leave
//!   through [`to_decimal`]; nothing inside the vault touches floating point

use crate::common::errors::MathError;
use ethnum::U256;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// 1.0 in 18-decimal fixed point
pub const ONE: u128 = 1_000_000_000_000_000_000;

#[inline]
fn narrow(value: U256, operation: &'static str) -> Result<u128, MathError> {
    if value > U256::from(u128::MAX) {
        return Err(MathError::Overflow { operation });
    }
    Ok(value.as_u128())
}

/// `a * b / c`, rounded down, with a 256-bit intermediate
pub fn mul_div_down(a: u128, b: u128, c: u128) -> Result<u128, MathError> {
    if c == 0 {
        return Err(MathError::DivisionByZero {
            operation: "mul_div_down",
        });
    }
    let product = U256::from(a) * U256::from(b);
    narrow(product / U256::from(c), "mul_div_down")
}

/// `a * b / c`, rounded up, with a 256-bit intermediate
pub fn mul_div_up(a: u128, b: u128, c: u128) -> Result<u128, MathError> {
    if c == 0 {
        return Err(MathError::DivisionByZero {
            operation: "mul_div_up",
        });
    }
    let product = U256::from(a) * U256::from(b);
    if product == U256::ZERO {
        return Ok(0);
    }
    narrow((product - U256::ONE) / U256::from(c) + U256::ONE, "mul_div_up")
}

/// `a * b / ONE`, rounded down
#[inline]
pub fn mul_down(a: u128, b: u128) -> Result<u128, MathError> {
    mul_div_down(a, b, ONE)
}

/// `a * b / ONE`, rounded up
#[inline]
pub fn mul_up(a: u128, b: u128) -> Result<u128, MathError> {
    mul_div_up(a, b, ONE)
}

/// `a * ONE / b`, rounded down
#[inline]
pub fn div_down(a: u128, b: u128) -> Result<u128, MathError> {
    mul_div_down(a, ONE, b)
}

/// `a * ONE / b`, rounded up
#[inline]
pub fn div_up(a: u128, b: u128) -> Result<u128, MathError> {
    mul_div_up(a, ONE, b)
}

/// Plain integer division rounded up
pub fn div_up_raw(a: u128, b: u128) -> Result<u128, MathError> {
    if b == 0 {
        return Err(MathError::DivisionByZero {
            operation: "div_up_raw",
        });
    }
    if a == 0 {
        return Ok(0);
    }
    Ok((a - 1) / b + 1)
}

/// `ONE - x`, saturating at zero
#[inline]
pub fn complement(x: u128) -> u128 {
    ONE.saturating_sub(x)
}

/// Checked addition
#[inline]
pub fn add(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_add(b)
        .ok_or(MathError::Overflow { operation: "add" })
}

/// Checked subtraction
#[inline]
pub fn sub(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_sub(b).ok_or(MathError::Underflow {
        operation: "sub",
        lhs: a,
        rhs: b,
    })
}

/// Integer square root of a 256-bit value (floor)
pub fn sqrt_u256(value: U256) -> U256 {
    if value < U256::from(2u8) {
        return value;
    }
    // Newton iteration starting from a power of two above the root
    let bits = 256 - value.leading_zeros();
    let mut x = U256::ONE << bits.div_ceil(2);
    loop {
        let y = (x + value / x) >> 1u32;
        if y >= x {
            return x;
        }
        x = y;
    }
}

/// Convert a decimal such as `0.003` into 18-decimal fixed point
///
/// Rejects negative values and values with more than 18 fractional digits.
pub fn from_decimal(value: Decimal) -> Result<u128, MathError> {
    let invalid = || MathError::InvalidDecimal {
        input: value.to_string(),
    };
    if value.is_sign_negative() && !value.is_zero() {
        return Err(invalid());
    }
    let scaled = value
        .checked_mul(Decimal::from(ONE as u64))
        .ok_or_else(invalid)?;
    if scaled.fract() != Decimal::ZERO {
        return Err(invalid());
    }
    scaled.to_u128().ok_or_else(invalid)
}

/// Convert an 18-decimal fixed point value back into a decimal
pub fn to_decimal(value: u128) -> Result<Decimal, MathError> {
    let mantissa = i128::try_from(value).map_err(|_| MathError::Overflow {
        operation: "to_decimal",
    })?;
    Decimal::try_from_i128_with_scale(mantissa, 18)
        .map(|d| d.normalize())
        .map_err(|_| MathError::Overflow {
            operation: "to_decimal",
        })
}
