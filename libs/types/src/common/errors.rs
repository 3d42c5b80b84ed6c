//! Error types for fixed-point arithmetic and identifier parsing
//!
//! Vault accounting never silently wraps: every overflow, underflow or division by zero in
//! the shared math surfaces as a [`MathError`].

use thiserror::Error;

/// Errors that can occur during fixed-point arithmetic operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MathError {
    /// Result exceeds the maximum representable value for the type
    #[error("Overflow in {operation}")]
    Overflow { operation: &'static str },

    /// Subtraction would produce a negative value
    #[error("Underflow in {operation}: {lhs} - {rhs}")]
    Underflow {
        operation: &'static str,
        lhs: u128,
        rhs: u128,
    },

    /// Division by zero in fixed-point arithmetic
    #[error("Division by zero in {operation}")]
    DivisionByZero { operation: &'static str },

    /// Decimal value cannot be represented as an 18-decimal fixed point value
    #[error("Decimal {input} cannot be represented as 18-decimal fixed point")]
    InvalidDecimal { input: String },

    /// Invalid format for address parsing
    #[error("Invalid address format: {0}")]
    InvalidAddress(String),
}
