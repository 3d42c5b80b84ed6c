//! Vault error taxonomy
//!
//! Every variant aborts the enclosing scope; the scope engine rolls back all ledger, pool,
//! buffer and token mutations made since the scope (or nested frame) opened.

use crate::tokens::TokenError;
use keel_types::{AccountId, MathError, PoolId, TokenId};
use thiserror::Error;

/// Broad failure class, used by callers to decide whether a retry can help
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The zero-sum invariant was violated
    Reconciliation,
    /// Caller arguments do not match vault state
    Precondition,
    /// A user-supplied limit was not met
    Slippage,
    /// The API was used in the wrong execution mode
    Mode,
    /// Overflow, underflow or division by zero
    Arithmetic,
    /// A pool, token or wrapper capability failed
    Collaborator,
}

#[derive(Debug, Error)]
pub enum VaultError {
    // Reconciliation
    #[error("Unsettled delta for token {token}: {delta} ({nonzero} tokens outstanding)")]
    UnsettledDelta {
        token: TokenId,
        delta: i128,
        nonzero: usize,
    },

    #[error("Insufficient payment of {token}: expected {expected}, credited {actual}")]
    InsufficientPayment {
        token: TokenId,
        expected: u128,
        actual: u128,
    },

    #[error("Reserves of {token} ({reserves}) exceed the vault balance ({balance})")]
    InsufficientReserves {
        token: TokenId,
        reserves: u128,
        balance: u128,
    },

    #[error("Ledger delta overflow for token {token}")]
    DeltaOverflow { token: TokenId },

    // Precondition
    #[error("Buffer for {wrapped} is not initialized")]
    BufferNotInitialized { wrapped: TokenId },

    #[error("Buffer for {wrapped} is already initialized")]
    BufferAlreadyInitialized { wrapped: TokenId },

    #[error("Wrapped token {wrapped} has no registered ERC4626 capability")]
    WrappedTokenNotRegistered { wrapped: TokenId },

    #[error("Wrapped token {wrapped} reports an invalid underlying asset")]
    InvalidUnderlyingToken { wrapped: TokenId },

    #[error("Wrapped token {wrapped} changed underlying asset: expected {expected}, got {actual}")]
    WrongUnderlyingToken {
        wrapped: TokenId,
        expected: TokenId,
        actual: TokenId,
    },

    #[error("Owner {owner} holds {balance} shares of buffer {wrapped}, cannot remove {requested}")]
    NotEnoughBufferShares {
        wrapped: TokenId,
        owner: AccountId,
        balance: u128,
        requested: u128,
    },

    #[error("Buffer {wrapped} total supply {total_supply} would fall below the minimum {minimum}")]
    BufferTotalSupplyTooLow {
        wrapped: TokenId,
        total_supply: u128,
        minimum: u128,
    },

    #[error("Pool {pool} is not registered")]
    PoolNotRegistered { pool: PoolId },

    #[error("Pool {pool} is already registered")]
    PoolAlreadyRegistered { pool: PoolId },

    #[error("Pool {pool} is not initialized")]
    PoolNotInitialized { pool: PoolId },

    #[error("Pool {pool} is already initialized")]
    PoolAlreadyInitialized { pool: PoolId },

    #[error("Pool {pool} total supply {total_supply} would fall below the minimum {minimum}")]
    PoolTotalSupplyTooLow {
        pool: PoolId,
        total_supply: u128,
        minimum: u128,
    },

    #[error("Invalid token configuration: {reason}")]
    InvalidTokenConfiguration { reason: String },

    #[error("Swap fee {fee} exceeds the maximum {max}")]
    SwapFeeTooHigh { fee: u128, max: u128 },

    #[error("Token {token} is not registered in pool {pool}")]
    TokenNotRegistered { pool: PoolId, token: TokenId },

    #[error("Expected {expected} amounts, got {actual}")]
    InputLengthMismatch { expected: usize, actual: usize },

    #[error("Single-token liquidity operation on {pool} needs a token")]
    SingleTokenRequired { pool: PoolId },

    #[error("Cannot swap a token for itself")]
    CannotSwapSameToken,

    #[error("Swap amount given is zero")]
    AmountGivenZero,

    #[error("Trade amount {amount} is below the minimum {minimum}")]
    TradeAmountTooSmall { amount: u128, minimum: u128 },

    #[error("Wrap amount {amount} of {wrapped} is below the minimum {minimum}")]
    WrapAmountTooSmall {
        wrapped: TokenId,
        amount: u128,
        minimum: u128,
    },

    #[error("Account {account} holds {balance} of BPT {pool}, needs {needed}")]
    InsufficientBptBalance {
        pool: PoolId,
        account: AccountId,
        balance: u128,
        needed: u128,
    },

    #[error("Pool {pool} holds {balance} of {token}, needs {needed}")]
    InsufficientPoolBalance {
        pool: PoolId,
        token: TokenId,
        balance: u128,
        needed: u128,
    },

    #[error("Invalid vault configuration: {reason}")]
    InvalidConfiguration { reason: String },

    // Slippage
    #[error("Amount out of {token} is {amount}, below the minimum {min}")]
    AmountOutBelowMin {
        token: TokenId,
        amount: u128,
        min: u128,
    },

    #[error("Amount in of {token} is {amount}, above the maximum {max}")]
    AmountInAboveMax {
        token: TokenId,
        amount: u128,
        max: u128,
    },

    #[error("BPT out {amount} below the minimum {min}")]
    BptAmountOutBelowMin { amount: u128, min: u128 },

    #[error("BPT in {amount} above the maximum {max}")]
    BptAmountInAboveMax { amount: u128, max: u128 },

    #[error("Issued shares {issued} below the minimum {min}")]
    IssuedSharesBelowMin { issued: u128, min: u128 },

    // Mode
    #[error("Vault is not unlocked")]
    VaultIsNotUnlocked,

    #[error("Query requested from a state-changing scope")]
    NotStaticCall,

    #[error("Queries are disabled")]
    QueriesDisabled,

    #[error("Queries are permanently disabled")]
    QueriesDisabledPermanently,

    // Arithmetic
    #[error(transparent)]
    Math(#[from] MathError),

    // Collaborators
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Pool {pool} rejected the operation: {reason}")]
    PoolRejected { pool: PoolId, reason: String },

    #[error("Vault holds {actual} underlying of {wrapped} after wrapper call, expected at least {expected}")]
    WrongUnderlyingAmount {
        wrapped: TokenId,
        expected: u128,
        actual: u128,
    },

    #[error("Vault holds {actual} of wrapped {wrapped} after wrapper call, expected at least {expected}")]
    WrongWrappedAmount {
        wrapped: TokenId,
        expected: u128,
        actual: u128,
    },

    #[error("Fee controller rejected {token} fees of pool {pool}: {reason}")]
    FeeControllerRejected {
        pool: PoolId,
        token: TokenId,
        reason: String,
    },
}

impl VaultError {
    pub fn class(&self) -> ErrorClass {
        use VaultError::*;
        match self {
            UnsettledDelta { .. }
            | InsufficientPayment { .. }
            | InsufficientReserves { .. }
            | DeltaOverflow { .. } => ErrorClass::Reconciliation,

            BufferNotInitialized { .. }
            | BufferAlreadyInitialized { .. }
            | WrappedTokenNotRegistered { .. }
            | InvalidUnderlyingToken { .. }
            | WrongUnderlyingToken { .. }
            | NotEnoughBufferShares { .. }
            | BufferTotalSupplyTooLow { .. }
            | PoolNotRegistered { .. }
            | PoolAlreadyRegistered { .. }
            | PoolNotInitialized { .. }
            | PoolAlreadyInitialized { .. }
            | PoolTotalSupplyTooLow { .. }
            | InvalidTokenConfiguration { .. }
            | SwapFeeTooHigh { .. }
            | TokenNotRegistered { .. }
            | InputLengthMismatch { .. }
            | SingleTokenRequired { .. }
            | CannotSwapSameToken
            | AmountGivenZero
            | TradeAmountTooSmall { .. }
            | WrapAmountTooSmall { .. }
            | InsufficientBptBalance { .. }
            | InsufficientPoolBalance { .. }
            | InvalidConfiguration { .. } => ErrorClass::Precondition,

            AmountOutBelowMin { .. }
            | AmountInAboveMax { .. }
            | BptAmountOutBelowMin { .. }
            | BptAmountInAboveMax { .. }
            | IssuedSharesBelowMin { .. } => ErrorClass::Slippage,

            VaultIsNotUnlocked | NotStaticCall | QueriesDisabled | QueriesDisabledPermanently => {
                ErrorClass::Mode
            }

            Math(_) => ErrorClass::Arithmetic,

            Token(_)
            | PoolRejected { .. }
            | WrongUnderlyingAmount { .. }
            | WrongWrappedAmount { .. }
            | FeeControllerRejected { .. } => ErrorClass::Collaborator,
        }
    }

    /// Pool or buffer supply would drop under its locked minimum
    pub fn is_minimum_supply(&self) -> bool {
        matches!(
            self,
            VaultError::BufferTotalSupplyTooLow { .. } | VaultError::PoolTotalSupplyTooLow { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_types::Address;

    #[test]
    fn test_taxonomy() {
        let token = Address::from_low_u64(1);
        assert_eq!(
            VaultError::UnsettledDelta {
                token,
                delta: 5,
                nonzero: 1
            }
            .class(),
            ErrorClass::Reconciliation
        );
        assert_eq!(
            VaultError::AmountOutBelowMin {
                token,
                amount: 1,
                min: 2
            }
            .class(),
            ErrorClass::Slippage
        );
        assert_eq!(VaultError::NotStaticCall.class(), ErrorClass::Mode);
        assert_eq!(
            VaultError::from(MathError::DivisionByZero { operation: "x" }).class(),
            ErrorClass::Arithmetic
        );
    }

    #[test]
    fn test_diagnostic_payload_in_message() {
        let err = VaultError::InsufficientPayment {
            token: Address::from_low_u64(0xab),
            expected: 100,
            actual: 40,
        };
        let msg = err.to_string();
        assert!(msg.contains("expected 100"));
        assert!(msg.contains("credited 40"));
    }
}
