//! Router errors
//!
//! Vault failures pass through unchanged; the router adds its own slippage, path and mode
//! failures on top. Any error returned from a hook aborts the whole unlock scope.

use keel_types::{MathError, TokenId};
use keel_vault::{ErrorClass, VaultError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error("Deadline {deadline} passed (now {now})")]
    DeadlineExceeded { deadline: u64, now: u64 },

    #[error("Reentrant call into {0}")]
    ReentrantCall(&'static str),

    #[error("Insufficient native value: required {required}, available {available}")]
    InsufficientEth { required: u128, available: u128 },

    #[error("Native asset handling requested but no wrapped native token is configured")]
    WethNotConfigured,

    #[error("Path is empty")]
    EmptyPath,

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Tokens out do not match the pool's tokens")]
    WrongTokensOut,

    #[error("Nested token {token} was never used by the operation")]
    UnusedNestedToken { token: TokenId },
}

impl From<MathError> for RouterError {
    fn from(err: MathError) -> Self {
        RouterError::Vault(VaultError::from(err))
    }
}

impl RouterError {
    pub fn class(&self) -> ErrorClass {
        match self {
            RouterError::Vault(inner) => inner.class(),
            RouterError::DeadlineExceeded { .. } => ErrorClass::Slippage,
            RouterError::ReentrantCall(_) => ErrorClass::Mode,
            RouterError::InsufficientEth { .. }
            | RouterError::WethNotConfigured
            | RouterError::EmptyPath
            | RouterError::InvalidPath(_)
            | RouterError::WrongTokensOut
            | RouterError::UnusedNestedToken { .. } => ErrorClass::Precondition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vault_errors_keep_their_class() {
        let err: RouterError = VaultError::NotStaticCall.into();
        assert_eq!(err.class(), ErrorClass::Mode);

        let err: RouterError = VaultError::InsufficientPayment {
            token: TokenId::ZERO,
            expected: 2,
            actual: 1,
        }
        .into();
        assert_eq!(err.class(), ErrorClass::Reconciliation);
    }

    #[test]
    fn test_router_error_classes() {
        assert_eq!(
            RouterError::DeadlineExceeded { deadline: 1, now: 2 }.class(),
            ErrorClass::Slippage
        );
        assert_eq!(RouterError::ReentrantCall("swap").class(), ErrorClass::Mode);
        assert_eq!(RouterError::EmptyPath.class(), ErrorClass::Precondition);
    }
}
