//! Unlock scope behaviour: close-of-scope reconciliation, nesting, sender tracking and
//! rollback

mod common;

use common::*;
use keel_types::TokenId;
use keel_vault::{ErrorClass, TokenTransfer, VaultError};
use proptest::prelude::*;

#[test]
fn test_empty_scope_closes() {
    let mut vault = new_vault();
    assert!(!vault.is_unlocked());

    let seen = vault
        .unlock(ALICE, |s| {
            assert!(s.is_unlocked());
            assert_eq!(s.depth(), 1);
            Ok::<_, VaultError>(s.sender())
        })
        .unwrap();

    assert_eq!(seen, Some(ALICE));
    assert!(!vault.is_unlocked());
    assert_eq!(vault.sender(), None);
}

#[test_log::test]
fn test_unsettled_delta_rejected_at_close() {
    let mut vault = new_vault();

    let err = vault
        .unlock(ALICE, |s| {
            s.take_debt(X, 100)?;
            s.supply_credit(Y, 40)?;
            s.take_debt(Y, 40)?;
            Ok::<_, VaultError>(())
        })
        .unwrap_err();

    match &err {
        VaultError::UnsettledDelta {
            token,
            delta,
            nonzero,
        } => {
            assert_eq!(*token, X);
            assert_eq!(*delta, 100);
            assert_eq!(*nonzero, 1);
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(err.class(), ErrorClass::Reconciliation);

    assert!(!vault.is_unlocked());
    assert_eq!(vault.get_nonzero_delta_count(), 0);
    assert_eq!(vault.get_token_delta(X), 0);
}

#[test]
fn test_nested_scope_keeps_outer_sender() {
    let mut vault = new_vault();

    vault
        .unlock(ALICE, |outer| {
            outer.unlock(BOB, |inner| {
                assert_eq!(inner.sender(), Some(ALICE));
                assert_eq!(inner.depth(), 2);
                inner.take_debt(X, 5)?;
                Ok::<_, VaultError>(())
            })?;

            // Nested frames do not run the close check
            assert_eq!(outer.get_token_delta(X), 5);
            assert_eq!(outer.sender(), Some(ALICE));
            assert_eq!(outer.depth(), 1);

            outer.supply_credit(X, 5)?;
            Ok::<_, VaultError>(())
        })
        .unwrap();

    assert_eq!(vault.sender(), None);
    assert!(!vault.is_unlocked());
}

#[test]
fn test_failed_nested_frame_is_rolled_back() {
    let mut vault = new_vault();

    vault
        .unlock(ALICE, |outer| {
            outer.take_debt(X, 10)?;

            let nested: Result<(), VaultError> = outer.unlock(ALICE, |inner| {
                inner.take_debt(Y, 7)?;
                inner.transfer(Y, ALICE, VAULT, 7)?;
                Err(VaultError::AmountGivenZero)
            });
            assert!(matches!(nested, Err(VaultError::AmountGivenZero)));

            assert_eq!(outer.get_token_delta(Y), 0);
            assert_eq!(outer.get_token_delta(X), 10);
            assert_eq!(outer.vault().balance_of(Y, VAULT), 0);

            outer.supply_credit(X, 10)?;
            Ok::<_, VaultError>(())
        })
        .unwrap();
}

#[test]
fn test_hook_error_rolls_back_physical_transfers() {
    let mut vault = new_vault();

    let result = vault.unlock(ALICE, |s| {
        pay(s, X, ALICE, 300)?;
        s.take_debt(X, 300)?;
        Err::<(), _>(VaultError::CannotSwapSameToken)
    });

    assert!(matches!(result, Err(VaultError::CannotSwapSameToken)));
    assert_eq!(vault.tokens().balance_of(X, ALICE), FUNDING);
    assert_eq!(vault.get_reserves_of(X), 0);
    assert_reserves_match(&vault, X);
}

#[test]
fn test_transient_state_does_not_leak_between_calls() {
    let mut vault = new_vault();

    let _ = vault.unlock(ALICE, |s| {
        s.take_debt(X, 1)?;
        Ok::<_, VaultError>(())
    });

    vault
        .unlock(BOB, |s| {
            assert_eq!(s.get_nonzero_delta_count(), 0);
            assert_eq!(s.sender(), Some(BOB));
            Ok::<_, VaultError>(())
        })
        .unwrap();
}

const TOKENS: [TokenId; 3] = [X, Y, Z];

proptest! {
    #[test]
    fn prop_zero_sum_closure(
        ops in prop::collection::vec((0usize..3, 1u128..1_000_000, any::<bool>(), any::<bool>()), 1..24),
        close_out in any::<bool>(),
    ) {
        let mut vault = new_vault();
        let mut net = [0i128; 3];
        for (index, amount, is_debt, _) in &ops {
            net[*index] += if *is_debt { *amount as i128 } else { -(*amount as i128) };
        }

        let result = vault.unlock(ALICE, |outer| {
            for (index, amount, is_debt, nested) in &ops {
                let (token, amount, is_debt) = (TOKENS[*index], *amount, *is_debt);
                if *nested {
                    outer.unlock(BOB, |inner| {
                        if is_debt { inner.take_debt(token, amount) } else { inner.supply_credit(token, amount) }
                    })?;
                } else if is_debt {
                    outer.take_debt(token, amount)?;
                } else {
                    outer.supply_credit(token, amount)?;
                }
            }
            if close_out {
                for (token, delta) in TOKENS.iter().zip(net) {
                    if delta > 0 {
                        outer.supply_credit(*token, delta as u128)?;
                    } else if delta < 0 {
                        outer.take_debt(*token, delta.unsigned_abs())?;
                    }
                }
            }
            Ok::<_, VaultError>(())
        });

        if close_out || net.iter().all(|d| *d == 0) {
            prop_assert!(result.is_ok());
        } else {
            prop_assert!(
                matches!(result, Err(VaultError::UnsettledDelta { .. })),
                "expected UnsettledDelta, got {:?}",
                result
            );
        }
        prop_assert!(!vault.is_unlocked());
        prop_assert_eq!(vault.get_nonzero_delta_count(), 0);
    }
}
