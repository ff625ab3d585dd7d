//! Alert lifecycle state machine.
//!
//! An alert's state is the pair `(status, verification_status)`:
//!
//! ```text
//!                 resolve
//!  (active, pending) ──────► (resolved, pending)
//!         │                          │
//!         │ verify                   │ verify
//!         ▼         resolve          ▼
//!  (active, verified) ─────► (resolved, verified)
//! ```
//!
//! Alerts always start in `(active, pending)`. `verify` is also accepted on
//! an already verified alert and leaves it unchanged. No action leaves
//! `(resolved, verified)`.
//!
//! Transitions are server-authoritative: [`expected`] predicts the outcome
//! but the cache only ever adopts what the backend returns.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};
use crate::types::{Alert, AlertStatus, VerificationStatus};

/// An operator action on an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertAction {
    /// Mark the alert resolved.
    Resolve,
    /// Mark the alert verified.
    Verify,
}

impl AlertAction {
    /// Returns the action as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::Verify => "verify",
        }
    }
}

impl fmt::Display for AlertAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The joint lifecycle state of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlertState {
    /// Active or resolved.
    pub status: AlertStatus,
    /// Pending or verified.
    pub verification: VerificationStatus,
}

impl AlertState {
    /// The state every backend-created alert starts in.
    pub const INITIAL: Self = Self {
        status: AlertStatus::Active,
        verification: VerificationStatus::Pending,
    };

    /// Returns the state of an alert.
    #[must_use]
    pub const fn of(alert: &Alert) -> Self {
        Self {
            status: alert.status,
            verification: alert.verification_status,
        }
    }

    /// Returns `true` if no action can change this state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status == AlertStatus::Resolved && self.verification == VerificationStatus::Verified
    }
}

impl fmt::Display for AlertState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.status, self.verification)
    }
}

/// Returns `true` if `action` may be offered for an alert in `state`.
#[must_use]
pub fn is_allowed(state: AlertState, action: AlertAction) -> bool {
    match action {
        AlertAction::Resolve => state.status == AlertStatus::Active,
        AlertAction::Verify => true,
    }
}

/// Actions worth offering an operator for an alert.
///
/// `verify` is omitted once the alert is verified since it would not change
/// anything.
#[must_use]
pub fn available_actions(alert: &Alert) -> Vec<AlertAction> {
    let state = AlertState::of(alert);
    let mut actions = Vec::with_capacity(2);
    if is_allowed(state, AlertAction::Resolve) {
        actions.push(AlertAction::Resolve);
    }
    if state.verification == VerificationStatus::Pending {
        actions.push(AlertAction::Verify);
    }
    actions
}

/// Checks the precondition for `action` on `alert`.
///
/// # Errors
///
/// Returns [`ClientError::InvalidTransition`] when resolving an alert that is
/// already resolved.
pub fn check(alert: &Alert, action: AlertAction) -> Result<()> {
    let state = AlertState::of(alert);
    if is_allowed(state, action) {
        Ok(())
    } else {
        Err(ClientError::InvalidTransition {
            id: alert.id,
            action,
            status: state.status,
            verification: state.verification,
        })
    }
}

/// Predicts the state after `action`, or `None` if the action is not allowed.
#[must_use]
pub fn expected(state: AlertState, action: AlertAction) -> Option<AlertState> {
    if !is_allowed(state, action) {
        return None;
    }
    Some(match action {
        AlertAction::Resolve => AlertState {
            status: AlertStatus::Resolved,
            ..state
        },
        AlertAction::Verify => AlertState {
            verification: VerificationStatus::Verified,
            ..state
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use test_case::test_case;

    fn alert(status: AlertStatus, verification: VerificationStatus) -> Alert {
        let ts = Utc.with_ymd_and_hms(2024, 1, 22, 10, 30, 0).unwrap();
        Alert {
            id: 7,
            service_id: 1,
            service_name: "api".into(),
            status,
            verification_status: verification,
            started_at: ts,
            resolved_at: (status == AlertStatus::Resolved).then_some(ts),
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn initial_state_is_active_pending() {
        assert_eq!(AlertState::INITIAL.to_string(), "(active, pending)");
        assert!(!AlertState::INITIAL.is_terminal());
    }

    #[test_case(AlertStatus::Active, VerificationStatus::Pending, &[AlertAction::Resolve, AlertAction::Verify] ; "active pending")]
    #[test_case(AlertStatus::Active, VerificationStatus::Verified, &[AlertAction::Resolve] ; "active verified")]
    #[test_case(AlertStatus::Resolved, VerificationStatus::Pending, &[AlertAction::Verify] ; "resolved pending")]
    #[test_case(AlertStatus::Resolved, VerificationStatus::Verified, &[] ; "terminal")]
    fn actions_offered(status: AlertStatus, verification: VerificationStatus, actions: &[AlertAction]) {
        assert_eq!(available_actions(&alert(status, verification)), actions);
    }

    #[test]
    fn resolving_resolved_alert_is_rejected() {
        let err = check(
            &alert(AlertStatus::Resolved, VerificationStatus::Pending),
            AlertAction::Resolve,
        )
        .unwrap_err();
        assert!(matches!(err, ClientError::InvalidTransition { id: 7, .. }));
    }

    #[test]
    fn verify_is_valid_everywhere() {
        for status in [AlertStatus::Active, AlertStatus::Resolved] {
            for verification in [VerificationStatus::Pending, VerificationStatus::Verified] {
                assert!(check(&alert(status, verification), AlertAction::Verify).is_ok());
            }
        }
    }

    #[test]
    fn terminal_state_has_no_exit() {
        let terminal = AlertState {
            status: AlertStatus::Resolved,
            verification: VerificationStatus::Verified,
        };
        assert!(terminal.is_terminal());
        assert_eq!(expected(terminal, AlertAction::Resolve), None);
        assert_eq!(expected(terminal, AlertAction::Verify), Some(terminal));
    }

    fn any_state() -> impl Strategy<Value = AlertState> {
        (any::<bool>(), any::<bool>()).prop_map(|(resolved, verified)| AlertState {
            status: if resolved { AlertStatus::Resolved } else { AlertStatus::Active },
            verification: if verified {
                VerificationStatus::Verified
            } else {
                VerificationStatus::Pending
            },
        })
    }

    proptest! {
        #[test]
        fn verify_never_changes_status(state in any_state()) {
            let next = expected(state, AlertAction::Verify);
            prop_assert!(next.is_some());
            let next = next.unwrap();
            prop_assert_eq!(next.status, state.status);
            prop_assert_eq!(next.verification, VerificationStatus::Verified);
        }

        #[test]
        fn resolve_never_changes_verification(state in any_state()) {
            if let Some(next) = expected(state, AlertAction::Resolve) {
                prop_assert_eq!(next.verification, state.verification);
                prop_assert_eq!(next.status, AlertStatus::Resolved);
            } else {
                prop_assert_eq!(state.status, AlertStatus::Resolved);
            }
        }

        #[test]
        fn verified_is_never_undone(state in any_state(), resolve_first in any::<bool>()) {
            let first = if resolve_first { AlertAction::Resolve } else { AlertAction::Verify };
            let after = expected(state, first).unwrap_or(state);
            let after = expected(after, AlertAction::Verify).unwrap_or(after);
            prop_assert_eq!(after.verification, VerificationStatus::Verified);
        }
    }
}
