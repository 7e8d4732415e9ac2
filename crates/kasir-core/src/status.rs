//! # Transaction Status Machine
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Pending ──────────► Completed ──────► Cancelled   (restores stock)    │
//! │      │                    │     ──────► Void                            │
//! │      │                    │     ──────► Refund                          │
//! │      │                    └─────────► Failed                            │
//! │      ├──► Cancelled                                                     │
//! │      └──► Failed                                                        │
//! │                                                                         │
//! │   Cancelled, Void, Refund, Failed are terminal.                         │
//! │   X → X is a no-op.                                                     │
//! │   Every arrow into Cancelled/Void/Refund/Failed needs a reason.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::TransactionStatus;
use crate::validation::validate_reason;

use TransactionStatus::*;

/// The single transition table.
pub fn allowed_targets(from: TransactionStatus) -> &'static [TransactionStatus] {
    match from {
        Pending => &[Completed, Cancelled, Failed],
        Completed => &[Cancelled, Void, Refund, Failed],
        Cancelled | Void | Refund | Failed => &[],
    }
}

pub fn is_terminal(status: TransactionStatus) -> bool {
    allowed_targets(status).is_empty()
}

/// Targets that must carry a written reason.
pub fn requires_reason(to: TransactionStatus) -> bool {
    matches!(to, Cancelled | Void | Refund | Failed)
}

/// Checks the reason for a move into `to`. Runs before anything is read.
///
/// Returns the trimmed reason (or `None` when the target doesn't need one
/// and none was given).
pub fn check_reason(to: TransactionStatus, reason: Option<&str>) -> CoreResult<Option<String>> {
    if requires_reason(to) {
        return match validate_reason(reason) {
            Ok(r) => Ok(Some(r)),
            Err(ValidationError::Required { .. }) => Err(CoreError::ReasonRequired { status: to }),
            Err(e) => Err(e.into()),
        };
    }

    match reason.map(str::trim).filter(|r| !r.is_empty()) {
        Some(r) => Ok(Some(validate_reason(Some(r))?)),
        None => Ok(None),
    }
}

/// What a validated status change has to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPlan {
    /// Already in the target state.
    NoOp,
    Apply {
        from: TransactionStatus,
        to: TransactionStatus,
        /// Completed → Cancelled gives the sold stock back.
        restore_stock: bool,
        /// Pending → Completed stamps `completed_at`.
        stamp_completed: bool,
    },
}

/// Looks `from → to` up in the transition table.
///
/// ```rust
/// use kasir_core::status::{plan_transition, TransitionPlan};
/// use kasir_core::types::TransactionStatus::*;
///
/// assert_eq!(plan_transition(Void, Void).unwrap(), TransitionPlan::NoOp);
/// assert!(plan_transition(Void, Completed).is_err());
/// ```
pub fn plan_transition(from: TransactionStatus, to: TransactionStatus) -> CoreResult<TransitionPlan> {
    if from == to {
        return Ok(TransitionPlan::NoOp);
    }

    if !allowed_targets(from).contains(&to) {
        return Err(CoreError::InvalidTransition { from, to });
    }

    Ok(TransitionPlan::Apply {
        from,
        to,
        restore_stock: from == Completed && to == Cancelled,
        stamp_completed: from == Pending && to == Completed,
    })
}

/// Appends `[<timestamp>] <status>: <reason>` on a new line.
///
/// Existing notes are kept verbatim.
pub fn append_status_note(
    notes: Option<&str>,
    at: DateTime<Utc>,
    status: TransactionStatus,
    reason: &str,
) -> String {
    let entry = format!(
        "[{}] {}: {}",
        at.to_rfc3339_opts(SecondsFormat::Secs, true),
        status,
        reason
    );
    match notes.filter(|n| !n.is_empty()) {
        Some(existing) => format!("{existing}\n{entry}"),
        None => entry,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const ALL: [TransactionStatus; 6] = [Pending, Completed, Cancelled, Void, Refund, Failed];

    #[test]
    fn test_transition_table() {
        assert!(plan_transition(Pending, Completed).is_ok());
        assert!(plan_transition(Pending, Cancelled).is_ok());
        assert!(plan_transition(Pending, Failed).is_ok());
        assert!(plan_transition(Pending, Void).is_err());
        assert!(plan_transition(Pending, Refund).is_err());

        for to in [Cancelled, Void, Refund, Failed] {
            assert!(plan_transition(Completed, to).is_ok());
        }
        assert!(plan_transition(Completed, Pending).is_err());
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for from in [Cancelled, Void, Refund, Failed] {
            assert!(is_terminal(from));
            for to in ALL.into_iter().filter(|to| *to != from) {
                assert!(matches!(
                    plan_transition(from, to),
                    Err(CoreError::InvalidTransition { .. })
                ));
            }
        }
        assert!(!is_terminal(Pending));
        assert!(!is_terminal(Completed));
    }

    #[test]
    fn test_same_state_is_noop() {
        for s in ALL {
            assert_eq!(plan_transition(s, s).unwrap(), TransitionPlan::NoOp);
        }
    }

    #[test]
    fn test_only_completed_to_cancelled_restores() {
        match plan_transition(Completed, Cancelled).unwrap() {
            TransitionPlan::Apply { restore_stock, .. } => assert!(restore_stock),
            TransitionPlan::NoOp => panic!("expected apply"),
        }
        for (from, to) in [(Pending, Cancelled), (Completed, Void), (Completed, Refund)] {
            match plan_transition(from, to).unwrap() {
                TransitionPlan::Apply { restore_stock, .. } => assert!(!restore_stock),
                TransitionPlan::NoOp => panic!("expected apply"),
            }
        }
    }

    #[test]
    fn test_reason_required_for_sensitive_targets() {
        for to in [Cancelled, Void, Refund, Failed] {
            assert!(matches!(
                check_reason(to, None),
                Err(CoreError::ReasonRequired { status }) if status == to
            ));
            assert!(matches!(
                check_reason(to, Some("  ")),
                Err(CoreError::ReasonRequired { .. })
            ));
        }
        assert_eq!(check_reason(Completed, None).unwrap(), None);
        assert_eq!(
            check_reason(Void, Some(" salah input ")).unwrap().as_deref(),
            Some("salah input")
        );
    }

    #[test]
    fn test_append_status_note() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap();
        let first = append_status_note(None, at, Cancelled, "customer left");
        assert_eq!(first, "[2024-05-01T10:30:00Z] cancelled: customer left");

        let second = append_status_note(Some("Held order - table 4"), at, Void, "double charge");
        assert_eq!(
            second,
            "Held order - table 4\n[2024-05-01T10:30:00Z] void: double charge"
        );
    }
}
