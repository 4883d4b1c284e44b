//! Manager and finance decisions
//!
//! ```text
//! pending_manager --approve (manager)--> pending_finance --approve (finance|admin)--> closed
//!        |                                      |
//!        +--reject (manager)--> rejected <------+--reject (finance|admin)
//! ```
//!
//! Checks run in a fixed order and the first failure wins: status, then
//! actor authority, then the comment. The claim's own manager deciding a
//! claim that already left `pending_manager` is a state failure, not an
//! authority one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actor::{Actor, Role};
use crate::claim::{required_text, ClaimRecord, ClaimStatus, HistoryAction};
use crate::error::ClaimError;

/// A reviewer's verdict on a claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionInput {
    pub approve: bool,
    pub comment: String,
}

impl DecisionInput {
    pub fn approve(comment: impl Into<String>) -> Self {
        Self {
            approve: true,
            comment: comment.into(),
        }
    }

    pub fn reject(comment: impl Into<String>) -> Self {
        Self {
            approve: false,
            comment: comment.into(),
        }
    }

    fn action(&self) -> HistoryAction {
        if self.approve {
            HistoryAction::Approve
        } else {
            HistoryAction::Reject
        }
    }
}

/// Applies a decision, returning the next state of the claim
pub fn decide(
    claim: &ClaimRecord,
    actor: &Actor,
    input: &DecisionInput,
    now: DateTime<Utc>,
) -> Result<ClaimRecord, ClaimError> {
    let action = input.action();
    let target = target_status(claim, action)?;
    if advanced_past(claim, actor) {
        return Err(ClaimError::invalid_state(claim.status, action.as_str()));
    }
    authorize(claim, actor)?;
    let comment = required_text(&input.comment, "comment")?;

    let mut next = claim.clone();
    next.status = target;
    next.record(actor.role, actor.id, action, comment, now);
    Ok(next)
}

/// Status a decision moves the claim to, or why the claim cannot be decided
fn target_status(claim: &ClaimRecord, action: HistoryAction) -> Result<ClaimStatus, ClaimError> {
    match (claim.status, action) {
        (ClaimStatus::PendingManager, HistoryAction::Approve) => Ok(ClaimStatus::PendingFinance),
        (ClaimStatus::PendingFinance, HistoryAction::Approve) => Ok(ClaimStatus::Closed),
        (ClaimStatus::PendingManager | ClaimStatus::PendingFinance, HistoryAction::Reject) => {
            Ok(ClaimStatus::Rejected)
        }
        (status, action) => Err(ClaimError::invalid_state(status, action.as_str())),
    }
}

/// The claim's own manager acting on a claim they already moved on
fn advanced_past(claim: &ClaimRecord, actor: &Actor) -> bool {
    actor.role == Role::Manager
        && actor.id == claim.manager_id
        && claim.status != ClaimStatus::PendingManager
}

fn authorize(claim: &ClaimRecord, actor: &Actor) -> Result<(), ClaimError> {
    let allowed = match claim.status {
        ClaimStatus::PendingManager => {
            actor.role == Role::Manager && actor.id == claim.manager_id
        }
        ClaimStatus::PendingFinance => matches!(actor.role, Role::Finance | Role::Admin),
        _ => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(ClaimError::forbidden(format!(
            "{} {} may not decide claim {} at {}",
            actor.role, actor.id, claim.id, claim.status
        )))
    }
}

/// Roles that may decide a claim at the given status
pub fn deciding_roles(status: ClaimStatus) -> &'static [Role] {
    match status {
        ClaimStatus::PendingManager => &[Role::Manager],
        ClaimStatus::PendingFinance => &[Role::Finance, Role::Admin],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::NewClaim;
    use core_kernel::EmployeeId;

    struct Cast {
        employee: Actor,
        manager: Actor,
        finance: Actor,
        admin: Actor,
    }

    fn cast() -> Cast {
        let manager = Actor::new(EmployeeId::new(), Role::Manager);
        Cast {
            employee: Actor::new(EmployeeId::new(), Role::Employee).with_manager(manager.id),
            manager,
            finance: Actor::new(EmployeeId::new(), Role::Finance),
            admin: Actor::new(EmployeeId::new(), Role::Admin),
        }
    }

    fn submitted(cast: &Cast) -> ClaimRecord {
        let input = NewClaim {
            title: "Cab".into(),
            amount: 550,
            claim_type: "CAB_ALLOWANCE".into(),
            ..Default::default()
        };
        ClaimRecord::submit(&cast.employee, input, Utc::now()).unwrap()
    }

    #[test]
    fn test_manager_approval_advances_to_finance() {
        let cast = cast();
        let claim = submitted(&cast);

        let next = decide(&claim, &cast.manager, &DecisionInput::approve("ok"), Utc::now()).unwrap();

        assert_eq!(next.status, ClaimStatus::PendingFinance);
        assert_eq!(next.history.len(), 1);
        let entry = &next.history[0];
        assert_eq!(entry.role, Role::Manager);
        assert_eq!(entry.action, HistoryAction::Approve);
        assert_eq!(entry.comment, "ok");
        assert_eq!(entry.actor_id, cast.manager.id);
    }

    #[test]
    fn test_finance_and_admin_close() {
        let cast = cast();
        let claim = submitted(&cast);
        let at_finance =
            decide(&claim, &cast.manager, &DecisionInput::approve("ok"), Utc::now()).unwrap();

        for reviewer in [&cast.finance, &cast.admin] {
            let closed =
                decide(&at_finance, reviewer, &DecisionInput::approve("paid"), Utc::now()).unwrap();
            assert_eq!(closed.status, ClaimStatus::Closed);
            assert_eq!(closed.history.len(), 2);
            assert_eq!(closed.history[1].role, reviewer.role);
        }
    }

    #[test]
    fn test_other_manager_forbidden() {
        let cast = cast();
        let claim = submitted(&cast);
        let stranger = Actor::new(EmployeeId::new(), Role::Manager);

        let err = decide(&claim, &stranger, &DecisionInput::approve("ok"), Utc::now()).unwrap_err();
        assert!(matches!(err, ClaimError::Forbidden(_)));
    }

    #[test]
    fn test_finance_cannot_decide_pending_manager() {
        let cast = cast();
        let claim = submitted(&cast);
        let err = decide(&claim, &cast.finance, &DecisionInput::reject("no"), Utc::now()).unwrap_err();
        assert!(matches!(err, ClaimError::Forbidden(_)));
    }

    #[test]
    fn test_repeat_manager_decision_is_invalid_state() {
        let cast = cast();
        let claim = submitted(&cast);
        let at_finance =
            decide(&claim, &cast.manager, &DecisionInput::approve("ok"), Utc::now()).unwrap();

        for input in [DecisionInput::approve("again"), DecisionInput::reject("changed my mind")] {
            let err = decide(&at_finance, &cast.manager, &input, Utc::now()).unwrap_err();
            assert!(matches!(
                err,
                ClaimError::InvalidState { status: ClaimStatus::PendingFinance, .. }
            ));
        }
    }

    #[test]
    fn test_other_manager_forbidden_at_pending_finance() {
        let cast = cast();
        let claim = submitted(&cast);
        let at_finance =
            decide(&claim, &cast.manager, &DecisionInput::approve("ok"), Utc::now()).unwrap();
        let stranger = Actor::new(EmployeeId::new(), Role::Manager);

        let err = decide(&at_finance, &stranger, &DecisionInput::approve("ok"), Utc::now())
            .unwrap_err();
        assert!(matches!(err, ClaimError::Forbidden(_)));
    }

    #[test]
    fn test_blank_comment_rejected_both_ways() {
        let cast = cast();
        let claim = submitted(&cast);
        for input in [DecisionInput::approve("  "), DecisionInput::reject("")] {
            let err = decide(&claim, &cast.manager, &input, Utc::now()).unwrap_err();
            assert!(matches!(err, ClaimError::Validation(_)));
        }
    }

    #[test]
    fn test_status_checked_before_authority() {
        let cast = cast();
        let claim = submitted(&cast);
        let rejected = decide(&claim, &cast.manager, &DecisionInput::reject("no"), Utc::now()).unwrap();

        // A stranger with an empty comment still sees the state error first
        let stranger = Actor::new(EmployeeId::new(), Role::Employee);
        let err = decide(&rejected, &stranger, &DecisionInput::approve(""), Utc::now()).unwrap_err();
        assert!(matches!(err, ClaimError::InvalidState { status: ClaimStatus::Rejected, .. }));
    }

    #[test]
    fn test_authority_checked_before_comment() {
        let cast = cast();
        let claim = submitted(&cast);
        let err = decide(&claim, &cast.employee, &DecisionInput::approve(""), Utc::now()).unwrap_err();
        assert!(matches!(err, ClaimError::Forbidden(_)));
    }

    #[test]
    fn test_deciding_roles() {
        assert_eq!(deciding_roles(ClaimStatus::PendingManager), &[Role::Manager]);
        assert_eq!(deciding_roles(ClaimStatus::PendingFinance), &[Role::Finance, Role::Admin]);
        assert!(deciding_roles(ClaimStatus::Recalled).is_empty());
    }
}
