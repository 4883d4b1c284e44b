//! Owner-side amendments
//!
//! None of these move the claim through the pipeline, so none of them append
//! history. They still go through compare-and-swap like any other write.

use chrono::{DateTime, Utc};

use crate::actor::Actor;
use crate::claim::{required_text, ChangeRequest, ClaimEdit, ClaimRecord, ClaimStatus};
use crate::error::ClaimError;

/// Edits claim fields while the claim awaits its manager or answers a recall
pub fn edit(
    claim: &ClaimRecord,
    actor: &Actor,
    edit: ClaimEdit,
    now: DateTime<Utc>,
) -> Result<ClaimRecord, ClaimError> {
    if !matches!(claim.status, ClaimStatus::PendingManager | ClaimStatus::Recalled) {
        return Err(ClaimError::invalid_state(claim.status, "edit"));
    }
    require_owner(claim, actor, "edit")?;
    claim.apply_edit(edit, now)
}

/// Leaves a note asking reviewers for a correction
pub fn request_change(
    claim: &ClaimRecord,
    actor: &Actor,
    message: &str,
    now: DateTime<Utc>,
) -> Result<ClaimRecord, ClaimError> {
    if claim.is_terminal() {
        return Err(ClaimError::invalid_state(claim.status, "request a change to"));
    }
    require_owner(claim, actor, "request a change to")?;
    let message = required_text(message, "message")?;

    let mut next = claim.clone();
    next.change_request = Some(ChangeRequest {
        message,
        requested_at: now,
    });
    next.updated_at = now;
    Ok(next)
}

/// Points the claim at an uploaded receipt
pub fn attach_receipt(
    claim: &ClaimRecord,
    actor: &Actor,
    receipt_ref: &str,
    now: DateTime<Utc>,
) -> Result<ClaimRecord, ClaimError> {
    if claim.is_terminal() {
        return Err(ClaimError::invalid_state(claim.status, "attach a receipt to"));
    }
    require_owner(claim, actor, "attach a receipt to")?;
    let receipt_ref = required_text(receipt_ref, "receipt reference")?;

    let mut next = claim.clone();
    next.receipt_ref = Some(receipt_ref);
    next.updated_at = now;
    Ok(next)
}

fn require_owner(claim: &ClaimRecord, actor: &Actor, what: &str) -> Result<(), ClaimError> {
    if actor.owns(claim) {
        Ok(())
    } else {
        Err(ClaimError::forbidden(format!(
            "only the owner may {} claim {}",
            what, claim.id
        )))
    }
}
