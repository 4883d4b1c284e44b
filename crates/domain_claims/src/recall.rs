//! Recall protocol
//!
//! An admin can pull any non-terminal claim out of the pipeline. The claim
//! sits in `recalled` until the owner answers (or the admin cancels), then
//! resumes at exactly the status it was recalled from. The resume target is
//! stored on the recall record, never inferred.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actor::{Actor, Role};
use crate::claim::{required_text, ClaimRecord, ClaimStatus, HistoryAction, RecallRecord};
use crate::error::ClaimError;

/// Admin request to recall a claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecallRequest {
    pub reason: String,
    #[serde(default)]
    pub require_attachment: bool,
}

/// Owner's answer to an open recall
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecallResponse {
    pub comment: String,
    #[serde(default)]
    pub file_ref: Option<String>,
}

/// Opens a recall on a non-terminal claim
pub fn request_recall(
    claim: &ClaimRecord,
    actor: &Actor,
    request: &RecallRequest,
    now: DateTime<Utc>,
) -> Result<ClaimRecord, ClaimError> {
    if claim.is_terminal() {
        return Err(ClaimError::invalid_state(claim.status, "recall"));
    }
    // An unanswered recall blocks a second one
    if claim.status == ClaimStatus::Recalled || claim.open_recall().is_some() {
        return Err(ClaimError::invalid_state(claim.status, "recall"));
    }
    require_admin(actor, "recall a claim")?;
    let reason = required_text(&request.reason, "reason")?;

    let mut next = claim.clone();
    next.recall = Some(RecallRecord {
        reason: reason.clone(),
        require_attachment: request.require_attachment,
        requested_by: actor.id,
        requested_at: now,
        resume_status: claim.status,
        exhibit_ref: None,
        responded_at: None,
        response_comment: None,
        response_file_ref: None,
        cancelled_at: None,
    });
    next.status = ClaimStatus::Recalled;
    next.record(Role::Admin, actor.id, HistoryAction::Recall, reason, now);
    Ok(next)
}

/// Attaches an admin reference file to the open recall; status is unchanged
pub fn attach_exhibit(
    claim: &ClaimRecord,
    actor: &Actor,
    file_ref: &str,
    now: DateTime<Utc>,
) -> Result<ClaimRecord, ClaimError> {
    open_recall(claim, "attach a recall exhibit to")?;
    require_admin(actor, "attach a recall exhibit")?;
    let file_ref = required_text(file_ref, "file reference")?;

    let mut next = claim.clone();
    if let Some(recall) = next.recall.as_mut() {
        recall.exhibit_ref = Some(file_ref);
    }
    next.updated_at = now;
    Ok(next)
}

/// Records the owner's answer and resumes the claim where it was recalled from
pub fn respond(
    claim: &ClaimRecord,
    actor: &Actor,
    response: &RecallResponse,
    now: DateTime<Utc>,
) -> Result<ClaimRecord, ClaimError> {
    let recall = open_recall(claim, "respond to a recall on")?;
    if !actor.owns(claim) {
        return Err(ClaimError::forbidden(format!(
            "only the owner may respond to the recall of claim {}",
            claim.id
        )));
    }
    let comment = required_text(&response.comment, "comment")?;
    let file_ref = response
        .file_ref
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string);
    if recall.require_attachment && file_ref.is_none() {
        return Err(ClaimError::validation("an attachment is required to answer this recall"));
    }

    let resume = recall.resume_status;
    let mut next = claim.clone();
    if let Some(recall) = next.recall.as_mut() {
        recall.responded_at = Some(now);
        recall.response_comment = Some(comment.clone());
        recall.response_file_ref = file_ref.clone();
    }
    if file_ref.is_some() {
        next.receipt_ref = file_ref;
    }
    next.status = resume;
    next.record(Role::Employee, actor.id, HistoryAction::RecallResponse, comment, now);
    Ok(next)
}

/// Withdraws an open recall and resumes the claim where it was recalled from
pub fn cancel(
    claim: &ClaimRecord,
    actor: &Actor,
    comment: &str,
    now: DateTime<Utc>,
) -> Result<ClaimRecord, ClaimError> {
    let resume = open_recall(claim, "cancel a recall on")?.resume_status;
    require_admin(actor, "cancel a recall")?;
    let comment = required_text(comment, "comment")?;

    let mut next = claim.clone();
    if let Some(recall) = next.recall.as_mut() {
        recall.cancelled_at = Some(now);
    }
    next.status = resume;
    next.record(Role::Admin, actor.id, HistoryAction::RecallCancel, comment, now);
    Ok(next)
}

fn open_recall<'a>(claim: &'a ClaimRecord, action: &str) -> Result<&'a RecallRecord, ClaimError> {
    if claim.status != ClaimStatus::Recalled {
        return Err(ClaimError::invalid_state(claim.status, action));
    }
    claim
        .open_recall()
        .ok_or_else(|| ClaimError::invalid_state(claim.status, action))
}

fn require_admin(actor: &Actor, what: &str) -> Result<(), ClaimError> {
    if actor.role == Role::Admin {
        Ok(())
    } else {
        Err(ClaimError::forbidden(format!("only an admin may {}", what)))
    }
}
