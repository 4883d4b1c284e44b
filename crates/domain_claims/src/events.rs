//! Domain events and the outbound notifier port

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use core_kernel::{Amount, ClaimId, Currency, EmployeeId, PortError};

use crate::claim::{ClaimRecord, ClaimStatus, HistoryAction};

/// Something that happened to a claim, emitted after the write commits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaimEvent {
    ClaimSubmitted {
        claim_id: ClaimId,
        user_id: EmployeeId,
        manager_id: EmployeeId,
        title: String,
        amount: Amount,
        currency: Currency,
        timestamp: DateTime<Utc>,
    },
    /// Manager approved; the claim moves on to finance
    ClaimAdvanced {
        claim_id: ClaimId,
        user_id: EmployeeId,
        approved_by: EmployeeId,
        comment: String,
        timestamp: DateTime<Utc>,
    },
    ClaimClosed {
        claim_id: ClaimId,
        user_id: EmployeeId,
        approved_by: EmployeeId,
        comment: String,
        timestamp: DateTime<Utc>,
    },
    ClaimRejected {
        claim_id: ClaimId,
        user_id: EmployeeId,
        rejected_by: EmployeeId,
        comment: String,
        timestamp: DateTime<Utc>,
    },
    RecallRequested {
        claim_id: ClaimId,
        user_id: EmployeeId,
        requested_by: EmployeeId,
        reason: String,
        require_attachment: bool,
        timestamp: DateTime<Utc>,
    },
    RecallAnswered {
        claim_id: ClaimId,
        user_id: EmployeeId,
        resumed_at: ClaimStatus,
        timestamp: DateTime<Utc>,
    },
    RecallCancelled {
        claim_id: ClaimId,
        user_id: EmployeeId,
        cancelled_by: EmployeeId,
        resumed_at: ClaimStatus,
        timestamp: DateTime<Utc>,
    },
}

impl ClaimEvent {
    pub fn submitted(claim: &ClaimRecord) -> Self {
        ClaimEvent::ClaimSubmitted {
            claim_id: claim.id,
            user_id: claim.user_id,
            manager_id: claim.manager_id,
            title: claim.title.clone(),
            amount: claim.amount,
            currency: claim.currency,
            timestamp: claim.created_at,
        }
    }

    /// Derives the event for a committed transition, if it appended history
    pub fn for_transition(before: &ClaimRecord, after: &ClaimRecord) -> Option<Self> {
        if after.history.len() <= before.history.len() {
            return None;
        }
        let entry = after.history.last()?;
        let claim_id = after.id;
        let user_id = after.user_id;
        let timestamp = entry.at;

        let event = match (entry.action, after.status) {
            (HistoryAction::Approve, ClaimStatus::PendingFinance) => ClaimEvent::ClaimAdvanced {
                claim_id,
                user_id,
                approved_by: entry.actor_id,
                comment: entry.comment.clone(),
                timestamp,
            },
            (HistoryAction::Approve, _) => ClaimEvent::ClaimClosed {
                claim_id,
                user_id,
                approved_by: entry.actor_id,
                comment: entry.comment.clone(),
                timestamp,
            },
            (HistoryAction::Reject, _) => ClaimEvent::ClaimRejected {
                claim_id,
                user_id,
                rejected_by: entry.actor_id,
                comment: entry.comment.clone(),
                timestamp,
            },
            (HistoryAction::Recall, _) => ClaimEvent::RecallRequested {
                claim_id,
                user_id,
                requested_by: entry.actor_id,
                reason: entry.comment.clone(),
                require_attachment: after
                    .recall
                    .as_ref()
                    .map_or(false, |r| r.require_attachment),
                timestamp,
            },
            (HistoryAction::RecallResponse, status) => ClaimEvent::RecallAnswered {
                claim_id,
                user_id,
                resumed_at: status,
                timestamp,
            },
            (HistoryAction::RecallCancel, status) => ClaimEvent::RecallCancelled {
                claim_id,
                user_id,
                cancelled_by: entry.actor_id,
                resumed_at: status,
                timestamp,
            },
        };
        Some(event)
    }

    pub fn claim_id(&self) -> ClaimId {
        match self {
            ClaimEvent::ClaimSubmitted { claim_id, .. }
            | ClaimEvent::ClaimAdvanced { claim_id, .. }
            | ClaimEvent::ClaimClosed { claim_id, .. }
            | ClaimEvent::ClaimRejected { claim_id, .. }
            | ClaimEvent::RecallRequested { claim_id, .. }
            | ClaimEvent::RecallAnswered { claim_id, .. }
            | ClaimEvent::RecallCancelled { claim_id, .. } => *claim_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClaimEvent::ClaimSubmitted { .. } => "claim_submitted",
            ClaimEvent::ClaimAdvanced { .. } => "claim_advanced",
            ClaimEvent::ClaimClosed { .. } => "claim_closed",
            ClaimEvent::ClaimRejected { .. } => "claim_rejected",
            ClaimEvent::RecallRequested { .. } => "recall_requested",
            ClaimEvent::RecallAnswered { .. } => "recall_answered",
            ClaimEvent::RecallCancelled { .. } => "recall_cancelled",
        }
    }
}

/// Outbound port for claim notifications (mail, chat, queue)
#[async_trait]
pub trait ClaimNotifier: Send + Sync {
    async fn notify(&self, event: &ClaimEvent) -> Result<(), PortError>;
}

/// Notifier that writes events to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

#[async_trait]
impl ClaimNotifier for LoggingNotifier {
    async fn notify(&self, event: &ClaimEvent) -> Result<(), PortError> {
        info!(
            event = event.name(),
            claim_id = %event.claim_id(),
            "Claim notification"
        );
        Ok(())
    }
}
