//! Claim service
//!
//! Runs every write as read → validate → compute → compare-and-swap against
//! the `ClaimStore`. A lost race re-reads fresh state and re-validates, so a
//! decision that was legal against the stale copy can still fail with the
//! state error it deserves. Business-rule failures are never retried.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use core_kernel::ClaimId;

use crate::actor::{Actor, Role, Scope};
use crate::amend;
use crate::claim::{ClaimEdit, ClaimRecord, ClaimStatus, NewClaim};
use crate::decision::{self, DecisionInput};
use crate::error::ClaimError;
use crate::events::{ClaimEvent, ClaimNotifier, LoggingNotifier};
use crate::ports::{ClaimQuery, ClaimStore};
use crate::recall::{self, RecallRequest, RecallResponse};

/// Tuning knobs for the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConfig {
    /// How many times a transition may lose the CAS race before giving up
    pub max_cas_attempts: u32,
    /// Largest submission batch accepted
    pub max_batch_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_cas_attempts: 3,
            max_batch_size: 50,
        }
    }
}

/// Summary of claims in an actor's scope
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimCounts {
    /// Awaiting manager, finance, or a recall answer
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
}

/// Application service for the claim lifecycle
#[derive(Clone)]
pub struct ClaimService {
    store: Arc<dyn ClaimStore>,
    notifier: Arc<dyn ClaimNotifier>,
    config: ServiceConfig,
}

impl ClaimService {
    pub fn new(store: Arc<dyn ClaimStore>) -> Self {
        Self {
            store,
            notifier: Arc::new(LoggingNotifier),
            config: ServiceConfig::default(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ClaimNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &Arc<dyn ClaimStore> {
        &self.store
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Creates one `pending_manager` claim per item; all or nothing
    #[instrument(skip(self, actor, items), fields(actor_id = %actor.id, count = items.len()))]
    pub async fn submit_claims(
        &self,
        actor: &Actor,
        items: Vec<NewClaim>,
    ) -> Result<Vec<ClaimRecord>, ClaimError> {
        if items.is_empty() {
            return Err(ClaimError::validation("at least one claim is required"));
        }
        if items.len() > self.config.max_batch_size {
            return Err(ClaimError::validation(format!(
                "at most {} claims may be submitted at once",
                self.config.max_batch_size
            )));
        }

        let now = Utc::now();
        let claims = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                ClaimRecord::submit(actor, item, now).map_err(|e| match e {
                    ClaimError::Validation(msg) => {
                        ClaimError::validation(format!("item {}: {}", index + 1, msg))
                    }
                    other => other,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let stored = self.store.insert_batch(claims).await?;
        info!(count = stored.len(), "Claims submitted");

        for claim in &stored {
            self.publish(&ClaimEvent::submitted(claim)).await;
        }
        Ok(stored)
    }

    /// Fetches a claim the actor is allowed to see
    #[instrument(skip(self, actor), fields(claim_id = %id, actor_id = %actor.id))]
    pub async fn get_claim(&self, id: ClaimId, actor: &Actor) -> Result<ClaimRecord, ClaimError> {
        let claim = self.store.get(id).await?;
        if !actor.scope().includes(&claim) {
            return Err(ClaimError::forbidden(format!(
                "claim {} is outside the scope of {}",
                id, actor.id
            )));
        }
        Ok(claim)
    }

    /// Lists claims in the actor's scope, newest first
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn list_claims(
        &self,
        actor: &Actor,
        query: ClaimQuery,
    ) -> Result<Vec<ClaimRecord>, ClaimError> {
        Ok(self.store.list_by_scope(&actor.scope(), &query).await?)
    }

    /// Claims created on the given days, across every owner, for reporting
    ///
    /// Admin only. `status` is optional and a blank value is ignored.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn export_claims(
        &self,
        actor: &Actor,
        from: NaiveDate,
        to: NaiveDate,
        status: Option<&str>,
    ) -> Result<Vec<ClaimRecord>, ClaimError> {
        if actor.role != Role::Admin {
            return Err(ClaimError::forbidden(format!(
                "{} {} may not export claims",
                actor.role, actor.id
            )));
        }
        let status = status
            .filter(|s| !s.trim().is_empty())
            .map(str::parse::<ClaimStatus>)
            .transpose()?;
        let query = ClaimQuery {
            status,
            ..Default::default()
        }
        .created_within(Some(from), Some(to))?;

        let claims = self.store.list_by_scope(&Scope::All, &query).await?;
        info!(count = claims.len(), %from, %to, "Exported claims");
        Ok(claims)
    }

    /// Pending / approved / rejected totals over the actor's scope
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn counts(&self, actor: &Actor) -> Result<ClaimCounts, ClaimError> {
        let per_status = self.store.count_by_status(&actor.scope()).await?;
        Ok(per_status
            .into_iter()
            .fold(ClaimCounts::default(), |mut acc, (status, n)| {
                match status {
                    ClaimStatus::Closed => acc.approved += n,
                    ClaimStatus::Rejected => acc.rejected += n,
                    ClaimStatus::PendingManager
                    | ClaimStatus::PendingFinance
                    | ClaimStatus::Recalled => acc.pending += n,
                }
                acc
            }))
    }

    /// Approves or rejects a claim at its current decision point
    #[instrument(skip(self, actor, input), fields(claim_id = %id, actor_id = %actor.id, approve = input.approve))]
    pub async fn decide(
        &self,
        id: ClaimId,
        actor: &Actor,
        input: DecisionInput,
    ) -> Result<ClaimRecord, ClaimError> {
        let action = if input.approve { "approve" } else { "reject" };
        self.transition(id, action, |claim, now| decision::decide(claim, actor, &input, now))
            .await
    }

    #[instrument(skip(self, actor, request), fields(claim_id = %id, actor_id = %actor.id))]
    pub async fn request_recall(
        &self,
        id: ClaimId,
        actor: &Actor,
        request: RecallRequest,
    ) -> Result<ClaimRecord, ClaimError> {
        self.transition(id, "recall", |claim, now| {
            recall::request_recall(claim, actor, &request, now)
        })
        .await
    }

    #[instrument(skip(self, actor, file_ref), fields(claim_id = %id, actor_id = %actor.id))]
    pub async fn attach_recall_exhibit(
        &self,
        id: ClaimId,
        actor: &Actor,
        file_ref: String,
    ) -> Result<ClaimRecord, ClaimError> {
        self.transition(id, "attach-exhibit", |claim, now| {
            recall::attach_exhibit(claim, actor, &file_ref, now)
        })
        .await
    }

    #[instrument(skip(self, actor, response), fields(claim_id = %id, actor_id = %actor.id))]
    pub async fn respond_to_recall(
        &self,
        id: ClaimId,
        actor: &Actor,
        response: RecallResponse,
    ) -> Result<ClaimRecord, ClaimError> {
        self.transition(id, "recall-response", |claim, now| {
            recall::respond(claim, actor, &response, now)
        })
        .await
    }

    #[instrument(skip(self, actor, comment), fields(claim_id = %id, actor_id = %actor.id))]
    pub async fn cancel_recall(
        &self,
        id: ClaimId,
        actor: &Actor,
        comment: String,
    ) -> Result<ClaimRecord, ClaimError> {
        self.transition(id, "recall-cancel", |claim, now| {
            recall::cancel(claim, actor, &comment, now)
        })
        .await
    }

    #[instrument(skip(self, actor, edit), fields(claim_id = %id, actor_id = %actor.id))]
    pub async fn edit_claim(
        &self,
        id: ClaimId,
        actor: &Actor,
        edit: ClaimEdit,
    ) -> Result<ClaimRecord, ClaimError> {
        self.transition(id, "edit", |claim, now| {
            amend::edit(claim, actor, edit.clone(), now)
        })
        .await
    }

    #[instrument(skip(self, actor, message), fields(claim_id = %id, actor_id = %actor.id))]
    pub async fn request_change(
        &self,
        id: ClaimId,
        actor: &Actor,
        message: String,
    ) -> Result<ClaimRecord, ClaimError> {
        self.transition(id, "change-request", |claim, now| {
            amend::request_change(claim, actor, &message, now)
        })
        .await
    }

    #[instrument(skip(self, actor, receipt_ref), fields(claim_id = %id, actor_id = %actor.id))]
    pub async fn attach_receipt(
        &self,
        id: ClaimId,
        actor: &Actor,
        receipt_ref: String,
    ) -> Result<ClaimRecord, ClaimError> {
        self.transition(id, "attach-receipt", |claim, now| {
            amend::attach_receipt(claim, actor, &receipt_ref, now)
        })
        .await
    }

    /// The optimistic write loop shared by every mutation
    async fn transition<F>(
        &self,
        id: ClaimId,
        action: &'static str,
        apply: F,
    ) -> Result<ClaimRecord, ClaimError>
    where
        F: Fn(&ClaimRecord, DateTime<Utc>) -> Result<ClaimRecord, ClaimError> + Send + Sync,
    {
        let attempts = self.config.max_cas_attempts.max(1);

        for attempt in 1..=attempts {
            let current = self.store.get(id).await?;
            let next = apply(&current, Utc::now())?;

            match self.store.compare_and_swap(id, current.version, next).await {
                Ok(stored) => {
                    info!(
                        claim_id = %id,
                        action,
                        from = %current.status,
                        to = %stored.status,
                        version = stored.version,
                        "Claim updated"
                    );
                    if let Some(event) = ClaimEvent::for_transition(&current, &stored) {
                        self.publish(&event).await;
                    }
                    return Ok(stored);
                }
                Err(e) if e.is_version_conflict() => {
                    warn!(claim_id = %id, action, attempt, "Lost update race; re-reading claim");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ClaimError::VersionConflict {
            claim_id: id.to_string(),
            attempts,
        })
    }

    async fn publish(&self, event: &ClaimEvent) {
        if let Err(e) = self.notifier.notify(event).await {
            warn!(event = event.name(), claim_id = %event.claim_id(), error = %e, "Notification failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Role;
    use crate::ports::memory::InMemoryClaimStore;
    use async_trait::async_trait;
    use core_kernel::{EmployeeId, PortError};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        events: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl ClaimNotifier for RecordingNotifier {
        async fn notify(&self, event: &ClaimEvent) -> Result<(), PortError> {
            self.events.lock().unwrap().push(event.name());
            Ok(())
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl ClaimNotifier for FailingNotifier {
        async fn notify(&self, _event: &ClaimEvent) -> Result<(), PortError> {
            Err(PortError::connection("smtp down"))
        }
    }

    fn cab() -> NewClaim {
        NewClaim {
            title: "Cab".into(),
            amount: 550,
            claim_type: "CAB_ALLOWANCE".into(),
            ..Default::default()
        }
    }

    fn people() -> (Actor, Actor) {
        let manager = Actor::new(EmployeeId::new(), Role::Manager);
        let employee = Actor::new(EmployeeId::new(), Role::Employee).with_manager(manager.id);
        (employee, manager)
    }

    #[tokio::test]
    async fn test_batch_rejected_as_a_whole() {
        let store = Arc::new(InMemoryClaimStore::new());
        let service = ClaimService::new(store.clone());
        let (employee, _) = people();

        let bad = NewClaim { amount: -5, ..cab() };
        let err = service.submit_claims(&employee, vec![cab(), bad]).await.unwrap_err();

        assert!(matches!(err, ClaimError::Validation(ref m) if m.starts_with("item 2")));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_empty_and_oversized_batches() {
        let service = ClaimService::new(Arc::new(InMemoryClaimStore::new()))
            .with_config(ServiceConfig { max_cas_attempts: 3, max_batch_size: 2 });
        let (employee, _) = people();

        assert!(service.submit_claims(&employee, vec![]).await.is_err());
        assert!(service.submit_claims(&employee, vec![cab(), cab(), cab()]).await.is_err());
        assert_eq!(service.submit_claims(&employee, vec![cab(), cab()]).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_events_published_after_commit() {
        let notifier = Arc::new(RecordingNotifier::default());
        let service = ClaimService::new(Arc::new(InMemoryClaimStore::new()))
            .with_notifier(notifier.clone());
        let (employee, manager) = people();

        let claim = service.submit_claims(&employee, vec![cab()]).await.unwrap().remove(0);
        service.decide(claim.id, &manager, DecisionInput::reject("dup")).await.unwrap();
        // Failed attempts publish nothing
        let _ = service.decide(claim.id, &manager, DecisionInput::approve("ok")).await;

        let events = notifier.events.lock().unwrap().clone();
        assert_eq!(events, vec!["claim_submitted", "claim_rejected"]);
    }

    #[tokio::test]
    async fn test_notifier_failure_does_not_fail_transition() {
        let service = ClaimService::new(Arc::new(InMemoryClaimStore::new()))
            .with_notifier(Arc::new(FailingNotifier));
        let (employee, manager) = people();

        let claim = service.submit_claims(&employee, vec![cab()]).await.unwrap().remove(0);
        let next = service.decide(claim.id, &manager, DecisionInput::approve("ok")).await.unwrap();
        assert_eq!(next.status, ClaimStatus::PendingFinance);
        assert_eq!(next.version, 2);
    }

    #[tokio::test]
    async fn test_get_claim_outside_scope_forbidden() {
        let service = ClaimService::new(Arc::new(InMemoryClaimStore::new()));
        let (employee, _) = people();
        let (stranger, _) = people();

        let claim = service.submit_claims(&employee, vec![cab()]).await.unwrap().remove(0);
        assert!(service.get_claim(claim.id, &employee).await.is_ok());
        assert!(matches!(
            service.get_claim(claim.id, &stranger).await,
            Err(ClaimError::Forbidden(_))
        ));
        assert!(matches!(
            service.get_claim(ClaimId::new(), &employee).await,
            Err(ClaimError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_counts_buckets() {
        let service = ClaimService::new(Arc::new(InMemoryClaimStore::new()));
        let (employee, manager) = people();
        let claims = service
            .submit_claims(&employee, vec![cab(), cab(), cab()])
            .await
            .unwrap();
        service.decide(claims[0].id, &manager, DecisionInput::reject("no")).await.unwrap();
        service.decide(claims[1].id, &manager, DecisionInput::approve("ok")).await.unwrap();

        let counts = service.counts(&employee).await.unwrap();
        assert_eq!(counts, ClaimCounts { pending: 2, approved: 0, rejected: 1 });
    }

    #[tokio::test]
    async fn test_export_is_admin_only_and_checks_range() {
        let service = ClaimService::new(Arc::new(InMemoryClaimStore::new()));
        let today = Utc::now().date_naive();
        let finance = Actor::new(EmployeeId::new(), Role::Finance);
        let admin = Actor::new(EmployeeId::new(), Role::Admin);

        // Authority is checked before the range
        let yesterday = today.pred_opt().unwrap();
        assert!(matches!(
            service.export_claims(&finance, today, yesterday, None).await,
            Err(ClaimError::Forbidden(_))
        ));
        assert!(matches!(
            service.export_claims(&admin, today, yesterday, None).await,
            Err(ClaimError::Validation(_))
        ));
        assert!(matches!(
            service.export_claims(&admin, today, today, Some("archived")).await,
            Err(ClaimError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_export_spans_owners_and_filters() {
        let service = ClaimService::new(Arc::new(InMemoryClaimStore::new()));
        let (alice, manager) = people();
        let (bob, _) = people();
        let admin = Actor::new(EmployeeId::new(), Role::Admin);
        let today = Utc::now().date_naive();

        let first = service.submit_claims(&alice, vec![cab()]).await.unwrap().remove(0);
        service.submit_claims(&bob, vec![cab()]).await.unwrap();
        service
            .decide(first.id, &manager, DecisionInput::reject("duplicate"))
            .await
            .unwrap();

        let all = service.export_claims(&admin, today, today, Some(" ")).await.unwrap();
        assert_eq!(all.len(), 2);

        let rejected = service
            .export_claims(&admin, today, today, Some("REJECTED"))
            .await
            .unwrap();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].id, first.id);

        let earlier = today.pred_opt().unwrap();
        assert!(service.export_claims(&admin, earlier, earlier, None).await.unwrap().is_empty());
    }
}
