//! Claim Store port
//!
//! The claims domain never talks to storage directly. It requires a
//! `ClaimStore` that can read a claim, list claims within an actor's scope,
//! insert new claims, and apply a conditional write. Every transition goes
//! through `compare_and_swap`, which is what guarantees a single winner when
//! two reviewers decide the same claim at once.
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_claims::ports::{ClaimStore, memory::InMemoryClaimStore};
//! use std::sync::Arc;
//!
//! let store: Arc<dyn ClaimStore> = match config.store_backend {
//!     StoreBackend::Memory => Arc::new(InMemoryClaimStore::new()),
//!     StoreBackend::Postgres => Arc::new(PostgresClaimStore::new(pool)),
//! };
//! ```

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use core_kernel::{ClaimId, DomainPort, HealthCheckable, PortError};

use crate::actor::Scope;
use crate::claim::{ClaimRecord, ClaimStatus};
use crate::error::ClaimError;

/// Query parameters for listing claims
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimQuery {
    /// Filter by status
    pub status: Option<ClaimStatus>,
    /// Only claims created at or after this instant
    pub created_from: Option<DateTime<Utc>>,
    /// Only claims created strictly before this instant
    pub created_to: Option<DateTime<Utc>>,
    /// Limit results
    pub limit: Option<u32>,
    /// Offset for pagination
    pub offset: Option<u32>,
}

impl ClaimQuery {
    /// Creates a query filtered by status
    pub fn by_status(status: ClaimStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Adds pagination to the query
    pub fn paginate(mut self, limit: u32, offset: u32) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }

    /// Restricts the query to claims created on the given days (UTC)
    ///
    /// Both days are inclusive; either side may be open. Fails with
    /// `Validation` when `to` is before `from`.
    pub fn created_within(
        mut self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Self, ClaimError> {
        if let (Some(from), Some(to)) = (from, to) {
            if to < from {
                return Err(ClaimError::validation(format!(
                    "date range ends ({to}) before it starts ({from})"
                )));
            }
        }
        self.created_from = from.map(start_of_day);
        self.created_to = to.and_then(|day| day.succ_opt()).map(start_of_day);
        Ok(self)
    }

    pub fn matches(&self, claim: &ClaimRecord) -> bool {
        self.status.map_or(true, |status| claim.status == status)
            && self.created_from.map_or(true, |from| claim.created_at >= from)
            && self.created_to.map_or(true, |to| claim.created_at < to)
    }
}

fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

/// Storage contract for claim records
///
/// Implementations must treat `compare_and_swap` as atomic: the record is
/// replaced only if the stored version still equals `expected_version`, and
/// the stored version is then incremented. Otherwise the call fails with
/// `PortError::VersionConflict` and nothing is written.
#[async_trait]
pub trait ClaimStore: DomainPort + HealthCheckable {
    /// Retrieves a claim by ID, or `PortError::NotFound`
    async fn get(&self, id: ClaimId) -> Result<ClaimRecord, PortError>;

    /// Lists claims visible within `scope`, newest first
    async fn list_by_scope(
        &self,
        scope: &Scope,
        query: &ClaimQuery,
    ) -> Result<Vec<ClaimRecord>, PortError>;

    /// Inserts new claims; either all are stored or none are
    async fn insert_batch(&self, claims: Vec<ClaimRecord>) -> Result<Vec<ClaimRecord>, PortError>;

    /// Replaces the claim if its stored version is still `expected_version`
    ///
    /// # Returns
    ///
    /// The stored record, carrying its new version
    async fn compare_and_swap(
        &self,
        id: ClaimId,
        expected_version: u64,
        record: ClaimRecord,
    ) -> Result<ClaimRecord, PortError>;

    /// Counts claims per status within `scope`
    async fn count_by_status(&self, scope: &Scope) -> Result<Vec<(ClaimStatus, u64)>, PortError> {
        let claims = self.list_by_scope(scope, &ClaimQuery::default()).await?;
        Ok(ClaimStatus::ALL
            .into_iter()
            .map(|status| {
                let count = claims.iter().filter(|c| c.status == status).count() as u64;
                (status, count)
            })
            .collect())
    }
}

/// Checks that a replacement record keeps the fields a transition may never touch
///
/// The in-memory store calls this before writing. The Postgres store applies
/// the same rules to the locked row inside its conditional write.
pub fn check_replacement(current: &ClaimRecord, next: &ClaimRecord) -> Result<(), PortError> {
    if next.id != current.id || next.user_id != current.user_id {
        return Err(PortError::conflict("claim identity and owner are immutable"));
    }
    if next.manager_id != current.manager_id {
        return Err(PortError::conflict("claim manager is immutable"));
    }
    if next.history.len() < current.history.len()
        || next.history[..current.history.len()] != current.history[..]
    {
        return Err(PortError::conflict("claim history is append-only"));
    }
    Ok(())
}

/// In-memory claim store
///
/// Backs the `memory` server profile and every test that does not need a
/// database.
pub mod memory {
    use super::*;
    use chrono::Utc;
    use core_kernel::{AdapterHealth, HealthCheckResult};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    /// Claims held in a `HashMap` behind an async lock
    #[derive(Debug, Default, Clone)]
    pub struct InMemoryClaimStore {
        claims: Arc<RwLock<HashMap<ClaimId, ClaimRecord>>>,
    }

    impl InMemoryClaimStore {
        /// Creates an empty store
        pub fn new() -> Self {
            Self::default()
        }

        /// Pre-populates with claims for testing
        pub async fn with_claims(claims: Vec<ClaimRecord>) -> Self {
            let store = Self::new();
            {
                let mut map = store.claims.write().await;
                for claim in claims {
                    map.insert(claim.id, claim);
                }
            }
            store
        }

        pub async fn len(&self) -> usize {
            self.claims.read().await.len()
        }

        pub async fn is_empty(&self) -> bool {
            self.claims.read().await.is_empty()
        }
    }

    impl DomainPort for InMemoryClaimStore {}

    #[async_trait]
    impl HealthCheckable for InMemoryClaimStore {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult {
                adapter_id: "memory-claim-store".to_string(),
                status: AdapterHealth::Healthy,
                latency_ms: 0,
                message: Some("In-memory store always healthy".to_string()),
                checked_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl ClaimStore for InMemoryClaimStore {
        async fn get(&self, id: ClaimId) -> Result<ClaimRecord, PortError> {
            self.claims
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Claim", id))
        }

        async fn list_by_scope(
            &self,
            scope: &Scope,
            query: &ClaimQuery,
        ) -> Result<Vec<ClaimRecord>, PortError> {
            let claims = self.claims.read().await;
            let mut results: Vec<_> = claims
                .values()
                .filter(|c| scope.includes(c) && query.matches(c))
                .cloned()
                .collect();

            results.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

            // Apply pagination
            let offset = query.offset.unwrap_or(0) as usize;
            let limit = query.limit.map_or(usize::MAX, |l| l as usize);
            Ok(results.into_iter().skip(offset).take(limit).collect())
        }

        async fn insert_batch(&self, claims: Vec<ClaimRecord>) -> Result<Vec<ClaimRecord>, PortError> {
            let mut map = self.claims.write().await;
            if let Some(dup) = claims.iter().find(|c| map.contains_key(&c.id)) {
                return Err(PortError::conflict(format!("claim {} already exists", dup.id)));
            }
            for claim in &claims {
                map.insert(claim.id, claim.clone());
            }
            Ok(claims)
        }

        async fn compare_and_swap(
            &self,
            id: ClaimId,
            expected_version: u64,
            mut record: ClaimRecord,
        ) -> Result<ClaimRecord, PortError> {
            let mut map = self.claims.write().await;
            let current = map
                .get(&id)
                .ok_or_else(|| PortError::not_found("Claim", id))?;

            if current.version != expected_version {
                return Err(PortError::version_conflict("Claim", id, expected_version));
            }
            check_replacement(current, &record)?;

            record.version = expected_version + 1;
            map.insert(id, record.clone());
            Ok(record)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::InMemoryClaimStore;
    use super::*;
    use crate::actor::{Actor, Role};
    use crate::claim::NewClaim;
    use chrono::Utc;
    use core_kernel::EmployeeId;

    fn claim_for(employee: &Actor) -> ClaimRecord {
        let input = NewClaim {
            title: "Fuel".into(),
            amount: 1200,
            claim_type: "PETROL_ALLOWANCE".into(),
            ..Default::default()
        };
        ClaimRecord::submit(employee, input, Utc::now()).unwrap()
    }

    fn employee() -> Actor {
        Actor::new(EmployeeId::new(), Role::Employee).with_manager(EmployeeId::new())
    }

    #[tokio::test]
    async fn test_cas_bumps_version() {
        let claim = claim_for(&employee());
        let store = InMemoryClaimStore::with_claims(vec![claim.clone()]).await;

        let mut next = claim.clone();
        next.title = "Diesel".into();
        let stored = store.compare_and_swap(claim.id, 1, next).await.unwrap();

        assert_eq!(stored.version, 2);
        assert_eq!(store.get(claim.id).await.unwrap().title, "Diesel");
    }

    #[tokio::test]
    async fn test_cas_with_stale_version_conflicts() {
        let claim = claim_for(&employee());
        let store = InMemoryClaimStore::with_claims(vec![claim.clone()]).await;

        store.compare_and_swap(claim.id, 1, claim.clone()).await.unwrap();
        let err = store.compare_and_swap(claim.id, 1, claim.clone()).await.unwrap_err();

        assert!(err.is_version_conflict());
        assert_eq!(store.get(claim.id).await.unwrap().version, 2);
    }

    #[tokio::test]
    async fn test_cas_unknown_claim_not_found() {
        let claim = claim_for(&employee());
        let store = InMemoryClaimStore::new();
        let err = store.compare_and_swap(claim.id, 1, claim).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_cas_refuses_history_rewrite() {
        let mut claim = claim_for(&employee());
        claim.record(Role::Admin, EmployeeId::new(), crate::claim::HistoryAction::Recall, "x".into(), Utc::now());
        let store = InMemoryClaimStore::with_claims(vec![claim.clone()]).await;

        let mut rewritten = claim.clone();
        rewritten.history.clear();
        let err = store.compare_and_swap(claim.id, 1, rewritten).await.unwrap_err();
        assert!(matches!(err, PortError::Conflict { .. }));
    }

    #[test]
    fn test_created_within_covers_whole_days() {
        let day = |d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap();
        let query = ClaimQuery::default()
            .created_within(Some(day(1)), Some(day(31)))
            .unwrap();

        let employee = Actor::new(EmployeeId::new(), Role::Employee).with_manager(EmployeeId::new());
        let mut claim = claim_for(&employee);
        let at = |d: u32, h, m| day(d).and_hms_opt(h, m, 0).unwrap().and_utc();

        claim.created_at = at(1, 0, 0);
        assert!(query.matches(&claim));
        claim.created_at = at(31, 23, 59);
        assert!(query.matches(&claim));
        claim.created_at = day(31).succ_opt().unwrap().and_hms_opt(0, 0, 0).unwrap().and_utc();
        assert!(!query.matches(&claim));
        claim.created_at = at(1, 0, 0) - chrono::Duration::seconds(1);
        assert!(!query.matches(&claim));
    }

    #[test]
    fn test_created_within_rejects_inverted_range() {
        let from = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert!(matches!(
            ClaimQuery::default().created_within(Some(from), Some(to)),
            Err(ClaimError::Validation(_))
        ));

        let same_day = ClaimQuery::default().created_within(Some(from), Some(from)).unwrap();
        assert_eq!(
            same_day.created_to.unwrap() - same_day.created_from.unwrap(),
            chrono::Duration::days(1)
        );
    }

    #[test]
    fn test_open_ended_range() {
        let from = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let query = ClaimQuery::default().created_within(Some(from), None).unwrap();
        assert!(query.created_from.is_some());
        assert!(query.created_to.is_none());
    }

    #[tokio::test]
    async fn test_list_respects_scope_and_status() {
        let alice = employee();
        let bob = employee();
        let store = InMemoryClaimStore::new();
        store
            .insert_batch(vec![claim_for(&alice), claim_for(&alice), claim_for(&bob)])
            .await
            .unwrap();

        let own = store.list_by_scope(&alice.scope(), &ClaimQuery::default()).await.unwrap();
        assert_eq!(own.len(), 2);
        assert!(own.iter().all(|c| c.user_id == alice.id));

        let managed = Scope::Managed(bob.manager_id.unwrap());
        assert_eq!(store.list_by_scope(&managed, &ClaimQuery::default()).await.unwrap().len(), 1);

        let closed = ClaimQuery::by_status(ClaimStatus::Closed);
        assert!(store.list_by_scope(&Scope::All, &closed).await.unwrap().is_empty());

        let page = ClaimQuery::default().paginate(2, 1);
        assert_eq!(store.list_by_scope(&Scope::All, &page).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_count_by_status_default() {
        let alice = employee();
        let store = InMemoryClaimStore::new();
        store.insert_batch(vec![claim_for(&alice), claim_for(&alice)]).await.unwrap();

        let counts = store.count_by_status(&Scope::All).await.unwrap();
        let pending = counts
            .iter()
            .find(|(s, _)| *s == ClaimStatus::PendingManager)
            .map(|(_, n)| *n);
        assert_eq!(pending, Some(2));
    }

    #[tokio::test]
    async fn test_duplicate_insert_conflicts() {
        let claim = claim_for(&employee());
        let store = InMemoryClaimStore::new();
        store.insert_batch(vec![claim.clone()]).await.unwrap();
        let err = store.insert_batch(vec![claim]).await.unwrap_err();
        assert!(matches!(err, PortError::Conflict { .. }));
        assert_eq!(store.len().await, 1);
    }
}
