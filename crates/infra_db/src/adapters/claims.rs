//! PostgreSQL Claim Store Adapter
//!
//! This module provides the database adapter for the claims domain,
//! implementing the `ClaimStore` port using PostgreSQL via the `ClaimsRepository`.
//!
//! # Overview
//!
//! The `PostgresClaimStore` serves as the bridge between the domain layer's
//! port interface and the database layer. It:
//!
//! - Translates domain requests into repository operations
//! - Converts database row types back to domain models
//! - Handles error translation between database and port errors
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresClaimStore;
//! use domain_claims::{ClaimService, ClaimStore};
//! use std::sync::Arc;
//!
//! let store: Arc<dyn ClaimStore> = Arc::new(PostgresClaimStore::new(pool));
//! let service = ClaimService::new(store);
//! ```

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::{debug, instrument};

use core_kernel::{
    AdapterHealth, Amount, ClaimId, Currency, DomainPort, EmployeeId, HealthCheckResult,
    HealthCheckable, PortError,
};
use domain_claims::{
    ChangeRequest, ClaimQuery, ClaimRecord, ClaimStatus, ClaimStore, ClaimType, HistoryAction,
    HistoryEntry, RecallRecord, Role, Scope,
};

use crate::error::DatabaseError;
use crate::repositories::claims::{
    ClaimFilter, ClaimRow, ClaimWithHistory, ClaimsRepository, HistoryRow,
};

const ADAPTER_ID: &str = "postgres-claim-store";

/// PostgreSQL-backed implementation of the ClaimStore trait
///
/// # Health Checking
///
/// Health checks perform a simple query to ensure the connection pool is
/// operational.
///
/// # Error Handling
///
/// Database errors are translated to `PortError` variants:
/// - `DatabaseError::NotFound` -> `PortError::NotFound`
/// - `DatabaseError::StaleVersion` -> `PortError::VersionConflict`
/// - `DatabaseError::DuplicateEntry` -> `PortError::Conflict`
/// - Connection errors -> `PortError::Connection`
/// - Other errors -> `PortError::Internal`
#[derive(Debug, Clone)]
pub struct PostgresClaimStore {
    repository: ClaimsRepository,
    pool: PgPool,
}

impl PostgresClaimStore {
    /// Creates a new PostgreSQL claim store
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: ClaimsRepository::new(pool.clone()),
            pool,
        }
    }

    /// Returns a reference to the underlying repository
    pub fn repository(&self) -> &ClaimsRepository {
        &self.repository
    }
}

// Mark as a domain port
impl DomainPort for PostgresClaimStore {}

#[async_trait]
impl HealthCheckable for PostgresClaimStore {
    /// Checks database connectivity with a SELECT 1
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();

        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;

        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => HealthCheckResult {
                adapter_id: ADAPTER_ID.to_string(),
                status: AdapterHealth::Healthy,
                latency_ms,
                message: None,
                checked_at: Utc::now(),
            },
            Err(e) => HealthCheckResult {
                adapter_id: ADAPTER_ID.to_string(),
                status: AdapterHealth::Unhealthy,
                latency_ms,
                message: Some(format!("Database error: {}", e)),
                checked_at: Utc::now(),
            },
        }
    }
}

#[async_trait]
impl ClaimStore for PostgresClaimStore {
    #[instrument(skip(self), fields(claim_id = %id))]
    async fn get(&self, id: ClaimId) -> Result<ClaimRecord, PortError> {
        debug!("Fetching claim by ID");

        let row = self
            .repository
            .get(*id.as_uuid())
            .await
            .map_err(db_to_port_error)?;

        row_to_claim(row)
    }

    #[instrument(skip(self))]
    async fn list_by_scope(
        &self,
        scope: &Scope,
        query: &ClaimQuery,
    ) -> Result<Vec<ClaimRecord>, PortError> {
        let mut filter = scope_filter(scope);
        filter.status = query.status.map(|s| s.as_str().to_string());
        filter.created_from = query.created_from;
        filter.created_to = query.created_to;
        filter.limit = query.limit.map(i64::from);
        filter.offset = query.offset.map(i64::from);

        let rows = self
            .repository
            .list(&filter)
            .await
            .map_err(db_to_port_error)?;

        debug!(count = rows.len(), "Listed claims");
        rows.into_iter().map(row_to_claim).collect()
    }

    #[instrument(skip(self, claims), fields(count = claims.len()))]
    async fn insert_batch(&self, claims: Vec<ClaimRecord>) -> Result<Vec<ClaimRecord>, PortError> {
        let rows = claims
            .iter()
            .map(claim_to_row)
            .collect::<Result<Vec<_>, _>>()?;

        self.repository
            .insert_batch(&rows)
            .await
            .map_err(db_to_port_error)?;

        Ok(claims)
    }

    #[instrument(skip(self, record), fields(claim_id = %id))]
    async fn compare_and_swap(
        &self,
        id: ClaimId,
        expected_version: u64,
        mut record: ClaimRecord,
    ) -> Result<ClaimRecord, PortError> {
        if record.id != id {
            return Err(PortError::conflict("claim identity is immutable"));
        }
        let expected = to_i64(expected_version, "version")?;
        let row = claim_to_row(&record)?;

        let new_version = self
            .repository
            .compare_and_swap(expected, &row)
            .await
            .map_err(db_to_port_error)?;

        record.version = u64::try_from(new_version)
            .map_err(|_| PortError::transformation("stored version is negative"))?;
        debug!(version = record.version, "Claim replaced");
        Ok(record)
    }

    #[instrument(skip(self))]
    async fn count_by_status(&self, scope: &Scope) -> Result<Vec<(ClaimStatus, u64)>, PortError> {
        let rows = self
            .repository
            .count_by_status(&scope_filter(scope))
            .await
            .map_err(db_to_port_error)?;

        let mut counts: Vec<(ClaimStatus, u64)> =
            ClaimStatus::ALL.into_iter().map(|s| (s, 0)).collect();
        for row in rows {
            let status = parse_column::<ClaimStatus>(&row.status, "status")?;
            let count = u64::try_from(row.count).unwrap_or(0);
            if let Some(slot) = counts.iter_mut().find(|(s, _)| *s == status) {
                slot.1 = count;
            }
        }
        Ok(counts)
    }
}

fn scope_filter(scope: &Scope) -> ClaimFilter {
    match scope {
        Scope::Own(id) => ClaimFilter {
            user_id: Some(*id.as_uuid()),
            ..Default::default()
        },
        Scope::Managed(id) => ClaimFilter {
            manager_id: Some(*id.as_uuid()),
            ..Default::default()
        },
        Scope::All => ClaimFilter::default(),
    }
}

// Conversion helpers

fn db_to_port_error(err: DatabaseError) -> PortError {
    match err {
        DatabaseError::NotFound { entity, id } => PortError::not_found(entity, id),
        DatabaseError::StaleVersion { entity, id, expected } => {
            PortError::version_conflict(entity, id, expected.max(0) as u64)
        }
        DatabaseError::DuplicateEntry(msg) => PortError::conflict(msg),
        DatabaseError::ConstraintViolation(msg) | DatabaseError::ForeignKeyViolation(msg) => {
            PortError::conflict(msg)
        }
        DatabaseError::ConnectionFailed(msg) => PortError::connection(msg),
        DatabaseError::PoolExhausted => PortError::connection("connection pool exhausted"),
        DatabaseError::SerializationError(msg) => PortError::transformation(msg),
        other => PortError::internal(other.to_string()),
    }
}

fn to_i64(value: u64, what: &str) -> Result<i64, PortError> {
    i64::try_from(value).map_err(|_| PortError::transformation(format!("{what} out of range")))
}

fn parse_column<T: FromStr>(value: &str, column: &str) -> Result<T, PortError> {
    value
        .trim()
        .parse()
        .map_err(|_| PortError::transformation(format!("invalid {column} '{value}'")))
}

fn claim_to_row(claim: &ClaimRecord) -> Result<ClaimWithHistory, PortError> {
    let claim_id = *claim.id.as_uuid();
    let recall = claim.recall.as_ref();

    let history = claim
        .history
        .iter()
        .enumerate()
        .map(|(seq, entry)| {
            Ok(HistoryRow {
                claim_id,
                seq: i32::try_from(seq)
                    .map_err(|_| PortError::transformation("history too long"))?,
                role: entry.role.as_str().to_string(),
                actor_id: *entry.actor_id.as_uuid(),
                action: entry.action.as_str().to_string(),
                comment: entry.comment.clone(),
                at: entry.at,
            })
        })
        .collect::<Result<Vec<_>, PortError>>()?;

    let row = ClaimRow {
        claim_id,
        user_id: *claim.user_id.as_uuid(),
        manager_id: *claim.manager_id.as_uuid(),
        title: claim.title.clone(),
        description: claim.description.clone(),
        claim_type: claim.claim_type.as_str().to_string(),
        amount: to_i64(claim.amount.units(), "amount")?,
        currency: claim.currency.code().to_string(),
        claim_date: claim.claim_date,
        status: claim.status.as_str().to_string(),
        receipt_ref: claim.receipt_ref.clone(),
        recall_reason: recall.map(|r| r.reason.clone()),
        recall_require_attachment: recall.map(|r| r.require_attachment),
        recall_requested_by: recall.map(|r| *r.requested_by.as_uuid()),
        recall_requested_at: recall.map(|r| r.requested_at),
        recall_resume_status: recall.map(|r| r.resume_status.as_str().to_string()),
        recall_exhibit_ref: recall.and_then(|r| r.exhibit_ref.clone()),
        recall_responded_at: recall.and_then(|r| r.responded_at),
        recall_response_comment: recall.and_then(|r| r.response_comment.clone()),
        recall_response_file_ref: recall.and_then(|r| r.response_file_ref.clone()),
        recall_cancelled_at: recall.and_then(|r| r.cancelled_at),
        change_request_message: claim.change_request.as_ref().map(|c| c.message.clone()),
        change_requested_at: claim.change_request.as_ref().map(|c| c.requested_at),
        version: to_i64(claim.version, "version")?,
        created_at: claim.created_at,
        updated_at: claim.updated_at,
    };

    Ok(ClaimWithHistory { claim: row, history })
}

fn row_to_claim(row: ClaimWithHistory) -> Result<ClaimRecord, PortError> {
    let ClaimWithHistory { claim: c, history } = row;

    let recall = match (
        c.recall_reason,
        c.recall_requested_by,
        c.recall_requested_at,
        c.recall_resume_status,
    ) {
        (Some(reason), Some(requested_by), Some(requested_at), Some(resume_status)) => {
            Some(RecallRecord {
                reason,
                require_attachment: c.recall_require_attachment.unwrap_or(false),
                requested_by: EmployeeId::from_uuid(requested_by),
                requested_at,
                resume_status: parse_column(&resume_status, "recall_resume_status")?,
                exhibit_ref: c.recall_exhibit_ref,
                responded_at: c.recall_responded_at,
                response_comment: c.recall_response_comment,
                response_file_ref: c.recall_response_file_ref,
                cancelled_at: c.recall_cancelled_at,
            })
        }
        _ => None,
    };

    let change_request = match (c.change_request_message, c.change_requested_at) {
        (Some(message), Some(requested_at)) => Some(ChangeRequest {
            message,
            requested_at,
        }),
        _ => None,
    };

    let history = history
        .into_iter()
        .map(|h| {
            Ok(HistoryEntry {
                role: parse_column::<Role>(&h.role, "role")?,
                actor_id: EmployeeId::from_uuid(h.actor_id),
                action: parse_column::<HistoryAction>(&h.action, "action")?,
                comment: h.comment,
                at: h.at,
            })
        })
        .collect::<Result<Vec<_>, PortError>>()?;

    Ok(ClaimRecord {
        id: ClaimId::from_uuid(c.claim_id),
        user_id: EmployeeId::from_uuid(c.user_id),
        manager_id: EmployeeId::from_uuid(c.manager_id),
        title: c.title,
        description: c.description,
        claim_type: parse_column::<ClaimType>(&c.claim_type, "claim_type")?,
        amount: Amount::from_i64(c.amount)
            .map_err(|e| PortError::transformation(e.to_string()))?,
        currency: parse_column::<Currency>(&c.currency, "currency")?,
        claim_date: c.claim_date,
        status: parse_column::<ClaimStatus>(&c.status, "status")?,
        receipt_ref: c.receipt_ref,
        recall,
        change_request,
        history,
        version: u64::try_from(c.version)
            .map_err(|_| PortError::transformation("stored version is negative"))?,
        created_at: c.created_at,
        updated_at: c.updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::claims::guard_replacement;
    use chrono::DateTime;
    use domain_claims::decision::{decide, DecisionInput};
    use test_utils::{ClaimRecordBuilder, Team};

    /// The row as Postgres would hand it back, timestamps cut to microseconds
    fn stored(claim: &ClaimRecord) -> ClaimWithHistory {
        let mut row = claim_to_row(claim).expect("maps to row");
        for entry in &mut row.history {
            entry.at = DateTime::<Utc>::from_timestamp_micros(entry.at.timestamp_micros()).expect("in range");
        }
        row
    }

    fn check(current: &ClaimWithHistory, next: &ClaimRecord) -> Result<(), DatabaseError> {
        let next = claim_to_row(next).expect("maps to row");
        guard_replacement(&current.claim, &current.history, &next)
    }

    #[test]
    fn test_guard_accepts_appended_history() {
        let team = Team::new();
        let claim = ClaimRecordBuilder::new()
            .for_team(&team)
            .at(ClaimStatus::PendingFinance)
            .build();
        let next = decide(&claim, &team.finance, &DecisionInput::approve("paid"), Utc::now())
            .expect("finance approves");

        assert!(check(&stored(&claim), &next).is_ok());
    }

    #[test]
    fn test_guard_rejects_moved_owner_or_manager() {
        let team = Team::new();
        let claim = ClaimRecordBuilder::new().for_team(&team).build();
        let current = stored(&claim);

        let mut moved = claim.clone();
        moved.manager_id = EmployeeId::new();
        assert!(matches!(
            check(&current, &moved),
            Err(DatabaseError::ConstraintViolation(_))
        ));

        let mut reassigned = claim.clone();
        reassigned.user_id = EmployeeId::new();
        assert!(matches!(
            check(&current, &reassigned),
            Err(DatabaseError::ConstraintViolation(_))
        ));
    }

    #[test]
    fn test_guard_rejects_rewritten_or_shrunk_history() {
        let team = Team::new();
        let claim = ClaimRecordBuilder::new()
            .for_team(&team)
            .at(ClaimStatus::PendingFinance)
            .build();
        let current = stored(&claim);
        let next = decide(&claim, &team.finance, &DecisionInput::approve("paid"), Utc::now())
            .expect("finance approves");

        let mut rewritten = next.clone();
        rewritten.history[0].comment = "never said this".to_string();
        assert!(matches!(
            check(&current, &rewritten),
            Err(DatabaseError::ConstraintViolation(_))
        ));

        let mut shrunk = next;
        shrunk.history.clear();
        assert!(matches!(
            check(&current, &shrunk),
            Err(DatabaseError::ConstraintViolation(_))
        ));
    }

    #[test]
    fn test_row_mapping_preserves_recalled_claim() {
        let claim = ClaimRecordBuilder::new()
            .recalled_from(ClaimStatus::PendingFinance, true)
            .build();

        let row = claim_to_row(&claim).expect("maps to row");
        assert_eq!(row.claim.status, "recalled");
        assert_eq!(row.claim.recall_resume_status.as_deref(), Some("pending_finance"));
        assert_eq!(row.history.len(), 2);
        assert_eq!(row.history[1].seq, 1);
        assert_eq!(row.history[1].action, "recall");

        let back = row_to_claim(row).expect("maps back");
        assert_eq!(back, claim);
    }

    #[test]
    fn test_row_mapping_without_recall() {
        let claim = ClaimRecordBuilder::new().build();
        let row = claim_to_row(&claim).expect("maps to row");
        assert!(row.claim.recall_requested_at.is_none());
        assert!(row.history.is_empty());
        assert_eq!(row_to_claim(row).expect("maps back"), claim);
    }

    #[test]
    fn test_unknown_status_is_transformation_error() {
        let claim = ClaimRecordBuilder::new().build();
        let mut row = claim_to_row(&claim).expect("maps to row");
        row.claim.status = "archived".to_string();
        assert!(matches!(
            row_to_claim(row),
            Err(PortError::Transformation { .. })
        ));
    }

    #[test]
    fn test_char_padded_currency_parses() {
        let claim = ClaimRecordBuilder::new().build();
        let mut row = claim_to_row(&claim).expect("maps to row");
        row.claim.currency = format!("{} ", row.claim.currency);
        assert_eq!(row_to_claim(row).expect("maps back").currency, claim.currency);
    }

    #[test]
    fn test_scope_filters() {
        let team = Team::new();
        assert_eq!(
            scope_filter(&team.employee.scope()).user_id,
            Some(*team.employee.id.as_uuid())
        );
        assert_eq!(
            scope_filter(&team.manager.scope()).manager_id,
            Some(*team.manager.id.as_uuid())
        );
        assert_eq!(scope_filter(&team.finance.scope()), ClaimFilter::default());
    }

    #[test]
    fn test_stale_version_becomes_version_conflict() {
        let err = db_to_port_error(DatabaseError::stale("Claim", "abc", 2));
        assert!(err.is_version_conflict());
        assert!(db_to_port_error(DatabaseError::not_found("Claim", "abc")).is_not_found());
        assert!(db_to_port_error(DatabaseError::PoolExhausted).is_transient());
    }
}
