//! Claims repository implementation
//!
//! This module provides database access for reimbursement claims and their
//! append-only decision history.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::error::DatabaseError;

const CLAIM_COLUMNS: &str = r#"
    claim_id, user_id, manager_id, title, description, claim_type, amount,
    currency, claim_date, status, receipt_ref,
    recall_reason, recall_require_attachment, recall_requested_by,
    recall_requested_at, recall_resume_status, recall_exhibit_ref,
    recall_responded_at, recall_response_comment, recall_response_file_ref,
    recall_cancelled_at,
    change_request_message, change_requested_at,
    version, created_at, updated_at
"#;

const HISTORY_COLUMNS: &str = "claim_id, seq, role, actor_id, action, comment, at";

/// Repository for managing claims data
///
/// The ClaimsRepository handles all database operations for a claim's
/// lifecycle, from submission through the final decision.
#[derive(Debug, Clone)]
pub struct ClaimsRepository {
    pool: PgPool,
}

impl ClaimsRepository {
    /// Creates a new ClaimsRepository with the given connection pool
    ///
    /// # Arguments
    ///
    /// * `pool` - The PostgreSQL connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Retrieves a claim and its history by identifier
    ///
    /// Both reads share one REPEATABLE READ snapshot, so the history always
    /// matches the claim row's version.
    ///
    /// # Returns
    ///
    /// The claim with history or NotFound error
    pub async fn get(&self, claim_id: Uuid) -> Result<ClaimWithHistory, DatabaseError> {
        let mut tx = self.snapshot().await?;

        let claim = fetch_claim(&mut tx, claim_id, false)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Claim", claim_id))?;
        let history = fetch_history(&mut tx, claim_id).await?;

        tx.commit().await?;
        Ok(ClaimWithHistory { claim, history })
    }

    /// Retrieves the history of a claim in recording order
    pub async fn history(&self, claim_id: Uuid) -> Result<Vec<HistoryRow>, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        fetch_history(&mut conn, claim_id).await
    }

    /// Opens a read-only transaction at REPEATABLE READ
    async fn snapshot(&self) -> Result<Transaction<'static, Postgres>, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    /// Lists claims matching the filter, newest first
    pub async fn list(&self, filter: &ClaimFilter) -> Result<Vec<ClaimWithHistory>, DatabaseError> {
        let mut builder =
            QueryBuilder::<Postgres>::new(format!("SELECT {CLAIM_COLUMNS} FROM claims WHERE TRUE"));
        filter.push_conditions(&mut builder);
        builder.push(" ORDER BY created_at DESC, claim_id DESC");
        if let Some(limit) = filter.limit {
            builder.push(" LIMIT ").push_bind(limit);
        }
        if let Some(offset) = filter.offset {
            builder.push(" OFFSET ").push_bind(offset);
        }

        let mut tx = self.snapshot().await?;
        let claims = builder
            .build_query_as::<ClaimRow>()
            .fetch_all(&mut *tx)
            .await?;

        if claims.is_empty() {
            tx.commit().await?;
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = claims.iter().map(|c| c.claim_id).collect();
        let history = sqlx::query_as::<_, HistoryRow>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM claim_history WHERE claim_id = ANY($1) ORDER BY claim_id, seq"
        ))
        .bind(ids)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        let mut by_claim: HashMap<Uuid, Vec<HistoryRow>> = HashMap::new();
        for row in history {
            by_claim.entry(row.claim_id).or_default().push(row);
        }

        Ok(claims
            .into_iter()
            .map(|claim| {
                let history = by_claim.remove(&claim.claim_id).unwrap_or_default();
                ClaimWithHistory { claim, history }
            })
            .collect())
    }

    /// Counts claims per status for the filter's owner or manager
    pub async fn count_by_status(
        &self,
        filter: &ClaimFilter,
    ) -> Result<Vec<StatusCountRow>, DatabaseError> {
        let mut builder =
            QueryBuilder::<Postgres>::new("SELECT status, COUNT(*) AS count FROM claims WHERE TRUE");
        filter.push_conditions(&mut builder);
        builder.push(" GROUP BY status");

        let rows = builder
            .build_query_as::<StatusCountRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Inserts new claims in a single transaction
    ///
    /// Either every claim is stored or none are.
    pub async fn insert_batch(&self, claims: &[ClaimWithHistory]) -> Result<(), DatabaseError> {
        let sql = format!(
            r#"
            INSERT INTO claims ({CLAIM_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26)
            "#
        );
        let mut tx = self.pool.begin().await?;

        for entry in claims {
            let row = &entry.claim;
            bind_claim(sqlx::query(&sql), row)
                .execute(&mut *tx)
                .await
                .map_err(|e| match DatabaseError::from(e) {
                    DatabaseError::DuplicateEntry(_) => {
                        DatabaseError::duplicate("Claim", "id", row.claim_id)
                    }
                    other => other,
                })?;

            for history in &entry.history {
                insert_history(history).execute(&mut *tx).await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    /// Replaces a claim if its stored version is still `expected_version`
    ///
    /// The stored row is locked and checked against the replacement, the
    /// mutable columns are overwritten, the version is incremented, and
    /// history rows beyond those already persisted are appended, all in one
    /// transaction.
    ///
    /// # Returns
    ///
    /// The new stored version
    ///
    /// # Errors
    ///
    /// - `DatabaseError::NotFound` if no claim has this identifier
    /// - `DatabaseError::StaleVersion` if the stored version moved on
    /// - `DatabaseError::ConstraintViolation` if the owner or manager would
    ///   change, or the persisted history is not a prefix of the new one
    pub async fn compare_and_swap(
        &self,
        expected_version: i64,
        replacement: &ClaimWithHistory,
    ) -> Result<i64, DatabaseError> {
        let row = &replacement.claim;
        let mut tx = self.pool.begin().await?;

        let Some(current) = fetch_claim(&mut tx, row.claim_id, true).await? else {
            tx.rollback().await?;
            return Err(DatabaseError::not_found("Claim", row.claim_id));
        };
        if current.version != expected_version {
            tx.rollback().await?;
            return Err(DatabaseError::stale("Claim", row.claim_id, expected_version));
        }
        let persisted = fetch_history(&mut tx, row.claim_id).await?;
        if let Err(e) = guard_replacement(&current, &persisted, replacement) {
            tx.rollback().await?;
            return Err(e);
        }

        let new_version = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE claims SET
                title = $3,
                description = $4,
                claim_type = $5,
                amount = $6,
                currency = $7,
                claim_date = $8,
                status = $9,
                receipt_ref = $10,
                recall_reason = $11,
                recall_require_attachment = $12,
                recall_requested_by = $13,
                recall_requested_at = $14,
                recall_resume_status = $15,
                recall_exhibit_ref = $16,
                recall_responded_at = $17,
                recall_response_comment = $18,
                recall_response_file_ref = $19,
                recall_cancelled_at = $20,
                change_request_message = $21,
                change_requested_at = $22,
                updated_at = $23,
                version = version + 1
            WHERE claim_id = $1 AND version = $2
            RETURNING version
            "#,
        )
        .bind(row.claim_id)
        .bind(expected_version)
        .bind(row.title.clone())
        .bind(row.description.clone())
        .bind(row.claim_type.clone())
        .bind(row.amount)
        .bind(row.currency.clone())
        .bind(row.claim_date)
        .bind(row.status.clone())
        .bind(row.receipt_ref.clone())
        .bind(row.recall_reason.clone())
        .bind(row.recall_require_attachment)
        .bind(row.recall_requested_by)
        .bind(row.recall_requested_at)
        .bind(row.recall_resume_status.clone())
        .bind(row.recall_exhibit_ref.clone())
        .bind(row.recall_responded_at)
        .bind(row.recall_response_comment.clone())
        .bind(row.recall_response_file_ref.clone())
        .bind(row.recall_cancelled_at)
        .bind(row.change_request_message.clone())
        .bind(row.change_requested_at)
        .bind(row.updated_at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(new_version) = new_version else {
            tx.rollback().await?;
            return Err(DatabaseError::stale("Claim", row.claim_id, expected_version));
        };

        for entry in &replacement.history[persisted.len()..] {
            insert_history(entry).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(new_version)
    }
}

async fn fetch_claim(
    conn: &mut PgConnection,
    claim_id: Uuid,
    for_update: bool,
) -> Result<Option<ClaimRow>, DatabaseError> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let row = sqlx::query_as::<_, ClaimRow>(&format!(
        "SELECT {CLAIM_COLUMNS} FROM claims WHERE claim_id = $1{lock}"
    ))
    .bind(claim_id)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

async fn fetch_history(
    conn: &mut PgConnection,
    claim_id: Uuid,
) -> Result<Vec<HistoryRow>, DatabaseError> {
    let rows = sqlx::query_as::<_, HistoryRow>(&format!(
        "SELECT {HISTORY_COLUMNS} FROM claim_history WHERE claim_id = $1 ORDER BY seq"
    ))
    .bind(claim_id)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

/// Rejects replacements that move ownership or rewrite persisted history
///
/// Timestamps compare at microsecond precision, the resolution Postgres stores.
pub(crate) fn guard_replacement(
    current: &ClaimRow,
    persisted: &[HistoryRow],
    replacement: &ClaimWithHistory,
) -> Result<(), DatabaseError> {
    let next = &replacement.claim;
    if next.user_id != current.user_id || next.manager_id != current.manager_id {
        return Err(DatabaseError::ConstraintViolation(
            "claim owner and manager are immutable".to_string(),
        ));
    }

    let extends = replacement.history.len() >= persisted.len()
        && persisted
            .iter()
            .zip(&replacement.history)
            .all(|(stored, next)| same_entry(stored, next));
    if !extends {
        return Err(DatabaseError::ConstraintViolation(
            "claim history is append-only".to_string(),
        ));
    }
    Ok(())
}

fn same_entry(stored: &HistoryRow, next: &HistoryRow) -> bool {
    stored.seq == next.seq
        && stored.role.trim() == next.role.trim()
        && stored.actor_id == next.actor_id
        && stored.action.trim() == next.action.trim()
        && stored.comment == next.comment
        && stored.at.timestamp_micros() == next.at.timestamp_micros()
}

fn bind_claim<'q>(
    query: Query<'q, Postgres, PgArguments>,
    row: &ClaimRow,
) -> Query<'q, Postgres, PgArguments> {
    query
        .bind(row.claim_id)
        .bind(row.user_id)
        .bind(row.manager_id)
        .bind(row.title.clone())
        .bind(row.description.clone())
        .bind(row.claim_type.clone())
        .bind(row.amount)
        .bind(row.currency.clone())
        .bind(row.claim_date)
        .bind(row.status.clone())
        .bind(row.receipt_ref.clone())
        .bind(row.recall_reason.clone())
        .bind(row.recall_require_attachment)
        .bind(row.recall_requested_by)
        .bind(row.recall_requested_at)
        .bind(row.recall_resume_status.clone())
        .bind(row.recall_exhibit_ref.clone())
        .bind(row.recall_responded_at)
        .bind(row.recall_response_comment.clone())
        .bind(row.recall_response_file_ref.clone())
        .bind(row.recall_cancelled_at)
        .bind(row.change_request_message.clone())
        .bind(row.change_requested_at)
        .bind(row.version)
        .bind(row.created_at)
        .bind(row.updated_at)
}

fn insert_history(row: &HistoryRow) -> Query<'static, Postgres, PgArguments> {
    sqlx::query(
        r#"
        INSERT INTO claim_history (claim_id, seq, role, actor_id, action, comment, at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(row.claim_id)
    .bind(row.seq)
    .bind(row.role.clone())
    .bind(row.actor_id)
    .bind(row.action.clone())
    .bind(row.comment.clone())
    .bind(row.at)
}

/// Filter for listing and counting claims
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimFilter {
    /// Only claims owned by this employee
    pub user_id: Option<Uuid>,
    /// Only claims routed to this manager
    pub manager_id: Option<Uuid>,
    pub status: Option<String>,
    /// Inclusive lower bound on `created_at`
    pub created_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`
    pub created_to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ClaimFilter {
    fn push_conditions(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        if let Some(user_id) = self.user_id {
            builder.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(manager_id) = self.manager_id {
            builder.push(" AND manager_id = ").push_bind(manager_id);
        }
        if let Some(status) = &self.status {
            builder.push(" AND status = ").push_bind(status.clone());
        }
        if let Some(from) = self.created_from {
            builder.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = self.created_to {
            builder.push(" AND created_at < ").push_bind(to);
        }
    }
}

// Row types

/// A claim together with its ordered history
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimWithHistory {
    pub claim: ClaimRow,
    pub history: Vec<HistoryRow>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ClaimRow {
    pub claim_id: Uuid,
    pub user_id: Uuid,
    pub manager_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub claim_type: String,
    pub amount: i64,
    pub currency: String,
    pub claim_date: NaiveDate,
    pub status: String,
    pub receipt_ref: Option<String>,
    pub recall_reason: Option<String>,
    pub recall_require_attachment: Option<bool>,
    pub recall_requested_by: Option<Uuid>,
    pub recall_requested_at: Option<DateTime<Utc>>,
    pub recall_resume_status: Option<String>,
    pub recall_exhibit_ref: Option<String>,
    pub recall_responded_at: Option<DateTime<Utc>>,
    pub recall_response_comment: Option<String>,
    pub recall_response_file_ref: Option<String>,
    pub recall_cancelled_at: Option<DateTime<Utc>>,
    pub change_request_message: Option<String>,
    pub change_requested_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct HistoryRow {
    pub claim_id: Uuid,
    /// Zero-based position in the claim's history
    pub seq: i32,
    pub role: String,
    pub actor_id: Uuid,
    pub action: String,
    pub comment: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StatusCountRow {
    pub status: String,
    pub count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_conditions_bind_in_order() {
        let filter = ClaimFilter {
            manager_id: Some(Uuid::new_v4()),
            status: Some("pending_manager".to_string()),
            ..Default::default()
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM claims WHERE TRUE");
        filter.push_conditions(&mut builder);
        assert_eq!(
            builder.sql(),
            "SELECT 1 FROM claims WHERE TRUE AND manager_id = $1 AND status = $2"
        );
    }

    #[test]
    fn test_created_range_is_half_open() {
        let from = Utc::now();
        let filter = ClaimFilter {
            status: Some("closed".to_string()),
            created_from: Some(from),
            created_to: Some(from + chrono::Duration::days(1)),
            ..Default::default()
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM claims WHERE TRUE");
        filter.push_conditions(&mut builder);
        assert_eq!(
            builder.sql(),
            "SELECT 1 FROM claims WHERE TRUE AND status = $1 AND created_at >= $2 AND created_at < $3"
        );
    }

    #[test]
    fn test_empty_filter_adds_no_conditions() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM claims WHERE TRUE");
        ClaimFilter::default().push_conditions(&mut builder);
        assert_eq!(builder.sql(), "SELECT 1 FROM claims WHERE TRUE");
    }
}
