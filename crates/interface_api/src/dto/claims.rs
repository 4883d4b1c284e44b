//! Claims DTOs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use domain_claims::decision::deciding_roles;
use domain_claims::{
    ClaimEdit, ClaimQuery, ClaimRecord, ClaimStatus, DecisionInput, HistoryEntry, NewClaim,
    RecallRecord, RecallRequest, RecallResponse,
};

use crate::error::ApiError;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateClaimsRequest {
    #[validate(length(min = 1, message = "at least one claim is required"))]
    pub items: Vec<CreateClaimItem>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateClaimItem {
    pub title: String,
    pub amount: i64,
    #[serde(rename = "type")]
    pub claim_type: String,
    pub currency: Option<String>,
    pub description: Option<String>,
    pub receipt_ref: Option<String>,
    pub claim_date: Option<NaiveDate>,
}

impl From<CreateClaimItem> for NewClaim {
    fn from(item: CreateClaimItem) -> Self {
        NewClaim {
            title: item.title,
            amount: item.amount,
            claim_type: item.claim_type,
            currency_code: item.currency,
            description: item.description,
            receipt_ref: item.receipt_ref,
            claim_date: item.claim_date,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListClaimsParams {
    pub status: Option<String>,
    /// First creation day included (UTC)
    pub from: Option<NaiveDate>,
    /// Last creation day included (UTC)
    pub to: Option<NaiveDate>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl TryFrom<ListClaimsParams> for ClaimQuery {
    type Error = ApiError;

    fn try_from(params: ListClaimsParams) -> Result<Self, Self::Error> {
        let status = params
            .status
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.parse::<ClaimStatus>())
            .transpose()?;
        let query = ClaimQuery {
            status,
            limit: params.limit,
            offset: params.offset,
            ..Default::default()
        }
        .created_within(params.from, params.to)?;
        Ok(query)
    }
}

/// Query string of the admin report download
#[derive(Debug, Deserialize)]
pub struct ExportParams {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub status: Option<String>,
    /// `xlsx` (default) or `csv`
    pub format: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EditClaimRequest {
    pub title: Option<String>,
    pub amount: Option<i64>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub claim_type: Option<String>,
    pub currency: Option<String>,
    pub claim_date: Option<NaiveDate>,
}

impl From<EditClaimRequest> for ClaimEdit {
    fn from(req: EditClaimRequest) -> Self {
        ClaimEdit {
            title: req.title,
            amount: req.amount,
            description: req.description,
            claim_type: req.claim_type,
            currency_code: req.currency,
            claim_date: req.claim_date,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub approve: bool,
    #[serde(default)]
    pub comment: String,
}

impl From<DecisionRequest> for DecisionInput {
    fn from(req: DecisionRequest) -> Self {
        DecisionInput {
            approve: req.approve,
            comment: req.comment,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RecallRequestBody {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub require_attachment: bool,
}

impl From<RecallRequestBody> for RecallRequest {
    fn from(body: RecallRequestBody) -> Self {
        RecallRequest {
            reason: body.reason,
            require_attachment: body.require_attachment,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RecallResponseBody {
    #[serde(default)]
    pub comment: String,
    pub file_ref: Option<String>,
}

impl From<RecallResponseBody> for RecallResponse {
    fn from(body: RecallResponseBody) -> Self {
        RecallResponse {
            comment: body.comment,
            file_ref: body.file_ref,
        }
    }
}

/// Body carrying a single file reference
#[derive(Debug, Deserialize)]
pub struct FileRefRequest {
    #[serde(default)]
    pub file_ref: String,
}

/// Body carrying a single free-text comment or message
#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    pub id: String,
    pub user_id: String,
    pub manager_id: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub claim_type: String,
    pub amount: u64,
    pub currency: String,
    /// Amount rendered with the currency symbol
    pub display_amount: String,
    pub claim_date: NaiveDate,
    pub status: ClaimStatus,
    /// Roles that may decide the claim next
    pub awaiting: Vec<String>,
    pub receipt_ref: Option<String>,
    pub recall: Option<RecallRecord>,
    pub change_request: Option<String>,
    pub history: Vec<HistoryEntry>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ClaimRecord> for ClaimResponse {
    fn from(claim: ClaimRecord) -> Self {
        ClaimResponse {
            id: claim.id.to_string(),
            user_id: claim.user_id.to_string(),
            manager_id: claim.manager_id.to_string(),
            title: claim.title,
            description: claim.description,
            claim_type: claim.claim_type.as_str().to_string(),
            amount: claim.amount.units(),
            currency: claim.currency.code().to_string(),
            display_amount: claim.amount.display_in(claim.currency),
            claim_date: claim.claim_date,
            status: claim.status,
            awaiting: deciding_roles(claim.status)
                .iter()
                .map(|r| r.as_str().to_string())
                .collect(),
            receipt_ref: claim.receipt_ref,
            recall: claim.recall,
            change_request: claim.change_request.map(|c| c.message),
            history: claim.history,
            version: claim.version,
            created_at: claim.created_at,
            updated_at: claim.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::ClaimRecordBuilder;

    #[test]
    fn test_response_lists_next_deciders() {
        let claim = ClaimRecordBuilder::new().at(ClaimStatus::PendingFinance).build();
        let response = ClaimResponse::from(claim);
        assert_eq!(response.awaiting, vec!["finance", "admin"]);
        assert_eq!(response.claim_type, "CAB_ALLOWANCE");
        assert!(response.id.starts_with("CLM-"));
    }

    #[test]
    fn test_blank_status_filter_is_ignored() {
        let params = ListClaimsParams {
            status: Some(" ".to_string()),
            ..Default::default()
        };
        assert_eq!(ClaimQuery::try_from(params).unwrap().status, None);
    }

    #[test]
    fn test_date_filter_becomes_created_range() {
        let params = ListClaimsParams {
            from: NaiveDate::from_ymd_opt(2024, 3, 1),
            to: NaiveDate::from_ymd_opt(2024, 3, 31),
            ..Default::default()
        };
        let query = ClaimQuery::try_from(params).unwrap();
        assert_eq!(query.created_from.unwrap().to_string(), "2024-03-01 00:00:00 UTC");
        assert_eq!(query.created_to.unwrap().to_string(), "2024-04-01 00:00:00 UTC");
    }

    #[test]
    fn test_inverted_date_filter_rejected() {
        let params = ListClaimsParams {
            from: NaiveDate::from_ymd_opt(2024, 3, 2),
            to: NaiveDate::from_ymd_opt(2024, 3, 1),
            ..Default::default()
        };
        assert!(matches!(
            ClaimQuery::try_from(params),
            Err(ApiError::Validation(..))
        ));
    }

    #[test]
    fn test_unknown_status_filter_rejected() {
        let params = ListClaimsParams {
            status: Some("archived".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            ClaimQuery::try_from(params),
            Err(ApiError::Validation(..))
        ));
    }
}
