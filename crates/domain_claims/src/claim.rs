//! Claim aggregate

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{Amount, ClaimId, Currency, EmployeeId};

use crate::actor::{Actor, Role};
use crate::error::ClaimError;

/// Longest title the store accepts
pub const MAX_TITLE_LEN: usize = 140;

/// Claim status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    /// Waiting for the submitter's manager
    PendingManager,
    /// Manager approved; waiting for finance
    PendingFinance,
    /// Finance approved (terminal)
    Closed,
    /// Rejected at either stage (terminal)
    Rejected,
    /// Pulled out of the pipeline by an admin
    Recalled,
}

impl ClaimStatus {
    pub const ALL: [ClaimStatus; 5] = [
        ClaimStatus::PendingManager,
        ClaimStatus::PendingFinance,
        ClaimStatus::Closed,
        ClaimStatus::Rejected,
        ClaimStatus::Recalled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::PendingManager => "pending_manager",
            ClaimStatus::PendingFinance => "pending_finance",
            ClaimStatus::Closed => "closed",
            ClaimStatus::Rejected => "rejected",
            ClaimStatus::Recalled => "recalled",
        }
    }

    /// Closed and rejected claims accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, ClaimStatus::Closed | ClaimStatus::Rejected)
    }

    /// Counts toward the "pending" bucket of the summary
    pub fn is_pending(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClaimStatus {
    type Err = ClaimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClaimStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ClaimError::validation(format!("unknown claim status '{}'", s)))
    }
}

/// Kind of expense being reimbursed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimType {
    PetrolAllowance,
    CabAllowance,
    Meal,
    OfficeSupply,
    Postage,
}

impl ClaimType {
    pub const ALL: [ClaimType; 5] = [
        ClaimType::PetrolAllowance,
        ClaimType::CabAllowance,
        ClaimType::Meal,
        ClaimType::OfficeSupply,
        ClaimType::Postage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimType::PetrolAllowance => "PETROL_ALLOWANCE",
            ClaimType::CabAllowance => "CAB_ALLOWANCE",
            ClaimType::Meal => "MEAL",
            ClaimType::OfficeSupply => "OFFICE_SUPPLY",
            ClaimType::Postage => "POSTAGE",
        }
    }
}

impl fmt::Display for ClaimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClaimType {
    type Err = ClaimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClaimType::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ClaimError::validation(format!("unknown claim type '{}'", s)))
    }
}

/// Audit action recorded in a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HistoryAction {
    Approve,
    Reject,
    Recall,
    RecallResponse,
    RecallCancel,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Approve => "approve",
            HistoryAction::Reject => "reject",
            HistoryAction::Recall => "recall",
            HistoryAction::RecallResponse => "recall-response",
            HistoryAction::RecallCancel => "recall-cancel",
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryAction {
    type Err = ClaimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(HistoryAction::Approve),
            "reject" => Ok(HistoryAction::Reject),
            "recall" => Ok(HistoryAction::Recall),
            "recall-response" => Ok(HistoryAction::RecallResponse),
            "recall-cancel" => Ok(HistoryAction::RecallCancel),
            other => Err(ClaimError::validation(format!("unknown history action '{}'", other))),
        }
    }
}

/// One audit trail entry; never mutated after append
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub actor_id: EmployeeId,
    pub action: HistoryAction,
    pub comment: String,
    pub at: DateTime<Utc>,
}

/// An admin recall of a claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecallRecord {
    pub reason: String,
    pub require_attachment: bool,
    pub requested_by: EmployeeId,
    pub requested_at: DateTime<Utc>,
    /// Status the claim held immediately before the recall
    pub resume_status: ClaimStatus,
    /// Reference file the admin attached to explain the recall
    pub exhibit_ref: Option<String>,
    pub responded_at: Option<DateTime<Utc>>,
    pub response_comment: Option<String>,
    pub response_file_ref: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl RecallRecord {
    /// A recall is open until it is answered or cancelled
    pub fn is_open(&self) -> bool {
        self.responded_at.is_none() && self.cancelled_at.is_none()
    }
}

/// Employee note asking reviewers for a correction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub message: String,
    pub requested_at: DateTime<Utc>,
}

/// A reimbursement claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub id: ClaimId,
    /// Submitting employee
    pub user_id: EmployeeId,
    /// Approving manager, fixed at creation
    pub manager_id: EmployeeId,
    pub title: String,
    pub description: Option<String>,
    pub claim_type: ClaimType,
    pub amount: Amount,
    pub currency: Currency,
    /// Date the expense was incurred
    pub claim_date: NaiveDate,
    pub status: ClaimStatus,
    pub receipt_ref: Option<String>,
    pub recall: Option<RecallRecord>,
    pub change_request: Option<ChangeRequest>,
    pub history: Vec<HistoryEntry>,
    /// Optimistic concurrency token
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for one claim in a submission batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClaim {
    pub title: String,
    pub amount: i64,
    pub claim_type: String,
    pub currency_code: Option<String>,
    pub description: Option<String>,
    pub receipt_ref: Option<String>,
    pub claim_date: Option<NaiveDate>,
}

/// Field changes the owner may make while a claim is still editable
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimEdit {
    pub title: Option<String>,
    pub amount: Option<i64>,
    pub description: Option<String>,
    pub claim_type: Option<String>,
    pub currency_code: Option<String>,
    pub claim_date: Option<NaiveDate>,
}

impl ClaimEdit {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.amount.is_none()
            && self.description.is_none()
            && self.claim_type.is_none()
            && self.currency_code.is_none()
            && self.claim_date.is_none()
    }
}

impl ClaimRecord {
    /// Validates a submission and builds a `pending_manager` claim owned by `owner`
    pub fn submit(owner: &Actor, input: NewClaim, now: DateTime<Utc>) -> Result<Self, ClaimError> {
        let manager_id = owner.manager_id.ok_or_else(|| {
            ClaimError::validation("submitter has no manager assigned")
        })?;
        let title = validate_title(&input.title)?;
        let amount = Amount::from_i64(input.amount)?;
        let claim_type = input.claim_type.parse::<ClaimType>()?;
        let currency = parse_currency(input.currency_code.as_deref())?;

        Ok(Self {
            id: ClaimId::new_v7(),
            user_id: owner.id,
            manager_id,
            title,
            description: non_blank(input.description),
            claim_type,
            amount,
            currency,
            claim_date: input.claim_date.unwrap_or_else(|| now.date_naive()),
            status: ClaimStatus::PendingManager,
            receipt_ref: non_blank(input.receipt_ref),
            recall: None,
            change_request: None,
            history: Vec::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    /// Applies a validated edit; status and history are untouched
    pub fn apply_edit(&self, edit: ClaimEdit, now: DateTime<Utc>) -> Result<Self, ClaimError> {
        if edit.is_empty() {
            return Err(ClaimError::validation("nothing to change"));
        }

        let mut next = self.clone();
        if let Some(title) = edit.title {
            next.title = validate_title(&title)?;
        }
        if let Some(amount) = edit.amount {
            next.amount = Amount::from_i64(amount)?;
        }
        if let Some(kind) = edit.claim_type {
            next.claim_type = kind.parse()?;
        }
        if let Some(code) = edit.currency_code {
            next.currency = parse_currency(Some(&code))?;
        }
        if let Some(date) = edit.claim_date {
            next.claim_date = date;
        }
        if edit.description.is_some() {
            next.description = non_blank(edit.description);
        }
        next.updated_at = now;
        Ok(next)
    }

    /// Returns the open recall, if any
    pub fn open_recall(&self) -> Option<&RecallRecord> {
        self.recall.as_ref().filter(|recall| recall.is_open())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn last_entry(&self) -> Option<&HistoryEntry> {
        self.history.last()
    }

    /// Appends an audit entry and stamps the update time
    pub(crate) fn record(
        &mut self,
        role: Role,
        actor_id: EmployeeId,
        action: HistoryAction,
        comment: String,
        now: DateTime<Utc>,
    ) {
        self.history.push(HistoryEntry {
            role,
            actor_id,
            action,
            comment,
            at: now,
        });
        self.updated_at = now;
    }
}

/// Trims a required free-text field, failing if nothing remains
pub(crate) fn required_text(value: &str, what: &str) -> Result<String, ClaimError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ClaimError::validation(format!("{} is mandatory", what)));
    }
    Ok(trimmed.to_string())
}

fn validate_title(title: &str) -> Result<String, ClaimError> {
    let title = required_text(title, "title")?;
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ClaimError::validation(format!(
            "title must be at most {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(title)
}

fn parse_currency(code: Option<&str>) -> Result<Currency, ClaimError> {
    match code.map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => Ok(code.parse::<Currency>()?),
        None => Ok(Currency::default()),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
