//! Expense Claims Domain
//!
//! This crate implements the reimbursement claim lifecycle: submission,
//! manager and finance decisions, and the admin recall protocol.
//!
//! # Claim Lifecycle
//!
//! ```text
//! pending_manager -> pending_finance -> closed
//!        |                  |
//!        +----> rejected <--+
//!
//! any pending stage <-> recalled (resumes where it left off)
//! ```
//!
//! Decisions and recall operations are pure functions over a `ClaimRecord`;
//! `ClaimService` applies them against a `ClaimStore` with optimistic
//! compare-and-swap.

pub mod actor;
pub mod amend;
pub mod claim;
pub mod decision;
pub mod error;
pub mod events;
pub mod ports;
pub mod recall;
pub mod service;

pub use actor::{Actor, Role, Scope};
pub use claim::{
    ChangeRequest, ClaimEdit, ClaimRecord, ClaimStatus, ClaimType, HistoryAction, HistoryEntry,
    NewClaim, RecallRecord,
};
pub use decision::DecisionInput;
pub use error::{ClaimError, ErrorCategory};
pub use events::{ClaimEvent, ClaimNotifier, LoggingNotifier};
pub use ports::{memory::InMemoryClaimStore, ClaimQuery, ClaimStore};
pub use recall::{RecallRequest, RecallResponse};
pub use service::{ClaimCounts, ClaimService, ServiceConfig};
