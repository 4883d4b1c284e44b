//! Property-Based Test Generators
//!
//! Provides proptest strategies for claim inputs and for random sequences of
//! lifecycle actions used by the state-machine properties.

use core_kernel::{ClaimId, Currency, EmployeeId};
use domain_claims::{ClaimType, NewClaim};
use proptest::prelude::*;

/// Strategy for generating valid Currency values
pub fn currency_strategy() -> impl Strategy<Value = Currency> {
    proptest::sample::select(Currency::ALL.to_vec())
}

/// Strategy for generating claim types
pub fn claim_type_strategy() -> impl Strategy<Value = ClaimType> {
    proptest::sample::select(ClaimType::ALL.to_vec())
}

/// Strategy for generating valid amounts in whole units
pub fn amount_strategy() -> impl Strategy<Value = i64> {
    0i64..1_000_000i64
}

/// Strategy for generating titles that pass validation
pub fn title_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9 ]{0,60}"
}

/// Strategy for generating whitespace-only strings
pub fn blank_strategy() -> impl Strategy<Value = String> {
    "[ \t\n]{0,5}"
}

/// Strategy for generating valid submission inputs
pub fn new_claim_strategy() -> impl Strategy<Value = NewClaim> {
    (
        title_strategy(),
        amount_strategy(),
        claim_type_strategy(),
        currency_strategy(),
    )
        .prop_map(|(title, amount, claim_type, currency)| NewClaim {
            title,
            amount,
            claim_type: claim_type.as_str().to_string(),
            currency_code: Some(currency.code().to_string()),
            ..Default::default()
        })
}

/// Strategy for generating ClaimId
pub fn claim_id_strategy() -> impl Strategy<Value = ClaimId> {
    any::<[u8; 16]>().prop_map(|bytes| ClaimId::from_uuid(uuid::Uuid::from_bytes(bytes)))
}

/// Strategy for generating EmployeeId
pub fn employee_id_strategy() -> impl Strategy<Value = EmployeeId> {
    any::<[u8; 16]>().prop_map(|bytes| EmployeeId::from_uuid(uuid::Uuid::from_bytes(bytes)))
}

/// One attempted step in a claim's life
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    ManagerApprove,
    ManagerReject,
    FinanceApprove,
    FinanceReject,
    AdminApprove,
    AdminReject,
    /// A manager who does not manage the claim
    StrangerApprove,
    /// The rightful manager, but with a blank comment
    BlankApprove,
    Recall { require_attachment: bool },
    Respond { with_file: bool },
    CancelRecall,
}

/// Strategy for a single lifecycle action
pub fn lifecycle_action_strategy() -> impl Strategy<Value = LifecycleAction> {
    prop_oneof![
        Just(LifecycleAction::ManagerApprove),
        Just(LifecycleAction::ManagerReject),
        Just(LifecycleAction::FinanceApprove),
        Just(LifecycleAction::FinanceReject),
        Just(LifecycleAction::AdminApprove),
        Just(LifecycleAction::AdminReject),
        Just(LifecycleAction::StrangerApprove),
        Just(LifecycleAction::BlankApprove),
        any::<bool>().prop_map(|require_attachment| LifecycleAction::Recall { require_attachment }),
        any::<bool>().prop_map(|with_file| LifecycleAction::Respond { with_file }),
        Just(LifecycleAction::CancelRecall),
    ]
}

/// Strategy for sequences of lifecycle actions
pub fn lifecycle_strategy(max_len: usize) -> impl Strategy<Value = Vec<LifecycleAction>> {
    proptest::collection::vec(lifecycle_action_strategy(), 0..=max_len)
}
