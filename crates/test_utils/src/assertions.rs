//! Custom Test Assertions
//!
//! Provides assertion helpers for claims and claim errors that give more
//! meaningful failure messages than bare `matches!`.

use domain_claims::{ClaimError, ClaimRecord, ClaimStatus, HistoryAction, Role};

/// Asserts the claim's status and history length together
pub fn assert_stage(claim: &ClaimRecord, status: ClaimStatus, history_len: usize) {
    assert_eq!(
        claim.status, status,
        "Expected claim {} at {}, found {}",
        claim.id, status, claim.status
    );
    assert_eq!(
        claim.history.len(),
        history_len,
        "Expected {} history entries on claim {}, found {:?}",
        history_len,
        claim.id,
        claim.history
    );
}

/// Asserts the most recent history entry
pub fn assert_last_entry(claim: &ClaimRecord, role: Role, action: HistoryAction, comment: &str) {
    let entry = claim
        .history
        .last()
        .unwrap_or_else(|| panic!("Claim {} has no history", claim.id));
    assert_eq!(entry.role, role, "Unexpected role in {:?}", entry);
    assert_eq!(entry.action, action, "Unexpected action in {:?}", entry);
    assert_eq!(entry.comment, comment, "Unexpected comment in {:?}", entry);
}

/// Asserts that `after` keeps every entry of `before` in place
pub fn assert_history_extends(before: &ClaimRecord, after: &ClaimRecord) {
    assert!(
        after.history.len() >= before.history.len()
            && after.history[..before.history.len()] == before.history[..],
        "History of claim {} was rewritten:\nbefore: {:?}\nafter: {:?}",
        before.id,
        before.history,
        after.history
    );
}

fn describe<T: std::fmt::Debug>(result: &Result<T, ClaimError>) -> String {
    match result {
        Ok(value) => format!("Ok({:?})", value),
        Err(e) => format!("Err({:?})", e),
    }
}

/// Asserts a Validation failure
pub fn assert_validation<T: std::fmt::Debug>(result: &Result<T, ClaimError>) {
    assert!(
        matches!(result, Err(ClaimError::Validation(_))),
        "Expected Validation error, got {}",
        describe(result)
    );
}

/// Asserts a Forbidden failure
pub fn assert_forbidden<T: std::fmt::Debug>(result: &Result<T, ClaimError>) {
    assert!(
        matches!(result, Err(ClaimError::Forbidden(_))),
        "Expected Forbidden error, got {}",
        describe(result)
    );
}

/// Asserts a NotFound failure
pub fn assert_not_found<T: std::fmt::Debug>(result: &Result<T, ClaimError>) {
    assert!(
        matches!(result, Err(ClaimError::NotFound(_))),
        "Expected NotFound error, got {}",
        describe(result)
    );
}

/// Asserts an InvalidState failure
pub fn assert_invalid_state<T: std::fmt::Debug>(result: &Result<T, ClaimError>) {
    assert!(
        matches!(result, Err(ClaimError::InvalidState { .. })),
        "Expected InvalidState error, got {}",
        describe(result)
    );
}
