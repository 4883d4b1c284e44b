//! Test Data Builders
//!
//! `ClaimRecordBuilder` produces claims at any pipeline stage. It drives the
//! real decision and recall functions to get there, so the history of a built
//! claim is exactly what the service would have recorded.

use chrono::{NaiveDate, Utc};

use domain_claims::decision::{decide, DecisionInput};
use domain_claims::recall::{request_recall, RecallRequest};
use domain_claims::{ClaimRecord, ClaimStatus, NewClaim};

use crate::fixtures::{ClaimInputFixtures, Team};

/// Builder for claims at a chosen stage
pub struct ClaimRecordBuilder {
    team: Team,
    input: NewClaim,
    stage: ClaimStatus,
    recalled_from: ClaimStatus,
    require_attachment: bool,
}

impl Default for ClaimRecordBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimRecordBuilder {
    /// Creates a builder for a freshly submitted cab claim
    pub fn new() -> Self {
        Self {
            team: Team::new(),
            input: ClaimInputFixtures::cab(),
            stage: ClaimStatus::PendingManager,
            recalled_from: ClaimStatus::PendingManager,
            require_attachment: false,
        }
    }

    /// Uses the given team's actors for submission and decisions
    pub fn for_team(mut self, team: &Team) -> Self {
        self.team = team.clone();
        self
    }

    pub fn with_input(mut self, input: NewClaim) -> Self {
        self.input = input;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.input.title = title.into();
        self
    }

    pub fn with_amount(mut self, amount: i64) -> Self {
        self.input.amount = amount;
        self
    }

    pub fn with_claim_date(mut self, date: NaiveDate) -> Self {
        self.input.claim_date = Some(date);
        self
    }

    /// Target status of the built claim
    pub fn at(mut self, stage: ClaimStatus) -> Self {
        self.stage = stage;
        self
    }

    /// Builds a recalled claim whose recall was opened at `from`
    pub fn recalled_from(mut self, from: ClaimStatus, require_attachment: bool) -> Self {
        self.stage = ClaimStatus::Recalled;
        self.recalled_from = from;
        self.require_attachment = require_attachment;
        self
    }

    /// The team whose actors the builder uses
    pub fn team(&self) -> &Team {
        &self.team
    }

    /// Builds the claim
    ///
    /// # Panics
    ///
    /// Panics if the input is invalid or the stage cannot be reached
    pub fn build(self) -> ClaimRecord {
        let team = &self.team;
        let now = Utc::now();
        let submitted = ClaimRecord::submit(&team.employee, self.input.clone(), now)
            .expect("builder input must be a valid claim");

        let approve_manager = |c: &ClaimRecord| {
            decide(c, &team.manager, &DecisionInput::approve("approved by manager"), now)
                .expect("manager approval")
        };

        match self.stage {
            ClaimStatus::PendingManager => submitted,
            ClaimStatus::PendingFinance => approve_manager(&submitted),
            ClaimStatus::Closed => decide(
                &approve_manager(&submitted),
                &team.finance,
                &DecisionInput::approve("paid"),
                now,
            )
            .expect("finance approval"),
            ClaimStatus::Rejected => decide(
                &submitted,
                &team.manager,
                &DecisionInput::reject("not reimbursable"),
                now,
            )
            .expect("manager rejection"),
            ClaimStatus::Recalled => {
                let base = match self.recalled_from {
                    ClaimStatus::PendingFinance => approve_manager(&submitted),
                    _ => submitted,
                };
                let request = RecallRequest {
                    reason: "need receipt".to_string(),
                    require_attachment: self.require_attachment,
                };
                request_recall(&base, &team.admin, &request, now).expect("admin recall")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_stages_have_matching_history() {
        let cases = [
            (ClaimStatus::PendingManager, 0),
            (ClaimStatus::PendingFinance, 1),
            (ClaimStatus::Closed, 2),
            (ClaimStatus::Rejected, 1),
            (ClaimStatus::Recalled, 1),
        ];
        for (stage, history) in cases {
            let claim = ClaimRecordBuilder::new().at(stage).build();
            assert_eq!(claim.status, stage);
            assert_eq!(claim.history.len(), history);
        }
    }

    #[test]
    fn test_recalled_from_finance() {
        let claim = ClaimRecordBuilder::new()
            .recalled_from(ClaimStatus::PendingFinance, true)
            .build();
        let recall = claim.recall.expect("recall present");
        assert_eq!(recall.resume_status, ClaimStatus::PendingFinance);
        assert!(recall.require_attachment);
    }
}
