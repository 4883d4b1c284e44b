//! Pre-built Test Fixtures
//!
//! Provides ready-to-use actors and claim inputs. Every call creates fresh
//! identifiers so tests never share state by accident.

use fake::faker::lorem::en::{Sentence, Words};
use fake::Fake;

use core_kernel::EmployeeId;
use domain_claims::{Actor, NewClaim, Role};

/// A reporting line: one employee, their manager, plus finance and admin reviewers
#[derive(Debug, Clone)]
pub struct Team {
    pub employee: Actor,
    pub manager: Actor,
    pub finance: Actor,
    pub admin: Actor,
}

impl Team {
    /// Creates a team with fresh identifiers
    pub fn new() -> Self {
        let manager = ActorFixtures::manager();
        Self {
            employee: ActorFixtures::employee_of(&manager),
            manager,
            finance: ActorFixtures::finance(),
            admin: ActorFixtures::admin(),
        }
    }

    /// A manager with no reports in this team
    pub fn stranger_manager(&self) -> Actor {
        ActorFixtures::manager()
    }

    /// Another employee reporting to the same manager
    pub fn colleague(&self) -> Actor {
        ActorFixtures::employee_of(&self.manager)
    }
}

impl Default for Team {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture for actors
pub struct ActorFixtures;

impl ActorFixtures {
    /// An employee whose manager is `manager`
    pub fn employee_of(manager: &Actor) -> Actor {
        Actor::new(EmployeeId::new(), Role::Employee).with_manager(manager.id)
    }

    /// An employee without a manager on record
    pub fn unmanaged_employee() -> Actor {
        Actor::new(EmployeeId::new(), Role::Employee)
    }

    pub fn manager() -> Actor {
        Actor::new(EmployeeId::new(), Role::Manager)
    }

    pub fn finance() -> Actor {
        Actor::new(EmployeeId::new(), Role::Finance)
    }

    pub fn admin() -> Actor {
        Actor::new(EmployeeId::new(), Role::Admin)
    }
}

/// Fixture for claim submission inputs
pub struct ClaimInputFixtures;

impl ClaimInputFixtures {
    /// The canonical cab ride: 550 INR
    pub fn cab() -> NewClaim {
        NewClaim {
            title: "Cab".to_string(),
            amount: 550,
            claim_type: "CAB_ALLOWANCE".to_string(),
            ..Default::default()
        }
    }

    pub fn meal() -> NewClaim {
        NewClaim {
            title: "Team lunch".to_string(),
            amount: 1200,
            claim_type: "MEAL".to_string(),
            description: Some("Quarterly review lunch".to_string()),
            ..Default::default()
        }
    }

    pub fn petrol_usd() -> NewClaim {
        NewClaim {
            title: "Fuel for client visit".to_string(),
            amount: 45,
            claim_type: "PETROL_ALLOWANCE".to_string(),
            currency_code: Some("USD".to_string()),
            ..Default::default()
        }
    }

    /// A plausible claim with generated title and description
    pub fn random() -> NewClaim {
        let words: Vec<String> = Words(1..4).fake();
        NewClaim {
            title: words.join(" "),
            amount: (1..5_000i64).fake(),
            claim_type: "OFFICE_SUPPLY".to_string(),
            description: Some(Sentence(3..8).fake()),
            ..Default::default()
        }
    }
}
