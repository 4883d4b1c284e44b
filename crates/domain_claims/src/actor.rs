//! Actors, roles, and visibility scopes
//!
//! Roles are resolved once at the boundary (the Actor/Role Provider) into the
//! closed `Role` enum; nothing downstream re-parses role strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::EmployeeId;

use crate::claim::ClaimRecord;
use crate::error::ClaimError;

/// Role of the acting employee
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Employee,
    Manager,
    Finance,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Employee => "employee",
            Role::Manager => "manager",
            Role::Finance => "finance",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ClaimError;

    /// Accepts `admin`, `ADMIN` and `ROLE_ADMIN` alike
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let name = trimmed
            .strip_prefix("ROLE_")
            .or_else(|| trimmed.strip_prefix("role_"))
            .unwrap_or(trimmed);
        match name.to_ascii_lowercase().as_str() {
            "employee" | "user" => Ok(Role::Employee),
            "manager" => Ok(Role::Manager),
            "finance" => Ok(Role::Finance),
            "admin" => Ok(Role::Admin),
            _ => Err(ClaimError::validation(format!("unknown role '{}'", s))),
        }
    }
}

/// The current actor, as supplied by the Actor/Role Provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: EmployeeId,
    pub role: Role,
    /// The actor's own line manager; stamped onto claims they submit
    pub manager_id: Option<EmployeeId>,
}

impl Actor {
    pub fn new(id: EmployeeId, role: Role) -> Self {
        Self {
            id,
            role,
            manager_id: None,
        }
    }

    pub fn with_manager(mut self, manager_id: EmployeeId) -> Self {
        self.manager_id = Some(manager_id);
        self
    }

    /// Returns the set of claims this actor may see
    pub fn scope(&self) -> Scope {
        match self.role {
            Role::Employee => Scope::Own(self.id),
            Role::Manager => Scope::Managed(self.id),
            Role::Finance | Role::Admin => Scope::All,
        }
    }

    pub fn owns(&self, claim: &ClaimRecord) -> bool {
        claim.user_id == self.id
    }
}

/// Visibility scope of a listing or lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Claims submitted by this employee
    Own(EmployeeId),
    /// Claims whose approving manager is this employee
    Managed(EmployeeId),
    /// Every claim
    All,
}

impl Scope {
    pub fn includes(&self, claim: &ClaimRecord) -> bool {
        match self {
            Scope::Own(id) => claim.user_id == *id,
            Scope::Managed(id) => claim.manager_id == *id,
            Scope::All => true,
        }
    }
}
