//! Core Kernel - Foundational types for the reimbursement system
//!
//! This crate provides the building blocks shared by every other crate:
//! - Strongly-typed identifiers for claims and employees
//! - Currency codes and whole-unit amounts
//! - Port infrastructure (errors, health checks) for storage collaborators

pub mod money;
pub mod identifiers;
pub mod error;
pub mod ports;

pub use money::{Amount, Currency, MoneyError};
pub use identifiers::{ClaimId, EmployeeId};
pub use error::CoreError;
pub use ports::{
    PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth,
};
