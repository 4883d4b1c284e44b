//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! reimbursement test suite.
//!
//! # Modules
//!
//! - `fixtures`: Actors for every role and canonical claim inputs
//! - `builders`: `ClaimRecordBuilder` to place a claim at any pipeline stage
//! - `database`: Postgres test container management
//! - `assertions`: Assertion helpers for claims and claim errors
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
