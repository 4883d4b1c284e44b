//! Infrastructure Database Layer
//!
//! This crate provides the PostgreSQL implementation of the claims domain's
//! `ClaimStore` port using SQLx.
//!
//! # Architecture
//!
//! The crate follows the repository pattern: `ClaimsRepository` owns the SQL
//! and works in plain row types, while `PostgresClaimStore` implements the
//! domain port and translates between rows and `ClaimRecord`.
//!
//! # Optimistic Concurrency
//!
//! Every claim row carries a `version`. A conditional write updates the row
//! only where the version still matches and appends the new history entries
//! in the same transaction, so a status change and its audit entry commit
//! together or not at all.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, DatabaseConfig, PostgresClaimStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/reimbursement")).await?;
//! let store = PostgresClaimStore::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod repositories;
pub mod adapters;

pub use pool::{DatabasePool, create_pool, create_pool_from_url, run_migrations, DatabaseConfig};
pub use error::DatabaseError;
pub use adapters::PostgresClaimStore;
