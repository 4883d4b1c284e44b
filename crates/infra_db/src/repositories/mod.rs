//! Repository implementations
//!
//! Repositories encapsulate SQL queries and work in database row types.
//! Mapping to domain types happens in the adapters.
//!
//! # Architecture
//!
//! - Runtime-checked queries (`sqlx::query_as` with `FromRow` rows)
//! - Transactions for every multi-statement write
//! - Optimistic concurrency control through a `version` column

pub mod claims;

pub use claims::ClaimsRepository;
