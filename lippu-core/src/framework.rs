//! Database access plumbing shared by the entity queries.
//!
//! Read queries are modeled as [`kanau::processor::Processor`] messages
//! handled by [`DatabaseProcessor`]; multi-row writes take an explicit
//! `sqlx::Transaction` so the caller controls the commit boundary.

use sqlx::PgPool;

/// Pool-backed processor for standalone queries.
pub struct DatabaseProcessor {
    pub pool: PgPool,
}

/// Postgres error codes that indicate a retryable transaction conflict.
const RETRYABLE_SQLSTATE: [&str; 2] = ["40001", "40P01"];

/// Whether an error is a serialization failure or deadlock that a fresh
/// transaction attempt may resolve.
pub fn is_retryable_conflict(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|code| RETRYABLE_SQLSTATE.contains(&code.as_ref()))
        .unwrap_or(false)
}
