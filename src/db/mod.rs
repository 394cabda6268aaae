//! Connection layer.
//!
//! This module wraps native database clients behind a single connection
//! interface:
//! - Backends (SQLite, PostgreSQL) that execute raw statements
//! - A `Connection` that applies the retry policy and keeps the last error
//! - Query builders that render INSERT/UPDATE/DELETE/SELECT text
//!
//! # Error categories
//!
//! A statement that fails and is not retryable surfaces as
//! [`DbError::QueryFailed`]; callers treat it as a soft failure. Spending the
//! retry budget or failing to reconnect yields an error for which
//! [`DbError::is_fatal`] is true: it must abort the whole operation.

mod backend;
mod columns;
mod config;
mod connection;
mod dialect;
mod drivers;
mod escape;
mod query_builders;
mod retry;
mod value;

pub use backend::{BackendError, DatabaseBackend, QueryResult, Row};
pub use columns::{FieldSpec, SqlType, TypeFamily};
pub use config::{DatabaseConfig, PostgresConfig};
pub use connection::{open_db, open_mem_db, Connection};
pub use dialect::Dialect;
pub use drivers::{PostgresBackend, SqliteBackend};
pub use escape::{double_quote_char, escape_html, escape_string_for_quote};
pub use query_builders::QueryBuilder;
pub use retry::{ErrorClass, RetryDecision, RetryPolicy, RELAX_SQL_MODE};
pub use value::{is_numeric_str, Value};

use thiserror::Error;

/// Database error types
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to open database '{path}': {message}")]
    OpenFailed { path: String, message: String },

    #[error("Query failed: {message}")]
    QueryFailed { message: String },

    #[error("Too many iterations ({iterations}) retrying statement: {message}")]
    RetriesExhausted { iterations: u32, message: String },

    #[error("Cannot reconnect after the server connection was lost: {message}")]
    ReconnectFailed { message: String },

    #[error("Cannot read fields of table '{table}': {message}")]
    SchemaUnavailable { table: String, message: String },

    #[error("Connection lock poisoned")]
    LockPoisoned,
}

impl DbError {
    /// Whether the error must abort the whole call chain.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DbError::RetriesExhausted { .. } | DbError::ReconnectFailed { .. } | DbError::LockPoisoned
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(!DbError::QueryFailed { message: "x".into() }.is_fatal());
        assert!(DbError::RetriesExhausted { iterations: 4, message: "x".into() }.is_fatal());
        assert!(DbError::ReconnectFailed { message: "x".into() }.is_fatal());
        assert!(!DbError::SchemaUnavailable { table: "t".into(), message: "x".into() }.is_fatal());
    }
}
