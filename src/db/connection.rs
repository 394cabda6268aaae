//! Database connection management.
//!
//! [`Connection`] runs statements on a backend and applies the
//! [`RetryPolicy`] to failures. It also remembers the last error text and
//! counts every statement sent to the server, retries included.

use std::path::Path;
use std::thread;

use tracing::{debug, error, warn};

use super::backend::{DatabaseBackend, QueryResult, Row};
use super::columns::FieldSpec;
use super::dialect::Dialect;
use super::drivers::SqliteBackend;
use super::retry::{RetryDecision, RetryPolicy, RELAX_SQL_MODE};
use super::value::Value;
use super::DbError;

/// Open a SQLite database file.
pub fn open_db(path: &Path) -> Result<Connection, DbError> {
    Ok(Connection::new(Box::new(SqliteBackend::open(path)?)))
}

/// Create an in-memory SQLite database.
///
/// Used by tests to avoid disk I/O and temp file management.
pub fn open_mem_db() -> Result<Connection, DbError> {
    Ok(Connection::new(Box::new(SqliteBackend::in_memory()?)))
}

/// A server connection with retry handling.
pub struct Connection {
    backend: Box<dyn DatabaseBackend>,
    retry: RetryPolicy,
    last_error: String,
    queries: u64,
}

impl Connection {
    pub fn new(backend: Box<dyn DatabaseBackend>) -> Self {
        Self {
            backend,
            retry: RetryPolicy::default(),
            last_error: String::new(),
            queries: 0,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn retry_policy_mut(&mut self) -> &mut RetryPolicy {
        &mut self.retry
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    pub fn dialect(&self) -> Dialect {
        self.backend.dialect()
    }

    /// Execute a statement, retrying transient failures.
    ///
    /// Non-retryable failures come back as [`DbError::QueryFailed`] with the
    /// server text also kept in [`error`](Self::error).
    pub fn execute(&mut self, sql: &str) -> Result<QueryResult, DbError> {
        self.attempt(sql, 0, false)
    }

    fn attempt(&mut self, sql: &str, iteration: u32, reconnected: bool) -> Result<QueryResult, DbError> {
        self.queries += 1;
        debug!(backend = self.backend.backend_name(), iteration, sql, "executing statement");

        let message = match self.backend.query(sql) {
            Ok(result) => {
                self.last_error.clear();
                return Ok(result);
            }
            Err(e) => e.message,
        };
        self.last_error = message.clone();

        match self.retry.decide(&message, iteration) {
            RetryDecision::Retry { delay, iteration: next } => {
                warn!(iteration = next, error = %message, "deadlock, retrying statement");
                thread::sleep(delay);
                self.attempt(sql, next, reconnected)
            }
            RetryDecision::Reconnect { delay } => {
                if reconnected {
                    error!(error = %message, "connection lost again after reconnecting");
                    return Err(DbError::ReconnectFailed { message });
                }
                warn!(error = %message, "connection lost, reconnecting");
                thread::sleep(delay);
                match self.backend.reconnect() {
                    Ok(()) => self.attempt(sql, iteration, true),
                    Err(e) => {
                        error!(error = %e, "reconnect failed");
                        self.last_error = e.message.clone();
                        Err(DbError::ReconnectFailed { message: e.message })
                    }
                }
            }
            RetryDecision::RelaxSqlMode { iteration: next } => {
                warn!(iteration = next, error = %message, "strict SQL mode violation, relaxing SQL mode");
                match self.attempt(RELAX_SQL_MODE, next, reconnected) {
                    Ok(_) => self.attempt(sql, next, reconnected),
                    Err(e) if e.is_fatal() => Err(e),
                    Err(_) => {
                        self.last_error = message.clone();
                        Err(DbError::QueryFailed { message })
                    }
                }
            }
            RetryDecision::Exhausted { class } => {
                error!(?class, iterations = iteration + 1, error = %message, "retry budget exhausted");
                Err(DbError::RetriesExhausted {
                    iterations: iteration + 1,
                    message,
                })
            }
            RetryDecision::Fail => Err(DbError::QueryFailed { message }),
        }
    }

    /// Text of the last statement error, empty after a success.
    pub fn error(&self) -> &str {
        &self.last_error
    }

    /// Identity generated by the most recent INSERT.
    pub fn insert_id(&mut self) -> Option<Value> {
        self.backend.insert_id()
    }

    /// Column metadata of `table`.
    pub fn fields(&mut self, table: &str) -> Result<Vec<FieldSpec>, DbError> {
        let sql = self.backend.fields_query(table);
        let result = self.execute(&sql)?;
        self.backend
            .parse_fields(result)
            .map_err(|e| DbError::SchemaUnavailable {
                table: table.to_string(),
                message: e.message,
            })
    }

    /// Number of statements sent to the server so far.
    pub fn queries_count(&self) -> u64 {
        self.queries
    }

    pub fn quote(&self, value: &Value) -> String {
        self.dialect().quote(value)
    }

    pub fn quote_ident(&self, name: &str) -> String {
        self.dialect().quote_ident(name)
    }

    /// First row of a query, or `None` when it returns nothing.
    pub fn get_row(&mut self, sql: &str) -> Result<Option<Row>, DbError> {
        Ok(self.execute(sql)?.first_row())
    }

    /// First column of every row of a query.
    pub fn get_column(&mut self, sql: &str) -> Result<Vec<Value>, DbError> {
        Ok(self.execute(sql)?.column(0))
    }
}
