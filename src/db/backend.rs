//! Backend trait for abstracting native database clients.
//!
//! A backend is the thinnest possible layer over a client library: it runs a
//! statement and reports the raw outcome. Retrying, error bookkeeping and
//! statement counting live in [`Connection`](super::Connection), so every
//! backend gets them for free.

use indexmap::IndexMap;
use thiserror::Error;

use super::columns::FieldSpec;
use super::dialect::Dialect;
use super::value::Value;

/// A row keyed by column name, in column order.
pub type Row = IndexMap<String, Value>;

/// Error text reported by a native client for a failed statement.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result of a statement execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// Rows changed by a write statement (0 for queries).
    pub affected: u64,
}

impl QueryResult {
    pub fn affected(count: u64) -> Self {
        Self {
            affected: count,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows as name-keyed maps.
    pub fn into_rows(self) -> Vec<Row> {
        let headers = self.headers;
        self.rows
            .into_iter()
            .map(|row| headers.iter().cloned().zip(row).collect())
            .collect()
    }

    /// The first row as a name-keyed map.
    pub fn first_row(self) -> Option<Row> {
        self.into_rows().into_iter().next()
    }

    /// Values of one column across all rows.
    pub fn column(&self, index: usize) -> Vec<Value> {
        self.rows
            .iter()
            .filter_map(|row| row.get(index).cloned())
            .collect()
    }
}

/// Trait for native database clients.
pub trait DatabaseBackend: Send {
    /// Get the backend name for logging/debugging.
    fn backend_name(&self) -> &'static str;

    /// SQL dialect used to quote identifiers and literals.
    fn dialect(&self) -> Dialect;

    /// Execute one statement.
    fn query(&mut self, sql: &str) -> Result<QueryResult, BackendError>;

    /// Identity generated by the most recent INSERT, if any.
    fn insert_id(&mut self) -> Option<Value>;

    /// Statement that lists the columns of `table`.
    fn fields_query(&self, table: &str) -> String;

    /// Turn the result of [`fields_query`](Self::fields_query) into column metadata.
    fn parse_fields(&self, result: QueryResult) -> Result<Vec<FieldSpec>, BackendError>;

    /// Re-establish the underlying connection after it was severed.
    fn reconnect(&mut self) -> Result<(), BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> QueryResult {
        QueryResult {
            headers: vec!["id".to_string(), "name".to_string()],
            rows: vec![
                vec![Value::Int(1), Value::from("Alice")],
                vec![Value::Int(2), Value::from("Bob")],
            ],
            affected: 0,
        }
    }

    #[test]
    fn test_query_result_first_row() {
        let row = sample().first_row().unwrap();
        assert_eq!(row.get("name"), Some(&Value::from("Alice")));
        assert_eq!(row.get_index(0).map(|(k, _)| k.as_str()), Some("id"));
    }

    #[test]
    fn test_query_result_column() {
        assert_eq!(sample().column(0), vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn test_affected_result_is_empty() {
        let result = QueryResult::affected(3);
        assert!(result.is_empty());
        assert_eq!(result.affected, 3);
    }

    #[test]
    fn test_trait_is_object_safe() {
        fn accepts_backend(_db: &dyn DatabaseBackend) {}
        let _ = accepts_backend;
    }
}
