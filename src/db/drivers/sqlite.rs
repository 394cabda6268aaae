//! SQLite backend on top of rusqlite.

use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;

use crate::db::backend::{BackendError, DatabaseBackend, QueryResult};
use crate::db::columns::FieldSpec;
use crate::db::dialect::Dialect;
use crate::db::value::Value;
use crate::db::DbError;

/// A local SQLite database, either file-backed or in memory.
pub struct SqliteBackend {
    conn: rusqlite::Connection,
    /// `None` for in-memory databases, which cannot be reopened.
    path: Option<PathBuf>,
}

impl SqliteBackend {
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = rusqlite::Connection::open(path).map_err(|e| DbError::OpenFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn in_memory() -> Result<Self, DbError> {
        let conn = rusqlite::Connection::open_in_memory().map_err(|e| DbError::OpenFailed {
            path: ":memory:".to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { conn, path: None })
    }

    fn run(&mut self, sql: &str) -> rusqlite::Result<QueryResult> {
        let mut stmt = self.conn.prepare(sql)?;
        let column_count = stmt.column_count();

        if column_count == 0 {
            let affected = stmt.execute([])?;
            return Ok(QueryResult::affected(affected as u64));
        }

        let headers: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(from_sql(row.get_ref(i)?));
            }
            out.push(values);
        }

        Ok(QueryResult {
            headers,
            rows: out,
            affected: 0,
        })
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

/// Strip the quoting SQLite keeps around literal column defaults.
fn parse_default(raw: &Value) -> Option<Value> {
    let text = match raw {
        Value::Null => return None,
        Value::Text(t) => t.as_str(),
        other => return Some(other.clone()),
    };
    let unquoted = text
        .strip_prefix('\'')
        .and_then(|t| t.strip_suffix('\''))
        .map(|t| t.replace("''", "'"));
    Some(Value::Text(unquoted.unwrap_or_else(|| text.to_string())))
}

impl DatabaseBackend for SqliteBackend {
    fn backend_name(&self) -> &'static str {
        "Sqlite"
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn query(&mut self, sql: &str) -> Result<QueryResult, BackendError> {
        self.run(sql).map_err(|e| BackendError::new(e.to_string()))
    }

    fn insert_id(&mut self) -> Option<Value> {
        match self.conn.last_insert_rowid() {
            0 => None,
            id => Some(Value::Int(id)),
        }
    }

    fn fields_query(&self, table: &str) -> String {
        format!("PRAGMA table_info({})", Dialect::Sqlite.quote_ident(table))
    }

    fn parse_fields(&self, result: QueryResult) -> Result<Vec<FieldSpec>, BackendError> {
        // table_info columns: cid, name, type, notnull, dflt_value, pk
        let position = |name: &str| {
            result
                .headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| BackendError::new(format!("missing column '{}' in table_info", name)))
        };
        let (name_idx, type_idx, notnull_idx, default_idx, pk_idx) = (
            position("name")?,
            position("type")?,
            position("notnull")?,
            position("dflt_value")?,
            position("pk")?,
        );

        let fields = result
            .rows
            .iter()
            .map(|row| FieldSpec {
                name: row[name_idx].to_string(),
                sql_type: row[type_idx].to_string(),
                nullable: row[notnull_idx].as_i64() == Some(0),
                default: parse_default(&row[default_idx]),
                primary_key: row[pk_idx].as_i64().unwrap_or(0) > 0,
            })
            .collect();
        Ok(fields)
    }

    fn reconnect(&mut self) -> Result<(), BackendError> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| BackendError::new("cannot reconnect to an in-memory database"))?;
        self.conn = rusqlite::Connection::open(path).map_err(|e| BackendError::new(e.to_string()))?;
        Ok(())
    }
}
