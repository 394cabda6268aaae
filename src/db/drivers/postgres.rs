//! PostgreSQL backend on top of the synchronous `postgres` client.
//!
//! Statements go through the simple query protocol, so every value comes
//! back as text (or NULL). That matches how records treat column values.

use ::postgres::{Client, NoTls, SimpleQueryMessage};

use crate::db::backend::{BackendError, DatabaseBackend, QueryResult};
use crate::db::columns::FieldSpec;
use crate::db::dialect::Dialect;
use crate::db::escape::double_quote_char;
use crate::db::value::Value;
use crate::db::DbError;

pub struct PostgresBackend {
    client: Client,
    connection_string: String,
}

impl PostgresBackend {
    /// Connect using a libpq-style string or a `postgres://` URL.
    pub fn connect(connection_string: &str) -> Result<Self, DbError> {
        let client = Client::connect(connection_string, NoTls).map_err(|e| DbError::OpenFailed {
            path: redact(connection_string),
            message: error_text(&e),
        })?;
        Ok(Self {
            client,
            connection_string: connection_string.to_string(),
        })
    }
}

/// Hide the password part of a URL before it ends up in an error.
fn redact(connection_string: &str) -> String {
    match (connection_string.find("://"), connection_string.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            let auth = &connection_string[scheme_end + 3..at];
            match auth.find(':') {
                Some(colon) => format!(
                    "{}{}:***{}",
                    &connection_string[..scheme_end + 3],
                    &auth[..colon],
                    &connection_string[at..]
                ),
                None => connection_string.to_string(),
            }
        }
        _ => connection_string.to_string(),
    }
}

fn error_text(e: &::postgres::Error) -> String {
    if e.is_closed() {
        return "connection closed".to_string();
    }
    match e.as_db_error() {
        Some(db) => db.message().to_string(),
        None => e.to_string(),
    }
}

/// Map a catalog `udt_name` onto the declared type names records understand.
fn declared_type(udt_name: &str, length: Option<&str>) -> String {
    let name = match udt_name {
        "int2" => "smallint",
        "int4" => "int",
        "int8" => "bigint",
        "float4" => "float",
        "float8" => "double",
        "numeric" => "decimal",
        "bpchar" => "char",
        "timestamp" | "timestamptz" => "datetime",
        "time" | "timetz" => "time",
        "bool" => "tinyint",
        "json" | "jsonb" => "text",
        other => other,
    };
    match length {
        Some(len) if !len.is_empty() => format!("{}({})", name, len),
        _ => name.to_string(),
    }
}

/// Extract the literal from a column default such as `'abc'::character varying`.
///
/// Sequence defaults are generated by the server and yield `None`.
fn parse_default(raw: Option<&str>) -> Option<Value> {
    let raw = raw?;
    if raw.starts_with("nextval(") {
        return None;
    }
    if let Some(rest) = raw.strip_prefix('\'') {
        let end = rest.rfind('\'').unwrap_or(rest.len());
        return Some(Value::Text(rest[..end].replace("''", "'")));
    }
    let literal = raw.split("::").next().unwrap_or(raw).trim();
    Some(Value::Text(literal.trim_matches(|c| c == '(' || c == ')').to_string()))
}

impl DatabaseBackend for PostgresBackend {
    fn backend_name(&self) -> &'static str {
        "Postgres"
    }

    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn query(&mut self, sql: &str) -> Result<QueryResult, BackendError> {
        let messages = self
            .client
            .simple_query(sql)
            .map_err(|e| BackendError::new(error_text(&e)))?;

        let mut result = QueryResult::default();
        for message in messages {
            match message {
                SimpleQueryMessage::Row(row) => {
                    if result.headers.is_empty() {
                        result.headers = row.columns().iter().map(|c| c.name().to_string()).collect();
                    }
                    let values = (0..row.len())
                        .map(|i| row.get(i).map(Value::from).unwrap_or(Value::Null))
                        .collect();
                    result.rows.push(values);
                }
                SimpleQueryMessage::CommandComplete(count) => result.affected = count,
                _ => {}
            }
        }
        Ok(result)
    }

    fn insert_id(&mut self) -> Option<Value> {
        // lastval() fails when no sequence was touched in this session.
        self.query("SELECT lastval()")
            .ok()
            .and_then(|r| r.column(0).into_iter().next())
            .filter(|v| !v.is_null())
    }

    fn fields_query(&self, table: &str) -> String {
        let table = double_quote_char(table, '\'');
        format!(
            "SELECT c.column_name, c.udt_name, c.character_maximum_length, c.is_nullable, \
             c.column_default, \
             CASE WHEN EXISTS (\
                 SELECT 1 FROM information_schema.table_constraints t \
                 JOIN information_schema.key_column_usage k \
                   ON k.constraint_name = t.constraint_name AND k.table_name = t.table_name \
                 WHERE t.constraint_type = 'PRIMARY KEY' \
                   AND k.table_name = c.table_name AND k.column_name = c.column_name\
             ) THEN 'YES' ELSE 'NO' END AS is_key \
             FROM information_schema.columns c \
             WHERE c.table_name = '{}' AND c.table_schema = current_schema() \
             ORDER BY c.ordinal_position",
            table
        )
    }

    fn parse_fields(&self, result: QueryResult) -> Result<Vec<FieldSpec>, BackendError> {
        let fields = result
            .rows
            .iter()
            .map(|row| {
                let text = |i: usize| row.get(i).and_then(|v| v.as_text().map(String::from));
                let length = text(2);
                FieldSpec {
                    name: text(0).unwrap_or_default(),
                    sql_type: declared_type(&text(1).unwrap_or_default(), length.as_deref()),
                    nullable: text(3).as_deref() == Some("YES"),
                    default: parse_default(text(4).as_deref()),
                    primary_key: text(5).as_deref() == Some("YES"),
                }
            })
            .collect();
        Ok(fields)
    }

    fn reconnect(&mut self) -> Result<(), BackendError> {
        self.client = Client::connect(&self.connection_string, NoTls)
            .map_err(|e| BackendError::new(error_text(&e)))?;
        Ok(())
    }
}
