//! Shared context of a record tree: one connection and one schema registry.

use std::error::Error;
use std::sync::{Arc, Mutex, MutexGuard};

use super::identity::KeySpec;
use super::schema::{SchemaRegistry, SharedSchema};
use crate::db::{Connection, DatabaseConfig, DbError, Dialect, QueryBuilder, QueryResult, RetryPolicy, Value};

/// Connection and schema cache shared by every record built from it.
///
/// Statements are serialized through the connection lock; a record tree
/// runs its cascade sequentially on the same session.
pub struct Session {
    connection: Mutex<Connection>,
    builder: QueryBuilder,
    schemas: SchemaRegistry,
}

impl Session {
    pub fn new(connection: Connection) -> Arc<Self> {
        let builder = QueryBuilder::new(connection.dialect());
        Arc::new(Self {
            connection: Mutex::new(connection),
            builder,
            schemas: SchemaRegistry::new(),
        })
    }

    /// Connect to the configured database with the given retry policy.
    pub fn open(config: &DatabaseConfig, retry: RetryPolicy) -> Result<Arc<Self>, Box<dyn Error>> {
        let connection = Connection::new(config.connect()?).with_retry(retry);
        Ok(Self::new(connection))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.connection.lock().map_err(|_| DbError::LockPoisoned)
    }

    pub fn dialect(&self) -> Dialect {
        self.builder.dialect()
    }

    pub fn builder(&self) -> QueryBuilder {
        self.builder
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    pub fn execute(&self, sql: &str) -> Result<QueryResult, DbError> {
        self.lock()?.execute(sql)
    }

    /// Run an INSERT and return the generated identity, read under the same
    /// lock so no other statement can slip in between.
    pub fn execute_insert(&self, sql: &str) -> Result<Option<Value>, DbError> {
        let mut conn = self.lock()?;
        conn.execute(sql)?;
        Ok(conn.insert_id())
    }

    /// Text of the connection's last statement error.
    pub fn last_error(&self) -> String {
        self.lock().map(|c| c.error().to_string()).unwrap_or_default()
    }

    pub fn queries_count(&self) -> u64 {
        self.lock().map(|c| c.queries_count()).unwrap_or_default()
    }

    /// Cached schema of `table`, fetched through this session's connection.
    pub fn schema(&self, table: &str, key: KeySpec) -> Result<SharedSchema, DbError> {
        self.schemas.get_or_init(table, key, |t| self.lock()?.fields(t))
    }
}
