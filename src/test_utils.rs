//! Shared test utilities.
//!
//! - [`ScriptedBackend`]: an in-process backend whose failures are scripted,
//!   for exercising the retry policy without a server.
//! - [`sample_session`]: an in-memory SQLite session with a small schema.
//! - [`AuditHooks`]: extra-data hooks that log each call.
//! - [`test_lock`]: serializes tests that touch the process environment or
//!   working directory.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::db::{open_mem_db, BackendError, DatabaseBackend, DbError, Dialect, FieldSpec, QueryResult, Row, Value};
use crate::record::{ExtraContext, ExtraData, RecordError, Session};

pub const DEADLOCK: &str = "Deadlock found when trying to get lock; try restarting transaction";
pub const GONE_AWAY: &str = "MySQL server has gone away";
pub const STRICT: &str = "Field 'created' doesn't have a default value";

#[derive(Default)]
struct Script {
    responses: VecDeque<Result<QueryResult, String>>,
    fail_always: Option<String>,
    statements: Vec<String>,
    reconnects: u32,
    refuse_reconnect: bool,
    fields: Vec<FieldSpec>,
}

fn lock(script: &Mutex<Script>) -> MutexGuard<'_, Script> {
    script.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Backend that replays scripted outcomes. Unscripted statements succeed.
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
}

/// Test-side handle to a [`ScriptedBackend`] moved into a connection.
#[derive(Clone)]
pub struct ScriptHandle {
    script: Arc<Mutex<Script>>,
}

impl ScriptedBackend {
    pub fn new() -> (Self, ScriptHandle) {
        let script = Arc::new(Mutex::new(Script::default()));
        (
            Self {
                script: Arc::clone(&script),
            },
            ScriptHandle { script },
        )
    }
}

impl ScriptHandle {
    /// Fail the next unanswered statement with `message`.
    pub fn fail_with(&self, message: &str) {
        lock(&self.script).responses.push_back(Err(message.to_string()));
    }

    /// Fail every statement from now on.
    pub fn fail_always_with(&self, message: &str) {
        lock(&self.script).fail_always = Some(message.to_string());
    }

    pub fn respond_with(&self, result: QueryResult) {
        lock(&self.script).responses.push_back(Ok(result));
    }

    pub fn refuse_reconnect(&self) {
        lock(&self.script).refuse_reconnect = true;
    }

    /// Columns reported for every table, as `(name, type)` pairs.
    pub fn with_fields(&self, fields: &[(&str, &str)]) {
        lock(&self.script).fields = fields.iter().map(|(name, ty)| FieldSpec::new(name, ty)).collect();
    }

    pub fn statements(&self) -> Vec<String> {
        lock(&self.script).statements.clone()
    }

    pub fn reconnects(&self) -> u32 {
        lock(&self.script).reconnects
    }
}

impl DatabaseBackend for ScriptedBackend {
    fn backend_name(&self) -> &'static str {
        "Scripted"
    }

    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn query(&mut self, sql: &str) -> Result<QueryResult, BackendError> {
        let mut script = lock(&self.script);
        script.statements.push(sql.to_string());
        if let Some(message) = &script.fail_always {
            return Err(BackendError::new(message.clone()));
        }
        match script.responses.pop_front() {
            Some(Ok(result)) => Ok(result),
            Some(Err(message)) => Err(BackendError::new(message)),
            None => Ok(QueryResult::affected(1)),
        }
    }

    fn insert_id(&mut self) -> Option<Value> {
        None
    }

    fn fields_query(&self, table: &str) -> String {
        format!("SHOW FIELDS FROM `{}`", table)
    }

    fn parse_fields(&self, _result: QueryResult) -> Result<Vec<FieldSpec>, BackendError> {
        Ok(lock(&self.script).fields.clone())
    }

    fn reconnect(&mut self) -> Result<(), BackendError> {
        let mut script = lock(&self.script);
        script.reconnects += 1;
        if script.refuse_reconnect {
            return Err(BackendError::new("Can't connect to MySQL server"));
        }
        Ok(())
    }
}

/// Hooks that log each call as `"<hook> <id>"` and keep a `visits` extra
/// field. Clones share one log.
#[derive(Clone, Default)]
pub struct AuditHooks {
    calls: Arc<Mutex<Vec<String>>>,
    fail_save: bool,
}

impl AuditHooks {
    /// Hooks whose save pushes an error and reports failure.
    pub fn failing_save() -> Self {
        Self {
            fail_save: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn log(&self, hook: &str, ctx: &ExtraContext<'_>) {
        let entry = format!("{} {}", hook, ctx.id.describe());
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(entry);
    }
}

impl ExtraData for AuditHooks {
    fn reset(&mut self, extra: &mut Row) {
        extra.insert("visits".to_string(), Value::Int(0));
    }

    fn load(&mut self, ctx: ExtraContext<'_>) -> Result<bool, DbError> {
        self.log("load", &ctx);
        ctx.extra.insert("visits".to_string(), Value::Int(7));
        Ok(true)
    }

    fn save(&mut self, ctx: ExtraContext<'_>) -> Result<bool, DbError> {
        self.log("save", &ctx);
        if self.fail_save {
            ctx.errors.push(RecordError::Query("audit log unavailable".to_string()));
            return Ok(false);
        }
        Ok(true)
    }

    fn delete(&mut self, ctx: ExtraContext<'_>) -> Result<bool, DbError> {
        self.log("delete", &ctx);
        Ok(true)
    }
}

/// In-memory session with a `users` table holding two rows.
pub fn sample_session() -> Arc<Session> {
    let session = Session::new(open_mem_db().expect("in-memory database"));
    for sql in [
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name VARCHAR(64) NOT NULL DEFAULT '', \
         active TINYINT(1) NOT NULL DEFAULT 0)",
        "INSERT INTO users (name, active) VALUES ('Alice', 1)",
        "INSERT INTO users (name, active) VALUES ('Bob <b>', 0)",
    ] {
        session.execute(sql).expect("sample schema");
    }
    session
}

/// Serialize tests that change the environment or the working directory.
pub fn test_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(())).lock().unwrap_or_else(PoisonError::into_inner)
}
