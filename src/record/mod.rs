//! Active records bound to one table row.
//!
//! A [`Record`] holds the identity, column values, extra fields and child
//! relations of a row. Field writes are formatted and validated against the
//! cached [`TableSchema`]; failures are pushed onto the record's error stack
//! and reported as `false`. Only unrecoverable connection failures surface as
//! `Err(DbError)`.
//!
//! ```no_run
//! use dbreg::db::open_mem_db;
//! use dbreg::record::{Record, Session, SpecialFields};
//!
//! let session = Session::new(open_mem_db()?);
//! let mut user = Record::new(&session, "users")?;
//! user.configure_fields(SpecialFields::Required, &["name"], true);
//! if user.set_value("name", "Alice") && user.save()? {
//!     println!("saved as {}", user.id().describe());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod children;
mod error;
mod hooks;
mod identity;
mod persistence;
mod schema;
mod session;
mod validation;

pub use children::{ChildRelation, RecordFactory, RelationSpec};
pub use error::RecordError;
pub use hooks::{ExtraContext, ExtraData, FieldHasher, LegacyMd5Hasher, NoExtraData};
pub use identity::{Identity, KeySpec};
pub use schema::{SchemaRegistry, SharedSchema, SpecialFields, TableSchema};
pub use session::Session;
pub use validation::{format_field_value, validate_field_value, ZERO_DATETIME};

use std::collections::BTreeSet;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::warn;

use crate::db::{DbError, FieldSpec, QueryResult, Row, Value};

#[derive(Clone, Copy)]
enum Hook {
    Load,
    Save,
    Delete,
}

/// One row of a table, with its child records.
pub struct Record {
    session: Arc<Session>,
    table: String,
    schema: SharedSchema,
    key: KeySpec,
    id: Identity,
    data: Row,
    extra: Row,
    children: IndexMap<String, ChildRelation>,
    read_only: bool,
    errors: Vec<RecordError>,
    hooks: Box<dyn ExtraData>,
}

impl Record {
    /// Record of `table` keyed by `id`.
    pub fn new(session: &Arc<Session>, table: &str) -> Result<Self, DbError> {
        Self::with_key(session, table, KeySpec::default())
    }

    /// Record of `table` keyed by `key`.
    ///
    /// The key only matters for the first record built for the table; later
    /// records share the cached schema and its key.
    pub fn with_key(session: &Arc<Session>, table: &str, key: KeySpec) -> Result<Self, DbError> {
        let schema = session.schema(table, key)?;
        let key = schema::read(&schema).key().clone();

        let mut record = Self {
            session: Arc::clone(session),
            table: table.to_string(),
            schema,
            id: Identity::empty_for(&key),
            key,
            data: Row::new(),
            extra: Row::new(),
            children: IndexMap::new(),
            read_only: false,
            errors: Vec::new(),
            hooks: Box::new(NoExtraData),
        };
        record.reset_data(true);
        Ok(record)
    }

    /// Attach extra-field hooks. The hooks declare their fields right away.
    pub fn with_hooks(mut self, hooks: Box<dyn ExtraData>) -> Self {
        self.hooks = hooks;
        self.extra.clear();
        self.hooks.reset(&mut self.extra);
        self
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn key(&self) -> &KeySpec {
        &self.key
    }

    pub fn schema(&self) -> &SharedSchema {
        &self.schema
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Block updates of existing rows.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Reinitialize field values to the column defaults.
    ///
    /// The identity is kept. Dynamic child relations are emptied, fixed ones
    /// have each child reset.
    pub fn reset_data(&mut self, reset_errors: bool) {
        self.extra.clear();
        self.hooks.reset(&mut self.extra);

        self.data = {
            let schema = schema::read(&self.schema);
            let excluded = schema.special(SpecialFields::Excluded);
            schema
                .fields()
                .values()
                .filter(|f| !self.key.contains(&f.name) && !excluded.contains(&f.name))
                .map(|f| (f.name.clone(), f.initial_value()))
                .collect()
        };

        for relation in self.children.values_mut() {
            relation.reset(reset_errors);
        }

        if reset_errors {
            self.errors.clear();
        }
    }

    // Special fields

    pub fn configure_fields<S: AsRef<str>>(&self, kind: SpecialFields, fields: &[S], merge: bool) {
        schema::write(&self.schema).configure(kind, fields, merge);
    }

    pub fn special_fields(&self, kind: SpecialFields) -> BTreeSet<String> {
        schema::read(&self.schema).special(kind).clone()
    }

    fn is_special(&self, kind: SpecialFields, field: &str) -> bool {
        schema::read(&self.schema).is_special(kind, field)
    }

    /// Replace the hash applied to encrypted fields of this table.
    pub fn set_hasher(&self, hasher: Arc<dyn FieldHasher>) {
        schema::write(&self.schema).set_hasher(hasher);
    }

    fn field_spec(&self, field: &str) -> Option<FieldSpec> {
        schema::read(&self.schema).field(field).cloned()
    }

    // Identity

    pub fn id(&self) -> &Identity {
        &self.id
    }

    /// Assign the identity. Composite identities are reordered into key order.
    pub fn set_id(&mut self, id: impl Into<Identity>) -> bool {
        let id = id.into();
        if id.is_empty() {
            self.errors.push(RecordError::EmptyIdentifier);
            return false;
        }
        if !id.matches(&self.key) {
            self.errors.push(RecordError::InvalidIdentifier);
            return false;
        }
        self.id = id.normalized(&self.key);
        true
    }

    /// Assign positional identity values in key order.
    pub fn set_id_values(&mut self, values: Vec<Value>) -> bool {
        match Identity::positional(&self.key, values) {
            Some(id) => self.set_id(id),
            None => {
                self.errors.push(RecordError::InvalidIdentifier);
                false
            }
        }
    }

    fn scalar_id(&self) -> Value {
        self.id.as_scalar().cloned().unwrap_or_default()
    }

    // Field access

    /// Set one field, extra field or child relation.
    ///
    /// Read-only fields accept only their current value.
    pub fn set_value(&mut self, field: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        if !self.is_special(SpecialFields::ReadOnly, field) {
            return self.write_value(field, value);
        }

        let current = self.data.get(field).cloned().unwrap_or_default();
        if value.loosely_equals(&current) {
            return true;
        }
        self.errors.push(RecordError::ReadOnlyField(field.to_string()));
        false
    }

    fn write_value(&mut self, field: &str, value: Value) -> bool {
        if self.extra.contains_key(field) {
            let value = self.format_value(field, value);
            if !self.validate_value(field, &value) {
                return false;
            }
            self.extra.insert(field.to_string(), value);
            true
        } else if self.data.contains_key(field) {
            let value = self.format_value(field, value);
            if !self.validate_value(field, &value) {
                return false;
            }
            let value = if !value.is_empty_key() && self.is_special(SpecialFields::Encrypted, field) {
                let hasher = schema::read(&self.schema).hasher();
                Value::Text(hasher.hash(&value.to_string()))
            } else {
                value
            };
            self.data.insert(field.to_string(), value);
            true
        } else if self.children.contains_key(field) {
            self.set_child_data(field, &value)
        } else {
            self.errors.push(RecordError::FieldMissing(field.to_string()));
            false
        }
    }

    /// Current value of a field or extra field.
    ///
    /// Serialized fields are never HTML-escaped.
    pub fn get_value(&mut self, field: &str, escape: bool) -> Option<Value> {
        let (value, escape) = if let Some(value) = self.extra.get(field) {
            (value, escape)
        } else if let Some(value) = self.data.get(field) {
            (value, escape && !self.is_special(SpecialFields::Serialized, field))
        } else {
            self.errors.push(RecordError::FieldMissing(field.to_string()));
            return None;
        };
        Some(if escape { value.html_escaped() } else { value.clone() })
    }

    /// Apply a mapping of values.
    ///
    /// Extra fields go first and ignore `skip_readonly`. Key fields are
    /// assigned to the identity without validation. Unknown keys are errors
    /// only with `error_on_unknown`. Every key is attempted.
    pub fn set_data(&mut self, data: &Row, error_on_unknown: bool, skip_readonly: bool) -> bool {
        let mut ok = true;

        let extra_keys: Vec<String> = self
            .extra
            .keys()
            .filter(|k| data.get(*k).is_some_and(|v| !v.is_null()))
            .cloned()
            .collect();
        for key in &extra_keys {
            if let Some(value) = data.get(key) {
                ok &= self.write_value(key, value.clone());
            }
        }

        for (key, value) in data {
            if extra_keys.contains(key) {
                continue;
            }
            if self.key.contains(key) {
                self.id.set(key, value.clone());
            } else if error_on_unknown || self.data.contains_key(key) || self.children.contains_key(key) {
                if !skip_readonly || !self.is_special(SpecialFields::ReadOnly, key) {
                    ok &= self.set_value(key, value.clone());
                }
            }
        }

        ok
    }

    /// Identity, field values, child data and extra fields in one mapping.
    pub fn get_data(&self, escape: bool) -> Row {
        let escaped = |v: &Value| if escape { v.html_escaped() } else { v.clone() };
        let serialized = self.special_fields(SpecialFields::Serialized);
        let mut row = Row::new();

        for (field, value) in self.id.pairs(&self.key) {
            row.insert(field.to_string(), escaped(value));
        }
        for (field, value) in &self.data {
            let value = if serialized.contains(field) { value.clone() } else { escaped(value) };
            row.insert(field.clone(), value);
        }
        for (name, relation) in &self.children {
            row.insert(name.clone(), Value::Composite(relation.to_json(escape)));
        }
        for (field, value) in &self.extra {
            row.insert(field.clone(), escaped(value));
        }
        row
    }

    /// Non-key values backed by a column of the table.
    pub fn data_fields(&self) -> Row {
        let schema = schema::read(&self.schema);
        self.data
            .iter()
            .filter(|(k, _)| schema.field(k).is_some() && !self.key.contains(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Current values of the fields whose value differs from the formatted
    /// candidate.
    pub fn compare_data(&self, candidate: &Row) -> Row {
        let current = self.get_data(false);
        let mut diff = Row::new();
        for (field, value) in candidate {
            if let Some(existing) = current.get(field) {
                if !existing.loosely_equals(&self.format_value(field, value.clone())) {
                    diff.insert(field.clone(), existing.clone());
                }
            }
        }
        diff
    }

    pub fn format_value(&self, field: &str, value: Value) -> Value {
        match self.field_spec(field) {
            Some(spec) => format_field_value(&spec, value),
            None => value,
        }
    }

    pub fn format_data(&self, data: &Row) -> Row {
        data.iter()
            .map(|(k, v)| (k.clone(), self.format_value(k, v.clone())))
            .collect()
    }

    /// Required-field check followed by the type check of table columns.
    pub fn validate_value(&mut self, field: &str, value: &Value) -> bool {
        if value.as_text() == Some("") && self.is_special(SpecialFields::Required, field) {
            self.errors.push(RecordError::RequiredMissing(field.to_string()));
            return false;
        }

        if let Some(spec) = self.field_spec(field) {
            if !validate_field_value(&spec, value) {
                self.errors.push(RecordError::InvalidValue {
                    field: field.to_string(),
                    value: value.to_string(),
                });
                return false;
            }
        }
        true
    }

    /// Validate `data` (the current field values by default) and every child.
    pub fn validate_data(&mut self, data: Option<&Row>) -> bool {
        let data = data.cloned().unwrap_or_else(|| self.data.clone());
        let mut ok = true;

        for field in self.special_fields(SpecialFields::Required) {
            let missing = match data.get(&field) {
                None | Some(Value::Null) => true,
                Some(value) => value.as_text() == Some(""),
            };
            if missing {
                ok = false;
                self.errors.push(RecordError::RequiredMissing(field));
            }
        }

        for (field, value) in &data {
            ok &= self.validate_value(field, value);
        }

        for (name, relation) in self.children.iter_mut() {
            for (key, child) in relation.records.iter_mut() {
                if !child.validate_data(None) {
                    ok = false;
                    self.errors.push(children::child_failure(name, key, child));
                }
            }
        }

        ok
    }

    /// Whether the record holds a value for `field`.
    pub fn field_exists(&self, field: &str) -> bool {
        self.data.contains_key(field)
    }

    /// Whether `field` is a column of the table.
    pub fn is_field(&self, field: &str) -> bool {
        schema::read(&self.schema).field(field).is_some()
    }

    /// Column metadata in table order.
    pub fn field_specs(&self) -> Vec<FieldSpec> {
        schema::read(&self.schema).fields().values().cloned().collect()
    }

    // Errors

    /// Most recent error message.
    pub fn error(&self) -> Option<String> {
        self.errors.last().map(ToString::to_string)
    }

    pub fn error_stack(&self) -> &[RecordError] {
        &self.errors
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    // Statement helpers

    /// Turn a soft statement failure into an error-stack entry.
    fn soft<T>(&mut self, result: Result<T, DbError>) -> Result<Option<T>, DbError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_fatal() => Err(err),
            Err(DbError::QueryFailed { message }) => {
                self.errors.push(RecordError::Query(message));
                Ok(None)
            }
            Err(err) => {
                self.errors.push(RecordError::Query(err.to_string()));
                Ok(None)
            }
        }
    }

    fn run(&mut self, sql: &str) -> Result<Option<QueryResult>, DbError> {
        let result = self.session.execute(sql);
        self.soft(result)
    }

    fn run_hook(&mut self, hook: Hook) -> Result<bool, DbError> {
        let ctx = ExtraContext {
            session: &self.session,
            table: &self.table,
            id: &self.id,
            extra: &mut self.extra,
            errors: &mut self.errors,
        };
        match hook {
            Hook::Load => self.hooks.load(ctx),
            Hook::Save => self.hooks.save(ctx),
            Hook::Delete => self.hooks.delete(ctx),
        }
    }

    // Serialized fields

    fn encode_serialized(&self, mut data: Row) -> Row {
        for field in self.special_fields(SpecialFields::Serialized) {
            if let Some(value) = data.get_mut(&field) {
                if !value.is_blank() {
                    *value = Value::Text(value.to_json().to_string());
                }
            }
        }
        data
    }

    fn decode_serialized(&mut self) {
        for field in self.special_fields(SpecialFields::Serialized) {
            let Some(value) = self.data.get_mut(&field) else {
                continue;
            };
            let Some(text) = value.as_text().filter(|t| !t.is_empty()) else {
                continue;
            };
            match serde_json::from_str::<serde_json::Value>(text) {
                Ok(json) => *value = Value::from(json),
                Err(err) => warn!(table = %self.table, field = %field, error = %err, "stored value is not JSON"),
            }
        }
    }
}

/// JSON object of a row's values.
fn row_to_json(row: &Row) -> serde_json::Value {
    serde_json::Value::Object(row.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
}
