//! Per-table schema cache.
//!
//! The first record built for a table fetches its column metadata; every
//! later record for that table shares the same [`TableSchema`]. Special field
//! sets configured through one record are therefore visible to all of them.
//! Entries are never invalidated: schema changes made while the registry is
//! alive are not observed.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::hooks::{FieldHasher, LegacyMd5Hasher};
use super::identity::KeySpec;
use crate::db::{DbError, FieldSpec};

/// Named field sets configured per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialFields {
    /// Must not be the empty string.
    Required,
    /// Can only be "set" to their current value.
    ReadOnly,
    /// Never loaded into a record.
    Excluded,
    /// Stored as a one-way hash.
    Encrypted,
    /// Stored as JSON text.
    Serialized,
}

/// Cached metadata of one table.
pub struct TableSchema {
    table: String,
    key: KeySpec,
    fields: IndexMap<String, FieldSpec>,
    required: BTreeSet<String>,
    readonly: BTreeSet<String>,
    excluded: BTreeSet<String>,
    encrypted: BTreeSet<String>,
    serialized: BTreeSet<String>,
    hasher: Arc<dyn FieldHasher>,
}

impl TableSchema {
    pub fn new(table: &str, key: KeySpec, fields: Vec<FieldSpec>) -> Self {
        Self {
            table: table.to_string(),
            key,
            fields: fields.into_iter().map(|f| (f.name.clone(), f)).collect(),
            required: BTreeSet::new(),
            readonly: BTreeSet::new(),
            excluded: BTreeSet::new(),
            encrypted: BTreeSet::new(),
            serialized: BTreeSet::new(),
            hasher: Arc::new(LegacyMd5Hasher),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn key(&self) -> &KeySpec {
        &self.key
    }

    pub fn fields(&self) -> &IndexMap<String, FieldSpec> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn special(&self, kind: SpecialFields) -> &BTreeSet<String> {
        match kind {
            SpecialFields::Required => &self.required,
            SpecialFields::ReadOnly => &self.readonly,
            SpecialFields::Excluded => &self.excluded,
            SpecialFields::Encrypted => &self.encrypted,
            SpecialFields::Serialized => &self.serialized,
        }
    }

    fn special_mut(&mut self, kind: SpecialFields) -> &mut BTreeSet<String> {
        match kind {
            SpecialFields::Required => &mut self.required,
            SpecialFields::ReadOnly => &mut self.readonly,
            SpecialFields::Excluded => &mut self.excluded,
            SpecialFields::Encrypted => &mut self.encrypted,
            SpecialFields::Serialized => &mut self.serialized,
        }
    }

    pub fn is_special(&self, kind: SpecialFields, field: &str) -> bool {
        self.special(kind).contains(field)
    }

    /// Add `fields` to a set, or replace the set when `merge` is false.
    pub fn configure<S: AsRef<str>>(&mut self, kind: SpecialFields, fields: &[S], merge: bool) {
        let set = self.special_mut(kind);
        if !merge {
            set.clear();
        }
        set.extend(fields.iter().map(|f| f.as_ref().to_string()));

        if kind == SpecialFields::Encrypted && !self.encrypted.is_empty() && !self.hasher.is_secure() {
            warn!(
                table = %self.table,
                hasher = self.hasher.name(),
                "encrypted fields use a legacy hash that does not protect secrets"
            );
        }
    }

    pub fn hasher(&self) -> Arc<dyn FieldHasher> {
        Arc::clone(&self.hasher)
    }

    pub fn set_hasher(&mut self, hasher: Arc<dyn FieldHasher>) {
        self.hasher = hasher;
    }
}

/// Handle to a cached schema, shared by every record of the table.
pub type SharedSchema = Arc<RwLock<TableSchema>>;

pub(crate) fn read(schema: &SharedSchema) -> RwLockReadGuard<'_, TableSchema> {
    schema.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write(schema: &SharedSchema) -> RwLockWriteGuard<'_, TableSchema> {
    schema.write().unwrap_or_else(PoisonError::into_inner)
}

/// Process-wide (or session-wide) map of table name to schema.
#[derive(Default)]
pub struct SchemaRegistry {
    tables: RwLock<HashMap<String, SharedSchema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached schema of `table`, fetching its fields on first access.
    ///
    /// `key` and `fetch` are ignored once the table is cached. A failed or
    /// empty fetch is not cached, so the next call tries again.
    pub fn get_or_init<F>(&self, table: &str, key: KeySpec, fetch: F) -> Result<SharedSchema, DbError>
    where
        F: FnOnce(&str) -> Result<Vec<FieldSpec>, DbError>,
    {
        if let Some(schema) = self.get(table) {
            return Ok(schema);
        }

        let fields = fetch(table)?;
        if fields.is_empty() {
            return Err(DbError::SchemaUnavailable {
                table: table.to_string(),
                message: "table has no columns or does not exist".to_string(),
            });
        }
        debug!(table, fields = fields.len(), "caching table schema");

        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let schema = tables
            .entry(table.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(TableSchema::new(table, key, fields))));
        Ok(Arc::clone(schema))
    }

    pub fn get(&self, table: &str) -> Option<SharedSchema> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(table)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.tables.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn users_fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("id", "int(11)").primary_key(),
            FieldSpec::new("name", "varchar(64)"),
        ]
    }

    #[test]
    fn test_fetches_once_and_shares() {
        let registry = SchemaRegistry::new();
        let calls = Cell::new(0);

        let first = registry
            .get_or_init("users", KeySpec::default(), |_| {
                calls.set(calls.get() + 1);
                Ok(users_fields())
            })
            .unwrap();
        let second = registry
            .get_or_init("users", KeySpec::from("other"), |_| {
                calls.set(calls.get() + 1);
                Ok(vec![])
            })
            .unwrap();

        assert_eq!(calls.get(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(read(&second).key(), &KeySpec::default());
    }

    #[test]
    fn test_configuration_is_visible_through_every_handle() {
        let registry = SchemaRegistry::new();
        let a = registry.get_or_init("users", KeySpec::default(), |_| Ok(users_fields())).unwrap();
        let b = registry.get_or_init("users", KeySpec::default(), |_| Ok(users_fields())).unwrap();

        write(&a).configure(SpecialFields::Required, &["name"], true);
        assert!(read(&b).is_special(SpecialFields::Required, "name"));
    }

    #[test]
    fn test_configure_merge_and_replace() {
        let mut schema = TableSchema::new("users", KeySpec::default(), users_fields());
        schema.configure(SpecialFields::ReadOnly, &["a"], true);
        schema.configure(SpecialFields::ReadOnly, &["b"], true);
        assert_eq!(schema.special(SpecialFields::ReadOnly).len(), 2);

        schema.configure(SpecialFields::ReadOnly, &["c"], false);
        assert_eq!(
            schema.special(SpecialFields::ReadOnly).iter().collect::<Vec<_>>(),
            vec!["c"]
        );
    }

    #[test]
    fn test_empty_fetch_is_not_cached() {
        let registry = SchemaRegistry::new();
        let err = registry
            .get_or_init("missing", KeySpec::default(), |_| Ok(vec![]))
            .err()
            .unwrap();
        assert!(matches!(err, DbError::SchemaUnavailable { .. }));
        assert!(registry.is_empty());
    }
}
