//! Child relations: records of another table keyed by `(parent id, child key)`.
//!
//! A dynamic relation rebuilds its child set from the database on load and
//! deletes persisted children missing from memory on save. A fixed relation
//! declares its child keys once; its children are loaded, saved and deleted
//! but never added or dropped.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use super::{row_to_json, KeySpec, Record, RecordError, Session, SpecialFields};
use crate::db::{DbError, Row, Value};

/// Builds the record used for each child of a relation.
pub type RecordFactory = Arc<dyn Fn(&Arc<Session>, &str, KeySpec) -> Result<Record, DbError> + Send + Sync>;

fn default_factory() -> RecordFactory {
    Arc::new(|session: &Arc<Session>, table: &str, key: KeySpec| Record::with_key(session, table, key))
}

/// Declaration of a child relation.
pub struct RelationSpec {
    table: String,
    parent_field: String,
    child_field: String,
    fixed: Vec<String>,
    required: Vec<String>,
    factory: Option<RecordFactory>,
}

impl RelationSpec {
    /// Children of `table`, keyed by `(parent_field, child_field)`.
    pub fn new(table: &str, parent_field: &str, child_field: &str) -> Self {
        Self {
            table: table.to_string(),
            parent_field: parent_field.to_string(),
            child_field: child_field.to_string(),
            fixed: Vec::new(),
            required: Vec::new(),
            factory: None,
        }
    }

    /// Make the relation fixed with these child keys.
    pub fn fixed(mut self, keys: &[&str]) -> Self {
        self.fixed = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    /// Fields every child must fill.
    pub fn required(mut self, fields: &[&str]) -> Self {
        self.required = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn factory(mut self, factory: RecordFactory) -> Self {
        self.factory = Some(factory);
        self
    }
}

/// A declared relation and its in-memory children.
pub struct ChildRelation {
    pub(crate) table: String,
    pub(crate) parent_field: String,
    pub(crate) child_field: String,
    fixed: Vec<String>,
    required: Vec<String>,
    factory: RecordFactory,
    pub(crate) records: IndexMap<String, Record>,
}

impl ChildRelation {
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn is_fixed(&self) -> bool {
        !self.fixed.is_empty()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.records.keys().map(String::as_str).collect()
    }

    pub fn records(&self) -> &IndexMap<String, Record> {
        &self.records
    }

    fn key_spec(&self) -> KeySpec {
        KeySpec::Composite(vec![self.parent_field.clone(), self.child_field.clone()])
    }

    fn identity(&self, parent: &Value, key: &str) -> super::Identity {
        super::Identity::Composite(
            [
                (self.parent_field.clone(), parent.clone()),
                (self.child_field.clone(), Value::from(key)),
            ]
            .into_iter()
            .collect(),
        )
    }

    fn build(&self, session: &Arc<Session>, parent: &Value, key: &str) -> Result<Record, DbError> {
        let mut record = (self.factory)(session, &self.table, self.key_spec())?;
        if !self.required.is_empty() {
            record.configure_fields(SpecialFields::Required, &self.required, true);
        }
        record.id = self.identity(parent, key);
        Ok(record)
    }

    pub(crate) fn reset(&mut self, reset_errors: bool) {
        if self.is_fixed() {
            for record in self.records.values_mut() {
                record.reset_data(reset_errors);
            }
        } else {
            self.records.clear();
        }
    }

    pub(crate) fn to_json(&self, escape: bool) -> serde_json::Value {
        serde_json::Value::Object(
            self.records
                .iter()
                .map(|(key, record)| (key.clone(), row_to_json(&record.get_data(escape))))
                .collect(),
        )
    }
}

/// Error-stack entry for a failed child operation.
pub(crate) fn child_failure(relation: &str, key: &str, child: &Record) -> RecordError {
    RecordError::Child {
        relation: relation.to_string(),
        key: key.to_string(),
        message: child.error().unwrap_or_default(),
    }
}

fn json_row(json: &serde_json::Value) -> Option<Row> {
    match json {
        serde_json::Value::Object(map) => Some(
            map.iter()
                .map(|(k, v)| (k.clone(), Value::from(v.clone())))
                .collect(),
        ),
        _ => None,
    }
}

impl Record {
    /// Declare a child relation under `name`.
    ///
    /// The child table's schema is fetched right away, so a missing table
    /// fails here rather than on first use.
    pub fn add_child_relation(&mut self, name: &str, spec: RelationSpec) -> Result<bool, DbError> {
        if self.key.is_composite() {
            self.errors.push(RecordError::CompositeParentKey);
            return Ok(false);
        }

        let mut relation = ChildRelation {
            table: spec.table,
            parent_field: spec.parent_field,
            child_field: spec.child_field,
            fixed: spec.fixed,
            required: spec.required,
            factory: spec.factory.unwrap_or_else(default_factory),
            records: IndexMap::new(),
        };

        let parent = self.scalar_id();
        if relation.is_fixed() {
            for key in relation.fixed.clone() {
                let record = relation.build(&self.session, &parent, &key)?;
                relation.records.insert(key, record);
            }
        } else {
            self.session.schema(&relation.table, relation.key_spec())?;
        }

        debug!(table = %self.table, relation = name, child_table = %relation.table, "child relation declared");
        self.children.insert(name.to_string(), relation);
        Ok(true)
    }

    pub fn child_relation(&self, name: &str) -> Option<&ChildRelation> {
        self.children.get(name)
    }

    pub fn child(&self, relation: &str, key: &str) -> Option<&Record> {
        self.children.get(relation)?.records.get(key)
    }

    pub fn child_mut(&mut self, relation: &str, key: &str) -> Option<&mut Record> {
        self.children.get_mut(relation)?.records.get_mut(key)
    }

    /// Add an empty child to a dynamic relation.
    pub fn add_child(&mut self, relation: &str, key: &str) -> bool {
        let parent = self.scalar_id();
        let Some(rel) = self.children.get_mut(relation) else {
            self.errors.push(RecordError::UnknownRelation(relation.to_string()));
            return false;
        };
        if rel.is_fixed() {
            self.errors.push(RecordError::FixedRelation(relation.to_string()));
            return false;
        }

        match rel.build(&self.session, &parent, key) {
            Ok(record) => {
                rel.records.insert(key.to_string(), record);
                true
            }
            Err(err) => {
                self.errors.push(RecordError::Child {
                    relation: relation.to_string(),
                    key: key.to_string(),
                    message: err.to_string(),
                });
                false
            }
        }
    }

    /// Drop a child of a dynamic relation. The row goes on the next save.
    pub fn remove_child(&mut self, relation: &str, key: &str) -> bool {
        let Some(rel) = self.children.get_mut(relation) else {
            self.errors.push(RecordError::UnknownRelation(relation.to_string()));
            return false;
        };
        if rel.is_fixed() {
            self.errors.push(RecordError::FixedRelation(relation.to_string()));
            return false;
        }
        if rel.records.shift_remove(key).is_none() {
            self.errors.push(RecordError::UnknownChild {
                relation: relation.to_string(),
                key: key.to_string(),
            });
            return false;
        }
        true
    }

    pub(crate) fn load_children(&mut self) -> Result<bool, DbError> {
        let parent = self.scalar_id();
        let builder = self.session.builder();
        let mut ok = true;

        let names: Vec<String> = self.children.keys().cloned().collect();
        for name in names {
            let query = self.children.get(&name).filter(|r| !r.is_fixed()).map(|r| {
                builder.select_column(&r.child_field, &r.table, &[(r.parent_field.as_str(), &parent)])
            });

            if let Some(sql) = query {
                let keys = match self.run(&sql)? {
                    Some(result) => result.column(0),
                    None => {
                        ok = false;
                        if let Some(relation) = self.children.get_mut(&name) {
                            relation.records.clear();
                        }
                        continue;
                    }
                };
                let Some(relation) = self.children.get_mut(&name) else {
                    continue;
                };
                relation.records.clear();
                for key in keys.iter().map(ToString::to_string) {
                    match relation.build(&self.session, &parent, &key) {
                        Ok(record) => {
                            relation.records.insert(key, record);
                        }
                        Err(err) if err.is_fatal() => return Err(err),
                        Err(err) => {
                            ok = false;
                            self.errors.push(RecordError::Child {
                                relation: name.clone(),
                                key,
                                message: err.to_string(),
                            });
                        }
                    }
                }
            }

            let Some(relation) = self.children.get_mut(&name) else {
                continue;
            };
            debug!(relation = %name, children = relation.records.len(), "loading child records");
            let ids: Vec<_> = relation.records.keys().map(|key| relation.identity(&parent, key)).collect();
            for ((key, child), id) in relation.records.iter_mut().zip(ids) {
                if !child.load(id)? {
                    ok = false;
                    self.errors.push(child_failure(&name, key, child));
                }
            }
        }

        Ok(ok)
    }

    pub(crate) fn save_children(&mut self) -> Result<bool, DbError> {
        let parent = self.scalar_id();
        let builder = self.session.builder();
        let mut ok = true;

        let names: Vec<String> = self.children.keys().cloned().collect();
        for name in names {
            let Some(relation) = self.children.get_mut(&name) else {
                continue;
            };
            let ids: Vec<_> = relation.records.keys().map(|key| relation.identity(&parent, key)).collect();
            for ((key, child), id) in relation.records.iter_mut().zip(ids) {
                child.id = id;
                if !child.save()? {
                    ok = false;
                    self.errors.push(child_failure(&name, key, child));
                }
            }

            if relation.is_fixed() {
                continue;
            }
            let keep: Vec<Value> = relation.records.keys().map(|k| Value::from(k.as_str())).collect();
            let table = relation.table.clone();
            let sql = builder.delete_residual(
                &relation.table,
                &relation.parent_field,
                &parent,
                &relation.child_field,
                &keep,
            );
            if self.run(&sql)?.is_none() {
                ok = false;
                self.errors.push(RecordError::ResidualCleanup(table));
            }
        }

        Ok(ok)
    }

    pub(crate) fn delete_children(&mut self, reset_data: bool) -> Result<bool, DbError> {
        let mut ok = true;
        for (name, relation) in self.children.iter_mut() {
            for (key, child) in relation.records.iter_mut() {
                if !child.delete_with(reset_data)? {
                    ok = false;
                    self.errors.push(child_failure(name, key, child));
                }
            }
        }
        Ok(ok)
    }

    /// Replace the data of a relation's children from a JSON object keyed by
    /// child key.
    ///
    /// Dynamic relations are emptied first. Fixed relations only accept
    /// their declared keys.
    pub(crate) fn set_child_data(&mut self, name: &str, value: &Value) -> bool {
        let entries = match value {
            Value::Composite(serde_json::Value::Object(entries)) => entries.clone(),
            Value::Composite(serde_json::Value::Array(items)) if items.is_empty() => Default::default(),
            _ => {
                self.errors.push(RecordError::InvalidChildData(name.to_string()));
                return false;
            }
        };

        let parent = self.scalar_id();
        let Some(relation) = self.children.get_mut(name) else {
            self.errors.push(RecordError::UnknownRelation(name.to_string()));
            return false;
        };
        if !relation.is_fixed() {
            relation.records.clear();
        }

        let mut ok = true;
        for (key, child_data) in &entries {
            if !relation.records.contains_key(key) {
                if relation.is_fixed() {
                    ok = false;
                    self.errors.push(RecordError::UnknownChild {
                        relation: name.to_string(),
                        key: key.clone(),
                    });
                    continue;
                }
                match relation.build(&self.session, &parent, key) {
                    Ok(record) => {
                        relation.records.insert(key.clone(), record);
                    }
                    Err(err) => {
                        ok = false;
                        self.errors.push(RecordError::Child {
                            relation: name.to_string(),
                            key: key.clone(),
                            message: err.to_string(),
                        });
                        continue;
                    }
                }
            }

            let Some(row) = json_row(child_data) else {
                ok = false;
                self.errors.push(RecordError::InvalidChildData(name.to_string()));
                continue;
            };
            let Some(child) = relation.records.get_mut(key) else {
                continue;
            };
            if !child.set_data(&row, true, false) {
                ok = false;
                self.errors.push(child_failure(name, key, child));
            }
        }
        ok
    }

    /// Data of every child of a relation, keyed by child key.
    pub fn get_child_data(&mut self, relation: &str, escape: bool) -> Option<IndexMap<String, Row>> {
        match self.children.get(relation) {
            Some(rel) => Some(
                rel.records
                    .iter()
                    .map(|(key, child)| (key.clone(), child.get_data(escape)))
                    .collect(),
            ),
            None => {
                self.errors.push(RecordError::UnknownRelation(relation.to_string()));
                None
            }
        }
    }

    pub fn get_child_record_data(&mut self, relation: &str, key: &str, escape: bool) -> Option<Row> {
        match self.child(relation, key) {
            Some(child) => Some(child.get_data(escape)),
            None => {
                self.push_unknown_child(relation, key);
                None
            }
        }
    }

    pub fn get_child_value(&mut self, relation: &str, key: &str, field: &str, escape: bool) -> Option<Value> {
        match self.child_mut(relation, key) {
            Some(child) => child.get_value(field, escape),
            None => {
                self.push_unknown_child(relation, key);
                None
            }
        }
    }

    pub fn set_child_value(&mut self, relation: &str, key: &str, field: &str, value: impl Into<Value>) -> bool {
        match self.child_mut(relation, key) {
            Some(child) => child.set_value(field, value),
            None => {
                self.push_unknown_child(relation, key);
                false
            }
        }
    }

    pub fn child_field_exists(&self, relation: &str, key: &str, field: &str) -> bool {
        self.child(relation, key).is_some_and(|child| child.field_exists(field))
    }

    fn push_unknown_child(&mut self, relation: &str, key: &str) {
        self.errors.push(RecordError::UnknownChild {
            relation: relation.to_string(),
            key: key.to_string(),
        });
    }
}
