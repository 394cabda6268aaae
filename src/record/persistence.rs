//! Loading, saving and deleting records.
//!
//! `save` picks one of three paths from the identity state:
//! - no identity: INSERT, then adopt the generated id (single-field keys)
//! - identity of an existing row: UPDATE, unless the record is read-only
//! - identity of a missing row: INSERT including the identity columns
//!
//! Every successful write cascades to the child records and the save hook.

use tracing::debug;

use super::{Hook, Identity, Record, RecordError};
use crate::db::{DbError, QueryResult, Row, Value};

fn lookup_is_valid(values: &[Value], fields: &[&str]) -> bool {
    !values.is_empty() && values.len() == fields.len()
}

fn describe_values(values: &[Value]) -> String {
    values.iter().map(ToString::to_string).collect::<Vec<_>>().join(" + ")
}

impl Record {
    /// Load the row identified by `id`.
    ///
    /// When no such row exists the field values are reset and a "record not
    /// found" error is pushed.
    pub fn load(&mut self, id: impl Into<Identity>) -> Result<bool, DbError> {
        if self.set_id(id) {
            if self.exists()? {
                return self.load_current();
            }
            self.errors.push(RecordError::NotFound {
                key: self.key.describe(),
                value: self.id.describe(),
            });
        }
        self.reset_data(false);
        Ok(false)
    }

    /// Load the row of the current identity again.
    pub fn reload(&mut self) -> Result<bool, DbError> {
        let id = self.id.clone();
        self.load(id)
    }

    fn load_current(&mut self) -> Result<bool, DbError> {
        let sql = self.session.builder().select(&self.table, &self.id.pairs(&self.key));
        let row = self.run(&sql)?.and_then(QueryResult::first_row);
        match row {
            Some(row) => {
                self.fill_from_row(row, false);
                self.load_related()
            }
            None => {
                self.errors.push(RecordError::NotFound {
                    key: self.key.describe(),
                    value: self.id.describe(),
                });
                self.reset_data(false);
                Ok(false)
            }
        }
    }

    fn fill_from_row(&mut self, row: Row, adopt_identity: bool) {
        if adopt_identity {
            let mut id = Identity::empty_for(&self.key);
            for field in self.key.fields() {
                id.set(field, row.get(field).cloned().unwrap_or_default());
            }
            self.id = id;
        }

        let excluded = self.special_fields(super::SpecialFields::Excluded);
        let key = &self.key;
        self.data = row
            .into_iter()
            .filter(|(field, _)| !key.contains(field) && !excluded.contains(field))
            .collect();
        self.decode_serialized();
    }

    fn load_related(&mut self) -> Result<bool, DbError> {
        let children_ok = self.load_children()?;
        let extra_ok = self.run_hook(Hook::Load)?;
        Ok(children_ok && extra_ok)
    }

    pub fn load_by_field(&mut self, value: impl Into<Value>, field: &str) -> Result<bool, DbError> {
        self.load_by_fields(&[value.into()], &[field])
    }

    /// Load the first row whose `fields` equal `values`.
    pub fn load_by_fields(&mut self, values: &[Value], fields: &[&str]) -> Result<bool, DbError> {
        if !lookup_is_valid(values, fields) {
            self.errors.push(RecordError::InvalidLookup);
            return Ok(false);
        }

        let conditions: Vec<(&str, &Value)> = fields.iter().copied().zip(values).collect();
        let sql = self.session.builder().select(&self.table, &conditions);
        match self.run(&sql)?.and_then(QueryResult::first_row) {
            Some(row) => {
                self.fill_from_row(row, true);
                self.load_related()
            }
            None => {
                self.errors.push(RecordError::NotFound {
                    key: fields.join(" + "),
                    value: describe_values(values),
                });
                self.reset_data(false);
                Ok(false)
            }
        }
    }

    pub fn load_by_child_field(
        &mut self,
        relation: &str,
        value: impl Into<Value>,
        field: &str,
    ) -> Result<bool, DbError> {
        self.load_by_child_fields(relation, &[value.into()], &[field])
    }

    /// Find a child row of `relation` by column values and load its parent.
    pub fn load_by_child_fields(
        &mut self,
        relation: &str,
        values: &[Value],
        fields: &[&str],
    ) -> Result<bool, DbError> {
        let Some((table, parent_field)) = self
            .children
            .get(relation)
            .map(|r| (r.table.clone(), r.parent_field.clone()))
        else {
            self.errors.push(RecordError::UnknownRelation(relation.to_string()));
            return Ok(false);
        };
        if !lookup_is_valid(values, fields) {
            self.errors.push(RecordError::InvalidLookup);
            return Ok(false);
        }

        let conditions: Vec<(&str, &Value)> = fields.iter().copied().zip(values).collect();
        let sql = self.session.builder().select(&table, &conditions);
        let parent_id = self
            .run(&sql)?
            .and_then(QueryResult::first_row)
            .and_then(|mut row| row.shift_remove(&parent_field));

        match parent_id {
            Some(id) => self.load(id),
            None => {
                self.errors.push(RecordError::NotFound {
                    key: fields.join(" + "),
                    value: describe_values(values),
                });
                self.reset_data(false);
                Ok(false)
            }
        }
    }

    /// Whether the row of the current identity exists.
    pub fn exists(&mut self) -> Result<bool, DbError> {
        if self.id.is_empty() {
            return Ok(false);
        }
        let id = self.id.clone();
        self.exists_id(&id)
    }

    pub fn exists_id(&mut self, id: &Identity) -> Result<bool, DbError> {
        let sql = self.session.builder().exists(&self.table, &id.pairs(&self.key));
        Ok(self.run(&sql)?.is_some_and(|result| !result.is_empty()))
    }

    pub fn exists_by_field(&mut self, value: impl Into<Value>, field: &str) -> Result<bool, DbError> {
        self.exists_by_fields(&[value.into()], &[field])
    }

    pub fn exists_by_fields(&mut self, values: &[Value], fields: &[&str]) -> Result<bool, DbError> {
        if !lookup_is_valid(values, fields) {
            self.errors.push(RecordError::InvalidLookup);
            return Ok(false);
        }
        let conditions: Vec<(&str, &Value)> = fields.iter().copied().zip(values).collect();
        let sql = self.session.builder().exists(&self.table, &conditions);
        Ok(self.run(&sql)?.is_some_and(|result| !result.is_empty()))
    }

    /// Persist the record and cascade to its children and save hook.
    pub fn save(&mut self) -> Result<bool, DbError> {
        let data = self.encode_serialized(self.data_fields());
        let builder = self.session.builder();

        let written = if self.id.is_empty() {
            let sql = builder.insert(&self.table, &data);
            let result = self.session.execute_insert(&sql);
            match self.soft(result)? {
                Some(generated) => {
                    // Composite keys have no generated value to adopt.
                    if !self.key.is_composite() {
                        if let Some(generated) = generated {
                            self.id = Identity::Scalar(generated);
                        }
                    }
                    true
                }
                None => false,
            }
        } else if self.exists()? {
            if self.read_only {
                self.errors.push(RecordError::ReadOnlyTable(self.table.clone()));
                false
            } else {
                let sql = builder.update(&self.table, &data, &self.id.pairs(&self.key));
                match sql {
                    Some(sql) => self.run(&sql)?.is_some(),
                    None => true,
                }
            }
        } else {
            let mut data = data;
            for (field, value) in self.id.pairs(&self.key) {
                data.insert(field.to_string(), value.clone());
            }
            let sql = builder.insert(&self.table, &data);
            self.run(&sql)?.is_some()
        };

        if !written {
            return Ok(false);
        }
        debug!(table = %self.table, id = %self.id.describe(), "record written");

        // Children of an unidentified parent would be keyed by NULL.
        let children_ok = if self.id.is_empty() && !self.children.is_empty() {
            self.errors.push(RecordError::MissingGeneratedId(self.table.clone()));
            false
        } else {
            self.save_children()?
        };
        let extra_ok = self.run_hook(Hook::Save)?;
        Ok(children_ok && extra_ok)
    }

    /// Delete the record and its children, then reset the field values.
    pub fn delete(&mut self) -> Result<bool, DbError> {
        self.delete_with(true)
    }

    /// Delete the record and its children.
    ///
    /// Children are deleted even when the parent row could not be. The
    /// delete hook only runs after the parent row is gone.
    pub fn delete_with(&mut self, reset_data: bool) -> Result<bool, DbError> {
        let mut ok = true;

        if !self.id.is_empty() {
            let sql = self.session.builder().delete(&self.table, &self.id.pairs(&self.key));
            if self.run(&sql)?.is_some() {
                ok &= self.run_hook(Hook::Delete)?;
            } else {
                ok = false;
            }
            ok &= self.delete_children(reset_data)?;
        }

        if reset_data {
            self.reset_data(false);
        }
        Ok(ok)
    }

    /// Set `field` to 1 or 0 and write only that column.
    pub fn toggle(&mut self, field: &str, on: bool) -> Result<bool, DbError> {
        if !self.set_value(field, if on { "1" } else { "0" }) {
            return Ok(false);
        }
        if self.id.is_empty() {
            self.errors.push(RecordError::EmptyIdentifier);
            return Ok(false);
        }

        let value = self.data.get(field).cloned().unwrap_or_default();
        let data: Row = [(field.to_string(), value)].into_iter().collect();
        let sql = self.session.builder().update(&self.table, &data, &self.id.pairs(&self.key));
        match sql {
            Some(sql) => Ok(self.run(&sql)?.is_some()),
            None => Ok(false),
        }
    }

    /// Raw rows of the table matching every condition, or all rows when
    /// there are none.
    pub fn rows(&mut self, conditions: &[(&str, &Value)], escape: bool) -> Result<Vec<Row>, DbError> {
        let builder = self.session.builder();
        let sql = if conditions.is_empty() {
            builder.select_all(&self.table)
        } else {
            builder.select(&self.table, conditions)
        };

        let rows = self.run(&sql)?.map(QueryResult::into_rows).unwrap_or_default();
        if !escape {
            return Ok(rows);
        }
        Ok(rows
            .into_iter()
            .map(|row| row.into_iter().map(|(k, v)| (k, v.html_escaped())).collect())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::{open_mem_db, Connection};
    use crate::record::{RelationSpec, Session, SpecialFields};
    use crate::test_utils::{AuditHooks, ScriptedBackend, DEADLOCK};
    use rstest::{fixture, rstest};

    #[fixture]
    fn session() -> Arc<Session> {
        let session = Session::new(open_mem_db().unwrap());
        session
            .execute(
                "CREATE TABLE users (id INTEGER PRIMARY KEY, name VARCHAR(64) NOT NULL DEFAULT '', \
                 email VARCHAR(64) NOT NULL DEFAULT '', active TINYINT(1) NOT NULL DEFAULT 0, \
                 prefs TEXT)",
            )
            .unwrap();
        session
    }

    fn saved_user(session: &Arc<Session>, name: &str) -> Record {
        let mut user = Record::new(session, "users").unwrap();
        assert!(user.set_value("name", name));
        assert!(user.set_value("email", format!("{}@example.com", name.to_lowercase())));
        assert!(user.save().unwrap());
        user
    }

    #[rstest]
    fn test_save_adopts_generated_id(session: Arc<Session>) {
        let user = saved_user(&session, "Alice");
        assert_eq!(user.id(), &Identity::Scalar(Value::Int(1)));
    }

    #[rstest]
    fn test_save_updates_existing(session: Arc<Session>) {
        let mut user = saved_user(&session, "Alice");
        user.set_value("name", "Alicia");
        assert!(user.save().unwrap());

        let mut copy = Record::new(&session, "users").unwrap();
        assert!(copy.load(1).unwrap());
        assert_eq!(copy.get_value("name", false), Some(Value::from("Alicia")));
    }

    #[rstest]
    fn test_save_with_assigned_id_inserts(session: Arc<Session>) {
        let mut user = Record::new(&session, "users").unwrap();
        assert!(user.set_id(42));
        user.set_value("name", "Zed");
        assert!(user.save().unwrap());
        assert!(Record::new(&session, "users").unwrap().load(42).unwrap());
    }

    #[rstest]
    fn test_read_only_record_is_not_updated(session: Arc<Session>) {
        let mut user = saved_user(&session, "Alice");
        user.set_read_only(true);
        user.set_value("name", "Mallory");
        assert!(!user.save().unwrap());
        assert_eq!(user.error_stack().last(), Some(&RecordError::ReadOnlyTable("users".into())));
    }

    #[rstest]
    fn test_load_missing_resets_and_keeps_errors(session: Arc<Session>) {
        let mut user = Record::new(&session, "users").unwrap();
        user.set_value("name", "dirty");
        user.set_value("nope", 1);

        assert!(!user.load(99).unwrap());
        assert_eq!(user.get_value("name", false), Some(Value::from("")));
        assert_eq!(user.error().as_deref(), Some("record not found: id = 99"));
        assert_eq!(user.error_stack().len(), 2);
    }

    #[rstest]
    fn test_load_by_fields(session: Arc<Session>) {
        saved_user(&session, "Alice");
        saved_user(&session, "Bob");

        let mut user = Record::new(&session, "users").unwrap();
        assert!(user.load_by_field("bob@example.com", "email").unwrap());
        assert_eq!(user.id(), &Identity::Scalar(Value::Int(2)));
        assert!(!user.field_exists("id"));

        assert!(!user.load_by_fields(&[Value::from("x")], &[]).unwrap());
        assert_eq!(user.error_stack().last(), Some(&RecordError::InvalidLookup));
    }

    #[rstest]
    fn test_exists_variants(session: Arc<Session>) {
        saved_user(&session, "Alice");
        let mut user = Record::new(&session, "users").unwrap();
        assert!(!user.exists().unwrap());
        assert!(user.exists_id(&Identity::from(1)).unwrap());
        assert!(user.exists_by_field("Alice", "name").unwrap());
        assert!(!user.exists_by_fields(&[Value::from("Alice"), Value::Int(1)], &["name", "active"]).unwrap());
    }

    #[rstest]
    fn test_delete_then_missing(session: Arc<Session>) {
        let mut user = saved_user(&session, "Alice");
        assert!(user.delete().unwrap());
        assert!(!user.exists().unwrap());
        assert_eq!(user.get_value("name", false), Some(Value::from("")));

        let mut fresh = Record::new(&session, "users").unwrap();
        assert!(fresh.delete().unwrap());
    }

    #[rstest]
    fn test_toggle_writes_single_column(session: Arc<Session>) {
        let mut user = saved_user(&session, "Alice");
        assert!(user.toggle("active", true).unwrap());

        let rows = user.rows(&[("active", &Value::from("1"))], false).unwrap();
        assert_eq!(rows.len(), 1);

        let mut unsaved = Record::new(&session, "users").unwrap();
        assert!(!unsaved.toggle("active", true).unwrap());
        assert_eq!(unsaved.error_stack(), &[RecordError::EmptyIdentifier]);
    }

    #[rstest]
    fn test_serialized_round_trip(session: Arc<Session>) {
        let mut user = Record::new(&session, "users").unwrap();
        user.configure_fields(SpecialFields::Serialized, &["prefs"], true);
        user.set_value("prefs", Value::Composite(serde_json::json!({"theme": "<dark>"})));
        assert!(user.save().unwrap());

        let stored = user.rows(&[], false).unwrap();
        assert_eq!(stored[0].get("prefs"), Some(&Value::from(r#"{"theme":"<dark>"}"#)));

        let mut copy = Record::new(&session, "users").unwrap();
        assert!(copy.load(1).unwrap());
        assert_eq!(
            copy.get_value("prefs", true),
            Some(Value::Composite(serde_json::json!({"theme": "<dark>"})))
        );
    }

    #[rstest]
    fn test_rows_escape(session: Arc<Session>) {
        saved_user(&session, "<b>");
        let mut user = Record::new(&session, "users").unwrap();
        let rows = user.rows(&[], true).unwrap();
        assert_eq!(rows[0].get("name"), Some(&Value::from("&lt;b&gt;")));
    }

    #[rstest]
    fn test_hooks_follow_load_save_delete(session: Arc<Session>) {
        let hooks = AuditHooks::default();
        let mut user = Record::new(&session, "users").unwrap().with_hooks(Box::new(hooks.clone()));
        user.set_value("name", "Alice");
        assert!(user.save().unwrap());

        let mut copy = Record::new(&session, "users").unwrap().with_hooks(Box::new(hooks.clone()));
        assert!(copy.load(1).unwrap());
        assert_eq!(copy.get_value("visits", false), Some(Value::Int(7)));
        assert!(copy.delete().unwrap());
        assert_eq!(copy.get_value("visits", false), Some(Value::Int(0)));

        assert_eq!(hooks.calls(), vec!["save 1", "load 1", "delete 1"]);
    }

    #[rstest]
    fn test_failing_save_hook_fails_save(session: Arc<Session>) {
        let hooks = AuditHooks::failing_save();
        let mut user = Record::new(&session, "users").unwrap().with_hooks(Box::new(hooks.clone()));
        user.set_value("name", "Alice");

        assert!(!user.save().unwrap());
        assert!(Record::new(&session, "users").unwrap().load(1).unwrap());
        assert_eq!(user.error().as_deref(), Some("audit log unavailable"));
    }

    #[rstest]
    fn test_set_data_assigns_identity_without_validation(session: Arc<Session>) {
        let mut user = Record::new(&session, "users").unwrap();
        let data: Row = [
            ("id".to_string(), Value::from("abc")),
            ("name".to_string(), Value::from("Alice")),
        ]
        .into_iter()
        .collect();

        assert!(user.set_data(&data, true, false));
        assert_eq!(user.id(), &Identity::Scalar(Value::from("abc")));
        assert!(user.error_stack().is_empty());
    }

    #[test]
    fn test_missing_generated_id_skips_children() {
        let (backend, handle) = ScriptedBackend::new();
        handle.with_fields(&[
            ("id", "int(11)"),
            ("user_id", "int(11)"),
            ("tag", "varchar(10)"),
            ("name", "varchar(20)"),
        ]);
        let session = Session::new(Connection::new(Box::new(backend)));
        let hooks = AuditHooks::default();

        let mut user = Record::new(&session, "users").unwrap().with_hooks(Box::new(hooks.clone()));
        assert!(user.add_child_relation("tags", RelationSpec::new("user_tags", "user_id", "tag")).unwrap());
        assert!(user.add_child("tags", "A"));
        user.set_value("name", "Alice");

        assert!(!user.save().unwrap());
        assert!(user.id().is_empty());
        assert_eq!(user.error_stack(), &[RecordError::MissingGeneratedId("users".into())]);
        assert_eq!(hooks.calls().len(), 1);

        let writes: Vec<_> = handle
            .statements()
            .into_iter()
            .filter(|sql| sql.starts_with("INSERT") || sql.starts_with("DELETE"))
            .collect();
        assert_eq!(writes.len(), 1);
        assert!(writes[0].starts_with("INSERT INTO `users`"));
    }

    #[test]
    fn test_exhausted_retries_abort_save() {
        let (backend, handle) = ScriptedBackend::new();
        handle.with_fields(&[("id", "int(11)"), ("name", "varchar(20)")]);
        let connection = Connection::new(Box::new(backend))
            .with_retry(crate::db::RetryPolicy::default().with_delay(std::time::Duration::ZERO));
        let session = Session::new(connection);

        let mut user = Record::new(&session, "users").unwrap();
        user.set_value("name", "Alice");
        handle.fail_always_with(DEADLOCK);

        assert!(matches!(user.save(), Err(DbError::RetriesExhausted { .. })));
    }

    #[test]
    fn test_soft_query_error_lands_on_stack() {
        let (backend, handle) = ScriptedBackend::new();
        handle.with_fields(&[("id", "int(11)"), ("name", "varchar(20)")]);
        let session = Session::new(Connection::new(Box::new(backend)));

        let mut user = Record::new(&session, "users").unwrap();
        handle.fail_with("Duplicate entry 'Alice'");
        assert!(!user.save().unwrap());
        assert_eq!(user.error().as_deref(), Some("Duplicate entry 'Alice'"));
    }
}
