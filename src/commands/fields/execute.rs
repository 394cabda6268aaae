use std::error::Error;
use std::sync::Arc;

use serde::Serialize;

use super::FieldsCmd;
use crate::commands::Execute;
use crate::db::FieldSpec;
use crate::record::{Record, Session};

/// Result of the fields command execution
#[derive(Debug, Serialize)]
pub struct FieldsResult {
    pub table: String,
    pub key: Vec<String>,
    pub fields: Vec<FieldSpec>,
}

impl Execute for FieldsCmd {
    type Output = FieldsResult;

    fn execute(self, session: &Arc<Session>) -> Result<Self::Output, Box<dyn Error>> {
        let record = Record::new(session, &self.table)?;
        Ok(FieldsResult {
            key: record.key().fields().into_iter().map(String::from).collect(),
            fields: record.field_specs(),
            table: self.table,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_session;
    use rstest::{fixture, rstest};

    #[fixture]
    fn session() -> Arc<Session> {
        sample_session()
    }

    crate::execute_test! {
        test_name: test_fields_in_table_order,
        fixture: session,
        cmd: FieldsCmd { table: "users".to_string() },
        assertions: |result| {
            let names: Vec<&str> = result.fields.iter().map(|f| f.name.as_str()).collect();
            assert_eq!(names, ["id", "name", "active"]);
            assert_eq!(result.key, ["id"]);
        },
    }

    crate::execute_test! {
        test_name: test_fields_carry_metadata,
        fixture: session,
        cmd: FieldsCmd { table: "users".to_string() },
        assertions: |result| {
            assert!(result.fields[0].primary_key);
            assert_eq!(result.fields[1].sql_type, "VARCHAR(64)");
            assert!(!result.fields[1].nullable);
        },
    }

    crate::execute_error_test! {
        test_name: test_missing_table,
        fixture: session,
        cmd: FieldsCmd { table: "nope".to_string() },
        contains: "nope",
    }
}
