//! Output formatting for fields command results.

use super::execute::FieldsResult;
use crate::output::Outputable;

impl Outputable for FieldsResult {
    fn to_table(&self) -> String {
        let mut lines = vec![format!("Table: {} (key: {})", self.table, self.key.join(" + ")), String::new()];

        let width = self.fields.iter().map(|f| f.name.len()).max().unwrap_or(0);
        let type_width = self.fields.iter().map(|f| f.sql_type.len()).max().unwrap_or(0);
        for field in &self.fields {
            let mut line = format!("  {:<width$}  {:<type_width$}", field.name, field.sql_type);
            if field.primary_key {
                line.push_str("  primary key");
            }
            if field.nullable {
                line.push_str("  null");
            }
            if let Some(default) = &field.default {
                line.push_str(&format!("  default {}", default.to_json()));
            }
            lines.push(line.trim_end().to_string());
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::FieldSpec;
    use rstest::{fixture, rstest};

    #[fixture]
    fn users() -> FieldsResult {
        FieldsResult {
            table: "users".to_string(),
            key: vec!["id".to_string()],
            fields: vec![
                FieldSpec::new("id", "int(11)").primary_key(),
                FieldSpec::new("name", "varchar(64)").with_default(""),
                FieldSpec::new("note", "text").nullable(),
            ],
        }
    }

    const USERS_TABLE: &str = "\
Table: users (key: id)

  id    int(11)      primary key
  name  varchar(64)  default \"\"
  note  text         null";

    crate::output_table_test! {
        test_name: test_to_table,
        fixture: users,
        fixture_type: FieldsResult,
        expected: USERS_TABLE,
    }

    crate::output_json_test! {
        test_name: test_format_json,
        fixture: users,
        fixture_type: FieldsResult,
        assertions: {
            "table": "users",
            "key": serde_json::json!(["id"]),
        },
    }

    crate::output_toon_test! {
        test_name: test_format_toon,
        fixture: users,
        fixture_type: FieldsResult,
        contains: ["table: users", "varchar(64)"],
    }
}
