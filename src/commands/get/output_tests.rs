//! Output formatting tests for the get command.

#[cfg(test)]
mod tests {
    use super::super::execute::GetResult;
    use crate::db::{Row, Value};
    use rstest::{fixture, rstest};

    const FOUND_TABLE: &str = "\
Record: users 1

  id:      1
  name:    Alice
  active:  1";

    const MISSING_TABLE: &str = "\
Record: users 99

Not found.
  record not found: id = 99";

    #[fixture]
    fn found() -> GetResult {
        let mut data = Row::new();
        data.insert("id".to_string(), Value::Int(1));
        data.insert("name".to_string(), Value::from("Alice"));
        data.insert("active".to_string(), Value::Int(1));
        GetResult {
            table: "users".to_string(),
            id: "1".to_string(),
            found: true,
            data,
            errors: vec![],
        }
    }

    #[fixture]
    fn missing() -> GetResult {
        GetResult {
            table: "users".to_string(),
            id: "99".to_string(),
            errors: vec!["record not found: id = 99".to_string()],
            ..Default::default()
        }
    }

    crate::output_table_test! {
        test_name: test_to_table_found,
        fixture: found,
        fixture_type: GetResult,
        expected: FOUND_TABLE,
    }

    crate::output_table_test! {
        test_name: test_to_table_missing,
        fixture: missing,
        fixture_type: GetResult,
        expected: MISSING_TABLE,
    }

    crate::output_json_test! {
        test_name: test_format_json,
        fixture: found,
        fixture_type: GetResult,
        assertions: {
            "found": true,
            "data": serde_json::json!({"id": 1, "name": "Alice", "active": 1}),
        },
    }

    crate::output_toon_test! {
        test_name: test_format_toon,
        fixture: found,
        fixture_type: GetResult,
        contains: ["table: users", "found: true", "Alice"],
    }
}
