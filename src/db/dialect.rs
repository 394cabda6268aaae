//! SQL dialect differences that matter to generated statements.

use super::escape::{double_quote_char, escape_string_for_quote};
use super::value::Value;

/// The SQL dialect spoken by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Sqlite,
    Postgres,
}

impl Dialect {
    /// Quote a table or column name.
    pub fn quote_ident(&self, name: &str) -> String {
        match self {
            Dialect::MySql | Dialect::Sqlite => format!("`{}`", double_quote_char(name, '`')),
            Dialect::Postgres => format!("\"{}\"", double_quote_char(name, '"')),
        }
    }

    /// Render a value as a SQL literal.
    ///
    /// Every non-null value is emitted as a quoted string and left to the
    /// server to coerce into the column type.
    pub fn quote(&self, value: &Value) -> String {
        let text = match value {
            Value::Null => return "NULL".to_string(),
            Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            other => other.to_string(),
        };

        match self {
            Dialect::MySql => format!("'{}'", escape_string_for_quote(&text, '\'')),
            Dialect::Sqlite | Dialect::Postgres => format!("'{}'", double_quote_char(&text, '\'')),
        }
    }

    /// Tail of an INSERT that provides no column values.
    pub fn empty_insert(&self) -> &'static str {
        match self {
            Dialect::MySql => "() VALUES ()",
            Dialect::Sqlite | Dialect::Postgres => "DEFAULT VALUES",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Dialect::MySql, "`users`")]
    #[case(Dialect::Sqlite, "`users`")]
    #[case(Dialect::Postgres, "\"users\"")]
    fn test_quote_ident(#[case] dialect: Dialect, #[case] expected: &str) {
        assert_eq!(dialect.quote_ident("users"), expected);
    }

    #[test]
    fn test_quote_ident_escapes_backtick() {
        assert_eq!(Dialect::MySql.quote_ident("we`ird"), "`we``ird`");
    }

    #[rstest]
    #[case(Dialect::MySql, "O'Hara", r"'O\'Hara'")]
    #[case(Dialect::Sqlite, "O'Hara", "'O''Hara'")]
    #[case(Dialect::Postgres, "O'Hara", "'O''Hara'")]
    fn test_quote_text(#[case] dialect: Dialect, #[case] input: &str, #[case] expected: &str) {
        assert_eq!(dialect.quote(&Value::from(input)), expected);
    }

    #[test]
    fn test_quote_null_and_numbers() {
        assert_eq!(Dialect::Sqlite.quote(&Value::Null), "NULL");
        assert_eq!(Dialect::Sqlite.quote(&Value::Int(7)), "'7'");
        assert_eq!(Dialect::MySql.quote(&Value::Bool(false)), "'0'");
    }

    #[test]
    fn test_quote_composite_as_json() {
        let value = Value::Composite(serde_json::json!(["a"]));
        assert_eq!(Dialect::Sqlite.quote(&value), r#"'["a"]'"#);
    }
}
