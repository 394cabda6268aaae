//! Column metadata reported by a driver.

use serde::Serialize;

use super::value::Value;

/// Broad classes of SQL column types that share formatting/validation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    /// `tinyint`: numeric, but also used for boolean flags.
    Flag,
    Numeric,
    Text,
    Char,
    Year,
    Date,
    Time,
    DateTime,
    Timestamp,
    Other,
}

/// A declared SQL type with any `(length, precision)` suffix split off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlType {
    /// Lowercased type name, e.g. `varchar`, `int`, `datetime`.
    pub name: String,
    /// First number inside the parentheses, if any.
    pub length: Option<u32>,
}

impl SqlType {
    /// Parse a declaration such as `int(10) unsigned` or `VARCHAR(255)`.
    pub fn parse(declared: &str) -> Self {
        let declared = declared.trim().to_ascii_lowercase();
        let name_end = declared
            .find(|c: char| c == '(' || c.is_whitespace())
            .unwrap_or(declared.len());
        let name = declared[..name_end].to_string();

        let length = declared.find('(').and_then(|open| {
            let inner = &declared[open + 1..];
            let close = inner.find(')').unwrap_or(inner.len());
            inner[..close].split(',').next()?.trim().parse().ok()
        });

        Self { name, length }
    }

    pub fn family(&self) -> TypeFamily {
        match self.name.as_str() {
            "tinyint" => TypeFamily::Flag,
            "smallint" | "mediumint" | "int" | "integer" | "bigint" | "bit" | "real" | "double"
            | "float" | "decimal" | "numeric" => TypeFamily::Numeric,
            "varchar" | "string" | "tinyblob" | "blob" | "mediumblob" | "longblob" | "tinytext"
            | "text" | "mediumtext" | "longtext" => TypeFamily::Text,
            "character" | "char" => TypeFamily::Char,
            "year" => TypeFamily::Year,
            "date" => TypeFamily::Date,
            "time" => TypeFamily::Time,
            "datetime" => TypeFamily::DateTime,
            "timestamp" => TypeFamily::Timestamp,
            _ => TypeFamily::Other,
        }
    }
}

/// Metadata for one column of a table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    pub name: String,
    /// Type as declared, e.g. `varchar(64)`.
    pub sql_type: String,
    pub nullable: bool,
    pub default: Option<Value>,
    pub primary_key: bool,
}

impl FieldSpec {
    pub fn new(name: &str, sql_type: &str) -> Self {
        Self {
            name: name.to_string(),
            sql_type: sql_type.to_string(),
            nullable: false,
            default: None,
            primary_key: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn parsed_type(&self) -> SqlType {
        SqlType::parse(&self.sql_type)
    }

    /// Value a fresh record starts with: the column default when it is
    /// non-empty, otherwise `0` for numeric-looking types and `""` for the rest.
    pub fn initial_value(&self) -> Value {
        match &self.default {
            Some(default) if !default.to_string().is_empty() => default.clone(),
            _ => {
                let declared = self.sql_type.to_ascii_lowercase();
                if declared.contains("int") || declared.contains("float") || declared.contains("double") {
                    Value::Int(0)
                } else {
                    Value::Text(String::new())
                }
            }
        }
    }
}
