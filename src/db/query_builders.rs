//! SQL text builders for record persistence.
//!
//! All builders quote identifiers and literals for the target dialect.
//! Values are always rendered inline; no statement parameters are used.

use super::backend::Row;
use super::dialect::Dialect;
use super::value::Value;

/// Renders statements for one dialect.
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder {
    dialect: Dialect,
}

impl QueryBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn ident(&self, name: &str) -> String {
        self.dialect.quote_ident(name)
    }

    /// `WHERE` clause matching every condition. An empty condition list
    /// matches nothing.
    pub fn where_clause(&self, conditions: &[(&str, &Value)]) -> String {
        if conditions.is_empty() {
            return " WHERE 1 = 0".to_string();
        }
        let parts: Vec<String> = conditions
            .iter()
            .map(|(field, value)| match value {
                Value::Null => format!("{} IS NULL", self.ident(field)),
                v => format!("{} = {}", self.ident(field), self.dialect.quote(v)),
            })
            .collect();
        format!(" WHERE {}", parts.join(" AND "))
    }

    pub fn insert(&self, table: &str, data: &Row) -> String {
        if data.is_empty() {
            return format!("INSERT INTO {} {}", self.ident(table), self.dialect.empty_insert());
        }
        let columns: Vec<String> = data.keys().map(|k| self.ident(k)).collect();
        let values: Vec<String> = data.values().map(|v| self.dialect.quote(v)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.ident(table),
            columns.join(", "),
            values.join(", ")
        )
    }

    /// UPDATE statement, or `None` when there is nothing to set.
    pub fn update(&self, table: &str, data: &Row, key: &[(&str, &Value)]) -> Option<String> {
        if data.is_empty() {
            return None;
        }
        let assignments: Vec<String> = data
            .iter()
            .map(|(k, v)| format!("{} = {}", self.ident(k), self.dialect.quote(v)))
            .collect();
        Some(format!(
            "UPDATE {} SET {}{}",
            self.ident(table),
            assignments.join(", "),
            self.where_clause(key)
        ))
    }

    pub fn delete(&self, table: &str, key: &[(&str, &Value)]) -> String {
        format!("DELETE FROM {}{}", self.ident(table), self.where_clause(key))
    }

    pub fn select(&self, table: &str, conditions: &[(&str, &Value)]) -> String {
        format!("SELECT * FROM {}{}", self.ident(table), self.where_clause(conditions))
    }

    /// Every row of `table`.
    pub fn select_all(&self, table: &str) -> String {
        format!("SELECT * FROM {}", self.ident(table))
    }

    pub fn select_column(&self, column: &str, table: &str, conditions: &[(&str, &Value)]) -> String {
        format!(
            "SELECT {} FROM {}{}",
            self.ident(column),
            self.ident(table),
            self.where_clause(conditions)
        )
    }

    pub fn exists(&self, table: &str, conditions: &[(&str, &Value)]) -> String {
        format!("SELECT 1 FROM {}{} LIMIT 1", self.ident(table), self.where_clause(conditions))
    }

    /// Remove child rows of `parent_value` whose `child_field` is not in `keep`.
    pub fn delete_residual(
        &self,
        table: &str,
        parent_field: &str,
        parent_value: &Value,
        child_field: &str,
        keep: &[Value],
    ) -> String {
        let mut sql = self.delete(table, &[(parent_field, parent_value)]);
        if !keep.is_empty() {
            let list: Vec<String> = keep.iter().map(|v| self.dialect.quote(v)).collect();
            sql.push_str(&format!(" AND {} NOT IN ({})", self.ident(child_field), list.join(", ")));
        }
        sql
    }
}
