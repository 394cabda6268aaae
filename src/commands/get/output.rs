//! Output formatting for get command results.

use super::execute::GetResult;
use crate::output::Outputable;

impl Outputable for GetResult {
    fn to_table(&self) -> String {
        let header = format!("Record: {} {}", self.table, self.id);

        if !self.found {
            let mut lines = vec![header, String::new(), "Not found.".to_string()];
            lines.extend(self.errors.iter().map(|e| format!("  {e}")));
            return lines.join("\n");
        }

        let width = self.data.keys().map(|k| k.len() + 1).max().unwrap_or(0);
        let mut lines = vec![header, String::new()];
        for (field, value) in &self.data {
            let label = format!("{field}:");
            lines.push(format!("  {label:<width$}  {value}").trim_end().to_string());
        }
        lines.join("\n")
    }
}
