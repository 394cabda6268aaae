use super::execute::ExistsResult;
use crate::output::Outputable;

impl Outputable for ExistsResult {
    fn to_table(&self) -> String {
        let state = if self.exists { "exists" } else { "not found" };
        format!("{} {} = {}: {}", self.table, self.key, self.id, state)
    }
}
