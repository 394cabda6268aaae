use std::error::Error;
use std::sync::Arc;

use serde::Serialize;

use super::GetCmd;
use crate::commands::{identity, key_spec, Execute};
use crate::db::Row;
use crate::record::{Record, Session};

/// Result of the get command execution
#[derive(Debug, Default, Serialize)]
pub struct GetResult {
    pub table: String,
    pub id: String,
    pub found: bool,
    pub data: Row,
    pub errors: Vec<String>,
}

impl Execute for GetCmd {
    type Output = GetResult;

    fn execute(self, session: &Arc<Session>) -> Result<Self::Output, Box<dyn Error>> {
        let mut record = Record::with_key(session, &self.table, key_spec(&self.key))?;
        let id = identity(record.key(), &self.id)?;

        let found = record.load(id)?;
        let data = if found { record.get_data(!self.raw) } else { Row::new() };

        Ok(GetResult {
            table: self.table,
            id: self.id,
            found,
            data,
            errors: record.error_stack().iter().map(ToString::to_string).collect(),
        })
    }
}
