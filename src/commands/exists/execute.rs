use std::error::Error;
use std::sync::Arc;

use serde::Serialize;

use super::ExistsCmd;
use crate::commands::{identity, key_spec, Execute};
use crate::record::{Record, Session};

/// Result of the exists command execution
#[derive(Debug, Serialize)]
pub struct ExistsResult {
    pub table: String,
    pub key: String,
    pub id: String,
    pub exists: bool,
}

impl Execute for ExistsCmd {
    type Output = ExistsResult;

    fn execute(self, session: &Arc<Session>) -> Result<Self::Output, Box<dyn Error>> {
        let mut record = Record::with_key(session, &self.table, key_spec(&self.key))?;
        let id = identity(record.key(), &self.id)?;

        let exists = record.exists_id(&id)?;
        // A failed lookup is not an answer.
        if let Some(message) = record.error() {
            return Err(message.into());
        }

        Ok(ExistsResult {
            table: self.table,
            key: record.key().describe(),
            id: id.describe(),
            exists,
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
        let session = sample_session();
        session
            .execute("CREATE TABLE user_tags (user_id INTEGER NOT NULL, tag VARCHAR(16) NOT NULL, PRIMARY KEY (user_id, tag))")
            .unwrap();
        session.execute("INSERT INTO user_tags VALUES (1, 'admin')").unwrap();
        session
    }

    fn exists(table: &str, id: &str, key: &str) -> ExistsCmd {
        ExistsCmd {
            table: table.to_string(),
            id: id.to_string(),
            key: key.to_string(),
        }
    }

    #[rstest]
    #[case("1", true)]
    #[case("2", true)]
    #[case("99", false)]
    fn test_exists_by_id(session: Arc<Session>, #[case] id: &str, #[case] expected: bool) {
        let result = exists("users", id, "id").execute(&session).unwrap();
        assert_eq!(result.exists, expected);
    }

    crate::execute_test! {
        test_name: test_exists_composite,
        fixture: session,
        cmd: exists("user_tags", "1,admin", "user_id,tag"),
        assertions: |result| {
            assert!(result.exists);
            assert_eq!(result.key, "user_id + tag");
            assert_eq!(result.id, "1 + admin");
        },
    }

    crate::execute_test! {
        test_name: test_exists_composite_miss,
        fixture: session,
        cmd: exists("user_tags", "1,guest", "user_id,tag"),
        assertions: |result| {
            assert!(!result.exists);
        },
    }

    crate::execute_error_test! {
        test_name: test_exists_unknown_column,
        fixture: session,
        cmd: exists("users", "x", "missing"),
        contains: "missing",
    }
}
