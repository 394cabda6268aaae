//! Integration tests of the record engine against PostgreSQL.
//!
//! These tests require a local PostgreSQL instance.
//! Run with: cargo test --features postgres-tests
//!
//! Prerequisites:
//! 1. PostgreSQL running on localhost
//! 2. Create test database: `createdb -U postgres dbreg_test`
//!
//! Override the connection with `DBREG_TEST_PG`.

#![cfg(feature = "postgres-tests")]

use std::error::Error;
use std::sync::Arc;

use dbreg::db::{DatabaseConfig, RetryPolicy, Value};
use dbreg::record::{Identity, Record, RelationSpec, Session, SpecialFields};

/// Test connection string for PostgreSQL (local instance)
const PG_CONNECTION: &str = "postgres://postgres@localhost:5432/dbreg_test";

/// Each test gets its own tables so tests can run in parallel.
fn setup(prefix: &str) -> Result<(Arc<Session>, String, String), Box<dyn Error>> {
    let url = std::env::var("DBREG_TEST_PG").unwrap_or_else(|_| PG_CONNECTION.to_string());
    let session = Session::open(&DatabaseConfig::from_url(&url)?, RetryPolicy::default())?;

    let users = format!("{prefix}_users");
    let tags = format!("{prefix}_tags");
    for sql in [
        format!("DROP TABLE IF EXISTS {tags}"),
        format!("DROP TABLE IF EXISTS {users}"),
        format!(
            "CREATE TABLE {users} (id SERIAL PRIMARY KEY, name VARCHAR(64) NOT NULL DEFAULT '', \
             active SMALLINT NOT NULL DEFAULT 0)"
        ),
        format!(
            "CREATE TABLE {tags} (user_id INTEGER NOT NULL, tag VARCHAR(16) NOT NULL, \
             note VARCHAR(32) NOT NULL DEFAULT '', PRIMARY KEY (user_id, tag))"
        ),
    ] {
        session.execute(&sql)?;
    }
    Ok((session, users, tags))
}

// ============================================================================
// Tests - Schema
// ============================================================================

#[test]
fn test_fields_from_information_schema() -> Result<(), Box<dyn Error>> {
    let (session, users, _) = setup("schema")?;
    let record = Record::new(&session, &users)?;

    let names: Vec<String> = record.field_specs().into_iter().map(|f| f.name).collect();
    assert_eq!(names, ["id", "name", "active"]);
    assert!(record.field_specs()[0].primary_key);
    Ok(())
}

// ============================================================================
// Tests - Persistence
// ============================================================================

#[test]
fn test_insert_adopts_sequence_value() -> Result<(), Box<dyn Error>> {
    let (session, users, _) = setup("insert")?;
    let mut user = Record::new(&session, &users)?;
    user.configure_fields(SpecialFields::Required, &["name"], true);

    assert!(user.set_value("name", "Alice"));
    assert!(user.save()?);
    assert_eq!(user.id(), &Identity::Scalar(Value::from("1")));

    let mut copy = Record::new(&session, &users)?;
    assert!(copy.load("1")?);
    assert_eq!(copy.get_value("name", false), Some(Value::from("Alice")));
    Ok(())
}

#[test]
fn test_child_reconciliation() -> Result<(), Box<dyn Error>> {
    let (session, users, tags) = setup("children")?;
    let mut user = Record::new(&session, &users)?;
    user.add_child_relation("tags", RelationSpec::new(&tags, "user_id", "tag"))?;

    user.set_value("name", "Alice");
    for tag in ["A", "B", "C"] {
        assert!(user.add_child("tags", tag));
    }
    assert!(user.save()?);

    assert!(user.remove_child("tags", "B"));
    assert!(user.save()?);

    let stored = session
        .execute(&format!("SELECT tag FROM {tags} ORDER BY tag"))?
        .column(0);
    assert_eq!(stored, [Value::from("A"), Value::from("C")]);
    Ok(())
}
