//! Command definitions and implementations.
//!
//! Each command is defined in its own module with:
//! - The command struct with clap attributes for CLI parsing
//! - An [`Execute`] impl producing a serializable result
//! - An [`Outputable`] impl rendering that result

mod exists;
mod fields;
mod get;

pub use exists::ExistsCmd;
pub use fields::FieldsCmd;
pub use get::GetCmd;

use clap::Subcommand;
use std::error::Error;
use std::sync::Arc;
use thiserror::Error;

use crate::db::Value;
use crate::output::{OutputFormat, Outputable};
use crate::record::{Identity, KeySpec, Session};

/// Trait for executing commands with command-specific result types.
pub trait Execute {
    type Output: Outputable;

    fn execute(self, session: &Arc<Session>) -> Result<Self::Output, Box<dyn Error>>;
}

#[derive(Error, Debug)]
pub enum ArgumentError {
    #[error("Key {key} needs {expected} value(s), got {got}")]
    KeyArity { key: String, expected: usize, got: usize },
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the field metadata of a table
    Fields(FieldsCmd),

    /// Load one record and show its data
    Get(GetCmd),

    /// Report whether a row exists
    Exists(ExistsCmd),

    /// Catch-all for unknown commands
    #[command(external_subcommand)]
    Unknown(Vec<String>),
}

impl Command {
    /// Execute the command and return formatted output
    pub fn run(self, session: &Arc<Session>, format: OutputFormat) -> Result<String, Box<dyn Error>> {
        match self {
            Command::Fields(cmd) => {
                let result = cmd.execute(session)?;
                Ok(result.format(format))
            }
            Command::Get(cmd) => {
                let result = cmd.execute(session)?;
                Ok(result.format(format))
            }
            Command::Exists(cmd) => {
                let result = cmd.execute(session)?;
                Ok(result.format(format))
            }
            Command::Unknown(args) => {
                Err(format!("Unknown command: {}", args.first().unwrap_or(&String::new())).into())
            }
        }
    }
}

/// Key spec from a comma-separated field list: `id` or `user_id,tag`.
pub(crate) fn key_spec(key: &str) -> KeySpec {
    let fields: Vec<&str> = key.split(',').map(str::trim).filter(|f| !f.is_empty()).collect();
    match fields.as_slice() {
        [single] => KeySpec::from(*single),
        [] => KeySpec::default(),
        many => KeySpec::composite(many),
    }
}

/// Identity from comma-separated values matched positionally to `key`.
pub(crate) fn identity(key: &KeySpec, id: &str) -> Result<Identity, ArgumentError> {
    let values: Vec<Value> = id.split(',').map(|v| Value::from(v.trim())).collect();
    let got = values.len();
    Identity::positional(key, values).ok_or_else(|| ArgumentError::KeyArity {
        key: key.describe(),
        expected: key.fields().len(),
        got,
    })
}
