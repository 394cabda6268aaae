//! CLI argument definitions.
//!
//! This module contains the top-level CLI structure. Individual command
//! definitions are in the `commands` module.

use clap::Parser;

use crate::commands::Command;
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Database URL or SQLite file path; overrides `.dbreg.json` and `DATABASE_URL`
    #[arg(long, global = true)]
    pub db: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_global_options_after_subcommand() {
        let args = Args::try_parse_from(["dbreg", "fields", "users", "--db", ":memory:", "--format", "json"]).unwrap();
        assert_eq!(args.db.as_deref(), Some(":memory:"));
        assert_eq!(args.format, OutputFormat::Json);
    }

    #[rstest]
    fn test_defaults() {
        let args = Args::try_parse_from(["dbreg", "fields", "users"]).unwrap();
        assert!(args.db.is_none());
        assert_eq!(args.format, OutputFormat::Table);
    }

    #[rstest]
    fn test_unknown_format_rejected() {
        assert!(Args::try_parse_from(["dbreg", "--format", "xml", "fields", "users"]).is_err());
    }
}
