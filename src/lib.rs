//! dbreg library - active records over SQL tables
//!
//! Provides the connection layer with its retry policy, the record engine
//! (type-driven validation, composite identities, child record trees) and a
//! small diagnostic CLI built on top of them.

pub mod cli;
pub mod commands;
pub mod config;
pub mod db;
pub mod output;
pub mod record;

#[macro_use]
pub mod test_macros;

#[cfg(test)]
pub mod test_utils;
