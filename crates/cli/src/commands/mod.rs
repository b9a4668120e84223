//! Subcommand implementations.

pub mod migrate;
pub mod user;
