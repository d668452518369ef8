//! CLI subcommands.

pub mod cache;
pub mod common;
pub mod config;
pub mod locate;
pub mod status;
