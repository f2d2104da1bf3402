//! Shared utilities for the PostgreSQL container entrypoint
//!
//! This crate provides the ambient pieces the entrypoint builds on:
//! - Structured logging initialization
//! - Environment variable parsing helpers
//! - External command execution with exit-code preserving errors

pub mod command;
pub mod config;
pub mod logging;

pub use command::{CommandOutput, ToolError};
pub use config::{env_opt, split_csv, split_opts, ConfigExt};
pub use logging::init_logging;
