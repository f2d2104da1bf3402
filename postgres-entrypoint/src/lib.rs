//! Entrypoint for a containerized PostgreSQL instance
//!
//! One binary serves as the container command (`run`) and as the operator's
//! toolbox: connection URLs, consoles, database provisioning, dumps and a
//! round-trip self-test. Every command resolves its connection target from an
//! explicit URL or the `DATABASE_*` environment.

pub mod cli;
pub mod commands;
pub mod descriptor;
pub mod error;
pub mod paths;
pub mod psql;
pub mod sql;
