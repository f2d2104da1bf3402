//! Exit-code carrying errors
//!
//! Two families reach `main`: a delegated tool failed (`common::ToolError`, its
//! own exit code is reused) or a documented precondition was not met
//! ([`EntrypointError`], fixed code). Everything else exits 1.

use common::ToolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EntrypointError {
    #[error("database '{0}' does not exist")]
    DatabaseNotFound(String),

    #[error("role '{0}' does not exist")]
    RoleNotFound(String),

    #[error("cannot reach database: {0}")]
    SelfTestUnreachable(String),

    #[error("expected {expected} rows in self_test before insert, found {actual}")]
    SelfTestInitialCount { expected: i64, actual: i64 },

    #[error("expected {expected} rows in self_test after insert, found {actual}")]
    SelfTestInsertCount { expected: i64, actual: i64 },

    #[error("unexpected output from psql: '{0}'")]
    UnexpectedOutput(String),
}

impl EntrypointError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::DatabaseNotFound(_) => 1,
            Self::RoleNotFound(_) => 2,
            Self::SelfTestInitialCount { .. } => 2,
            Self::SelfTestInsertCount { .. } => 3,
            Self::SelfTestUnreachable(_) => 4,
            Self::UnexpectedOutput(_) => 1,
        }
    }
}

/// Pick the process exit code for a failed invocation.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(e) = err.downcast_ref::<EntrypointError>() {
        return e.exit_code();
    }
    if let Some(e) = err.downcast_ref::<ToolError>() {
        return e.exit_code();
    }
    1
}
