//! SQL execution through `psql`
//!
//! Database lifecycle commands talk to the server through [`SqlExecutor`] so the
//! decision logic can be exercised against a recording fake.

use crate::descriptor::ConnectionDescriptor;
use crate::error::EntrypointError;
use anyhow::Result;
use common::command::{run_checked, run_with_input};
use tracing::debug;

/// Executes SQL against a connection target.
#[allow(async_fn_in_trait)]
pub trait SqlExecutor {
    /// Run a single query and return its rows, one unaligned tuple per line.
    async fn query(&self, target: &ConnectionDescriptor, sql: &str) -> Result<Vec<String>>;

    /// Run a statement or script for its side effects.
    async fn execute(&self, target: &ConnectionDescriptor, sql: &str) -> Result<()>;
}

/// [`SqlExecutor`] backed by the `psql` binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct Psql;

impl SqlExecutor for Psql {
    async fn query(&self, target: &ConnectionDescriptor, sql: &str) -> Result<Vec<String>> {
        debug!(target = %target, sql = %sql, "Query");

        let mut args = target.client_args();
        args.extend(
            ["-X", "-A", "-t", "-v", "ON_ERROR_STOP=1", "-c", sql]
                .iter()
                .map(|s| s.to_string()),
        );
        let stdout = run_checked("psql", &as_strs(&args), &as_env(&target.client_env())).await?;

        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn execute(&self, target: &ConnectionDescriptor, sql: &str) -> Result<()> {
        debug!(target = %target, "Execute script");

        let mut args = target.client_args();
        args.extend(
            ["-X", "-q", "-v", "ON_ERROR_STOP=1", "-f", "-"]
                .iter()
                .map(|s| s.to_string()),
        );
        run_with_input(
            "psql",
            &as_strs(&args),
            &as_env(&target.client_env()),
            sql.as_bytes(),
        )
        .await?;
        Ok(())
    }
}

/// Whether a `SELECT 1 ... WHERE` probe returned a row.
pub async fn exists<E: SqlExecutor>(
    executor: &E,
    target: &ConnectionDescriptor,
    sql: &str,
) -> Result<bool> {
    let rows = executor.query(target, sql).await?;
    Ok(rows.iter().any(|r| r == "1"))
}

/// Run a `count(*)` query and parse the single value.
pub async fn count<E: SqlExecutor>(
    executor: &E,
    target: &ConnectionDescriptor,
    sql: &str,
) -> Result<i64> {
    let rows = executor.query(target, sql).await?;
    let first = rows.first().map(String::as_str).unwrap_or_default();
    first
        .parse::<i64>()
        .map_err(|_| EntrypointError::UnexpectedOutput(first.to_string()).into())
}

pub fn as_strs(args: &[String]) -> Vec<&str> {
    args.iter().map(String::as_str).collect()
}

pub fn as_env<'a>(env: &'a [(&'static str, String)]) -> Vec<(&'a str, &'a str)> {
    env.iter().map(|(k, v)| (*k, v.as_str())).collect()
}
