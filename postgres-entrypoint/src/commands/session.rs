//! Diagnostic access: url, test, console, sql, bash

use crate::descriptor::ConnectionDescriptor;
use crate::psql::{as_env, as_strs, SqlExecutor};
use crate::sql;
use anyhow::Result;
use common::command::{exec, run_inherited};
use tracing::info;

/// psql arguments for running `query`, or stdin when there is none.
pub fn sql_args(target: &ConnectionDescriptor, query: Option<&str>, quiet: bool) -> Vec<String> {
    let mut args = target.client_args();
    args.extend(["-X", "-v", "ON_ERROR_STOP=1"].iter().map(|s| s.to_string()));
    if quiet {
        args.push("-q".to_string());
    }
    match query {
        Some(query) => {
            args.push("-c".to_string());
            args.push(query.to_string());
        }
        None => {
            args.push("-f".to_string());
            args.push("-".to_string());
        }
    }
    args
}

/// Run SQL with psql attached to this process's stdio.
pub async fn sql(target: &ConnectionDescriptor, query: Option<&str>, quiet: bool) -> Result<()> {
    info!(database = %target, "Running SQL");
    let args = sql_args(target, query, quiet);
    run_inherited("psql", &as_strs(&args), &as_env(&target.client_env())).await
}

pub async fn check_connection<E: SqlExecutor>(
    executor: &E,
    target: &ConnectionDescriptor,
) -> Result<()> {
    executor.query(target, sql::PING).await?;
    info!(database = %target, "Connection OK");
    Ok(())
}

/// Replace this process with an interactive psql.
pub fn console(target: &ConnectionDescriptor, quiet: bool) -> anyhow::Error {
    let mut args = target.client_args();
    if quiet {
        args.push("-q".to_string());
    }
    exec("psql", &as_strs(&args), &as_env(&target.client_env()))
}

/// Replace this process with bash.
pub fn bash(args: &[String]) -> anyhow::Error {
    exec("bash", &as_strs(args), &[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::psql::fake::FakeExecutor;

    fn target() -> ConnectionDescriptor {
        ConnectionDescriptor {
            scheme: "postgres".to_string(),
            user: "app".to_string(),
            password: Some("secret".to_string()),
            host: "db".to_string(),
            port: 5432,
            name: "orders".to_string(),
        }
    }

    #[test]
    fn test_sql_args_with_query() {
        let args = sql_args(&target(), Some("SELECT now()"), true);
        assert_eq!(
            &args[8..],
            ["-X", "-v", "ON_ERROR_STOP=1", "-q", "-c", "SELECT now()"]
        );
    }

    #[test]
    fn test_sql_args_read_stdin() {
        let args = sql_args(&target(), None, false);
        assert_eq!(&args[8..], ["-X", "-v", "ON_ERROR_STOP=1", "-f", "-"]);
    }

    #[tokio::test]
    async fn test_check_connection_pings() {
        let fake = FakeExecutor::default().respond(sql::PING, &["1"]);
        check_connection(&fake, &target()).await.unwrap();
        assert_eq!(fake.statements(), vec![sql::PING]);
    }
}
