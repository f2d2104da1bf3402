//! Subcommand implementations
//!
//! [`dispatch`] maps each [`Command`] to exactly one terminal action. Branches
//! share no state; each resolves its own connection target.

pub mod database;
pub mod server;
pub mod session;
pub mod transfer;

use crate::cli::{explicit_target, Command};
use crate::descriptor::{process_env, ConnectionDescriptor};
use crate::psql::Psql;
use anyhow::{Context, Result};
use common::{split_csv, ConfigExt};
use transfer::Endpoint;

/// Resolve the target from an optional explicit URL and the process environment.
pub fn resolve(url: Option<&str>) -> Result<ConnectionDescriptor> {
    ConnectionDescriptor::resolve(url, &process_env).context("Cannot resolve connection target")
}

/// Superuser connection to the server, needing no application settings.
pub fn resolve_admin(url: Option<&str>) -> Result<ConnectionDescriptor> {
    ConnectionDescriptor::resolve_admin(url, &process_env)
        .context("Cannot resolve server location")
}

fn admin_for(target: &ConnectionDescriptor) -> ConnectionDescriptor {
    target.admin(&process_env)
}

pub async fn dispatch(command: Command, quiet: bool) -> Result<()> {
    match command {
        Command::Run => server::run(&server::ServerConfig::from_env()?).await,

        Command::Url { admin, url } => {
            let shown = if admin {
                resolve_admin(explicit_target(&url))?
            } else {
                resolve(explicit_target(&url))?
            };
            println!("{}", shown.to_url());
            Ok(())
        }

        Command::Test { url } => {
            let target = resolve(explicit_target(&url))?;
            session::check_connection(&Psql, &target).await
        }

        Command::Console { url } => {
            let target = resolve(explicit_target(&url))?;
            Err(session::console(&target, quiet))
        }

        Command::Sql { target, query } => {
            let target = resolve(explicit_target(&Some(target)))?;
            session::sql(&target, query.as_deref(), quiet).await
        }

        Command::CreateDatabase { url, proxy } => {
            let target = resolve(explicit_target(&url))?;
            let extensions = split_csv(&String::env_or("DATABASE_EXTENSIONS", ""));
            database::create_database(&Psql, &admin_for(&target), &target, &extensions).await?;
            if proxy {
                database::run_proxy(&target).await?;
            }
            Ok(())
        }

        Command::DropDatabase { url } => {
            let target = resolve(explicit_target(&url))?;
            database::drop_database(&Psql, &admin_for(&target), &target).await
        }

        Command::ListDatabases { url } => {
            let admin = resolve_admin(explicit_target(&url))?;
            for name in database::list_databases(&Psql, &admin).await? {
                println!("{}", name);
            }
            Ok(())
        }

        Command::Export {
            destination,
            database,
        } => {
            let target = resolve(explicit_target(&database))?;
            transfer::export(&target, &Endpoint::parse(&destination)).await
        }

        Command::Import { source, database } => {
            let target = resolve(explicit_target(&database))?;
            transfer::import(&target, &Endpoint::parse(&source)).await
        }

        Command::SelfTest { url } => {
            let target = resolve(explicit_target(&url))?;
            self_test::verify(&Psql, &target).await
        }

        Command::SelfTestSetup { url } => {
            let target = resolve(explicit_target(&url))?;
            self_test::setup(&Psql, &target).await
        }

        Command::Bash { args } => Err(session::bash(&args)),
    }
}
