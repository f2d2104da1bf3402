//! Database and role lifecycle: create, drop, list, proxy

use crate::descriptor::ConnectionDescriptor;
use crate::error::EntrypointError;
use crate::psql::{as_strs, exists, SqlExecutor};
use crate::sql;
use anyhow::{Context, Result};
use common::command::run_inherited;
use tracing::{info, warn};

/// Ensure the target's role and database exist, owned by the role, with
/// `extensions` installed. Safe to run repeatedly.
pub async fn create_database<E: SqlExecutor>(
    executor: &E,
    admin: &ConnectionDescriptor,
    target: &ConnectionDescriptor,
    extensions: &[String],
) -> Result<()> {
    info!(database = %target.name, user = %target.user, "Creating database");

    executor
        .execute(admin, &sql::ensure_role(&target.user, target.password.as_deref()))
        .await
        .context(format!("Failed to create role {}", target.user))?;

    if exists(executor, admin, &sql::database_exists(&target.name)).await? {
        info!(database = %target.name, "Database already exists");
    } else {
        executor
            .execute(admin, &sql::create_database(&target.name, &target.user))
            .await
            .context(format!("Failed to create database {}", target.name))?;
    }

    executor
        .execute(admin, &sql::grant_all(&target.name, &target.user))
        .await?;

    install_extensions(executor, &admin.with_database(&target.name), extensions).await?;

    info!(database = %target.name, user = %target.user, "Database ready");
    Ok(())
}

/// `CREATE EXTENSION IF NOT EXISTS` for each entry, in order.
pub async fn install_extensions<E: SqlExecutor>(
    executor: &E,
    database: &ConnectionDescriptor,
    extensions: &[String],
) -> Result<()> {
    for extension in extensions {
        info!(database = %database.name, extension = %extension, "Installing extension");
        executor
            .execute(database, &sql::create_extension(extension))
            .await
            .context(format!("Failed to install extension {}", extension))?;
    }
    Ok(())
}

/// Drop the target's database and role.
///
/// Fails with [`EntrypointError::DatabaseNotFound`] or
/// [`EntrypointError::RoleNotFound`] before issuing any destructive statement.
pub async fn drop_database<E: SqlExecutor>(
    executor: &E,
    admin: &ConnectionDescriptor,
    target: &ConnectionDescriptor,
) -> Result<()> {
    if !exists(executor, admin, &sql::database_exists(&target.name)).await? {
        return Err(EntrypointError::DatabaseNotFound(target.name.clone()).into());
    }
    if !exists(executor, admin, &sql::role_exists(&target.user)).await? {
        return Err(EntrypointError::RoleNotFound(target.user.clone()).into());
    }

    info!(database = %target.name, "Dropping database");
    executor
        .query(admin, &sql::terminate_sessions(&target.name))
        .await?;
    executor
        .execute(admin, &sql::drop_database(&target.name))
        .await?;

    if target.user == admin.user {
        warn!(user = %target.user, "Role is the admin role, keeping it");
    } else {
        info!(user = %target.user, "Dropping role");
        executor.execute(admin, &sql::drop_role(&target.user)).await?;
    }

    Ok(())
}

pub async fn list_databases<E: SqlExecutor>(
    executor: &E,
    admin: &ConnectionDescriptor,
) -> Result<Vec<String>> {
    executor.query(admin, sql::LIST_DATABASES).await
}

/// `socat` arguments forwarding the target's port on all local interfaces.
pub fn proxy_args(target: &ConnectionDescriptor) -> Vec<String> {
    vec![
        format!("TCP-LISTEN:{},fork,reuseaddr", target.port),
        format!("TCP:{}:{}", target.host, target.port),
    ]
}

/// Forward connections to the target until socat exits.
pub async fn run_proxy(target: &ConnectionDescriptor) -> Result<()> {
    info!(host = %target.host, port = target.port, "Starting proxy");
    run_inherited("socat", &as_strs(&proxy_args(target)), &[]).await
}
