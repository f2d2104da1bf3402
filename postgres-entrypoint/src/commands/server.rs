//! Server lifecycle for `run`
//!
//! Creates the cluster on first start, launches postgres as a child, provisions
//! roles and databases over the local socket once it accepts connections, then
//! supervises it until exit, forwarding termination signals.

use crate::commands::database::create_database;
use crate::descriptor::{
    process_env, server_port, ConnectionDescriptor, ADMIN_DATABASE, DEFAULT_ADMIN_USER,
};
use crate::paths::ClusterPaths;
use crate::psql::{Psql, SqlExecutor};
use crate::sql;
use anyhow::{anyhow, Context, Result};
use common::command::run_checked;
use common::{env_opt, split_csv, ConfigExt, ToolError};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::sleep;
use tracing::{error, info, warn};

const HBA_RULES: &str = "\
# Password authentication for remote clients
host all all 0.0.0.0/0 scram-sha-256
host all all ::/0 scram-sha-256
";

/// Configuration for `run`, read from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub paths: ClusterPaths,
    pub port: u16,
    pub locale: String,
    pub startup_timeout: Duration,
    pub server_only: bool,
    pub extensions: Vec<String>,
    pub admin_user: String,
    pub admin_password: Option<String>,
}

impl ServerConfig {
    /// Fails on a malformed port rather than starting on the default.
    pub fn from_env() -> Result<Self> {
        let port = server_port(&process_env).context("Cannot determine server port")?;

        Ok(Self {
            paths: ClusterPaths::from_env(),
            port,
            locale: String::env_or("DATABASE_LOCALE", "C.UTF-8"),
            startup_timeout: Duration::from_secs(u64::env_parse("DATABASE_STARTUP_TIMEOUT", 60)),
            server_only: bool::env_bool("DATABASE_SERVER_ONLY", false),
            extensions: split_csv(&String::env_or("DATABASE_EXTENSIONS", "")),
            admin_user: String::env_or("DATABASE_ADMIN_USER", DEFAULT_ADMIN_USER),
            admin_password: env_opt("DATABASE_ADMIN_PASSWORD"),
        })
    }

    /// Superuser connection over the unix socket; relies on peer auth, so no
    /// password is sent.
    pub fn local_admin(&self) -> ConnectionDescriptor {
        ConnectionDescriptor {
            scheme: "postgres".to_string(),
            user: self.admin_user.clone(),
            password: None,
            host: self.paths.socket_dir.clone(),
            port: self.port,
            name: ADMIN_DATABASE.to_string(),
        }
    }
}

pub async fn run(config: &ServerConfig) -> Result<()> {
    info!(
        version = %config.paths.version,
        data_dir = %config.paths.data_dir.display(),
        port = config.port,
        "=== PostgreSQL entrypoint ==="
    );

    if config.paths.is_initialized() {
        info!("Found existing cluster");
    } else {
        create_cluster(config).await?;
        configure_cluster(&config.paths)?;
    }

    // Handlers go in before the child exists so no signal is lost.
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let mut child = start_server(config)?;
    let admin = config.local_admin();

    wait_until_ready(&Psql, &admin, &mut child, config.startup_timeout).await?;
    provision(&Psql, config, &admin).await?;

    let pid = child
        .id()
        .ok_or_else(|| anyhow!("Failed to get postgres PID"))?;
    info!(pid, "PostgreSQL ready");

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM, requesting smart shutdown");
                forward(pid, Signal::SIGTERM);
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, requesting fast shutdown");
                forward(pid, Signal::SIGINT);
            }
            status = child.wait() => {
                let status = status.context("Failed to wait for postgres")?;
                if status.success() {
                    info!("PostgreSQL exited cleanly");
                    return Ok(());
                }
                error!(code = ?status.code(), "PostgreSQL exited");
                return Err(ToolError {
                    tool: "postgres".to_string(),
                    code: status.code(),
                    stderr: String::new(),
                }
                .into());
            }
        }
    }
}

fn forward(pid: u32, sig: Signal) {
    if let Err(e) = kill(Pid::from_raw(pid as i32), sig) {
        warn!(error = %e, signal = ?sig, "Failed to signal postgres");
    }
}

async fn create_cluster(config: &ServerConfig) -> Result<()> {
    info!(locale = %config.locale, "No cluster found, running pg_createcluster");

    let port = config.port.to_string();
    let output = run_checked(
        "pg_createcluster",
        &[
            config.paths.version.as_str(),
            crate::paths::CLUSTER_NAME,
            "--locale",
            config.locale.as_str(),
            "--port",
            port.as_str(),
        ],
        &[],
    )
    .await
    .context("Failed to create cluster")?;

    for line in output.lines() {
        info!("  {}", line);
    }
    Ok(())
}

/// Listen on all interfaces and accept password logins from any host.
pub fn configure_cluster(paths: &ClusterPaths) -> Result<()> {
    append_once(
        &paths.postgresql_conf(),
        "listen_addresses = '*'",
        "listen_addresses = '*'\n",
    )?;
    append_once(&paths.pg_hba_conf(), "host all all 0.0.0.0/0", HBA_RULES)?;
    info!(config_dir = %paths.config_dir.display(), "Cluster configured");
    Ok(())
}

fn append_once(path: &Path, marker: &str, text: &str) -> Result<()> {
    let content = fs::read_to_string(path)
        .context(format!("Failed to read {}", path.display()))?;

    if content.lines().any(|l| l.trim_start().starts_with(marker)) {
        return Ok(());
    }

    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .context(format!("Failed to open {}", path.display()))?;
    if !content.is_empty() && !content.ends_with('\n') {
        writeln!(file)?;
    }
    file.write_all(text.as_bytes())
        .context(format!("Failed to update {}", path.display()))?;
    Ok(())
}

fn start_server(config: &ServerConfig) -> Result<Child> {
    let config_file = format!("config_file={}", config.paths.postgresql_conf().display());

    Command::new(config.paths.postgres_bin())
        .arg("-D")
        .arg(&config.paths.data_dir)
        .args(["-c", config_file.as_str()])
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .context("Failed to start postgres")
}

async fn wait_until_ready<E: SqlExecutor>(
    executor: &E,
    admin: &ConnectionDescriptor,
    child: &mut Child,
    timeout: Duration,
) -> Result<()> {
    info!(timeout = ?timeout, "Waiting for PostgreSQL to accept connections");

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            error!("PostgreSQL died during startup");
            return Err(ToolError {
                tool: "postgres".to_string(),
                code: status.code(),
                stderr: String::new(),
            }
            .into());
        }

        if executor.query(admin, sql::PING).await.is_ok() {
            return Ok(());
        }

        if start.elapsed() >= timeout {
            return Err(anyhow!(
                "PostgreSQL did not accept connections within {:?}",
                timeout
            ));
        }
        sleep(Duration::from_secs(1)).await;
    }
}

/// Apply admin credentials and, unless server-only, the application database.
pub async fn provision<E: SqlExecutor>(
    executor: &E,
    config: &ServerConfig,
    admin: &ConnectionDescriptor,
) -> Result<()> {
    if let Some(password) = &config.admin_password {
        info!(user = %config.admin_user, "Setting admin password");
        executor
            .execute(admin, &sql::set_password(&config.admin_user, password))
            .await?;
    }

    if config.server_only {
        info!("DATABASE_SERVER_ONLY set, skipping application database");
        return Ok(());
    }

    let app = ConnectionDescriptor::resolve(None, &process_env)
        .context("Application database is not configured (set DATABASE_SERVER_ONLY=true to skip)")?;
    create_database(executor, admin, &app, &config.extensions).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::psql::fake::FakeExecutor;
    use std::path::PathBuf;

    fn config(root: &Path) -> ServerConfig {
        ServerConfig {
            paths: ClusterPaths::under(root, "16"),
            port: 5432,
            locale: "C.UTF-8".to_string(),
            startup_timeout: Duration::from_secs(5),
            server_only: true,
            extensions: Vec::new(),
            admin_user: "postgres".to_string(),
            admin_password: Some("root'pw".to_string()),
        }
    }

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("pg-server-{}-{}", name, std::process::id()))
    }

    #[test]
    fn test_local_admin_uses_socket() {
        let admin = config(Path::new("/")).local_admin();
        assert_eq!(admin.host, "/var/run/postgresql");
        assert_eq!(admin.user, "postgres");
        assert_eq!(admin.name, "postgres");
        assert_eq!(admin.password, None);
    }

    #[test]
    fn test_configure_cluster_is_idempotent() {
        let root = scratch("configure");
        let paths = ClusterPaths::under(&root, "16");
        fs::create_dir_all(&paths.config_dir).unwrap();
        fs::write(paths.postgresql_conf(), "port = 5432").unwrap();
        fs::write(paths.pg_hba_conf(), "local all postgres peer\n").unwrap();

        configure_cluster(&paths).unwrap();
        configure_cluster(&paths).unwrap();

        let conf = fs::read_to_string(paths.postgresql_conf()).unwrap();
        assert_eq!(conf, "port = 5432\nlisten_addresses = '*'\n");

        let hba = fs::read_to_string(paths.pg_hba_conf()).unwrap();
        assert!(hba.starts_with("local all postgres peer\n"));
        assert_eq!(hba.matches("host all all 0.0.0.0/0 scram-sha-256").count(), 1);
        assert_eq!(hba.matches("host all all ::/0 scram-sha-256").count(), 1);

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_configure_cluster_requires_config_files() {
        let root = scratch("missing");
        let paths = ClusterPaths::under(&root, "16");
        assert!(configure_cluster(&paths).is_err());
    }

    #[tokio::test]
    async fn test_provision_server_only_sets_admin_password() {
        let config = config(Path::new("/"));
        let fake = FakeExecutor::default();
        provision(&fake, &config, &config.local_admin()).await.unwrap();

        assert_eq!(
            fake.statements(),
            vec!["ALTER ROLE \"postgres\" WITH PASSWORD 'root''pw'"]
        );
    }

    #[tokio::test]
    async fn test_wait_until_ready_reports_dead_server() {
        let config = config(Path::new("/"));
        let mut child = Command::new("sh").args(["-c", "exit 3"]).spawn().unwrap();
        child.wait().await.unwrap();

        let err = wait_until_ready(
            &FakeExecutor::default(),
            &config.local_admin(),
            &mut child,
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert_eq!(crate::error::exit_code(&err), 3);
    }
}
