//! Backup and restore with pg_dump / pg_restore
//!
//! Dumps are always custom format so `import` can read what `export` wrote,
//! whether through stdio, a file, or an HTTP endpoint.

use crate::descriptor::ConnectionDescriptor;
use crate::psql::{as_env, as_strs};
use anyhow::{Context, Result};
use common::command::run_inherited;
use common::{split_opts, ConfigExt, ToolError};
use reqwest::Body;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::io::ReaderStream;
use tracing::info;

pub const DEFAULT_EXPORT_OPTS: &str = "--no-owner --no-acl";
pub const DEFAULT_IMPORT_OPTS: &str = "--no-owner --no-acl";

/// Where a dump is read from or written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Stdio,
    Http(String),
    File(PathBuf),
}

impl Endpoint {
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() || raw == "-" {
            Self::Stdio
        } else if raw.starts_with("http://") || raw.starts_with("https://") {
            Self::Http(raw.to_string())
        } else {
            Self::File(PathBuf::from(raw))
        }
    }
}

/// Arguments for `pg_dump`; a file destination is written by pg_dump itself.
pub fn dump_args(target: &ConnectionDescriptor, opts: &str, endpoint: &Endpoint) -> Vec<String> {
    let mut args = target.client_args();
    args.push("--format=custom".to_string());
    args.extend(split_opts(opts));
    if let Endpoint::File(path) = endpoint {
        args.push(format!("--file={}", path.display()));
    }
    args
}

/// Arguments for `pg_restore`; without a file it reads stdin.
pub fn restore_args(target: &ConnectionDescriptor, opts: &str, endpoint: &Endpoint) -> Vec<String> {
    let mut args = target.client_args();
    args.extend(split_opts(opts));
    if let Endpoint::File(path) = endpoint {
        args.push(path.display().to_string());
    }
    args
}

/// Client binaries a transfer runs.
#[derive(Debug, Clone, Copy)]
pub struct DumpTools<'a> {
    pub dump: &'a str,
    pub restore: &'a str,
}

pub const PG_TOOLS: DumpTools<'static> = DumpTools {
    dump: "pg_dump",
    restore: "pg_restore",
};

pub async fn export(target: &ConnectionDescriptor, destination: &Endpoint) -> Result<()> {
    let opts = String::env_or("EXPORT_OPTS", DEFAULT_EXPORT_OPTS);
    export_with(&PG_TOOLS, target, &opts, destination).await
}

pub async fn export_with(
    tools: &DumpTools<'_>,
    target: &ConnectionDescriptor,
    opts: &str,
    destination: &Endpoint,
) -> Result<()> {
    let args = dump_args(target, opts, destination);
    let env = target.client_env();

    info!(database = %target, destination = ?destination, "Exporting database");

    match destination {
        Endpoint::Stdio | Endpoint::File(_) => {
            run_inherited(tools.dump, &as_strs(&args), &as_env(&env)).await?;
        }
        Endpoint::Http(url) => upload_dump(tools.dump, url, &args, &env).await?,
    }

    info!("Export complete");
    Ok(())
}

/// Stream pg_dump's stdout straight into an HTTP PUT.
async fn upload_dump(
    pg_dump: &str,
    url: &str,
    args: &[String],
    env: &[(&'static str, String)],
) -> Result<()> {
    let mut child = Command::new(pg_dump)
        .args(args)
        .envs(env.iter().map(|(k, v)| (*k, v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .context(format!("Failed to spawn {}", pg_dump))?;

    let stdout = child
        .stdout
        .take()
        .context(format!("{} stdout unavailable", pg_dump))?;

    info!(url = %url, "Uploading dump");
    let upload = reqwest::Client::new()
        .put(url)
        .body(Body::wrap_stream(ReaderStream::new(stdout)))
        .send()
        .await;

    // A failed upload drops the body, closing the pipe, so pg_dump exits too.
    let status = child
        .wait()
        .await
        .context(format!("Failed to wait for {}", pg_dump))?;

    let response = upload.context(format!("Failed to upload dump to {}", url))?;
    if !status.success() {
        return Err(tool_failed(pg_dump, status.code()));
    }
    response
        .error_for_status()
        .context(format!("Upload to {} rejected", url))?;
    Ok(())
}

pub async fn import(target: &ConnectionDescriptor, source: &Endpoint) -> Result<()> {
    let opts = String::env_or("IMPORT_OPTS", DEFAULT_IMPORT_OPTS);
    import_with(&PG_TOOLS, target, &opts, source).await
}

pub async fn import_with(
    tools: &DumpTools<'_>,
    target: &ConnectionDescriptor,
    opts: &str,
    source: &Endpoint,
) -> Result<()> {
    let args = restore_args(target, opts, source);
    let env = target.client_env();

    info!(database = %target, source = ?source, "Importing database");

    match source {
        Endpoint::Stdio | Endpoint::File(_) => {
            run_inherited(tools.restore, &as_strs(&args), &as_env(&env)).await?;
        }
        Endpoint::Http(url) => stream_restore(tools.restore, url, &args, &env).await?,
    }

    info!("Import complete");
    Ok(())
}

/// Download `url` straight into pg_restore's stdin.
async fn stream_restore(
    pg_restore: &str,
    url: &str,
    args: &[String],
    env: &[(&'static str, String)],
) -> Result<()> {
    let mut response = reqwest::get(url)
        .await
        .context(format!("Failed to download {}", url))?
        .error_for_status()
        .context(format!("Download of {} rejected", url))?;

    let mut child = Command::new(pg_restore)
        .args(args)
        .envs(env.iter().map(|(k, v)| (*k, v.as_str())))
        .stdin(Stdio::piped())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .context(format!("Failed to spawn {}", pg_restore))?;

    let mut stdin = child
        .stdin
        .take()
        .context(format!("{} stdin unavailable", pg_restore))?;

    let mut bytes = 0usize;
    while let Some(chunk) = response
        .chunk()
        .await
        .context(format!("Failed reading {}", url))?
    {
        bytes += chunk.len();
        if stdin.write_all(&chunk).await.is_err() {
            // pg_restore exited early; its status below carries the reason.
            break;
        }
    }
    drop(stdin);

    let status = child
        .wait()
        .await
        .context(format!("Failed to wait for {}", pg_restore))?;
    if !status.success() {
        return Err(tool_failed(pg_restore, status.code()));
    }

    info!(bytes, "Restored from download");
    Ok(())
}

fn tool_failed(tool: &str, code: Option<i32>) -> anyhow::Error {
    ToolError {
        tool: tool.to_string(),
        code,
        stderr: String::new(),
    }
    .into()
}
