//! Structured logging initialization
//!
//! Logs are written to stderr: stdout is reserved for command products such as
//! dumps, URLs and query results.

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Guard that keeps the tracing subscriber active.
/// Drop this at the end of main to flush logs.
pub struct LogGuard;

/// Initialize structured logging.
///
/// `quiet` lowers the default level to warnings. `RUST_LOG` directives are
/// still honoured on top of the default.
///
/// # Example
/// ```ignore
/// let _guard = init_logging(cli.quiet);
/// info!("Starting up...");
/// ```
pub fn init_logging(quiet: bool) -> LogGuard {
    let level = if quiet { Level::WARN } else { Level::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let format = fmt::layer().with_target(false).with_writer(std::io::stderr);

    // A subscriber may already be installed (tests, embedding); keep the first.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .try_init();

    LogGuard
}
