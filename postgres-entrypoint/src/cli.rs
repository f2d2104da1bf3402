//! Command line surface
//!
//! `postgres-entrypoint COMMAND [-q] ...`. Connection targets given as `-` mean
//! "resolve from the environment".

use clap::{error::ErrorKind, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "postgres-entrypoint")]
#[command(version)]
#[command(about = "Operate a containerized PostgreSQL instance", long_about = None)]
#[command(subcommand_required = true, arg_required_else_help = true)]
pub struct Cli {
    /// Only log warnings and errors; also passed to psql
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Initialize the cluster if needed, provision roles, and run the server
    Run,

    /// Print the resolved connection URL
    Url {
        /// Print the superuser URL instead
        #[arg(long)]
        admin: bool,

        /// Connection URL overriding the environment
        url: Option<String>,
    },

    /// Check that the database accepts connections
    Test { url: Option<String> },

    /// Open an interactive psql session
    Console { url: Option<String> },

    /// Run SQL against a target; reads stdin when no query is given
    Sql {
        /// Connection URL, or - for the environment
        target: String,

        query: Option<String>,
    },

    /// Create the role and database described by the target
    CreateDatabase {
        url: Option<String>,

        /// Afterwards, forward the target's port with socat in the foreground
        #[arg(long)]
        proxy: bool,
    },

    /// Drop the database and role described by the target
    DropDatabase { url: Option<String> },

    /// List non-template databases on the server
    ListDatabases { url: Option<String> },

    /// Dump the database in custom format
    Export {
        /// - for stdout, an http(s) URL to upload to, or a file path
        #[arg(default_value = "-")]
        destination: String,

        /// Connection URL overriding the environment
        #[arg(long = "database")]
        database: Option<String>,
    },

    /// Restore a custom format dump into the database
    Import {
        /// - for stdin, an http(s) URL to download from, or a file path
        #[arg(default_value = "-")]
        source: String,

        /// Connection URL overriding the environment
        #[arg(long = "database")]
        database: Option<String>,
    },

    /// Verify the fixture created by self-test-setup
    SelfTest { url: Option<String> },

    /// Create the self_test fixture table
    SelfTestSetup { url: Option<String> },

    /// Run a shell inside the container
    Bash {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

/// Treat a `-` target as absent so the environment is used.
pub fn explicit_target(url: &Option<String>) -> Option<&str> {
    url.as_deref().filter(|u| *u != "-")
}

/// Help and version requests succeed; every other parse failure is a usage error.
pub fn parse_error_exit_code(err: &clap::Error) -> i32 {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}
