//! Path utilities for the PostgreSQL cluster
//!
//! Follows the Debian `pg_createcluster` layout, fixed per server version:
//! data in `/var/lib/postgresql/<ver>/<cluster>`, configuration in
//! `/etc/postgresql/<ver>/<cluster>`, binaries in `/usr/lib/postgresql/<ver>/bin`.

use common::ConfigExt;
use std::path::{Path, PathBuf};

pub const DEFAULT_PG_MAJOR: &str = "16";
pub const CLUSTER_NAME: &str = "main";
pub const DEFAULT_SOCKET_DIR: &str = "/var/run/postgresql";

/// Filesystem locations of one cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterPaths {
    pub version: String,
    pub data_dir: PathBuf,
    pub config_dir: PathBuf,
    pub bin_dir: PathBuf,
    pub socket_dir: String,
}

impl ClusterPaths {
    /// Paths for the server version in `PG_MAJOR`.
    pub fn from_env() -> Self {
        let mut paths = Self::for_version(&String::env_or("PG_MAJOR", DEFAULT_PG_MAJOR));
        paths.socket_dir = String::env_or("DATABASE_SOCKET_DIR", DEFAULT_SOCKET_DIR);
        paths
    }

    pub fn for_version(version: &str) -> Self {
        Self::under(Path::new("/"), version)
    }

    /// Same layout below an arbitrary root.
    pub fn under(root: &Path, version: &str) -> Self {
        Self {
            version: version.to_string(),
            data_dir: root
                .join("var/lib/postgresql")
                .join(version)
                .join(CLUSTER_NAME),
            config_dir: root.join("etc/postgresql").join(version).join(CLUSTER_NAME),
            bin_dir: root.join("usr/lib/postgresql").join(version).join("bin"),
            socket_dir: DEFAULT_SOCKET_DIR.to_string(),
        }
    }

    pub fn postgresql_conf(&self) -> PathBuf {
        self.config_dir.join("postgresql.conf")
    }

    pub fn pg_hba_conf(&self) -> PathBuf {
        self.config_dir.join("pg_hba.conf")
    }

    pub fn postgres_bin(&self) -> PathBuf {
        self.bin_dir.join("postgres")
    }

    /// A cluster exists once initdb has written `PG_VERSION`.
    pub fn is_initialized(&self) -> bool {
        self.data_dir.join("PG_VERSION").exists()
    }
}
