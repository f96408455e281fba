use std::path::{Path, PathBuf};

/// Environment variable naming the installation root.
pub const INSTALL_DIR_ENV: &str = "SCANWARD_INSTALL_DIR";

/// Resolves well-known paths under the scanward installation root.
///
/// The root comes from `SCANWARD_INSTALL_DIR`; an absent variable leaves an
/// empty root, so paths resolve relative to the working directory.
#[derive(Debug, Clone)]
pub struct InstallDir {
    root: PathBuf,
}

impl InstallDir {
    /// Create an InstallDir referencing the given root path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the root from the environment.
    pub fn from_env() -> Self {
        Self::new(std::env::var_os(INSTALL_DIR_ENV).unwrap_or_default())
    }

    /// The installation root (possibly empty).
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the scan status log.
    pub fn log_dir(&self) -> PathBuf {
        self.root.join("var/log/scanward")
    }

    /// Path to the append-only scan status log.
    pub fn scan_status_log(&self) -> PathBuf {
        self.log_dir().join("scan_status.log")
    }
}
