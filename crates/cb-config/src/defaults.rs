//! Fixed filesystem locations and file names.
//!
//! Centralised so scheduler, control client, and tests agree on where
//! project checkouts, buildroots, and metadata live. Components take these
//! as explicit constructor arguments; the constants are only the defaults.

use std::path::PathBuf;

/// File name of the per-package build metadata, located at the package
/// source root.
pub const METADATA_FILE_NAME: &str = "cloudbuild.yml";

/// Runner-local checkout of the shared project git repository.
#[must_use]
pub fn runner_project_dir() -> PathBuf {
    PathBuf::from("/var/lib/cloudbuild/project")
}

/// Root under which buildroots, scripts, PID files, and logs are colocated,
/// one file set per `{package}@{dist}.{arch}` stem.
#[must_use]
pub fn runner_package_root() -> PathBuf {
    PathBuf::from("/var/lib/cloudbuild/builds")
}

/// Operator configuration for the control client.
#[must_use]
pub fn ctl_config_file() -> PathBuf {
    PathBuf::from("/etc/cloudbuild/ctl.yml")
}
