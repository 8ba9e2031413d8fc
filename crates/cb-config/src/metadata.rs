//! Per-package build metadata.
//!
//! Every buildable package carries a fixed-name YAML file at its source root
//! listing the distribution targets it may be built for. The file is read
//! fresh on every validation so a request always sees the current on-disk
//! state; nothing is cached across requests.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::defaults::METADATA_FILE_NAME;
use crate::error::{ConfigError, ConfigResult};

/// One build target a package is configured for.
///
/// A request matches a target only on exact equality of all three fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DistributionTarget {
    /// Distribution name, e.g. `TW`.
    pub dist: String,
    /// Architecture name, e.g. `x86_64`.
    pub arch: String,
    /// Runner group expected to build this target.
    pub runner_group: String,
}

impl DistributionTarget {
    /// `{dist}.{arch}` profile string identifying this target.
    #[must_use]
    pub fn profile(&self) -> String {
        format!("{}.{}", self.dist, self.arch)
    }
}

/// Parsed package metadata file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackageMetadata {
    /// Metadata schema version.
    pub schema_version: f64,
    /// Package name.
    pub name: String,
    /// Build targets the package is configured for.
    #[serde(default)]
    pub distributions: Vec<DistributionTarget>,
}

impl PackageMetadata {
    /// Location of the metadata file under a package source directory.
    #[must_use]
    pub fn file_path(package_source_path: &Path) -> PathBuf {
        package_source_path.join(METADATA_FILE_NAME)
    }

    /// Load the metadata file under `package_source_path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MetadataMissing`] when no metadata file exists,
    /// [`ConfigError::Read`] when it cannot be read, and
    /// [`ConfigError::Parse`] when it is not a valid metadata document.
    pub fn load(package_source_path: &Path) -> ConfigResult<Self> {
        let path = Self::file_path(package_source_path);
        if !path.is_file() {
            return Err(ConfigError::MetadataMissing { path });
        }
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let metadata: Self =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;
        debug!(
            package = %metadata.name,
            targets = metadata.distributions.len(),
            "loaded package metadata"
        );
        Ok(metadata)
    }

    /// Find the target exactly matching `(dist, arch, runner_group)`.
    #[must_use]
    pub fn matching_target(
        &self,
        dist: &str,
        arch: &str,
        runner_group: &str,
    ) -> Option<&DistributionTarget> {
        self.distributions.iter().find(|target| {
            target.dist == dist && target.arch == arch && target.runner_group == runner_group
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = "\
schema_version: 0.1
name: xclock
distributions:
  - dist: TW
    arch: x86_64
    runner_group: suse
  - dist: TW
    arch: aarch64
    runner_group: suse
";

    fn package_dir(metadata: &str) -> TempDir {
        let dir = TempDir::new().expect("temp dir");
        fs::write(dir.path().join(METADATA_FILE_NAME), metadata).expect("write metadata");
        dir
    }

    #[test]
    fn loads_targets_from_yaml() {
        let dir = package_dir(SAMPLE);
        let metadata = PackageMetadata::load(dir.path()).expect("load");
        assert_eq!(metadata.name, "xclock");
        assert_eq!(metadata.distributions.len(), 2);
        assert_eq!(metadata.distributions[0].profile(), "TW.x86_64");
    }

    #[test]
    fn match_requires_exact_tuple_equality() {
        let dir = package_dir(SAMPLE);
        let metadata = PackageMetadata::load(dir.path()).expect("load");
        assert!(metadata.matching_target("TW", "x86_64", "suse").is_some());
        assert!(metadata.matching_target("TW", "x86_64", "arm").is_none());
        assert!(metadata.matching_target("Leap", "x86_64", "suse").is_none());
        assert!(metadata.matching_target("TW", "riscv64", "suse").is_none());
    }

    #[test]
    fn match_outcome_is_independent_of_target_order() {
        let dir = package_dir(SAMPLE);
        let mut metadata = PackageMetadata::load(dir.path()).expect("load");
        let forward = metadata.matching_target("TW", "aarch64", "suse").cloned();
        metadata.distributions.reverse();
        let reversed = metadata.matching_target("TW", "aarch64", "suse").cloned();
        assert_eq!(forward, reversed);
        assert!(forward.is_some());
        assert!(metadata.matching_target("TW", "riscv64", "suse").is_none());
    }

    #[test]
    fn missing_file_is_reported_as_such() {
        let dir = TempDir::new().expect("temp dir");
        assert!(matches!(
            PackageMetadata::load(dir.path()),
            Err(ConfigError::MetadataMissing { .. })
        ));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let dir = package_dir("name: [broken");
        assert!(matches!(
            PackageMetadata::load(dir.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
