#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Configuration and on-disk metadata for the cloudbuild system.
//!
//! Layout:
//! - `defaults.rs`: fixed filesystem locations and file names
//! - `ctl.rs`: operator config for the control client (ssh access)
//! - `metadata.rs`: per-package build metadata and distribution targets
//! - `error.rs`: configuration error taxonomy

pub mod ctl;
pub mod defaults;
pub mod error;
pub mod metadata;

pub use ctl::{CtlConfig, RunnerAccess};
pub use error::{ConfigError, ConfigResult};
pub use metadata::{DistributionTarget, PackageMetadata};
