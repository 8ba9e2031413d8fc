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

//! Package build scheduler for the cloudbuild system.
//!
//! Listens for package build requests on the runner group's broker topic,
//! validates them against the on-disk package metadata, and launches builds
//! as detached subprocesses through generated run scripts.
//!
//! Layout:
//! - `config.rs`: scheduler settings and the poll/update interval invariant
//! - `validator.rs`: ordered request validation with ack discipline
//! - `script.rs`: prepare/run script generation (local and background mode)
//! - `builds.rs`: PID-file tracking, liveness, and preemption
//! - `scheduler.rs`: the polling cycle and interval loop
//! - `main.rs`: binary entrypoint

pub mod builds;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod script;
pub mod validator;

pub use config::SchedulerConfig;
pub use error::{SchedulerError, SchedulerResult};
pub use scheduler::Scheduler;
pub use script::{ScriptSettings, create_run_script};
pub use validator::RequestValidator;

/// Service identity prefix carried in scheduler responses.
pub const SERVICE_NAME: &str = "cb-scheduler";

/// Response identity for a package scope, `{service}:{scope}`.
#[must_use]
pub fn identity(scope: &str) -> String {
    format!("{SERVICE_NAME}:{scope}")
}
