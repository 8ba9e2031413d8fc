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

//! Binary entrypoint for the cloudbuild scheduler service.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;

use cb_broker::memory::{MemoryBus, MemoryConnector};
use cb_scheduler::{Scheduler, SchedulerConfig};
use cb_telemetry::{LoggingConfig, init_logging};

/// Build scheduler for one cloudbuild runner group.
#[derive(Debug, Parser)]
#[command(name = "cb-scheduler", version, about)]
struct Args {
    /// Runner group whose request topic this scheduler consumes.
    #[arg(long, env = "CB_RUNNER_GROUP")]
    runner_group: String,

    /// Seconds between polling cycles.
    #[arg(long, default_value_t = 10)]
    update_interval: u64,

    /// Broker poll timeout in milliseconds.
    #[arg(long, default_value_t = 5000)]
    poll_timeout: u64,

    /// Maximum number of concurrently running builds.
    #[arg(long, default_value_t = 10)]
    package_limit: usize,

    /// Local checkout of the shared project git repository.
    #[arg(long, default_value_os_t = cb_config::defaults::runner_project_dir())]
    project_dir: PathBuf,

    /// Root directory for buildroots, scripts, PID files, and logs.
    #[arg(long, default_value_os_t = cb_config::defaults::runner_package_root())]
    package_root: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&LoggingConfig::default())?;

    if !nix::unistd::Uid::effective().is_root() {
        bail!("cb-scheduler manages system build roots and must run as root");
    }

    std::fs::create_dir_all(&args.package_root).with_context(|| {
        format!("creating package root {}", args.package_root.display())
    })?;

    let mut config = SchedulerConfig::new(args.runner_group);
    config.update_interval = Duration::from_secs(args.update_interval);
    config.poll_timeout = Duration::from_millis(args.poll_timeout);
    config.running_limit = args.package_limit;
    config.project_dir = args.project_dir;
    config.package_root = args.package_root;

    // Process-private bus; a deployment swaps in a transport-backed
    // `BrokerConnector` here to reach other hosts.
    let connector = Arc::new(MemoryConnector::new(MemoryBus::new()));
    let scheduler = Scheduler::new(config, connector).context("starting scheduler")?;
    scheduler.run().await;
    Ok(())
}
