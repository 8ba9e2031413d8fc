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

//! Binary entrypoint for the cloudbuild control utility.

use std::process;
use std::sync::Arc;

use clap::Parser;

use cb_broker::memory::{MemoryBus, MemoryConnector};
use cb_ctl::{AppContext, Cli, run};
use cb_telemetry::{LoggingConfig, init_logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_logging(&LoggingConfig::default()) {
        eprintln!("error: {error:#}");
        process::exit(1);
    }

    let context = AppContext {
        // Process-private bus; a deployment swaps in a transport-backed
        // `BrokerConnector` here to reach the schedulers.
        connector: Arc::new(MemoryConnector::new(MemoryBus::new())),
        config_path: cli.config.clone(),
    };

    if let Err(error) = run(cli, &context).await {
        eprintln!("error: {}", error.display_message());
        process::exit(error.exit_code());
    }
}
