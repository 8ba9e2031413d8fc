//! Argument parsing and command dispatch.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

use crate::client::{AppContext, CliResult};
use crate::commands;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// cb-ctl - cloud builder control utility.
#[derive(Debug, Parser)]
#[command(name = "cb-ctl", version, about)]
pub struct Cli {
    /// Path to the control client configuration file.
    #[arg(long, global = true, default_value_os_t = cb_config::defaults::ctl_config_file())]
    pub config: PathBuf,

    /// Command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Package and target selection shared by most commands.
///
/// The package directory is resolved as `projects/{project_path}/{package}`
/// relative to the project repository root; `projects` is a fixed convention.
#[derive(Debug, Args)]
pub struct TargetArgs {
    /// Package name inside the project path.
    pub package: String,

    /// Project path pointing at the package in the git repository.
    #[arg(long)]
    pub project_path: String,

    /// Target architecture name.
    #[arg(long)]
    pub arch: String,

    /// Target distribution name.
    #[arg(long)]
    pub dist: String,
}

impl TargetArgs {
    /// Repository-relative package path.
    #[must_use]
    pub fn package_path(&self) -> String {
        format!("projects/{}/{}", self.project_path, self.package)
    }
}

/// Operator commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Request a package build on a runner group.
    Build {
        /// Package and target selection.
        #[command(flatten)]
        target: TargetArgs,

        /// Runner group to send the build request to.
        #[arg(long)]
        runner_group: String,

        /// Delete the package buildroot on the runner before building.
        #[arg(long)]
        clean: bool,
    },

    /// Build the package in the current working directory on this machine.
    BuildLocal {
        /// Target distribution name.
        #[arg(long)]
        dist: String,

        /// Delete the local buildroot before building.
        #[arg(long)]
        clean: bool,
    },

    /// Print the latest buildroot dependency report for a package.
    BuildDependencies {
        /// Package and target selection.
        #[command(flatten)]
        target: TargetArgs,

        /// Seconds of broker inactivity to wait for info responses.
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
        timeout: u64,
    },

    /// Calculate build dependencies now, on the local system.
    BuildDependenciesLocal {
        /// Target distribution name.
        #[arg(long)]
        dist: String,
    },

    /// Print the latest raw build log of a package.
    BuildLog {
        /// Package and target selection.
        #[command(flatten)]
        target: TargetArgs,

        /// Seconds of broker inactivity to wait for info responses.
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
        timeout: u64,
    },

    /// Print the latest build result and status information of a package.
    BuildInfo {
        /// Package and target selection.
        #[command(flatten)]
        target: TargetArgs,

        /// Seconds of broker inactivity to wait for info responses.
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
        timeout: u64,
    },

    /// Download the latest binary packages of a package.
    GetBinaries {
        /// Package and target selection.
        #[command(flatten)]
        target: TargetArgs,

        /// Local directory the binaries are copied into.
        #[arg(long)]
        target_dir: PathBuf,

        /// Seconds of broker inactivity to wait for info responses.
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
        timeout: u64,
    },

    /// Watch response messages of the cloud builder system.
    Watch {
        /// Only show responses for the given request UUID.
        #[arg(long)]
        filter_request_id: Option<Uuid>,

        /// Only show responses whose service identity starts with this name,
        /// e.g. `cb-scheduler`.
        #[arg(long, conflicts_with = "filter_request_id")]
        filter_service_name: Option<String>,

        /// Seconds of broker inactivity before the watch returns.
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
        timeout: u64,
    },
}

/// Dispatch the parsed command against the application context.
///
/// # Errors
///
/// Returns a `CliError` carrying the exit code classification: validation
/// problems exit with 2, operational failures with 3.
pub async fn run(cli: Cli, context: &AppContext) -> CliResult<()> {
    match cli.command {
        Command::Build {
            target,
            runner_group,
            clean,
        } => commands::build::submit(context, &target, &runner_group, clean).await,
        Command::BuildLocal { dist, clean } => commands::build::local(&dist, clean).await,
        Command::BuildDependencies { target, timeout } => {
            commands::info::build_dependencies(context, &target, timeout).await
        }
        Command::BuildDependenciesLocal { dist } => {
            commands::build::dependencies_local(&dist).await
        }
        Command::BuildLog { target, timeout } => {
            commands::info::build_log(context, &target, timeout).await
        }
        Command::BuildInfo { target, timeout } => {
            commands::info::build_info(context, &target, timeout).await
        }
        Command::GetBinaries {
            target,
            target_dir,
            timeout,
        } => commands::info::get_binaries(context, &target, &target_dir, timeout).await,
        Command::Watch {
            filter_request_id,
            filter_service_name,
            timeout,
        } => commands::watch::watch(context, filter_request_id, filter_service_name, timeout).await,
    }
}
