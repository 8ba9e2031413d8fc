//! Build submission and local build execution.

use std::process::Stdio;

use anyhow::anyhow;
use tokio::process::Command;

use cb_broker::topics;
use cb_config::metadata::PackageMetadata;
use cb_protocol::{BuildAction, BuildRequest};
use cb_scheduler::{ScriptSettings, create_run_script};

use crate::cli::TargetArgs;
use crate::client::{AppContext, CliError, CliResult};
use crate::output;

/// Publish a build request to the runner group's request topic.
///
/// Prints the serialized request so the operator can capture the request id
/// for later `watch --filter-request-id` calls.
pub(crate) async fn submit(
    context: &AppContext,
    target: &TargetArgs,
    runner_group: &str,
    clean: bool,
) -> CliResult<()> {
    let action = if clean {
        BuildAction::RebuildClean
    } else {
        BuildAction::Rebuild
    };
    let request = BuildRequest::new(
        target.package_path(),
        target.arch.clone(),
        target.dist.clone(),
        runner_group,
        action,
    );

    let broker = context.connector.connect().await.map_err(CliError::failure)?;
    let send = async {
        let payload = request.encode().map_err(CliError::failure)?;
        broker
            .send(&topics::package_request_topic(runner_group), &payload)
            .await
            .map_err(CliError::failure)
    }
    .await;
    broker.close().await.map_err(CliError::failure)?;
    send?;

    output::print_json(&request)
}

/// Build the package in the current working directory, in the foreground.
///
/// Requires root because the prepare phase constructs a buildroot. The tool
/// exits with the run script's exit code.
pub(crate) async fn local(dist: &str, clean: bool) -> CliResult<()> {
    require_root()?;
    let package_source_path = checked_working_directory()?;

    let request = BuildRequest::new(
        package_source_path.display().to_string(),
        std::env::consts::ARCH,
        dist,
        "local",
        BuildAction::Local,
    );
    let settings = ScriptSettings::new(&package_source_path, &package_source_path);
    let script = create_run_script(&request, &settings, clean, true).map_err(CliError::failure)?;

    let status = Command::new("bash")
        .arg(&script)
        .status()
        .await
        .map_err(|error| CliError::failure(anyhow!("running build script: {error}")))?;
    std::process::exit(status.code().unwrap_or(1));
}

/// Calculate build dependencies for the working-directory package, locally.
///
/// Delegates to the prepare tool's solver mode and prints its report, as
/// JSON when the solver produced structured data and raw otherwise.
pub(crate) async fn dependencies_local(dist: &str) -> CliResult<()> {
    require_root()?;
    let package_source_path = checked_working_directory()?;
    let profile = format!("{dist}.{}", std::env::consts::ARCH);

    let output = Command::new("cb-prepare")
        .arg("--root")
        .arg(format!("{}@{profile}", package_source_path.display()))
        .arg("--package")
        .arg(&package_source_path)
        .arg("--profile")
        .arg(&profile)
        .arg("--local")
        .arg("--solve")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|error| CliError::failure(anyhow!("spawning cb-prepare: {error}")))?;
    if !output.status.success() {
        return Err(CliError::failure(anyhow!(
            "dependency resolution failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let report = String::from_utf8_lossy(&output.stdout);
    match serde_json::from_str::<serde_json::Value>(&report) {
        Ok(solver_data) => output::print_json(&solver_data),
        Err(_) => {
            output::print_raw(report.trim_end());
            Ok(())
        }
    }
}

fn require_root() -> CliResult<()> {
    if nix::unistd::Uid::effective().is_root() {
        Ok(())
    } else {
        Err(CliError::validation(
            "local builds construct a buildroot and require root permissions",
        ))
    }
}

/// The working directory must be a package source root carrying metadata.
fn checked_working_directory() -> CliResult<std::path::PathBuf> {
    let cwd = std::env::current_dir()
        .map_err(|error| CliError::failure(anyhow!("resolving working directory: {error}")))?;
    if !PackageMetadata::file_path(&cwd).is_file() {
        return Err(CliError::validation(format!(
            "no package metadata found in {}",
            cwd.display()
        )));
    }
    PackageMetadata::load(&cwd).map_err(CliError::failure)?;
    Ok(cwd)
}
