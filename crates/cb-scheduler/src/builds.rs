//! Running-build bookkeeping.
//!
//! Every launched build leaves a `{build_root}.pid` file next to its
//! buildroot. These helpers resolve buildroot paths, probe PID liveness,
//! count in-flight builds for admission control, and preempt a running build
//! when a newer request targets the same `{dist}.{arch}` profile.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use walkdir::WalkDir;

use cb_broker::{MessageBroker, topics::RESPONSE_TOPIC};
use cb_protocol::{BuildRequest, Response, ResponseCode};

use crate::error::SchedulerResult;
use crate::identity;

/// How long a terminated build gets to exit before escalation to `SIGKILL`.
const TERMINATE_GRACE: Duration = Duration::from_secs(5);
const TERMINATE_POLL: Duration = Duration::from_millis(100);

/// Buildroot path for one package and `{dist}.{arch}` profile.
#[must_use]
pub fn build_root_path(package_root: &Path, package: &str, profile: &str) -> PathBuf {
    PathBuf::from(format!("{}@{profile}", package_root.join(package).display()))
}

/// Sibling file of a buildroot, e.g. the `pid`, `sh` or `build.log` file.
#[must_use]
pub fn build_root_suffixed(build_root: &Path, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{}.{suffix}", build_root.display()))
}

/// Whether a process with the given PID currently exists.
#[must_use]
pub fn pid_alive(pid: i32) -> bool {
    kill(Pid::from_raw(pid), None).is_ok()
}

fn read_pid(pid_file: &Path) -> Option<i32> {
    fs::read_to_string(pid_file)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
}

/// Count builds that are still running under the package root.
///
/// Scans for `*.pid` files and probes each recorded PID; stale files left
/// behind by finished builds do not count.
#[must_use]
pub fn running_builds(package_root: &Path) -> usize {
    WalkDir::new(package_root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "pid"))
        .filter_map(|entry| read_pid(entry.path()))
        .filter(|pid| pid_alive(*pid))
        .count()
}

/// Stop a process, first politely and then by force.
///
/// Sends `SIGTERM`, polls for exit for a grace period, and escalates to
/// `SIGKILL` if the process is still alive afterwards.
pub async fn terminate(pid: i32) {
    let target = Pid::from_raw(pid);
    if kill(target, Signal::SIGTERM).is_err() {
        return;
    }
    let deadline = tokio::time::Instant::now() + TERMINATE_GRACE;
    while tokio::time::Instant::now() < deadline {
        if !pid_alive(pid) {
            return;
        }
        tokio::time::sleep(TERMINATE_POLL).await;
    }
    let _ = kill(target, Signal::SIGKILL);
}

/// Preempt a running build for the target of `request`, if any.
///
/// When the target's PID file names a live process, a [`ResponseCode::ResetRunningBuild`]
/// response is published for the incoming request and the old build is
/// terminated before the new one is launched.
///
/// # Errors
///
/// Returns [`crate::SchedulerError::Broker`] or
/// [`crate::SchedulerError::Protocol`] when the reset response cannot be
/// published.
pub async fn reset_build_if_running(
    broker: &dyn MessageBroker,
    request: &BuildRequest,
    package_root: &Path,
) -> SchedulerResult<()> {
    let profile = format!("{}.{}", request.dist, request.arch);
    let build_root = build_root_path(package_root, &request.package, &profile);
    let pid_file = build_root_suffixed(&build_root, "pid");
    let Some(pid) = read_pid(&pid_file) else {
        return Ok(());
    };
    if !pid_alive(pid) {
        return Ok(());
    }

    tracing::info!(
        package = %request.package,
        profile = %profile,
        pid,
        "terminating running build before relaunch"
    );
    let response = Response {
        request_id: request.request_id,
        identity: identity(&request.runner_group),
        response_code: ResponseCode::ResetRunningBuild,
        message: format!("resetting running build of {}@{profile}", request.package),
        package: request.package.clone(),
        arch: Some(request.arch.clone()),
        dist: Some(request.dist.clone()),
    };
    broker.send(RESPONSE_TOPIC, &response.encode()?).await?;
    terminate(pid).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cb_broker::memory::{MemoryBroker, MemoryBus};
    use cb_protocol::BuildAction;
    use std::process::Command;
    use tempfile::TempDir;

    // Spawns a detached sleeper the way a generated run script does, so the
    // recorded PID is not a direct child of the test process.
    fn spawn_detached_sleeper(pid_file: &Path) -> i32 {
        let status = Command::new("bash")
            .arg("-c")
            .arg(format!("sleep 30 & echo $! > {}", pid_file.display()))
            .status()
            .expect("spawn sleeper");
        assert!(status.success());
        fs::read_to_string(pid_file)
            .expect("pid file")
            .trim()
            .parse()
            .expect("numeric pid")
    }

    #[test]
    fn running_builds_ignores_stale_pid_files() {
        let temp = TempDir::new().expect("temp dir");
        let stale = temp.path().join("projects/demo/old@TW.x86_64.pid");
        fs::create_dir_all(stale.parent().expect("parent")).expect("dirs");
        // PID 1 is alive but unkillable from here; use an impossible PID.
        fs::write(&stale, "999999999\n").expect("write stale pid");
        assert_eq!(running_builds(temp.path()), 0);
    }

    #[test]
    fn running_builds_counts_live_processes() {
        let temp = TempDir::new().expect("temp dir");
        let pid_file = temp.path().join("projects/demo/foo@TW.x86_64.pid");
        fs::create_dir_all(pid_file.parent().expect("parent")).expect("dirs");
        let pid = spawn_detached_sleeper(&pid_file);

        assert_eq!(running_builds(temp.path()), 1);

        let _ = kill(Pid::from_raw(pid), Signal::SIGKILL);
    }

    #[tokio::test]
    async fn reset_terminates_running_build_and_reports_it() {
        let temp = TempDir::new().expect("temp dir");
        let request = BuildRequest::new(
            "projects/demo/foo",
            "x86_64",
            "TW",
            "suse",
            BuildAction::Rebuild,
        );
        let pid_file = temp.path().join("projects/demo/foo@TW.x86_64.pid");
        fs::create_dir_all(pid_file.parent().expect("parent")).expect("dirs");
        let pid = spawn_detached_sleeper(&pid_file);

        let bus = MemoryBus::new();
        let broker = MemoryBroker::connect(bus.clone());
        reset_build_if_running(&broker, &request, temp.path())
            .await
            .expect("reset");

        assert!(!pid_alive(pid), "old build must be gone");
        assert_eq!(bus.topic_len(RESPONSE_TOPIC), 1);

        let batch = broker
            .read(RESPONSE_TOPIC, "watcher", Duration::from_millis(100))
            .await
            .expect("read response");
        let response = Response::decode(&batch[0].payload).expect("decode");
        assert_eq!(response.response_code, ResponseCode::ResetRunningBuild);
        assert_eq!(response.request_id, request.request_id);
        assert_eq!(response.identity, "cb-scheduler:suse");
    }

    #[tokio::test]
    async fn reset_is_a_no_op_without_a_live_build() {
        let temp = TempDir::new().expect("temp dir");
        let request = BuildRequest::new(
            "projects/demo/foo",
            "x86_64",
            "TW",
            "suse",
            BuildAction::Rebuild,
        );

        let bus = MemoryBus::new();
        let broker = MemoryBroker::connect(bus.clone());
        reset_build_if_running(&broker, &request, temp.path())
            .await
            .expect("reset");
        assert_eq!(bus.topic_len(RESPONSE_TOPIC), 0);
    }
}
