//! Run-script generation.
//!
//! A build is executed by a generated POSIX shell script that sequences the
//! external prepare phase (buildroot construction) and run phase (actual
//! compilation) for one `{dist}.{arch}` profile. In local mode the script
//! stays in the foreground and streams to the terminal; in scheduler mode it
//! backgrounds the whole pipeline, redirects output to log files next to the
//! buildroot, and records the backgrounded shell's PID so a later request for
//! the same target can preempt it.

use std::fs;
use std::path::{Path, PathBuf};

use cb_protocol::BuildRequest;

use crate::builds::{build_root_path, build_root_suffixed};
use crate::error::{SchedulerError, SchedulerResult};

/// Default executable for the prepare phase.
pub const DEFAULT_PREPARE_BIN: &str = "cb-prepare";
/// Default executable for the run phase.
pub const DEFAULT_RUN_BIN: &str = "cb-run";

/// Filesystem locations and tool names used by script generation.
#[derive(Debug, Clone)]
pub struct ScriptSettings {
    /// Local checkout of the shared project git repository.
    pub project_dir: PathBuf,
    /// Root for buildroots and their colocated file sets.
    pub package_root: PathBuf,
    /// Prepare-phase executable.
    pub prepare_bin: String,
    /// Run-phase executable.
    pub run_bin: String,
}

impl ScriptSettings {
    /// Settings with the default tool names.
    #[must_use]
    pub fn new(project_dir: impl Into<PathBuf>, package_root: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            package_root: package_root.into(),
            prepare_bin: DEFAULT_PREPARE_BIN.to_owned(),
            run_bin: DEFAULT_RUN_BIN.to_owned(),
        }
    }
}

/// Generate the run script for a request and return its path.
///
/// In local mode the package field of the request is used as the source path
/// directly and the buildroot lives next to it; in scheduler mode both are
/// resolved under the configured project and package roots. The script
/// directory is created recursively before the file is written.
///
/// # Errors
///
/// Returns [`SchedulerError::Io`] when the script directory or file cannot
/// be written.
pub fn create_run_script(
    request: &BuildRequest,
    settings: &ScriptSettings,
    clean_buildroot: bool,
    local: bool,
) -> SchedulerResult<PathBuf> {
    let profile = format!("{}.{}", request.dist, request.arch);
    let (package_source_path, build_root) = if local {
        let source = PathBuf::from(&request.package);
        let build_root = PathBuf::from(format!("{}@{profile}", source.display()));
        (source, build_root)
    } else {
        (
            settings.project_dir.join(&request.package),
            build_root_path(&settings.package_root, &request.package, &profile),
        )
    };

    let script = if local {
        local_script(request, settings, &package_source_path, &build_root, &profile, clean_buildroot)
    } else {
        background_script(
            request,
            settings,
            &package_source_path,
            &build_root,
            &profile,
            clean_buildroot,
        )
    };

    let script_path = build_root_suffixed(&build_root, "sh");
    if let Some(parent) = script_path.parent() {
        fs::create_dir_all(parent).map_err(|source| SchedulerError::Io {
            operation: "script_dir.create",
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(&script_path, script).map_err(|source| SchedulerError::Io {
        operation: "script.write",
        path: script_path.clone(),
        source,
    })?;
    Ok(script_path)
}

fn local_script(
    request: &BuildRequest,
    settings: &ScriptSettings,
    package_source_path: &Path,
    build_root: &Path,
    profile: &str,
    clean_buildroot: bool,
) -> String {
    format!(
        "#!/bin/bash\n\
         \n\
         set -e\n\
         \n\
         if {clean}; then\n\
         \x20\x20\x20\x20rm -rf {build_root}\n\
         fi\n\
         \n\
         {prepare} --root {build_root} \\\n\
         \x20\x20\x20\x20--package {package} \\\n\
         \x20\x20\x20\x20--profile {profile} \\\n\
         \x20\x20\x20\x20--request-id {request_id} \\\n\
         \x20\x20\x20\x20--local\n\
         {run} --root {build_root} \\\n\
         \x20\x20\x20\x20--request-id {request_id} \\\n\
         \x20\x20\x20\x20--local\n",
        clean = if clean_buildroot { "true" } else { "false" },
        build_root = build_root.display(),
        prepare = settings.prepare_bin,
        run = settings.run_bin,
        package = package_source_path.display(),
        profile = profile,
        request_id = request.request_id,
    )
}

fn background_script(
    request: &BuildRequest,
    settings: &ScriptSettings,
    package_source_path: &Path,
    build_root: &Path,
    profile: &str,
    clean_buildroot: bool,
) -> String {
    format!(
        "#!/bin/bash\n\
         \n\
         set -e\n\
         \n\
         rm -f {build_root}.log\n\
         \n\
         if {clean}; then\n\
         \x20\x20\x20\x20rm -rf {build_root}\n\
         fi\n\
         \n\
         function finish {{\n\
         \x20\x20\x20\x20kill $(jobs -p) &>/dev/null\n\
         }}\n\
         \n\
         {{\n\
         \x20\x20\x20\x20trap finish EXIT\n\
         \x20\x20\x20\x20{prepare} --root {build_root} \\\n\
         \x20\x20\x20\x20\x20\x20\x20\x20--package {package} \\\n\
         \x20\x20\x20\x20\x20\x20\x20\x20--profile {profile} \\\n\
         \x20\x20\x20\x20\x20\x20\x20\x20--request-id {request_id}\n\
         \x20\x20\x20\x20{run} --root {build_root} \\\n\
         \x20\x20\x20\x20\x20\x20\x20\x20--request-id {request_id} \\\n\
         \x20\x20\x20\x20\x20\x20\x20\x20&> {build_root}.build.log\n\
         }} &> {build_root}.run.log &\n\
         \n\
         echo $! > {build_root}.pid\n",
        clean = if clean_buildroot { "true" } else { "false" },
        build_root = build_root.display(),
        prepare = settings.prepare_bin,
        run = settings.run_bin,
        package = package_source_path.display(),
        profile = profile,
        request_id = request.request_id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use cb_protocol::BuildAction;
    use std::os::unix::fs::PermissionsExt;
    use std::process::Command;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn write_stub(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/bash\n{body}\n")).expect("write stub");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod stub");
        path.display().to_string()
    }

    fn stub_settings(temp: &TempDir, prepare_body: &str, run_body: &str) -> ScriptSettings {
        let mut settings = ScriptSettings::new(
            temp.path().join("project"),
            temp.path().join("builds"),
        );
        settings.prepare_bin = write_stub(temp.path(), "stub-prepare", prepare_body);
        settings.run_bin = write_stub(temp.path(), "stub-run", run_body);
        settings
    }

    #[test]
    fn scripts_tag_both_phases_with_the_request_id() {
        let temp = TempDir::new().expect("temp dir");
        let settings = ScriptSettings::new(temp.path().join("project"), temp.path().join("builds"));
        let request = BuildRequest::new(
            "projects/demo/foo",
            "x86_64",
            "TW",
            "suse",
            BuildAction::Rebuild,
        );

        let script_path = create_run_script(&request, &settings, false, false).expect("generate");
        let script = fs::read_to_string(&script_path).expect("read script");
        let id = request.request_id.to_string();
        assert_eq!(script.matches(&id).count(), 2, "prepare and run tagged");
        assert!(script.contains("cb-prepare --root"));
        assert!(script.contains("cb-run --root"));
        assert!(
            script_path
                .display()
                .to_string()
                .ends_with("projects/demo/foo@TW.x86_64.sh")
        );
    }

    #[test]
    fn clean_flag_controls_buildroot_removal() {
        let temp = TempDir::new().expect("temp dir");
        let settings = ScriptSettings::new(temp.path().join("project"), temp.path().join("builds"));
        let request =
            BuildRequest::new("pkg", "x86_64", "TW", "suse", BuildAction::RebuildClean);

        let script_path = create_run_script(&request, &settings, true, false).expect("generate");
        let script = fs::read_to_string(&script_path).expect("read");
        assert!(script.contains("if true; then"));
        assert!(script.contains("rm -rf"));

        let script_path = create_run_script(&request, &settings, false, false).expect("generate");
        let script = fs::read_to_string(script_path).expect("read");
        assert!(script.contains("if false; then"));
    }

    #[test]
    fn local_script_propagates_the_run_exit_code() {
        let temp = TempDir::new().expect("temp dir");
        let settings = stub_settings(&temp, "exit 0", "exit 7");
        let package = temp.path().join("pkg");
        fs::create_dir_all(&package).expect("package dir");
        let request = BuildRequest::new(
            package.display().to_string(),
            "x86_64",
            "TW",
            "local",
            BuildAction::Local,
        );

        let script_path = create_run_script(&request, &settings, false, true).expect("generate");
        let status = Command::new("bash")
            .arg(&script_path)
            .status()
            .expect("run script");
        assert_eq!(status.code(), Some(7));
    }

    #[test]
    fn background_script_detaches_from_the_caller() {
        let temp = TempDir::new().expect("temp dir");
        let settings = stub_settings(&temp, "exit 0", "sleep 5");
        let request =
            BuildRequest::new("projects/demo/slow", "x86_64", "TW", "suse", BuildAction::Rebuild);

        let script_path = create_run_script(&request, &settings, false, false).expect("generate");
        let started = Instant::now();
        let status = Command::new("bash")
            .arg(&script_path)
            .status()
            .expect("run script");
        assert!(status.success());
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "caller must regain control before the run phase completes"
        );

        let pid_file = temp
            .path()
            .join("builds/projects/demo/slow@TW.x86_64.pid");
        let pid: i32 = fs::read_to_string(&pid_file)
            .expect("pid file written at launch")
            .trim()
            .parse()
            .expect("pid is numeric");
        // Stop the detached job group so the sleep does not outlive the test.
        let _ = nix::sys::signal::kill(
            nix::unistd::Pid::from_raw(pid),
            nix::sys::signal::Signal::SIGTERM,
        );
    }
}
