// system.rs - SystemProcessControl: ProcessControl backed by the real OS.
//
// - The process table comes from sysinfo.
// - Detached launches get null stdio and a new session (setsid on Unix,
//   DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP | CREATE_NO_WINDOW on
//   Windows). A background thread reaps the child so an early exit never
//   leaves a zombie that still shows up in the process table.
// - Emulator instances are driven through the emulator console
//   (`<console> console launch|quit|quitall|isrunning --index N|--name S`).

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use mxx_profile::EmulatorSlot;
use sysinfo::{Pid, Process, ProcessStatus, Signal, System};

use crate::control::{ProcessControl, ProcessMatcher};
use crate::error::ProcessError;

/// How long killed processes get to exit before they are force killed.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

const KILL_POLL: Duration = Duration::from_millis(100);

/// A row of the process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub parent: Option<u32>,
    pub name: String,
    pub exe: Option<PathBuf>,
}

/// Snapshot of all live (non-zombie) processes.
pub fn process_table() -> Vec<ProcessInfo> {
    let mut sys = System::new();
    sys.refresh_processes();
    sys.processes()
        .iter()
        .filter(|(_, p)| is_alive(p))
        .map(|(pid, p)| ProcessInfo {
            pid: pid.as_u32(),
            parent: p.parent().map(|pid| pid.as_u32()),
            name: p.name().to_string(),
            exe: p.exe().map(Path::to_path_buf),
        })
        .collect()
}

/// Resolve a program name against PATH, or check that an explicit path
/// exists.
pub fn resolve_program(program: &Path) -> Result<PathBuf, ProcessError> {
    let not_found = || ProcessError::ExecutableNotFound {
        program: program.display().to_string(),
    };
    if program.is_absolute() || program.components().count() > 1 {
        if program.is_file() {
            Ok(program.to_path_buf())
        } else {
            Err(not_found())
        }
    } else {
        which::which(program).map_err(|_| not_found())
    }
}

pub struct SystemProcessControl {
    console: String,
    kill_grace: Duration,
}

impl SystemProcessControl {
    /// `console` is the emulator console executable (normally `ldpx`).
    pub fn new(console: impl Into<String>) -> Self {
        Self {
            console: console.into(),
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }

    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    /// Run `<console> console <args...>` and wait for it.
    fn console(&self, args: &[String]) -> Result<Output, ProcessError> {
        let program = resolve_program(Path::new(&self.console))?;
        tracing::debug!(console = %program.display(), ?args, "emulator console");
        Command::new(&program)
            .arg("console")
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ProcessError::Spawn {
                program: program.display().to_string(),
                source,
            })
    }

    fn console_checked(&self, args: Vec<String>) -> Result<(), ProcessError> {
        let output = self.console(&args)?;
        if output.status.success() {
            Ok(())
        } else {
            Err(ProcessError::Console {
                command: args.join(" "),
                reason: format!(
                    "{} {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            })
        }
    }

    fn slot_running(&self, slot: &EmulatorSlot) -> bool {
        let mut args = vec!["isrunning".to_string()];
        args.extend(slot.selector_args());
        match self.console(&args) {
            Ok(output) => {
                let answer = String::from_utf8_lossy(&output.stdout).trim().to_ascii_lowercase();
                answer == "running"
            }
            Err(e) => {
                // Unanswerable counts as alive so a flaky console can't fail a run.
                tracing::debug!(%slot, "emulator liveness unknown, assuming running: {}", e);
                true
            }
        }
    }

    fn kill_matching(&self, matcher: &ProcessMatcher) -> usize {
        let mut sys = System::new();
        sys.refresh_processes();

        let own_pid = sysinfo::get_current_pid().ok();
        let targets: Vec<Pid> = sys
            .processes()
            .iter()
            .filter(|(pid, p)| Some(**pid) != own_pid && is_alive(p) && matches(p, matcher))
            .map(|(pid, _)| *pid)
            .collect();
        if targets.is_empty() {
            return 0;
        }

        let mut signalled = 0;
        for pid in &targets {
            if let Some(process) = sys.process(*pid) {
                // kill_with returns None where SIGTERM doesn't exist (Windows).
                let sent = process.kill_with(Signal::Term).unwrap_or_else(|| process.kill());
                if sent {
                    signalled += 1;
                }
            }
        }

        let deadline = Instant::now() + self.kill_grace;
        let mut survivors = targets;
        while !survivors.is_empty() && Instant::now() < deadline {
            thread::sleep(KILL_POLL);
            sys.refresh_processes();
            survivors.retain(|pid| sys.process(*pid).is_some_and(is_alive));
        }
        for pid in survivors {
            if let Some(process) = sys.process(pid) {
                tracing::debug!(pid = pid.as_u32(), "force killing");
                process.kill();
            }
        }
        signalled
    }
}

impl ProcessControl for SystemProcessControl {
    fn launch_detached(
        &self,
        program: &Path,
        args: &[String],
        cwd: Option<&Path>,
    ) -> Result<(), ProcessError> {
        let program = resolve_program(program)?;
        let mut command = Command::new(&program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // SAFETY: setsid is async-signal-safe and touches no Rust state.
            unsafe {
                command.pre_exec(|| {
                    libc::setsid();
                    Ok(())
                });
            }
        }

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const DETACHED_PROCESS: u32 = 0x0000_0008;
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP | CREATE_NO_WINDOW);
        }

        let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
            program: program.display().to_string(),
            source,
        })?;
        tracing::info!(program = %program.display(), pid = child.id(), "launched");

        thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }

    fn launch_emulator(&self, slot: &EmulatorSlot) -> Result<(), ProcessError> {
        let mut args = vec!["launch".to_string()];
        args.extend(slot.selector_args());
        self.console_checked(args)?;
        tracing::info!(%slot, "emulator launched");
        Ok(())
    }

    fn is_running(&self, matcher: &ProcessMatcher) -> bool {
        match matcher {
            ProcessMatcher::EmulatorSlot(slot) => self.slot_running(slot),
            // The console has no "any running" query.
            ProcessMatcher::AllEmulators => true,
            _ => {
                let mut sys = System::new();
                sys.refresh_processes();
                sys.processes()
                    .values()
                    .any(|p| is_alive(p) && matches(p, matcher))
            }
        }
    }

    fn kill_all(&self, matcher: &ProcessMatcher) -> Result<usize, ProcessError> {
        match matcher {
            ProcessMatcher::EmulatorSlot(slot) => {
                let mut args = vec!["quit".to_string()];
                args.extend(slot.selector_args());
                self.console_checked(args)?;
                Ok(1)
            }
            ProcessMatcher::AllEmulators => {
                self.console_checked(vec!["quitall".to_string()])?;
                Ok(1)
            }
            _ => Ok(self.kill_matching(matcher)),
        }
    }
}

fn is_alive(process: &Process) -> bool {
    process.status() != ProcessStatus::Zombie
}

fn matches(process: &Process, matcher: &ProcessMatcher) -> bool {
    match matcher {
        ProcessMatcher::ExecutableName(name) => {
            name_matches(process.name(), name)
                || process
                    .exe()
                    .and_then(|exe| exe.file_name())
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| name_matches(n, name))
        }
        ProcessMatcher::ExecutablePath(path) => process
            .exe()
            .is_some_and(|exe| same_file(exe, path)),
        ProcessMatcher::EmulatorSlot(_) | ProcessMatcher::AllEmulators => false,
    }
}

/// Compare an executable name from the process table with a wanted one.
/// On Windows the comparison ignores case and a missing `.exe`.
pub(crate) fn name_matches(candidate: &str, wanted: &str) -> bool {
    if cfg!(windows) {
        let candidate = candidate.to_ascii_lowercase();
        let mut wanted = wanted.to_ascii_lowercase();
        if !wanted.ends_with(".exe") {
            wanted.push_str(".exe");
        }
        candidate == wanted
    } else {
        candidate == wanted
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    let canonical = |p: &Path| p.canonicalize().unwrap_or_else(|_| p.to_path_buf());
    canonical(a) == canonical(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_program_is_resolved_on_path() {
        #[cfg(unix)]
        assert!(resolve_program(Path::new("sh")).is_ok());
        assert!(matches!(
            resolve_program(Path::new("mxx-definitely-missing-binary")),
            Err(ProcessError::ExecutableNotFound { .. })
        ));
    }

    #[test]
    fn explicit_path_must_exist() {
        let err = resolve_program(Path::new("/nonexistent/dir/app")).unwrap_err();
        assert!(err.is_launch_failure());
    }

    #[cfg(unix)]
    #[test]
    fn name_match_is_exact_on_unix() {
        assert!(name_matches("MAA", "MAA"));
        assert!(!name_matches("maa", "MAA"));
        assert!(!name_matches("MAA.exe", "MAA"));
    }

    #[test]
    fn missing_console_means_launch_failure() {
        let control = SystemProcessControl::new("mxx-no-such-console");
        let err = control.launch_emulator(&EmulatorSlot::Index(0)).unwrap_err();
        assert!(matches!(err, ProcessError::ExecutableNotFound { .. }));
        // Liveness that can't be answered counts as running.
        assert!(control.is_running(&ProcessMatcher::EmulatorSlot(EmulatorSlot::Index(0))));
    }

    #[test]
    fn launching_missing_app_fails_before_spawn() {
        let control = SystemProcessControl::new("ldpx");
        let err = control
            .launch_detached(Path::new("/nonexistent/MAA"), &[], None)
            .unwrap_err();
        assert!(matches!(err, ProcessError::ExecutableNotFound { .. }));
    }

    #[test]
    fn nothing_matches_unknown_executable() {
        let control = SystemProcessControl::new("ldpx");
        let matcher = ProcessMatcher::ExecutablePath(PathBuf::from("/nonexistent/mxx-ghost"));
        assert!(!control.is_running(&matcher));
        assert_eq!(control.kill_all(&matcher).unwrap(), 0);
    }

    #[test]
    fn process_table_contains_current_process() {
        let own = std::process::id();
        assert!(process_table().iter().any(|p| p.pid == own));
    }
}
