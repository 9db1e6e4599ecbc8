// instance.rs - SingleInstanceGuard: refuse to run next to another mxx.
//
// Two mxx processes driving the same emulator would fight over it, and the
// completion files are rewritten without locking. On `pre_command` the guard
// looks for other processes running the same executable as this one,
// ignoring this process and its ancestors (a wrapper launcher or `cargo
// run` shows up as a parent, not a rival).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use mxx_plugin::{HookResult, Plugin, RunContext};

use crate::system::{name_matches, process_table, ProcessInfo};

pub struct SingleInstanceGuard {
    executable: Option<PathBuf>,
}

impl SingleInstanceGuard {
    /// Guard the executable of the current process.
    pub fn new() -> Self {
        let executable = std::env::current_exe().ok();
        if executable.is_none() {
            tracing::warn!("cannot determine own executable, single-instance check disabled");
        }
        Self { executable }
    }

    /// Guard an explicit executable.
    pub fn for_executable(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: Some(executable.into()),
        }
    }
}

impl Default for SingleInstanceGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for SingleInstanceGuard {
    fn name(&self) -> &str {
        "single-instance"
    }

    fn pre_command(&self, command: &str, _ctx: &mut RunContext) -> HookResult<Option<bool>> {
        let Some(executable) = &self.executable else {
            return Ok(None);
        };
        let others = other_instances(&process_table(), std::process::id(), executable);
        if others.is_empty() {
            return Ok(Some(true));
        }
        tracing::warn!(
            command,
            pids = ?others,
            "found {} other mxx instance(s) running; only one is allowed",
            others.len()
        );
        Ok(Some(false))
    }
}

/// PIDs in `table` running `executable`, excluding `own_pid` and its
/// ancestors.
pub fn other_instances(table: &[ProcessInfo], own_pid: u32, executable: &Path) -> Vec<u32> {
    let ancestry = ancestors(table, own_pid);
    let file_name = executable.file_name().and_then(|n| n.to_str());

    let mut pids: Vec<u32> = table
        .iter()
        .filter(|p| !ancestry.contains(&p.pid))
        .filter(|p| match (&p.exe, file_name) {
            (Some(exe), _) => exe == executable,
            (None, Some(name)) => name_matches(&p.name, name),
            (None, None) => false,
        })
        .map(|p| p.pid)
        .collect();
    pids.sort_unstable();
    pids
}

/// `pid` and every ancestor reachable through `table`.
fn ancestors(table: &[ProcessInfo], pid: u32) -> HashSet<u32> {
    let mut chain = HashSet::new();
    let mut current = Some(pid);
    while let Some(pid) = current {
        if !chain.insert(pid) {
            break;
        }
        current = table.iter().find(|p| p.pid == pid).and_then(|p| p.parent);
    }
    chain
}
