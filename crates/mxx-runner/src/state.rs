// state.rs - Run states, kill modes, outcomes and the per-run report.

use std::fmt;

use chrono::{DateTime, Utc};
use mxx_process::MonitorState;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RunError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    /// Gates are being evaluated and processes launched.
    Starting,
    /// Processes launched, `post_profile_start` dispatched.
    Running,
    /// Waiting out the lifetime while polling liveness.
    MonitoringForKill,
    /// Left running; mxx returns without waiting.
    Detached,
    /// Kill gates and teardown.
    Stopping,
    Stopped,
    /// A launch failed; nothing is monitored.
    Aborted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Starting => "starting",
            RunState::Running => "running",
            RunState::MonitoringForKill => "monitoring_for_kill",
            RunState::Detached => "detached",
            RunState::Stopping => "stopping",
            RunState::Stopped => "stopped",
            RunState::Aborted => "aborted",
        };
        write!(f, "{}", name)
    }
}

impl RunState {
    /// Valid transitions:
    ///   Idle -> Starting -> Running -> (MonitoringForKill | Detached)
    ///   MonitoringForKill -> Stopping -> Stopped
    ///   Starting -> Stopped (start vetoed), Idle -> Stopping (`down`)
    ///   any non-terminal state -> Aborted
    pub fn can_transition_to(&self, next: RunState) -> bool {
        if next == RunState::Aborted {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (RunState::Idle, RunState::Starting)
                | (RunState::Idle, RunState::Stopping)
                | (RunState::Starting, RunState::Running)
                | (RunState::Starting, RunState::Stopped)
                | (RunState::Running, RunState::MonitoringForKill)
                | (RunState::Running, RunState::Detached)
                | (RunState::MonitoringForKill, RunState::Stopping)
                | (RunState::Stopping, RunState::Stopped)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Detached | RunState::Stopped | RunState::Aborted
        )
    }
}

/// What happens once the profile is up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KillMode {
    /// Return immediately, leaving the processes running.
    #[default]
    Detach,
    /// After the lifetime, stop this profile's processes.
    Kill,
    /// After the lifetime, stop every managed process.
    KillAll,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Started and left running.
    Detached,
    /// Ran for its lifetime (or was taken down) and was stopped.
    Completed,
    /// Monitoring gave up after repeated liveness failures.
    Failed,
    /// A plugin vetoed the start.
    Skipped,
    /// A plugin vetoed the kill; processes were left running.
    KillBlocked,
}

impl RunOutcome {
    /// Whether the CLI should exit 0 for this outcome.
    pub fn is_success(&self) -> bool {
        !matches!(self, RunOutcome::Failed)
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunOutcome::Detached => "detached",
            RunOutcome::Completed => "completed",
            RunOutcome::Failed => "failed",
            RunOutcome::Skipped => "skipped",
            RunOutcome::KillBlocked => "kill_blocked",
        };
        write!(f, "{}", name)
    }
}

/// Record of one profile run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub profile: String,
    pub started_at: DateTime<Utc>,
    /// Every state the run passed through, starting with `Idle`.
    pub history: Vec<RunState>,
    pub outcome: Option<RunOutcome>,
    /// Monitor counters, when the run was monitored.
    pub monitor: Option<MonitorState>,
}

impl RunReport {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            profile: profile.into(),
            started_at: Utc::now(),
            history: vec![RunState::Idle],
            outcome: None,
            monitor: None,
        }
    }

    pub fn state(&self) -> RunState {
        self.history.last().copied().unwrap_or(RunState::Idle)
    }

    pub fn transition(&mut self, next: RunState) -> Result<(), RunError> {
        let current = self.state();
        if !current.can_transition_to(next) {
            return Err(RunError::InvalidTransition {
                profile: self.profile.clone(),
                from: current.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!(profile = %self.profile, from = %current, to = %next, "state");
        self.history.push(next);
        Ok(())
    }

    /// Move to a terminal state and record the outcome.
    pub fn finish(&mut self, state: RunState, outcome: RunOutcome) -> Result<(), RunError> {
        self.transition(state)?;
        self.outcome = Some(outcome);
        Ok(())
    }
}
