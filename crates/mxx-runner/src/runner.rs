// runner.rs - ProfileRunner: drives one profile through its lifecycle.
//
// up():
//   1. validate the profile (errors surface before anything is touched)
//   2. start gate: can_run_profile AND pre_profile_start (both dispatched)
//   3. launch emulator, wait `waittime` (only if both parts exist), launch app
//   4. post_profile_start
//   5. Detach, or monitor for the lifetime and then stop
// A monitor failure sets `profile_failed` in the context and re-dispatches
// post_profile_start before stopping, so observers can record the failure.
//
// down():
//   kill gate: can_kill_profile AND pre_profile_kill, then kill app and
//   emulator slot, then post_profile_kill. With no profile every known
//   profile is gated and killed, followed by an emulator-wide sweep if no
//   profile vetoed.

use chrono::Utc;
use mxx_plugin::context::START_TIME;
use mxx_plugin::{hooks, PluginRegistry, RunContext};
use mxx_process::{Monitor, MonitorOutcome, ProcessControl, Sleeper, Supervisor, ThreadSleeper};
use mxx_profile::{Profile, ProfileSource};
use serde_json::json;

use crate::error::RunError;
use crate::state::{KillMode, RunOutcome, RunReport, RunState};

/// Options for `up`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpOptions {
    pub mode: KillMode,
    /// Overrides the profile's waittime (seconds).
    pub waittime: Option<u64>,
}

/// Result of `down`.
#[derive(Debug, Clone, Default)]
pub struct DownReport {
    /// One report per profile that went through the kill gate.
    pub reports: Vec<RunReport>,
    /// Whether the emulator-wide sweep ran.
    pub swept_emulators: bool,
}

impl DownReport {
    pub fn blocked(&self) -> impl Iterator<Item = &RunReport> {
        self.reports
            .iter()
            .filter(|r| r.outcome == Some(RunOutcome::KillBlocked))
    }
}

pub struct ProfileRunner<'a> {
    plugins: &'a PluginRegistry,
    control: &'a dyn ProcessControl,
    profiles: &'a dyn ProfileSource,
    monitor: Monitor,
    default_waittime: u64,
    sleeper: Box<dyn Sleeper + 'a>,
}

impl<'a> ProfileRunner<'a> {
    /// `profiles` is consulted by `down(None)` and `KillMode::KillAll` to
    /// find every managed profile.
    pub fn new(
        plugins: &'a PluginRegistry,
        control: &'a dyn ProcessControl,
        profiles: &'a dyn ProfileSource,
    ) -> Self {
        Self {
            plugins,
            control,
            profiles,
            monitor: Monitor::default(),
            default_waittime: 15,
            sleeper: Box::new(ThreadSleeper),
        }
    }

    pub fn with_monitor(mut self, monitor: Monitor) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn with_default_waittime(mut self, seconds: u64) -> Self {
        self.default_waittime = seconds;
        self
    }

    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'a) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    /// Start `profile` and, depending on `options.mode`, see it through to
    /// the end of its lifetime.
    pub fn up(
        &mut self,
        profile: &Profile,
        ctx: &mut RunContext,
        options: UpOptions,
    ) -> Result<RunReport, RunError> {
        profile.validate()?;

        let mut report = RunReport::new(&profile.name);
        let span = tracing::info_span!("run", run_id = %report.run_id, profile = %profile.name);
        let _entered = span.enter();

        ctx.begin_profile(&profile.name);
        report.transition(RunState::Starting)?;

        let can_run = self.plugins.can_run_profile(profile, ctx);
        let pre_start = self.plugins.pre_profile_start(profile, ctx);
        if !(can_run && pre_start) {
            tracing::info!("start vetoed by plugin, skipping");
            report.finish(RunState::Stopped, RunOutcome::Skipped)?;
            return Ok(report);
        }

        ctx.set(START_TIME, Utc::now().to_rfc3339());
        if let Err(source) = self.launch(profile, ctx, options) {
            report.transition(RunState::Aborted)?;
            tracing::error!("launch failed: {}", source);
            return Err(RunError::Launch {
                profile: profile.name.clone(),
                source,
            });
        }

        report.transition(RunState::Running)?;
        tracing::info!("profile started");
        self.plugins.post_profile_start(profile, ctx);

        let lifetime = match (options.mode, profile.lifetime_duration()) {
            (KillMode::Detach, _) => {
                report.finish(RunState::Detached, RunOutcome::Detached)?;
                return Ok(report);
            }
            (_, None) => {
                tracing::warn!("kill requested but profile has no lifetime; leaving it running");
                report.finish(RunState::Detached, RunOutcome::Detached)?;
                return Ok(report);
            }
            (_, Some(lifetime)) => lifetime,
        };

        report.transition(RunState::MonitoringForKill)?;
        tracing::info!(lifetime_secs = lifetime.as_secs(), "monitoring until lifetime expires");

        let supervisor = Supervisor::new(self.control);
        let (outcome, monitor_state) = self.monitor.run(lifetime, self.sleeper.as_mut(), || {
            let missing = supervisor.missing(profile);
            for matcher in &missing {
                tracing::debug!("{} is not running", matcher);
            }
            missing.is_empty()
        });
        report.monitor = Some(monitor_state);

        let failed = outcome == MonitorOutcome::Failed;
        if failed {
            tracing::warn!(
                elapsed_secs = monitor_state.elapsed.as_secs(),
                "terminated due to repeated failure"
            );
            ctx.set_profile_failed(true);
            self.plugins.post_profile_start(profile, ctx);
        } else {
            tracing::info!("lifetime expired, stopping");
        }

        report.transition(RunState::Stopping)?;
        let killed = match options.mode {
            KillMode::KillAll => {
                let down = self.down_all(ctx)?;
                let blocked = down.blocked().any(|r| r.profile == profile.name);
                !blocked
            }
            _ => self.kill_profile(profile, ctx),
        };

        let outcome = if failed {
            RunOutcome::Failed
        } else if killed {
            RunOutcome::Completed
        } else {
            RunOutcome::KillBlocked
        };
        report.finish(RunState::Stopped, outcome)?;
        Ok(report)
    }

    /// Stop `profile`, or every known profile when `None`.
    pub fn down(
        &mut self,
        profile: Option<&Profile>,
        ctx: &mut RunContext,
    ) -> Result<DownReport, RunError> {
        match profile {
            Some(profile) => {
                let report = self.down_one(profile, ctx)?;
                Ok(DownReport {
                    reports: vec![report],
                    swept_emulators: false,
                })
            }
            None => self.down_all(ctx),
        }
    }

    fn down_one(&self, profile: &Profile, ctx: &mut RunContext) -> Result<RunReport, RunError> {
        let mut report = RunReport::new(&profile.name);
        let span = tracing::info_span!("down", run_id = %report.run_id, profile = %profile.name);
        let _entered = span.enter();

        report.transition(RunState::Stopping)?;
        let previous = ctx.profile_name.replace(profile.name.clone());
        let killed = self.kill_profile(profile, ctx);
        ctx.profile_name = previous;

        let outcome = if killed {
            RunOutcome::Completed
        } else {
            RunOutcome::KillBlocked
        };
        report.finish(RunState::Stopped, outcome)?;
        Ok(report)
    }

    fn down_all(&self, ctx: &mut RunContext) -> Result<DownReport, RunError> {
        let profiles = self.profiles.list_all()?;
        tracing::info!(count = profiles.len(), "stopping all profiles");

        let mut down = DownReport::default();
        for profile in &profiles {
            down.reports.push(self.down_one(profile, ctx)?);
        }

        if down.blocked().next().is_none() {
            match Supervisor::new(self.control).kill_all_emulators() {
                Ok(_) => down.swept_emulators = true,
                Err(e) => tracing::warn!("emulator sweep failed: {}", e),
            }
        } else {
            tracing::info!("a profile vetoed its kill, skipping emulator sweep");
        }
        Ok(down)
    }

    fn launch(
        &mut self,
        profile: &Profile,
        ctx: &mut RunContext,
        options: UpOptions,
    ) -> Result<(), mxx_process::ProcessError> {
        let supervisor = Supervisor::new(self.control);
        let args = json!({ "profile": profile.name });

        if profile.emulator.is_some() {
            self.plugins.emit(hooks::PRE_EMULATOR_START, &args, ctx);
            supervisor.launch_emulator(profile)?;
        }

        if profile.emulator.is_some() && profile.app.is_some() {
            let wait = options
                .waittime
                .map(std::time::Duration::from_secs)
                .unwrap_or_else(|| profile.waittime_or(self.default_waittime));
            let wait_args = json!({ "profile": profile.name, "seconds": wait.as_secs() });
            self.plugins.emit(hooks::PRE_WAIT_TIME, &wait_args, ctx);
            tracing::info!(seconds = wait.as_secs(), "waiting for emulator before starting app");
            self.sleeper.sleep(wait);
        }

        if profile.app.is_some() {
            self.plugins.emit(hooks::PRE_APP_LAUNCH, &args, ctx);
            supervisor.launch_app(profile)?;
        }
        Ok(())
    }

    /// Kill gate plus teardown. Returns false when a plugin vetoed.
    /// Teardown errors are logged; they don't undo the kill decision.
    fn kill_profile(&self, profile: &Profile, ctx: &mut RunContext) -> bool {
        let can_kill = self.plugins.can_kill_profile(profile, ctx);
        let pre_kill = self.plugins.pre_profile_kill(profile, ctx);
        if !(can_kill && pre_kill) {
            tracing::info!(profile = %profile.name, "kill vetoed by plugin");
            return false;
        }

        let supervisor = Supervisor::new(self.control);
        let args = json!({ "profile": profile.name });

        if profile.app.is_some() {
            self.plugins.emit(hooks::PRE_APP_KILL, &args, ctx);
            match supervisor.kill_app(profile) {
                Ok(count) => tracing::info!(profile = %profile.name, count, "app stopped"),
                Err(e) => tracing::warn!(profile = %profile.name, "failed to stop app: {}", e),
            }
        }
        if profile.emulator.is_some() {
            self.plugins.emit(hooks::PRE_EMULATOR_KILL, &args, ctx);
            if let Err(e) = supervisor.kill_emulator(profile) {
                tracing::warn!(profile = %profile.name, "failed to stop emulator: {}", e);
            }
        }

        self.plugins.post_profile_kill(profile, ctx);
        true
    }
}
