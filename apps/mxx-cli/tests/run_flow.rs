// run_flow.rs - End-to-end test of scheduled runs with completion tracking.
//
// Simulates a scheduler calling `mxx run next` repeatedly over two days:
//   day 1: alpha runs its lifetime and is recorded done; beta's app dies
//          and is recorded failed; the next call retries beta; with
//          include-failed there is nothing left for the day.
//   day 2: everything is incomplete again; beta is on the notify list,
//          so its early exit now counts as success.
//
// Profiles come from a real ProfileStore, completion records from a real
// CompletionStore, processes from a scripted ProcessControl.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use mxx_completion::{
    plan_next, CompletionStore, CompletionTracker, NextPlan, NotifyList, BY_COMPLETION,
    INCLUDE_FAILED,
};
use mxx_plugin::{PluginRegistry, RunContext};
use mxx_process::{ProcessControl, ProcessError, ProcessMatcher, Sleeper};
use mxx_profile::{EmulatorSlot, ProfileSource, ProfileStore};
use mxx_runner::{KillMode, ProfileResolver, ProfileRunner, RunOutcome, RunState, UpOptions};
use tempfile::TempDir;

/// Every app named `Dead.exe` has exited; everything else keeps running.
#[derive(Default)]
struct ScriptedControl {
    calls: Mutex<Vec<String>>,
}

impl ProcessControl for ScriptedControl {
    fn launch_detached(
        &self,
        program: &Path,
        _args: &[String],
        _cwd: Option<&Path>,
    ) -> Result<(), ProcessError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("launch {}", program.display()));
        Ok(())
    }

    fn launch_emulator(&self, slot: &EmulatorSlot) -> Result<(), ProcessError> {
        self.calls.lock().unwrap().push(format!("boot {}", slot));
        Ok(())
    }

    fn is_running(&self, matcher: &ProcessMatcher) -> bool {
        !matches!(matcher, ProcessMatcher::ExecutableName(name) if name == "Dead.exe")
    }

    fn kill_all(&self, matcher: &ProcessMatcher) -> Result<usize, ProcessError> {
        self.calls.lock().unwrap().push(format!("kill {}", matcher));
        Ok(1)
    }
}

#[derive(Clone, Default)]
struct FakeClock(Arc<Mutex<Duration>>);

impl Sleeper for FakeClock {
    fn sleep(&mut self, duration: Duration) {
        *self.0.lock().unwrap() += duration;
    }
}

struct Invocation {
    message: String,
    outcome: Option<RunOutcome>,
    history: Vec<RunState>,
}

/// The library calls behind one `mxx [--var ...] run next`, on `date`.
fn run_next(root: &Path, date: NaiveDate, vars: &[&str], control: &ScriptedControl) -> Invocation {
    let completion_dir = root.join("completion");
    let mut registry = PluginRegistry::new();
    registry.register(
        CompletionTracker::new(CompletionStore::new(&completion_dir).unwrap()).on_date(date),
    );

    let mut ctx = RunContext::from_var_args(vars);
    assert!(registry.pre_command("next", &mut ctx));

    let store = ProfileStore::new(root.join("configs")).unwrap();
    let resolver = ProfileResolver::new(registry.profiles(&ctx).to_vec(), &store);
    let all: Vec<String> = resolver
        .list_all()
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();

    let completion = CompletionStore::new(&completion_dir).unwrap();
    let plan = plan_next(&completion, &all, date, ctx.flag(INCLUDE_FAILED));
    let message = plan.to_string();
    let NextPlan::Run { profile, .. } = plan else {
        return Invocation {
            message,
            outcome: None,
            history: Vec::new(),
        };
    };

    ctx.set_var(BY_COMPLETION, "true");
    let profile = resolver.get(&profile).unwrap();
    let mut runner = ProfileRunner::new(&registry, control, &resolver)
        .with_default_waittime(15)
        .with_sleeper(FakeClock::default());
    let report = runner
        .up(
            &profile,
            &mut ctx,
            UpOptions {
                mode: KillMode::Kill,
                waittime: None,
            },
        )
        .unwrap();

    Invocation {
        message,
        outcome: report.outcome,
        history: report.history,
    }
}

fn write_profiles(root: &Path) {
    let configs = root.join("configs");
    fs::create_dir_all(&configs).unwrap();
    fs::write(
        configs.join("alpha.toml"),
        "lifetime = 5\nwaittime = 0\n[emulator]\nindex = 1\n[app]\npath = \"/opt/maa\"\napp = \"MAA.exe\"\n",
    )
    .unwrap();
    fs::write(
        configs.join("beta.toml"),
        "lifetime = 3600\nwaittime = 0\n[emulator]\nname = \"second\"\n[app]\npath = \"/opt/dead\"\napp = \"Dead.exe\"\n",
    )
    .unwrap();
}

#[test]
fn scheduled_runs_across_two_days() {
    let root = TempDir::new().unwrap();
    write_profiles(root.path());
    let control = ScriptedControl::default();
    let day1 = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
    let day2 = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
    let completion = CompletionStore::new(root.path().join("completion")).unwrap();

    // =========================================================
    // Day 1
    // =========================================================

    let first = run_next(root.path(), day1, &[], &control);
    assert_eq!(first.message, "2 of 2 incomplete, now running alpha.");
    assert_eq!(first.outcome, Some(RunOutcome::Completed));
    assert_eq!(
        first.history,
        vec![
            RunState::Idle,
            RunState::Starting,
            RunState::Running,
            RunState::MonitoringForKill,
            RunState::Stopping,
            RunState::Stopped,
        ]
    );
    assert!(completion.is_completed("alpha", day1, false));

    let second = run_next(root.path(), day1, &[], &control);
    assert_eq!(second.message, "1 of 2 incomplete, now running beta.");
    assert_eq!(second.outcome, Some(RunOutcome::Failed));
    assert_eq!(completion.load(day1).get("beta"), Some(&false));

    // A failure is retried on the next call.
    let retry = run_next(root.path(), day1, &[], &control);
    assert_eq!(retry.message, "1 of 2 incomplete, now running beta.");
    assert_eq!(retry.outcome, Some(RunOutcome::Failed));

    // ...unless failures count as done.
    let settled = run_next(root.path(), day1, &[INCLUDE_FAILED], &control);
    assert_eq!(settled.message, "All 2 profiles completed for today.");
    assert_eq!(settled.outcome, None);
    assert!(settled.history.is_empty());

    // Processes were stopped after every monitored run.
    let calls = control.calls.lock().unwrap().clone();
    assert!(calls.contains(&"kill executable /opt/maa/MAA.exe".to_string()));
    assert!(calls.contains(&"kill emulator name 'second'".to_string()));

    // =========================================================
    // Day 2
    // =========================================================

    NotifyList::in_dir(&root.path().join("completion"))
        .add("beta")
        .unwrap();

    let fresh = run_next(root.path(), day2, &[], &control);
    assert_eq!(fresh.message, "2 of 2 incomplete, now running alpha.");
    assert_eq!(fresh.outcome, Some(RunOutcome::Completed));

    let notified = run_next(root.path(), day2, &[], &control);
    assert_eq!(notified.message, "1 of 2 incomplete, now running beta.");
    // The run itself still failed, but the record counts it as done.
    assert_eq!(notified.outcome, Some(RunOutcome::Failed));
    assert!(completion.is_completed("beta", day2, false));

    let done = run_next(root.path(), day2, &[], &control);
    assert_eq!(done.message, "All 2 profiles completed for today.");
    assert_eq!(done.outcome, None);

    // Day 1's records are untouched.
    assert_eq!(completion.load(day1).get("beta"), Some(&false));
    assert_eq!(
        fs::read_dir(root.path().join("completion"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != "notify.json")
            .count(),
        2
    );
}

#[test]
fn tracking_is_inert_without_by_completion() {
    let root = TempDir::new().unwrap();
    write_profiles(root.path());
    let control = ScriptedControl::default();
    let day = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
    let completion_dir = root.path().join("completion");

    let mut registry = PluginRegistry::new();
    registry.register(
        CompletionTracker::new(CompletionStore::new(&completion_dir).unwrap()).on_date(day),
    );
    let store = ProfileStore::new(root.path().join("configs")).unwrap();
    let alpha = store.get("alpha").unwrap();
    let mut runner = ProfileRunner::new(&registry, &control, &store)
        .with_sleeper(FakeClock::default());

    // Plain `run up alpha` twice: never recorded, never skipped.
    for _ in 0..2 {
        let mut ctx = RunContext::new();
        let report = runner.up(&alpha, &mut ctx, UpOptions::default()).unwrap();
        assert_eq!(report.outcome, Some(RunOutcome::Detached));
    }
    let completion = CompletionStore::new(&completion_dir).unwrap();
    assert!(completion.load(day).is_empty());
}
