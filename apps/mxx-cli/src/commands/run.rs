// run.rs - Run subcommands: up, down, next, notify.
//
// up/down/next are wrapped in the command hooks:
//   pre_command (veto => command refused, nonzero exit)
//   -> command body
//   -> post_command with a JSON summary, or command_error on failure.
// Each named profile is handled on its own: a profile that fails to start,
// fails to stop, or whose monitoring gave up is reported and the remaining
// profiles still run. The command then fails (nonzero exit).

use anyhow::bail;
use chrono::NaiveDate;
use clap::Subcommand;
use serde_json::{json, Value};

use mxx_completion::{
    plan_next, CompletionStore, CompletionTracker, NextPlan, BY_COMPLETION, INCLUDE_FAILED,
};
use mxx_plugin::{DiscoveryOptions, PluginRegistry, RunContext};
use mxx_process::{
    Monitor, ProcessControl, SingleInstanceGuard, Sleeper, SystemProcessControl, ThreadSleeper,
};
use mxx_profile::{ProfileSource, ProfileStore};
use mxx_runner::{
    KillMode, MxxConfig, MxxPaths, ProfileResolver, ProfileRunner, RunOutcome, RunReport,
    UpOptions,
};

use super::notify::{self, NotifyCommands};

#[derive(Subcommand)]
pub enum RunCommands {
    /// Start one or more profiles.
    Up {
        /// Profile names, started in order.
        #[arg(required = true)]
        profiles: Vec<String>,
        /// Stop the profile's processes once its lifetime has elapsed.
        #[arg(long, conflicts_with = "kill_all")]
        kill: bool,
        /// Stop every managed process once the lifetime has elapsed.
        #[arg(long)]
        kill_all: bool,
        /// Seconds between emulator and app launch (overrides the profile).
        #[arg(long)]
        waittime: Option<u64>,
    },
    /// Stop profiles. Without names, stops every known profile.
    Down {
        /// Profile names.
        profiles: Vec<String>,
    },
    /// Run the first profile not yet completed today, then stop it.
    Next,
    /// Manage profiles whose early exit counts as success.
    Notify {
        #[command(subcommand)]
        command: NotifyCommands,
    },
}

impl RunCommands {
    fn name(&self) -> &'static str {
        match self {
            RunCommands::Up { .. } => "up",
            RunCommands::Down { .. } => "down",
            RunCommands::Next => "next",
            RunCommands::Notify { .. } => "notify",
        }
    }
}

pub fn execute(
    cmd: &RunCommands,
    paths: &MxxPaths,
    config: &MxxConfig,
    mut ctx: RunContext,
) -> anyhow::Result<()> {
    if let RunCommands::Notify { command } = cmd {
        return notify::execute(command, paths);
    }

    let registry = build_registry(paths, config)?;
    let store = ProfileStore::new(&paths.configs_dir)?;
    let completion = CompletionStore::new(&paths.completion_dir)?;
    let control = SystemProcessControl::new(config.emulator_console.clone());

    let session = Session {
        registry: &registry,
        control: &control,
        store: &store,
        completion: &completion,
        today: CompletionStore::today(),
        monitor: config.monitor(),
        default_waittime: config.default_waittime,
    };
    session.run(cmd, &mut ctx, ThreadSleeper).map(|_| ())
}

/// Built-in plugins first, then discovered external ones.
fn build_registry(paths: &MxxPaths, config: &MxxConfig) -> anyhow::Result<PluginRegistry> {
    let mut registry = PluginRegistry::new();
    if config.single_instance {
        registry.register(SingleInstanceGuard::new());
    }
    registry.register(CompletionTracker::new(CompletionStore::new(
        &paths.completion_dir,
    )?));

    if config.discover_plugins {
        let options = DiscoveryOptions::from_env(
            Some(paths.plugins_dir.clone()),
            config.plugin_timeout(),
        );
        let found = registry.discover(&options);
        tracing::debug!(count = found, "external plugins loaded");
    }
    Ok(registry)
}

/// What a run command works against.
struct Session<'a> {
    registry: &'a PluginRegistry,
    control: &'a dyn ProcessControl,
    store: &'a dyn ProfileSource,
    completion: &'a CompletionStore,
    today: NaiveDate,
    monitor: Monitor,
    default_waittime: u64,
}

impl Session<'_> {
    /// Run `cmd` inside the command hooks. Returns the post_command summary.
    fn run(
        &self,
        cmd: &RunCommands,
        ctx: &mut RunContext,
        sleeper: impl Sleeper + 'static,
    ) -> anyhow::Result<Value> {
        let command = cmd.name();
        if !self.registry.pre_command(command, ctx) {
            bail!("command '{}' blocked by a plugin", command);
        }

        let resolver = ProfileResolver::new(self.registry.profiles(ctx).to_vec(), self.store);
        let mut runner = ProfileRunner::new(self.registry, self.control, &resolver)
            .with_monitor(self.monitor)
            .with_default_waittime(self.default_waittime)
            .with_sleeper(sleeper);

        let result = match cmd {
            RunCommands::Up {
                profiles,
                kill,
                kill_all,
                waittime,
            } => {
                let mode = if *kill_all {
                    KillMode::KillAll
                } else if *kill {
                    KillMode::Kill
                } else {
                    KillMode::Detach
                };
                let options = UpOptions {
                    mode,
                    waittime: *waittime,
                };
                run_up(&mut runner, &resolver, profiles, ctx, options)
            }
            RunCommands::Down { profiles } => run_down(&mut runner, &resolver, profiles, ctx),
            RunCommands::Next => self.run_next(&mut runner, &resolver, ctx),
            RunCommands::Notify { .. } => Ok(json!({})),
        };

        match result {
            Ok(summary) => {
                self.registry.post_command(command, ctx, &summary);
                Ok(summary)
            }
            Err(e) => {
                self.registry.command_error(command, ctx, &format!("{:#}", e));
                Err(e)
            }
        }
    }

    fn run_next(
        &self,
        runner: &mut ProfileRunner<'_>,
        resolver: &ProfileResolver<'_>,
        ctx: &mut RunContext,
    ) -> anyhow::Result<Value> {
        let all: Vec<String> = resolver.list_all()?.into_iter().map(|p| p.name).collect();

        let plan = plan_next(self.completion, &all, self.today, ctx.flag(INCLUDE_FAILED));
        println!("{}", plan);
        let NextPlan::Run { profile, .. } = plan else {
            return Ok(json!({ "profiles": [] }));
        };

        ctx.set_var(BY_COMPLETION, "true");
        let options = UpOptions {
            mode: KillMode::Kill,
            waittime: None,
        };
        let mut tally = Tally::default();
        match start_one(runner, resolver, &profile, ctx, options) {
            Ok(report) => tally.report(report),
            Err(e) => tally.error(&profile, "starting", e),
        }
        tally.finish()
    }
}

fn start_one(
    runner: &mut ProfileRunner<'_>,
    resolver: &ProfileResolver<'_>,
    name: &str,
    ctx: &mut RunContext,
    options: UpOptions,
) -> anyhow::Result<RunReport> {
    let profile = resolver.get(name)?;
    Ok(runner.up(&profile, ctx, options)?)
}

fn run_up(
    runner: &mut ProfileRunner<'_>,
    resolver: &ProfileResolver<'_>,
    names: &[String],
    ctx: &mut RunContext,
    options: UpOptions,
) -> anyhow::Result<Value> {
    let mut tally = Tally::default();
    for name in names {
        match start_one(runner, resolver, name, ctx, options) {
            Ok(report) => tally.report(report),
            Err(e) => tally.error(name, "starting", e),
        }
    }
    tally.finish()
}

fn run_down(
    runner: &mut ProfileRunner<'_>,
    resolver: &ProfileResolver<'_>,
    names: &[String],
    ctx: &mut RunContext,
) -> anyhow::Result<Value> {
    let mut tally = Tally::default();
    if names.is_empty() {
        let down = runner.down(None, ctx)?;
        for report in down.reports {
            tally.report(report);
        }
        if down.swept_emulators {
            println!("All emulators stopped.");
        }
        return tally.finish();
    }

    for name in names {
        let stopped = resolver
            .get(name)
            .map_err(anyhow::Error::from)
            .and_then(|profile| Ok(runner.down(Some(&profile), ctx)?));
        match stopped {
            Ok(down) => {
                for report in down.reports {
                    tally.report(report);
                }
            }
            Err(e) => tally.error(name, "stopping", e),
        }
    }
    tally.finish()
}

/// Per-profile results of one command, in the order they happened.
#[derive(Default)]
struct Tally {
    reports: Vec<RunReport>,
    failed: Vec<String>,
}

impl Tally {
    fn report(&mut self, report: RunReport) {
        print_outcome(&report);
        if report.outcome.is_some_and(|o| !o.is_success()) {
            self.failed.push(report.profile.clone());
        }
        self.reports.push(report);
    }

    fn error(&mut self, name: &str, action: &str, error: anyhow::Error) {
        println!("Error {} profile {}: {:#}", action, name, error);
        tracing::error!(profile = name, "{:#}", error);
        self.failed.push(name.to_string());
    }

    /// JSON summary for post_command. Fails if any profile failed.
    fn finish(self) -> anyhow::Result<Value> {
        if !self.failed.is_empty() {
            bail!("profile(s) failed: {}", self.failed.join(", "));
        }

        let profiles: Vec<Value> = self
            .reports
            .iter()
            .map(|r| {
                json!({
                    "profile": r.profile,
                    "run_id": r.run_id.to_string(),
                    "outcome": r.outcome.map(|o| o.to_string()),
                })
            })
            .collect();
        Ok(json!({ "profiles": profiles }))
    }
}

fn print_outcome(report: &RunReport) {
    let name = &report.profile;
    match report.outcome {
        Some(RunOutcome::Detached) => println!("Started {}.", name),
        Some(RunOutcome::Completed) => println!("Stopped {}.", name),
        Some(RunOutcome::Failed) => {
            println!("{} terminated due to repeated failure.", name)
        }
        Some(RunOutcome::Skipped) => println!("Skipped {}: start blocked by a plugin.", name),
        Some(RunOutcome::KillBlocked) => {
            println!("{} left running: kill blocked by a plugin.", name)
        }
        None => {}
    }
}
