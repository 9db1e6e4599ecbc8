// registry.rs - PluginRegistry: ordered plugins and hook dispatch.
//
// Dispatch is sequential, in registration order. A plugin whose hook
// returns an error or panics is logged and treated as having no opinion;
// every other plugin still runs.
//
// Veto gates ask every plugin (no short circuit) and then AND the votes:
// one `Some(false)` blocks, `None` and failures count as "allow".

use std::any::Any;
use std::collections::HashSet;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use glob::Pattern;
use mxx_profile::Profile;
use serde_json::Value;

use crate::context::RunContext;
use crate::external::ExternalPlugin;
use crate::plugin::{hooks, HookResult, Plugin};

/// File-name patterns of external plugin executables.
const PLUGIN_PATTERNS: &[&str] = &["mxxp-*", "mxxp_*"];

/// Where and how to look for external plugins.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Development directory searched before `search_path` (usually `./plugins`).
    pub local_dir: Option<PathBuf>,
    /// Directories of installed plugins, normally the entries of `PATH`.
    pub search_path: Vec<PathBuf>,
    /// Per-call timeout for the plugins found.
    pub timeout: Duration,
}

impl DiscoveryOptions {
    /// Search `local_dir` and then every directory on `PATH`.
    pub fn from_env(local_dir: Option<PathBuf>, timeout: Duration) -> Self {
        let search_path = std::env::var_os("PATH")
            .map(|path| std::env::split_paths(&path).collect())
            .unwrap_or_default();
        Self {
            local_dir,
            search_path,
            timeout,
        }
    }
}

/// The set of plugins participating in one invocation.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Box<dyn Plugin>>,
    profiles: OnceLock<Vec<Profile>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plugin. Order of registration is dispatch order.
    pub fn register<P: Plugin + 'static>(&mut self, plugin: P) {
        self.register_boxed(Box::new(plugin));
    }

    pub fn register_boxed(&mut self, plugin: Box<dyn Plugin>) {
        tracing::debug!(plugin = plugin.name(), "registered plugin");
        self.plugins.push(plugin);
        self.profiles = OnceLock::new();
    }

    /// Drop every plugin and the cached profile list.
    pub fn clear(&mut self) {
        self.plugins.clear();
        self.profiles = OnceLock::new();
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Find and register external plugins. Returns how many were added.
    ///
    /// Candidates that fail the `describe` handshake are skipped with a
    /// warning. A name that is already registered is not registered again.
    pub fn discover(&mut self, options: &DiscoveryOptions) -> usize {
        let mut added = 0;
        for (name, path) in find_candidates(options) {
            if self.plugins.iter().any(|p| p.name() == name) {
                tracing::debug!(plugin = %name, path = %path.display(), "plugin already registered, skipping");
                continue;
            }
            match ExternalPlugin::describe(name.clone(), &path, Vec::new(), options.timeout) {
                Ok(plugin) => {
                    tracing::info!(plugin = %name, path = %path.display(), "loaded plugin");
                    self.register(plugin);
                    added += 1;
                }
                Err(e) => {
                    tracing::warn!(plugin = %name, path = %path.display(), "skipping plugin: {}", e)
                }
            }
        }
        added
    }

    /// Call `call` on every plugin and collect the successful results.
    pub fn dispatch<T>(
        &self,
        hook: &str,
        call: impl FnMut(&dyn Plugin) -> HookResult<T>,
    ) -> Vec<T> {
        self.dispatch_named(hook, call)
            .into_iter()
            .map(|(_, value)| value)
            .collect()
    }

    fn dispatch_named<T>(
        &self,
        hook: &str,
        mut call: impl FnMut(&dyn Plugin) -> HookResult<T>,
    ) -> Vec<(&str, T)> {
        let mut results = Vec::with_capacity(self.plugins.len());
        for plugin in &self.plugins {
            let plugin = plugin.as_ref();
            match panic::catch_unwind(AssertUnwindSafe(|| call(plugin))) {
                Ok(Ok(value)) => results.push((plugin.name(), value)),
                Ok(Err(e)) => {
                    tracing::warn!(plugin = plugin.name(), hook, "plugin hook failed: {}", e)
                }
                Err(payload) => tracing::warn!(
                    plugin = plugin.name(),
                    hook,
                    "plugin hook panicked: {}",
                    panic_message(payload.as_ref())
                ),
            }
        }
        results
    }

    /// Ask every plugin for a vote; `false` if any plugin voted `false`.
    pub fn dispatch_veto(
        &self,
        hook: &str,
        call: impl FnMut(&dyn Plugin) -> HookResult<Option<bool>>,
    ) -> bool {
        let mut allowed = true;
        for (name, vote) in self.dispatch_named(hook, call) {
            if vote == Some(false) {
                tracing::info!(plugin = name, hook, "vetoed");
                allowed = false;
            }
        }
        allowed
    }

    /// Fire a generic named hook and collect the values plugins returned.
    pub fn emit(&self, name: &str, args: &Value, ctx: &mut RunContext) -> Vec<Value> {
        self.dispatch(name, |p| p.hook(name, args, ctx))
            .into_iter()
            .flatten()
            .collect()
    }

    /// Profiles contributed by plugins; the first plugin to name a profile
    /// wins. Computed once and cached until the plugin set changes.
    pub fn profiles(&self, ctx: &RunContext) -> &[Profile] {
        self.profiles.get_or_init(|| {
            let mut seen = HashSet::new();
            let mut merged = Vec::new();
            for profile in self
                .dispatch(hooks::GET_PROFILES, |p| p.get_profiles(ctx))
                .into_iter()
                .flatten()
            {
                if profile.name.is_empty() {
                    tracing::warn!("ignoring plugin profile without a name");
                    continue;
                }
                if seen.insert(profile.name.clone()) {
                    merged.push(profile);
                }
            }
            merged
        })
    }

    pub fn pre_command(&self, command: &str, ctx: &mut RunContext) -> bool {
        self.dispatch_veto(hooks::PRE_COMMAND, |p| p.pre_command(command, ctx))
    }

    pub fn post_command(&self, command: &str, ctx: &mut RunContext, result: &Value) {
        self.dispatch(hooks::POST_COMMAND, |p| p.post_command(command, ctx, result));
    }

    pub fn command_error(&self, command: &str, ctx: &mut RunContext, error: &str) {
        self.dispatch(hooks::COMMAND_ERROR, |p| p.command_error(command, ctx, error));
    }

    pub fn pre_profile_start(&self, profile: &Profile, ctx: &mut RunContext) -> bool {
        self.dispatch_veto(hooks::PRE_PROFILE_START, |p| {
            p.pre_profile_start(profile, ctx)
        })
    }

    pub fn post_profile_start(&self, profile: &Profile, ctx: &mut RunContext) {
        self.dispatch(hooks::POST_PROFILE_START, |p| {
            p.post_profile_start(profile, ctx)
        });
    }

    pub fn pre_profile_kill(&self, profile: &Profile, ctx: &mut RunContext) -> bool {
        self.dispatch_veto(hooks::PRE_PROFILE_KILL, |p| p.pre_profile_kill(profile, ctx))
    }

    pub fn post_profile_kill(&self, profile: &Profile, ctx: &mut RunContext) {
        self.dispatch(hooks::POST_PROFILE_KILL, |p| p.post_profile_kill(profile, ctx));
    }

    pub fn can_run_profile(&self, profile: &Profile, ctx: &mut RunContext) -> bool {
        self.dispatch_veto(hooks::CAN_RUN_PROFILE, |p| p.can_run_profile(profile, ctx))
    }

    pub fn can_kill_profile(&self, profile: &Profile, ctx: &mut RunContext) -> bool {
        self.dispatch_veto(hooks::CAN_KILL_PROFILE, |p| p.can_kill_profile(profile, ctx))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Plugin executables in `local_dir` then `search_path`, as (name, path).
/// The first occurrence of each name wins.
pub(crate) fn find_candidates(options: &DiscoveryOptions) -> Vec<(String, PathBuf)> {
    let patterns: Vec<Pattern> = PLUGIN_PATTERNS
        .iter()
        .filter_map(|p| Pattern::new(p).ok())
        .collect();

    let mut seen = HashSet::new();
    let mut found = Vec::new();
    let dirs = options.local_dir.iter().chain(options.search_path.iter());
    for dir in dirs {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(dir = %dir.display(), "not scanning for plugins: {}", e);
                continue;
            }
        };
        let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
        paths.sort();

        for path in paths {
            let file_name = match path.file_name().and_then(|n| n.to_str()) {
                Some(n) => n,
                None => continue,
            };
            if !patterns.iter().any(|p| p.matches(file_name)) || !is_executable(&path) {
                continue;
            }
            let Some(name) = plugin_name(&path) else {
                continue;
            };
            if seen.insert(name.clone()) {
                found.push((name, path));
            }
        }
    }
    found
}

/// `mxxp-notify.exe` => `notify`.
fn plugin_name(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let name = stem
        .strip_prefix("mxxp-")
        .or_else(|| stem.strip_prefix("mxxp_"))?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(windows)]
fn is_executable(path: &Path) -> bool {
    let is_file = fs::metadata(path).map(|m| m.is_file()).unwrap_or(false);
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    is_file && matches!(ext.as_deref(), Some("exe" | "bat" | "cmd" | "com"))
}

#[cfg(not(any(unix, windows)))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
