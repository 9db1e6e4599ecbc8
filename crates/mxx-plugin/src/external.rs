// external.rs - ExternalPlugin: a plugin living in its own executable.
//
// Protocol (one process per hook call, JSON over stdio):
//   stdin  <- {"hook": "...", "command": "...", "profile": {...}, "context": {...}, "args": ...}
//   stdout -> {"vote": true|false|null, "context": {...}, "profiles": [...], "value": ...}
//
// At registration the executable receives `{"hook": "describe", ...}` and
// answers with a manifest listing the hooks it implements. Hooks missing
// from the manifest are answered locally with "no opinion" and never spawn
// the process. Empty stdout from a hook call counts as an empty response.
//
// The timeout covers both the process and its stdout: a plugin that exits
// but leaves a background child holding the pipe open also times out.

use std::collections::BTreeSet;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use mxx_profile::Profile;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::RunContext;
use crate::error::PluginError;
use crate::plugin::{hooks, HookResult, Plugin};

/// Hook name of the registration handshake.
pub const DESCRIBE: &str = "describe";

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// What an external plugin reports about itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default)]
    pub hooks: Vec<String>,
}

#[derive(Debug, Serialize)]
struct HookRequest<'a> {
    hook: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<&'a Profile>,
    context: &'a RunContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    args: Option<&'a Value>,
}

#[derive(Debug, Default, Deserialize)]
struct HookResponse {
    #[serde(default)]
    vote: Option<bool>,
    #[serde(default)]
    context: Map<String, Value>,
    #[serde(default)]
    profiles: Vec<Profile>,
    #[serde(default)]
    value: Option<Value>,
}

/// A plugin implemented by an external executable.
#[derive(Debug, Clone)]
pub struct ExternalPlugin {
    name: String,
    program: PathBuf,
    args: Vec<String>,
    hooks: BTreeSet<String>,
    timeout: Duration,
}

impl ExternalPlugin {
    /// Build an adapter with a known hook list, skipping the handshake.
    pub fn new(
        name: impl Into<String>,
        program: impl Into<PathBuf>,
        args: Vec<String>,
        hooks: impl IntoIterator<Item = impl Into<String>>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args,
            hooks: hooks.into_iter().map(Into::into).collect(),
            timeout,
        }
    }

    /// Run the `describe` handshake and build an adapter from the manifest.
    pub fn describe(
        name: impl Into<String>,
        program: impl Into<PathBuf>,
        args: Vec<String>,
        timeout: Duration,
    ) -> Result<Self, PluginError> {
        let mut plugin = Self::new(name, program, args, Vec::<String>::new(), timeout);
        let ctx = RunContext::default();
        let request = HookRequest {
            hook: DESCRIBE,
            command: None,
            profile: None,
            context: &ctx,
            args: None,
        };
        let output = plugin.exchange(&request)?;
        let manifest: PluginManifest =
            serde_json::from_str(output.trim()).map_err(|source| PluginError::Protocol {
                name: plugin.name.clone(),
                source,
            })?;

        if let Some(reported) = manifest.name.as_deref() {
            if reported != plugin.name {
                tracing::debug!(plugin = %plugin.name, reported, "plugin reports a different name");
            }
        }
        plugin.hooks = manifest.hooks.into_iter().collect();
        tracing::debug!(
            plugin = %plugin.name,
            hooks = ?plugin.hooks,
            version = manifest.version.as_deref().unwrap_or("-"),
            "described external plugin"
        );
        Ok(plugin)
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn hooks(&self) -> impl Iterator<Item = &str> {
        self.hooks.iter().map(String::as_str)
    }

    pub fn implements(&self, hook: &str) -> bool {
        self.hooks.contains(hook)
    }

    /// Call a hook that may update the context. Scratch updates returned by
    /// the plugin are merged into `ctx`.
    fn invoke(
        &self,
        hook: &str,
        command: Option<&str>,
        profile: Option<&Profile>,
        args: Option<&Value>,
        ctx: &mut RunContext,
    ) -> HookResult<HookResponse> {
        if !self.implements(hook) {
            return Ok(HookResponse::default());
        }
        let mut response = self.request(&HookRequest {
            hook,
            command,
            profile,
            context: ctx,
            args,
        })?;
        ctx.merge_scratch(std::mem::take(&mut response.context));
        Ok(response)
    }

    fn request(&self, request: &HookRequest<'_>) -> HookResult<HookResponse> {
        let output = self.exchange(request)?;
        let output = output.trim();
        if output.is_empty() {
            return Ok(HookResponse::default());
        }
        serde_json::from_str(output).map_err(|source| PluginError::Protocol {
            name: self.name.clone(),
            source,
        })
    }

    /// Spawn the plugin, send one request, and collect its stdout.
    fn exchange(&self, request: &HookRequest<'_>) -> HookResult<String> {
        let mut input = serde_json::to_vec(request).map_err(|source| PluginError::Protocol {
            name: self.name.clone(),
            source,
        })?;
        input.push(b'\n');

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| PluginError::Spawn {
                path: self.program.display().to_string(),
                source,
            })?;

        // Drain stdout on a separate thread so a chatty plugin can't block on
        // a full pipe while we wait for it to exit.
        let reader = child.stdout.take().map(|mut stdout| {
            let (tx, rx) = mpsc::channel();
            thread::spawn(move || {
                let mut buf = String::new();
                let _ = tx.send(stdout.read_to_string(&mut buf).map(|_| buf));
            });
            rx
        });

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(source) = stdin.write_all(&input) {
                // A plugin may exit without reading its request.
                if source.kind() != ErrorKind::BrokenPipe {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(PluginError::Io {
                        name: self.name.clone(),
                        source,
                    });
                }
            }
        }

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(PluginError::Timeout {
                        name: self.name.clone(),
                        seconds: self.timeout.as_secs(),
                    });
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(source) => {
                    return Err(PluginError::Io {
                        name: self.name.clone(),
                        source,
                    })
                }
            }
        };

        let output = match reader {
            Some(rx) => match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                Ok(read) => read.map_err(|source| PluginError::Io {
                    name: self.name.clone(),
                    source,
                })?,
                Err(RecvTimeoutError::Timeout) => {
                    tracing::warn!(plugin = %self.name, "plugin exited but its stdout is still open");
                    return Err(PluginError::Timeout {
                        name: self.name.clone(),
                        seconds: self.timeout.as_secs(),
                    });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(PluginError::Failed(format!(
                        "plugin {}: stdout reader panicked",
                        self.name
                    )))
                }
            },
            None => String::new(),
        };

        if !status.success() {
            return Err(PluginError::Exit {
                name: self.name.clone(),
                status: status.to_string(),
            });
        }
        Ok(output)
    }
}

impl Plugin for ExternalPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn pre_command(&self, command: &str, ctx: &mut RunContext) -> HookResult<Option<bool>> {
        Ok(self
            .invoke(hooks::PRE_COMMAND, Some(command), None, None, ctx)?
            .vote)
    }

    fn post_command(&self, command: &str, ctx: &mut RunContext, result: &Value) -> HookResult<()> {
        self.invoke(hooks::POST_COMMAND, Some(command), None, Some(result), ctx)?;
        Ok(())
    }

    fn command_error(&self, command: &str, ctx: &mut RunContext, error: &str) -> HookResult<()> {
        let args = serde_json::json!({ "error": error });
        self.invoke(hooks::COMMAND_ERROR, Some(command), None, Some(&args), ctx)?;
        Ok(())
    }

    fn pre_profile_start(&self, profile: &Profile, ctx: &mut RunContext) -> HookResult<Option<bool>> {
        Ok(self
            .invoke(hooks::PRE_PROFILE_START, None, Some(profile), None, ctx)?
            .vote)
    }

    fn post_profile_start(&self, profile: &Profile, ctx: &mut RunContext) -> HookResult<()> {
        self.invoke(hooks::POST_PROFILE_START, None, Some(profile), None, ctx)?;
        Ok(())
    }

    fn pre_profile_kill(&self, profile: &Profile, ctx: &mut RunContext) -> HookResult<Option<bool>> {
        Ok(self
            .invoke(hooks::PRE_PROFILE_KILL, None, Some(profile), None, ctx)?
            .vote)
    }

    fn post_profile_kill(&self, profile: &Profile, ctx: &mut RunContext) -> HookResult<()> {
        self.invoke(hooks::POST_PROFILE_KILL, None, Some(profile), None, ctx)?;
        Ok(())
    }

    fn can_run_profile(&self, profile: &Profile, ctx: &mut RunContext) -> HookResult<Option<bool>> {
        Ok(self
            .invoke(hooks::CAN_RUN_PROFILE, None, Some(profile), None, ctx)?
            .vote)
    }

    fn can_kill_profile(&self, profile: &Profile, ctx: &mut RunContext) -> HookResult<Option<bool>> {
        Ok(self
            .invoke(hooks::CAN_KILL_PROFILE, None, Some(profile), None, ctx)?
            .vote)
    }

    fn get_profiles(&self, ctx: &RunContext) -> HookResult<Vec<Profile>> {
        if !self.implements(hooks::GET_PROFILES) {
            return Ok(Vec::new());
        }
        let response = self.request(&HookRequest {
            hook: hooks::GET_PROFILES,
            command: None,
            profile: None,
            context: ctx,
            args: None,
        })?;
        Ok(response.profiles)
    }

    fn hook(&self, name: &str, args: &Value, ctx: &mut RunContext) -> HookResult<Option<Value>> {
        Ok(self.invoke(name, None, None, Some(args), ctx)?.value)
    }
}
