// context.rs - RunContext: the key/value bag every hook sees.
//
// One RunContext exists per CLI invocation. It carries:
//   - `vars`: parsed `--var` flags (`--var key` => "true", `--var k=v` => "v")
//   - `profile_name`: the profile currently being run
//   - `scratch`: free-form JSON values plugins set and read (`profile_failed`,
//     `start_time`, ...)
//
// It is serialized as-is into the external plugin protocol.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Scratch key set when monitoring gave up on a profile.
pub const PROFILE_FAILED: &str = "profile_failed";

/// Scratch key holding the RFC 3339 time the current profile was started.
pub const START_TIME: &str = "start_time";

/// Mutable per-invocation state shared with plugins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunContext {
    #[serde(default)]
    pub vars: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_name: Option<String>,

    #[serde(default)]
    pub scratch: Map<String, Value>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from raw `--var` arguments. Malformed entries
    /// (empty keys) are skipped.
    pub fn from_var_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ctx = Self::new();
        for arg in args {
            match parse_var(arg.as_ref()) {
                Some((key, value)) => {
                    ctx.vars.insert(key, value);
                }
                None => tracing::warn!("ignoring malformed --var '{}'", arg.as_ref()),
            }
        }
        ctx
    }

    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn set_var(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Whether a flag-style var is switched on.
    ///
    /// `--var key` stores "true"; an explicit `false`, `0` or `no` turns the
    /// flag off again.
    pub fn flag(&self, key: &str) -> bool {
        match self.var(key) {
            Some(value) => !matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "false" | "0" | "no"
            ),
            None => false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.scratch.get(key)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.scratch.get(key).and_then(Value::as_bool)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.scratch.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.scratch.remove(key)
    }

    /// Merge scratch updates returned by a plugin. Later writers win.
    pub fn merge_scratch(&mut self, updates: Map<String, Value>) {
        for (key, value) in updates {
            self.scratch.insert(key, value);
        }
    }

    pub fn profile_failed(&self) -> bool {
        self.get_bool(PROFILE_FAILED).unwrap_or(false)
    }

    pub fn set_profile_failed(&mut self, failed: bool) {
        self.set(PROFILE_FAILED, failed);
    }

    /// Point the context at a new profile, clearing per-profile scratch state.
    pub fn begin_profile(&mut self, name: &str) {
        self.profile_name = Some(name.to_string());
        self.scratch.remove(PROFILE_FAILED);
        self.scratch.remove(START_TIME);
    }
}

/// Parse one `--var` argument.
///
/// `key` => (key, "true"); `key=value` => (key, value). Whitespace around
/// key and value is trimmed. Returns `None` for an empty key.
pub fn parse_var(arg: &str) -> Option<(String, String)> {
    let (key, value) = match arg.split_once('=') {
        Some((key, value)) => (key.trim(), value.trim()),
        None => (arg.trim(), "true"),
    };
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_var_is_true() {
        assert_eq!(
            parse_var("by-completion"),
            Some(("by-completion".into(), "true".into()))
        );
    }

    #[test]
    fn key_value_var_keeps_literal_value() {
        assert_eq!(parse_var("mode=fast"), Some(("mode".into(), "fast".into())));
        // Only the first '=' splits.
        assert_eq!(parse_var("expr=a=b"), Some(("expr".into(), "a=b".into())));
        assert_eq!(parse_var(" x = 1 "), Some(("x".into(), "1".into())));
    }

    #[test]
    fn empty_key_is_rejected() {
        assert_eq!(parse_var("=oops"), None);
        assert_eq!(parse_var(""), None);
    }

    #[test]
    fn from_var_args_collects_and_skips_malformed() {
        let ctx = RunContext::from_var_args(["by-completion", "=bad", "note=hi"]);
        assert_eq!(ctx.vars.len(), 2);
        assert_eq!(ctx.var("note"), Some("hi"));
        assert!(ctx.flag("by-completion"));
    }

    #[test]
    fn flag_honours_explicit_false() {
        let ctx = RunContext::from_var_args(["a=false", "b=0", "c=yes", "d"]);
        assert!(!ctx.flag("a"));
        assert!(!ctx.flag("b"));
        assert!(ctx.flag("c"));
        assert!(ctx.flag("d"));
        assert!(!ctx.flag("missing"));
    }

    #[test]
    fn begin_profile_resets_failure_flag() {
        let mut ctx = RunContext::new();
        ctx.begin_profile("alpha");
        ctx.set_profile_failed(true);
        ctx.set("custom", 3);
        assert!(ctx.profile_failed());

        ctx.begin_profile("beta");
        assert_eq!(ctx.profile_name.as_deref(), Some("beta"));
        assert!(!ctx.profile_failed());
        // Plugin-owned keys survive.
        assert_eq!(ctx.get("custom"), Some(&Value::from(3)));
    }

    #[test]
    fn merge_scratch_overwrites_existing_keys() {
        let mut ctx = RunContext::new();
        ctx.set("k", 1);
        let mut updates = Map::new();
        updates.insert("k".into(), Value::from(2));
        updates.insert("new".into(), Value::from("x"));
        ctx.merge_scratch(updates);
        assert_eq!(ctx.get("k"), Some(&Value::from(2)));
        assert_eq!(ctx.get("new"), Some(&Value::from("x")));
    }
}
