// plugin.rs - The Plugin trait: every hook a plugin may implement.
//
// All methods have a default "no opinion" body, so a plugin only overrides
// the hooks it cares about. Veto hooks return `Ok(None)` when the plugin
// abstains, `Ok(Some(false))` to block and `Ok(Some(true))` to allow.

use mxx_profile::Profile;
use serde_json::Value;

use crate::context::RunContext;
use crate::error::PluginError;

/// Result type for every hook.
pub type HookResult<T> = Result<T, PluginError>;

/// Hook names, as used in logs and the external plugin protocol.
pub mod hooks {
    pub const PRE_COMMAND: &str = "pre_command";
    pub const POST_COMMAND: &str = "post_command";
    pub const COMMAND_ERROR: &str = "command_error";
    pub const PRE_PROFILE_START: &str = "pre_profile_start";
    pub const POST_PROFILE_START: &str = "post_profile_start";
    pub const PRE_PROFILE_KILL: &str = "pre_profile_kill";
    pub const POST_PROFILE_KILL: &str = "post_profile_kill";
    pub const CAN_RUN_PROFILE: &str = "can_run_profile";
    pub const CAN_KILL_PROFILE: &str = "can_kill_profile";
    pub const GET_PROFILES: &str = "get_profiles";

    // Generic named hooks emitted between launch and kill steps.
    pub const PRE_EMULATOR_START: &str = "pre_emulator_start";
    pub const PRE_WAIT_TIME: &str = "pre_wait_time";
    pub const PRE_APP_LAUNCH: &str = "pre_app_launch";
    pub const PRE_APP_KILL: &str = "pre_app_kill";
    pub const PRE_EMULATOR_KILL: &str = "pre_emulator_kill";
}

/// A participant in the mxx lifecycle.
///
/// Plugins must be `Send + Sync` so a registry can be shared behind a
/// reference for the whole invocation.
pub trait Plugin: Send + Sync {
    /// Plugin name, used in logs.
    fn name(&self) -> &str;

    /// Before a CLI command runs. Vote `false` to refuse the command.
    fn pre_command(&self, _command: &str, _ctx: &mut RunContext) -> HookResult<Option<bool>> {
        Ok(None)
    }

    /// After a CLI command finished. `result` is a small JSON summary.
    fn post_command(
        &self,
        _command: &str,
        _ctx: &mut RunContext,
        _result: &Value,
    ) -> HookResult<()> {
        Ok(())
    }

    /// A CLI command failed with `error`.
    fn command_error(&self, _command: &str, _ctx: &mut RunContext, _error: &str) -> HookResult<()> {
        Ok(())
    }

    fn pre_profile_start(
        &self,
        _profile: &Profile,
        _ctx: &mut RunContext,
    ) -> HookResult<Option<bool>> {
        Ok(None)
    }

    /// Called once the profile's processes were launched, and again with
    /// `profile_failed` set if monitoring later gave up on them.
    fn post_profile_start(&self, _profile: &Profile, _ctx: &mut RunContext) -> HookResult<()> {
        Ok(())
    }

    fn pre_profile_kill(
        &self,
        _profile: &Profile,
        _ctx: &mut RunContext,
    ) -> HookResult<Option<bool>> {
        Ok(None)
    }

    fn post_profile_kill(&self, _profile: &Profile, _ctx: &mut RunContext) -> HookResult<()> {
        Ok(())
    }

    fn can_run_profile(
        &self,
        _profile: &Profile,
        _ctx: &mut RunContext,
    ) -> HookResult<Option<bool>> {
        Ok(None)
    }

    fn can_kill_profile(
        &self,
        _profile: &Profile,
        _ctx: &mut RunContext,
    ) -> HookResult<Option<bool>> {
        Ok(None)
    }

    /// Profiles this plugin contributes in addition to the on-disk store.
    fn get_profiles(&self, _ctx: &RunContext) -> HookResult<Vec<Profile>> {
        Ok(Vec::new())
    }

    /// Generic named hook. Return `Some(value)` to contribute a result.
    fn hook(&self, _name: &str, _args: &Value, _ctx: &mut RunContext) -> HookResult<Option<Value>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Empty;

    impl Plugin for Empty {
        fn name(&self) -> &str {
            "empty"
        }
    }

    #[test]
    fn plugin_with_no_hooks_has_no_opinion() {
        let plugin = Empty;
        let profile = Profile::new("p");
        let mut ctx = RunContext::new();

        assert_eq!(plugin.pre_command("up", &mut ctx).unwrap(), None);
        assert_eq!(plugin.pre_profile_start(&profile, &mut ctx).unwrap(), None);
        assert_eq!(plugin.pre_profile_kill(&profile, &mut ctx).unwrap(), None);
        assert_eq!(plugin.can_run_profile(&profile, &mut ctx).unwrap(), None);
        assert_eq!(plugin.can_kill_profile(&profile, &mut ctx).unwrap(), None);
        assert!(plugin.get_profiles(&ctx).unwrap().is_empty());
        assert_eq!(plugin.hook("x", &Value::Null, &mut ctx).unwrap(), None);
        assert_eq!(ctx, RunContext::new());
    }
}
