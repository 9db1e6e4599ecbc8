// supervisor.rs - Supervisor: maps a Profile onto ProcessControl calls.

use mxx_profile::Profile;

use crate::control::{ProcessControl, ProcessMatcher};
use crate::error::ProcessError;

pub struct Supervisor<'a> {
    control: &'a dyn ProcessControl,
}

impl<'a> Supervisor<'a> {
    pub fn new(control: &'a dyn ProcessControl) -> Self {
        Self { control }
    }

    /// Boot the profile's emulator slot, if it has one.
    pub fn launch_emulator(&self, profile: &Profile) -> Result<(), ProcessError> {
        match &profile.emulator {
            Some(slot) => self.control.launch_emulator(slot),
            None => Ok(()),
        }
    }

    /// Start the profile's automation app detached, if it has one. The app
    /// runs with its install directory as working directory.
    pub fn launch_app(&self, profile: &Profile) -> Result<(), ProcessError> {
        match &profile.app {
            Some(app) => self
                .control
                .launch_detached(&app.executable_path(), &[], Some(&app.path)),
            None => Ok(()),
        }
    }

    /// What the lifetime monitor polls for this profile.
    pub fn liveness_matchers(profile: &Profile) -> Vec<ProcessMatcher> {
        let mut matchers = Vec::new();
        if let Some(slot) = &profile.emulator {
            matchers.push(ProcessMatcher::EmulatorSlot(slot.clone()));
        }
        if let Some(app) = &profile.app {
            matchers.push(ProcessMatcher::ExecutableName(app.executable_name()));
        }
        matchers
    }

    /// Expected processes that are not running.
    pub fn missing(&self, profile: &Profile) -> Vec<ProcessMatcher> {
        Self::liveness_matchers(profile)
            .into_iter()
            .filter(|m| !self.control.is_running(m))
            .collect()
    }

    pub fn is_alive(&self, profile: &Profile) -> bool {
        self.missing(profile).is_empty()
    }

    /// Stop the profile's app (matched by full executable path).
    pub fn kill_app(&self, profile: &Profile) -> Result<usize, ProcessError> {
        match &profile.app {
            Some(app) => self
                .control
                .kill_all(&ProcessMatcher::ExecutablePath(app.executable_path())),
            None => Ok(0),
        }
    }

    /// Quit the profile's emulator slot.
    pub fn kill_emulator(&self, profile: &Profile) -> Result<usize, ProcessError> {
        match &profile.emulator {
            Some(slot) => self
                .control
                .kill_all(&ProcessMatcher::EmulatorSlot(slot.clone())),
            None => Ok(0),
        }
    }

    /// Quit every emulator instance.
    pub fn kill_all_emulators(&self) -> Result<usize, ProcessError> {
        self.control.kill_all(&ProcessMatcher::AllEmulators)
    }
}
