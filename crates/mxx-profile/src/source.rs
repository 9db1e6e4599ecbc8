// source.rs - Where profiles come from.

use crate::error::ProfileError;
use crate::profile::Profile;

/// A read-only supplier of profiles.
///
/// The runner only needs lookup by name and a full listing; the TOML store,
/// plugin-contributed profiles and in-memory test fixtures all fit here.
pub trait ProfileSource {
    /// Look up a profile by name.
    fn get(&self, name: &str) -> Result<Profile, ProfileError>;

    /// Every profile this source knows, in a stable order.
    fn list_all(&self) -> Result<Vec<Profile>, ProfileError>;
}

impl ProfileSource for Vec<Profile> {
    fn get(&self, name: &str) -> Result<Profile, ProfileError> {
        self.iter()
            .find(|p| p.name == name)
            .cloned()
            .ok_or_else(|| ProfileError::NotFound(name.to_string()))
    }

    fn list_all(&self) -> Result<Vec<Profile>, ProfileError> {
        Ok(self.clone())
    }
}
