// resolver.rs - ProfileResolver: plugin-contributed profiles over the store.

use mxx_profile::{Profile, ProfileError, ProfileSource};

/// Looks a profile up among plugin-contributed profiles first, then in the
/// backing store.
pub struct ProfileResolver<'a> {
    contributed: Vec<Profile>,
    store: &'a dyn ProfileSource,
}

impl<'a> ProfileResolver<'a> {
    pub fn new(contributed: Vec<Profile>, store: &'a dyn ProfileSource) -> Self {
        Self { contributed, store }
    }

    /// Whether `name` comes from a plugin rather than the store.
    pub fn is_contributed(&self, name: &str) -> bool {
        self.contributed.iter().any(|p| p.name == name)
    }
}

impl ProfileSource for ProfileResolver<'_> {
    fn get(&self, name: &str) -> Result<Profile, ProfileError> {
        match self.contributed.iter().find(|p| p.name == name) {
            Some(profile) => Ok(profile.clone()),
            None => self.store.get(name),
        }
    }

    fn list_all(&self) -> Result<Vec<Profile>, ProfileError> {
        let mut all = self.contributed.clone();
        for profile in self.store.list_all()? {
            if !self.is_contributed(&profile.name) {
                all.push(profile);
            }
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contributed_profiles_shadow_the_store() {
        let store = vec![
            Profile::new("shared").with_lifetime(1),
            Profile::new("disk"),
        ];
        let resolver = ProfileResolver::new(vec![Profile::new("shared").with_lifetime(2)], &store);

        assert_eq!(resolver.get("shared").unwrap().lifetime, Some(2));
        assert_eq!(resolver.get("disk").unwrap().name, "disk");
        assert!(resolver.is_contributed("shared"));
        assert!(matches!(
            resolver.get("missing"),
            Err(ProfileError::NotFound(_))
        ));

        let names: Vec<String> = resolver.list_all().unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["shared", "disk"]);
    }
}
