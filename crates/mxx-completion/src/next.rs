// next.rs - Pick the next profile that still has work today.

use std::fmt;

use chrono::NaiveDate;

use crate::store::CompletionStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPlan {
    /// Nothing left to do. `total` is 0 when no profiles exist at all.
    AllComplete { total: usize },
    /// Run `profile`, the first of `incomplete`.
    Run {
        profile: String,
        incomplete: Vec<String>,
        total: usize,
    },
}

impl fmt::Display for NextPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextPlan::AllComplete { total: 0 } => write!(f, "No profiles found."),
            NextPlan::AllComplete { total } => {
                write!(f, "All {} profiles completed for today.", total)
            }
            NextPlan::Run {
                profile,
                incomplete,
                total,
            } => write!(
                f,
                "{} of {} incomplete, now running {}.",
                incomplete.len(),
                total,
                profile
            ),
        }
    }
}

/// Choose from `all` (in order) the first profile not completed on `date`.
///
/// With `include_failed` a recorded failure counts as done, matching the
/// tracker's start gate, so the chosen profile is one it will let through.
pub fn plan_next(
    store: &CompletionStore,
    all: &[String],
    date: NaiveDate,
    include_failed: bool,
) -> NextPlan {
    let mut incomplete = store.get_incomplete(all, date);
    if include_failed {
        let record = store.load(date);
        incomplete.retain(|name| !record.contains_key(name));
    }
    match incomplete.first() {
        Some(first) => NextPlan::Run {
            profile: first.clone(),
            incomplete: incomplete.clone(),
            total: all.len(),
        },
        None => NextPlan::AllComplete { total: all.len() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn runs_the_only_incomplete_profile() {
        let dir = tempdir().unwrap();
        let store = CompletionStore::new(dir.path()).unwrap();
        store.record("a", day(), true).unwrap();
        store.record("c", day(), true).unwrap();

        let plan = plan_next(&store, &names(&["a", "b", "c"]), day(), false);
        assert_eq!(
            plan,
            NextPlan::Run {
                profile: "b".into(),
                incomplete: names(&["b"]),
                total: 3,
            }
        );
        assert_eq!(plan.to_string(), "1 of 3 incomplete, now running b.");
    }

    #[test]
    fn failed_profiles_stay_in_input_order() {
        let dir = tempdir().unwrap();
        let store = CompletionStore::new(dir.path()).unwrap();
        store.record("a", day(), false).unwrap();

        let plan = plan_next(&store, &names(&["a", "b"]), day(), false);
        assert_eq!(plan.to_string(), "2 of 2 incomplete, now running a.");
    }

    #[test]
    fn nothing_left() {
        let dir = tempdir().unwrap();
        let store = CompletionStore::new(dir.path()).unwrap();
        store.record("a", day(), true).unwrap();

        let plan = plan_next(&store, &names(&["a"]), day(), false);
        assert_eq!(plan, NextPlan::AllComplete { total: 1 });
        assert_eq!(plan.to_string(), "All 1 profiles completed for today.");
        assert_eq!(
            plan_next(&store, &[], day(), false).to_string(),
            "No profiles found."
        );
    }

    #[test]
    fn include_failed_passes_over_recorded_failures() {
        let dir = tempdir().unwrap();
        let store = CompletionStore::new(dir.path()).unwrap();
        store.record("a", day(), true).unwrap();
        store.record("b", day(), false).unwrap();

        let all = names(&["a", "b", "c"]);
        assert_eq!(
            plan_next(&store, &all, day(), true).to_string(),
            "1 of 3 incomplete, now running c."
        );

        store.record("c", day(), false).unwrap();
        assert_eq!(
            plan_next(&store, &all, day(), true),
            NextPlan::AllComplete { total: 3 }
        );
        // Without the flag the failures are retried.
        assert_eq!(
            plan_next(&store, &all, day(), false).to_string(),
            "2 of 3 incomplete, now running b."
        );
    }
}
