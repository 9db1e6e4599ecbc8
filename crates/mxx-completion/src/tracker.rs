// tracker.rs - CompletionTracker plugin.
//
// Inactive unless the run carries `--var by-completion`. When active:
//   pre_profile_start   optional reset, then veto if already done today
//   post_profile_start  record success = !profile_failed
//
// post_profile_start fires right after launch and again if monitoring
// gives up on the processes, so the second call overwrites the first.

use chrono::NaiveDate;

use mxx_plugin::{HookResult, Plugin, PluginError, RunContext};
use mxx_profile::Profile;

use crate::notify::NotifyList;
use crate::store::CompletionStore;
use crate::{BY_COMPLETION, INCLUDE_FAILED, RESET_COMPLETION};

pub struct CompletionTracker {
    store: CompletionStore,
    notify: NotifyList,
    date: Option<NaiveDate>,
}

impl CompletionTracker {
    pub fn new(store: CompletionStore) -> Self {
        let notify = NotifyList::in_dir(store.completion_dir());
        Self {
            store,
            notify,
            date: None,
        }
    }

    /// Pin the tracker to `date` instead of the local calendar day.
    pub fn on_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn store(&self) -> &CompletionStore {
        &self.store
    }

    fn date(&self) -> NaiveDate {
        self.date.unwrap_or_else(CompletionStore::today)
    }
}

impl Plugin for CompletionTracker {
    fn name(&self) -> &str {
        "completion"
    }

    fn pre_profile_start(&self, profile: &Profile, ctx: &mut RunContext) -> HookResult<Option<bool>> {
        if !ctx.flag(BY_COMPLETION) {
            return Ok(None);
        }
        let date = self.date();

        if ctx.flag(RESET_COMPLETION) {
            let existed = self
                .store
                .reset(&profile.name, date)
                .map_err(|e| PluginError::Failed(e.to_string()))?;
            if existed {
                tracing::info!(profile = %profile.name, "completion reset for {}", date);
            }
        }

        if self
            .store
            .is_completed(&profile.name, date, ctx.flag(INCLUDE_FAILED))
        {
            tracing::info!(profile = %profile.name, "already completed on {}, skipping", date);
            return Ok(Some(false));
        }
        Ok(None)
    }

    fn post_profile_start(&self, profile: &Profile, ctx: &mut RunContext) -> HookResult<()> {
        if !ctx.flag(BY_COMPLETION) {
            return Ok(());
        }

        let mut success = !ctx.profile_failed();
        if !success && self.notify.contains(&profile.name) {
            tracing::info!(profile = %profile.name, "early exit expected, counting as success");
            success = true;
        }

        self.store
            .record(&profile.name, self.date(), success)
            .map_err(|e| PluginError::Failed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn tracker(dir: &std::path::Path) -> CompletionTracker {
        CompletionTracker::new(CompletionStore::new(dir).unwrap()).on_date(day())
    }

    fn tracking_ctx(extra: &[&str]) -> RunContext {
        let mut args = vec![BY_COMPLETION];
        args.extend_from_slice(extra);
        let mut ctx = RunContext::from_var_args(args);
        ctx.begin_profile("alpha");
        ctx
    }

    #[test]
    fn inactive_without_by_completion() {
        let dir = tempdir().unwrap();
        let tracker = tracker(dir.path());
        tracker.store().record("alpha", day(), true).unwrap();
        let profile = Profile::new("alpha");
        let mut ctx = RunContext::new();

        assert_eq!(tracker.pre_profile_start(&profile, &mut ctx).unwrap(), None);
        tracker.post_profile_start(&profile, &mut ctx).unwrap();
        // Still the earlier record.
        assert_eq!(tracker.store().load(day()).len(), 1);
    }

    #[test]
    fn records_success_then_vetoes() {
        let dir = tempdir().unwrap();
        let tracker = tracker(dir.path());
        let profile = Profile::new("alpha");
        let mut ctx = tracking_ctx(&[]);

        assert_eq!(tracker.pre_profile_start(&profile, &mut ctx).unwrap(), None);
        tracker.post_profile_start(&profile, &mut ctx).unwrap();
        assert!(tracker.store().is_completed("alpha", day(), false));

        let mut again = tracking_ctx(&[]);
        assert_eq!(
            tracker.pre_profile_start(&profile, &mut again).unwrap(),
            Some(false)
        );
    }

    #[test]
    fn failure_is_retried_unless_include_failed() {
        let dir = tempdir().unwrap();
        let tracker = tracker(dir.path());
        let profile = Profile::new("beta");
        let mut ctx = tracking_ctx(&[]);
        ctx.set_profile_failed(true);
        tracker.post_profile_start(&profile, &mut ctx).unwrap();
        assert_eq!(tracker.store().load(day()).get("beta"), Some(&false));

        let mut retry = tracking_ctx(&[]);
        assert_eq!(tracker.pre_profile_start(&profile, &mut retry).unwrap(), None);

        let mut skip = tracking_ctx(&[INCLUDE_FAILED]);
        assert_eq!(
            tracker.pre_profile_start(&profile, &mut skip).unwrap(),
            Some(false)
        );
    }

    #[test]
    fn reset_allows_a_rerun() {
        let dir = tempdir().unwrap();
        let tracker = tracker(dir.path());
        tracker.store().record("alpha", day(), true).unwrap();
        let profile = Profile::new("alpha");

        let mut ctx = tracking_ctx(&[RESET_COMPLETION]);
        assert_eq!(tracker.pre_profile_start(&profile, &mut ctx).unwrap(), None);
        assert!(tracker.store().load(day()).is_empty());
    }

    #[test]
    fn notify_listed_failure_counts_as_success() {
        let dir = tempdir().unwrap();
        let tracker = tracker(dir.path());
        NotifyList::in_dir(dir.path()).add("alpha").unwrap();
        let profile = Profile::new("alpha");

        let mut ctx = tracking_ctx(&[]);
        ctx.set_profile_failed(true);
        tracker.post_profile_start(&profile, &mut ctx).unwrap();
        assert!(tracker.store().is_completed("alpha", day(), false));
    }

    #[test]
    fn explicit_false_disables_tracking() {
        let dir = tempdir().unwrap();
        let tracker = tracker(dir.path());
        let profile = Profile::new("alpha");
        let mut ctx = RunContext::from_var_args(["by-completion=false"]);
        tracker.post_profile_start(&profile, &mut ctx).unwrap();
        assert!(tracker.store().load(day()).is_empty());
    }
}
