//! # mxx-completion
//!
//! Lets a scheduler call `mxx` repeatedly and have each profile run at most
//! once per day.
//!
//! - [`CompletionStore`] persists `profile -> success` per calendar date,
//!   one JSON file per date.
//! - [`CompletionTracker`] is the plugin that consults the store before a
//!   start (vetoing finished profiles) and records the outcome after.
//!   It only acts when the run carries `--var by-completion`.
//! - [`plan_next`] picks the next profile still to do today.
//! - [`NotifyList`] names profiles whose early exit counts as success.

pub mod error;
pub mod next;
pub mod notify;
pub mod store;
pub mod tracker;

pub use error::CompletionError;
pub use next::{plan_next, NextPlan};
pub use notify::NotifyList;
pub use store::CompletionStore;
pub use tracker::CompletionTracker;

/// Var that switches completion tracking on for a run.
pub const BY_COMPLETION: &str = "by-completion";

/// Var that clears today's record for the profile before checking it.
pub const RESET_COMPLETION: &str = "reset-completion";

/// Var that treats a recorded failure as "done for today".
pub const INCLUDE_FAILED: &str = "include-failed";
