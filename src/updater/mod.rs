//! Release feed checks and their schedule.

pub mod checker;
pub mod scheduler;
pub mod version;

pub use checker::{classify_status, retry_delay, FeedFailure, UpdateCheckOutcome, UpdateChecker};
pub use scheduler::{next_check_delay, UpdateScheduler};
pub use version::compare_versions;
