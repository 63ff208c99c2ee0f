//! Release completion watching.
//!
//! A webhook announces a release; CI uploads its artifacts over the next
//! quarter hour or so. The watcher claims the release, checks the asset list
//! on a timer, and updates the site cells once all four artifacts are there.

mod config;
mod recovery;
mod release;
mod scheduler;


pub use config::{DEFAULT_SUMMARY_URL_TEMPLATE, WatchConfig};
pub use recovery::{ELECTION_KEY, RecoveryOutcome, recover_pending};
pub use scheduler::{ManualScheduler, Scheduler, Task, TokioScheduler};
pub use release::{CheckOutcome, ReleaseWatcher, WatchError, WatchOutcome};
