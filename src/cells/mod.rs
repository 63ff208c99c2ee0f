//! Versioned configuration cells.
//!
//! A cell is a named JSON value shared by every worker through the keyed
//! store and mirrored to a local file for cold starts. The rendering layer
//! reads the site cells; the release watcher writes them.
//!
//! # Site Cells
//!
//! | name | type | written by |
//! |---|---|---|
//! | `lrelease` | version string | watcher |
//! | `lrelease_date` | `YYYY-MM-DD` | watcher |
//! | `pr_summary` | HTML fragment | watcher |
//! | `release_ids` | array of release ids | webhook, watcher |
//! | `crelease` | version string | manual promote |
//! | `crelease_date` | `YYYY-MM-DD` | manual promote |

use std::fmt;
use std::marker::PhantomData;

use serde_json::{Value, json};

use crate::types::ReleaseId;

mod store;

pub use store::{CellError, CellStore, SetOutcome};

/// Typed handle naming one cell.
pub struct ConfigCell<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ConfigCell<T> {
    pub const fn new(name: &'static str) -> Self {
        ConfigCell {
            name,
            _marker: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for ConfigCell<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ConfigCell<T> {}

impl<T> fmt::Debug for ConfigCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConfigCell").field(&self.name).finish()
    }
}

/// Version string of the latest nightly.
pub const LATEST_RELEASE: ConfigCell<String> = ConfigCell::new("lrelease");
/// Date the latest nightly was published on the site.
pub const LATEST_RELEASE_DATE: ConfigCell<String> = ConfigCell::new("lrelease_date");
/// Version string of the current stable release.
pub const CURRENT_RELEASE: ConfigCell<String> = ConfigCell::new("crelease");
/// Date of the current stable release.
pub const CURRENT_RELEASE_DATE: ConfigCell<String> = ConfigCell::new("crelease_date");
/// Releases announced by the webhook that are not complete yet.
pub const RELEASE_IDS: ConfigCell<Vec<ReleaseId>> = ConfigCell::new("release_ids");
/// `<li>` list of the change titles leading up to the latest nightly.
pub const PR_SUMMARY: ConfigCell<String> = ConfigCell::new("pr_summary");

/// Cells that must never be written back to an empty value.
pub(crate) const NON_REGRESSING: [&str; 2] = [LATEST_RELEASE.name(), CURRENT_RELEASE.name()];

/// Defaults used when neither the store nor the mirror has a value.
pub fn site_defaults() -> Vec<(&'static str, Value)> {
    vec![
        (LATEST_RELEASE.name(), json!("6.0.5067")),
        (LATEST_RELEASE_DATE.name(), json!("2024-01-21")),
        (CURRENT_RELEASE.name(), json!("6.0.5054")),
        (CURRENT_RELEASE_DATE.name(), json!("2024-01-13")),
        (RELEASE_IDS.name(), json!([])),
        (PR_SUMMARY.name(), json!("")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_site_cell_has_a_default() {
        let names: Vec<_> = site_defaults().into_iter().map(|(n, _)| n).collect();
        for cell in [
            LATEST_RELEASE.name(),
            LATEST_RELEASE_DATE.name(),
            CURRENT_RELEASE.name(),
            CURRENT_RELEASE_DATE.name(),
            RELEASE_IDS.name(),
            PR_SUMMARY.name(),
        ] {
            assert!(names.contains(&cell), "{cell} has no default");
        }
    }

    #[test]
    fn guarded_cells_default_to_non_empty() {
        for (name, value) in site_defaults() {
            if NON_REGRESSING.contains(&name) {
                assert_ne!(value, json!(""));
            }
        }
    }
}
