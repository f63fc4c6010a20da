//! Version-gated settings migrations run once after an upgrade.

use tracing::{error, info};

use crate::models::{
    ExtensionState, DEFAULT_CHECK_INTERVAL_MS, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_MS,
    LEGACY_CHECK_INTERVAL_MS, SETTINGS_VERSION,
};
use crate::updater::compare_versions;

pub struct Migration {
    /// First release that ships this step; it runs when upgrading from anything older.
    pub introduced_in: &'static str,
    pub name: &'static str,
    pub apply: fn(&mut ExtensionState) -> anyhow::Result<()>,
}

/// Ordered oldest first.
pub const MIGRATIONS: &[Migration] = &[Migration {
    introduced_in: "1.0.1",
    name: "update retry settings",
    apply: migrate_update_retry_settings,
}];

fn migrate_update_retry_settings(state: &mut ExtensionState) -> anyhow::Result<()> {
    let settings = &mut state.update_settings;
    if settings.max_retries == 0 {
        settings.max_retries = DEFAULT_MAX_RETRIES;
    }
    if settings.retry_delay == 0 {
        settings.retry_delay = DEFAULT_RETRY_DELAY_MS;
    }
    if settings.check_interval == LEGACY_CHECK_INTERVAL_MS {
        settings.check_interval = DEFAULT_CHECK_INTERVAL_MS;
        info!("Updated check interval from 24 hours to 1 hour");
    }
    state.settings_version = SETTINGS_VERSION.to_string();
    Ok(())
}

/// Run every step newer than `from`. A fresh install (`from == None`) runs nothing.
/// A failing step is logged and stops the remaining ones. Returns how many ran.
pub fn run_migrations(state: &mut ExtensionState, from: Option<&str>, to: &str) -> usize {
    run_steps(MIGRATIONS, state, from, to)
}

fn run_steps(
    steps: &[Migration],
    state: &mut ExtensionState,
    from: Option<&str>,
    to: &str,
) -> usize {
    let Some(from) = from else {
        info!("New installation detected, using default settings");
        return 0;
    };
    info!("Migrating settings from {} to {}", from, to);

    let mut applied = 0;
    for step in steps
        .iter()
        .filter(|step| compare_versions(from, step.introduced_in).is_lt())
    {
        if let Err(err) = (step.apply)(state) {
            error!(?err, migration = step.name, "Settings migration failed");
            break;
        }
        info!(migration = step.name, "Migration to {} completed", step.introduced_in);
        applied += 1;
    }
    applied
}
