//! The scheduled poll tick.
//!
//! Cadence lives with the external scheduler: a cron service hitting
//! `POST /api/v1/tasks/poll`, or `streamwatch poll <creator>` from crontab,
//! every ~5 minutes. This module is only the tick itself.

use tracing::debug;

use crate::AppState;

/// Run one poll tick for one creator.
///
/// Never fails: errors are contained inside the monitor (logged with
/// creator context), so the scheduler has nothing to retry against.
pub async fn run_poll_once(state: &AppState, creator: &str) {
    debug!(creator, "poll tick dispatched");
    state
        .monitors
        .monitor(creator)
        .poll_and_notify(creator)
        .await;
}
