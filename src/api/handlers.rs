use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::warn;

use crate::errors::AppError;
use crate::jobs;
use crate::monitor::MonitorRecord;
use crate::AppState;

/// Page-load path: validate the creator against the allow-list, lazily
/// populate the profile, and return the snapshot the page renders from.
///
/// An unlisted creator gets a 404 and a best-effort purge of whatever state
/// accumulated under that identifier; the purge may finish after the
/// response is gone.
pub async fn creator_page(
    State(state): State<Arc<AppState>>,
    Path(creator): Path<String>,
) -> Result<Json<MonitorRecord>, AppError> {
    if !state.config.creator_allowed(&creator) {
        warn!(creator = %creator, "rejected page load for unlisted creator");
        let monitors = state.monitors.clone();
        let purged = creator.clone();
        tokio::spawn(async move {
            if let Err(e) = monitors.purge(&purged).await {
                warn!(creator = %purged, error = %e, "purge of unlisted creator state failed");
            }
        });
        return Err(AppError::NotFound(format!("unknown creator: {creator}")));
    }

    let record = state.monitors.monitor(&creator).ensure_profile().await?;
    Ok(Json(record))
}

/// Read-only snapshot of the monitor record for display.
pub async fn creator_state(
    State(state): State<Arc<AppState>>,
    Path(creator): Path<String>,
) -> Result<Json<MonitorRecord>, AppError> {
    let record = state
        .monitors
        .monitor(&creator)
        .get_state()
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no state recorded for: {creator}")))?;
    Ok(Json(record))
}

/// Payload delivered by the external scheduler, one per poll tick.
#[derive(Debug, Deserialize)]
pub struct PollTask {
    pub creator: String,
}

/// Scheduler boundary.
///
/// Always answers 202: poll failures are contained inside the monitor, and
/// an immediate scheduler retry would not fix a flaky upstream anyway.
pub async fn poll_task(
    State(state): State<Arc<AppState>>,
    Json(task): Json<PollTask>,
) -> StatusCode {
    if task.creator.is_empty() {
        return StatusCode::BAD_REQUEST;
    }
    jobs::poll::run_poll_once(&state, &task.creator).await;
    StatusCode::ACCEPTED
}
