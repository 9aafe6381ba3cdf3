//! Internal view of the performance monitor.

use axum::{extract::State, response::Json};

use crate::{AppState, timing::TimingStats};

/// Per-label timing statistics, sorted by label.
pub async fn get_timings(State(state): State<AppState>) -> Json<Vec<TimingStats>> {
    Json(state.monitor.snapshot())
}
