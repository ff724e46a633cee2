//! Control API handlers.

use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use migrator_core::{Entity, WritePattern};
use migrator_engine::{RunInfo, SchedulerStatus};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, ApiResponse, CODE_OK};
use crate::router::MigratorState;

/// Request to start an incremental validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartIncrRequest {
    /// Only records modified at or after this time (epoch ms) are checked.
    #[serde(default)]
    pub utime: i64,
    /// Pause between empty scans, in milliseconds. Must be positive.
    pub sleep_interval_ms: i64,
}

fn apply_pattern<T: Entity>(state: &MigratorState<T>, pattern: WritePattern) -> ApiResponse {
    state.scheduler.set_pattern(pattern);
    info!(%pattern, "Write pattern set via control API");
    ApiResponse::ok()
}

pub async fn src_only<T: Entity>(State(state): State<MigratorState<T>>) -> ApiResponse {
    apply_pattern(&state, WritePattern::SrcOnly)
}

pub async fn src_first<T: Entity>(State(state): State<MigratorState<T>>) -> ApiResponse {
    apply_pattern(&state, WritePattern::SrcFirst)
}

pub async fn dst_first<T: Entity>(State(state): State<MigratorState<T>>) -> ApiResponse {
    apply_pattern(&state, WritePattern::DstFirst)
}

pub async fn dst_only<T: Entity>(State(state): State<MigratorState<T>>) -> ApiResponse {
    apply_pattern(&state, WritePattern::DstOnly)
}

/// Set the pattern named in the path.
pub async fn set_pattern<T: Entity>(
    State(state): State<MigratorState<T>>,
    Path(name): Path<String>,
) -> Result<ApiResponse, ApiError> {
    let pattern = name
        .parse::<WritePattern>()
        .map_err(|e| ApiError::InvalidParam(e.to_string()))?;
    Ok(apply_pattern(&state, pattern))
}

pub async fn start_full<T: Entity>(
    State(state): State<MigratorState<T>>,
) -> Result<ApiResponse<RunInfo>, ApiError> {
    let run = state.scheduler.start_full()?;
    Ok(ApiResponse::with_data(run))
}

pub async fn stop_full<T: Entity>(
    State(state): State<MigratorState<T>>,
) -> ApiResponse<RunInfo> {
    respond_stopped(state.scheduler.stop_full())
}

pub async fn start_incr<T: Entity>(
    State(state): State<MigratorState<T>>,
    body: Result<Json<StartIncrRequest>, JsonRejection>,
) -> Result<ApiResponse<RunInfo>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::InvalidParam(e.body_text()))?;

    let sleep_ms = u64::try_from(request.sleep_interval_ms)
        .ok()
        .filter(|ms| *ms > 0)
        .ok_or_else(|| {
            ApiError::InvalidParam(format!(
                "sleep_interval_ms must be positive, got {}",
                request.sleep_interval_ms
            ))
        })?;

    let run = state
        .scheduler
        .start_incr(request.utime, Duration::from_millis(sleep_ms))?;
    Ok(ApiResponse::with_data(run))
}

pub async fn stop_incr<T: Entity>(
    State(state): State<MigratorState<T>>,
) -> ApiResponse<RunInfo> {
    respond_stopped(state.scheduler.stop_incr())
}

pub async fn status<T: Entity>(
    State(state): State<MigratorState<T>>,
) -> ApiResponse<SchedulerStatus> {
    ApiResponse::with_data(state.scheduler.status())
}

fn respond_stopped(run: Option<RunInfo>) -> ApiResponse<RunInfo> {
    match run {
        Some(run) => ApiResponse::with_data(run),
        None => ApiResponse {
            code: CODE_OK,
            msg: "no active run".to_string(),
            data: None,
        },
    }
}
