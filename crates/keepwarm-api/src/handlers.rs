//! REST API handlers.
//!
//! Each handler delegates to the scheduler and returns JSON responses.
//! Scheduler errors map onto HTTP statuses: `InvalidConfig` → 400,
//! `NotFound` → 404, store faults → 500.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;

use keepwarm_scheduler::SchedulerError;
use keepwarm_state::{NewTarget, ProbeMethod, TargetId};

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(err: &SchedulerError) -> impl IntoResponse {
    let status = match err {
        SchedulerError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
        SchedulerError::NotFound(_) => StatusCode::NOT_FOUND,
        SchedulerError::State(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(err.to_string()),
        }),
    )
}

/// Body for POST /api/v1/targets. Defaults: GET probes every 30-60
/// seconds, starting immediately.
#[derive(Debug, Deserialize)]
pub struct AddTargetRequest {
    pub url: String,
    #[serde(default)]
    pub credential: Option<String>,
    #[serde(default)]
    pub method: ProbeMethod,
    #[serde(default = "default_interval_min")]
    pub interval_min: u64,
    #[serde(default = "default_interval_max")]
    pub interval_max: u64,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_interval_min() -> u64 {
    30
}

fn default_interval_max() -> u64 {
    60
}

fn default_active() -> bool {
    true
}

/// GET /api/v1/stats
pub async fn get_stats(State(state): State<ApiState>) -> impl IntoResponse {
    match state.scheduler.stats() {
        Ok(stats) => ApiResponse::ok(stats).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// GET /api/v1/targets
pub async fn list_targets(State(state): State<ApiState>) -> impl IntoResponse {
    match state.scheduler.list() {
        Ok(targets) => ApiResponse::ok(targets).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// POST /api/v1/targets
pub async fn add_target(
    State(state): State<ApiState>,
    Json(req): Json<AddTargetRequest>,
) -> impl IntoResponse {
    let new = NewTarget {
        url: req.url,
        credential: req.credential,
        method: req.method,
        interval_min: req.interval_min,
        interval_max: req.interval_max,
        active: req.active,
    };
    match state.scheduler.add(new).await {
        Ok(target) => (StatusCode::CREATED, ApiResponse::ok(target)).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// GET /api/v1/targets/:id
pub async fn get_target(
    State(state): State<ApiState>,
    Path(id): Path<TargetId>,
) -> impl IntoResponse {
    match state.scheduler.get(id) {
        Ok(target) => ApiResponse::ok(target).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// DELETE /api/v1/targets/:id
pub async fn delete_target(
    State(state): State<ApiState>,
    Path(id): Path<TargetId>,
) -> impl IntoResponse {
    match state.scheduler.delete(id).await {
        Ok(()) => ApiResponse::ok(serde_json::json!({ "deleted": id })).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// POST /api/v1/targets/:id/pause
pub async fn pause_target(
    State(state): State<ApiState>,
    Path(id): Path<TargetId>,
) -> impl IntoResponse {
    match state.scheduler.pause(id).await {
        Ok(()) => ApiResponse::ok(serde_json::json!({ "paused": id })).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// POST /api/v1/targets/:id/resume
pub async fn resume_target(
    State(state): State<ApiState>,
    Path(id): Path<TargetId>,
) -> impl IntoResponse {
    match state.scheduler.resume(id).await {
        Ok(target) => ApiResponse::ok(target).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use keepwarm_prober::Prober;
    use keepwarm_scheduler::SchedulerCore;
    use keepwarm_state::TargetStore;

    fn test_state() -> ApiState {
        let store = TargetStore::open_in_memory().unwrap();
        let scheduler = SchedulerCore::new(store, Prober::with_timeout(Duration::from_millis(500)));
        ApiState {
            scheduler: Arc::new(scheduler),
        }
    }

    fn add_request(url: &str) -> AddTargetRequest {
        AddTargetRequest {
            url: url.to_string(),
            credential: None,
            method: ProbeMethod::Get,
            interval_min: 30,
            interval_max: 60,
            // Inactive so handler tests never hit the network.
            active: false,
        }
    }

    #[tokio::test]
    async fn stats_on_empty_store() {
        let state = test_state();
        let resp = get_stats(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn add_and_get_target() {
        let state = test_state();

        let resp = add_target(State(state.clone()), Json(add_request("https://app.example")))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = get_target(State(state), Path(1)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn add_invalid_url_is_bad_request() {
        let state = test_state();
        let resp = add_target(State(state), Json(add_request("not a url")))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn add_invalid_intervals_is_bad_request() {
        let state = test_state();
        let mut req = add_request("https://app.example");
        req.interval_min = 1;
        let resp = add_target(State(state), Json(req)).await.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_nonexistent_target_is_not_found() {
        let state = test_state();
        let resp = get_target(State(state), Path(42)).await.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn pause_and_resume_roundtrip() {
        let state = test_state();
        add_target(State(state.clone()), Json(add_request("https://app.example"))).await;

        let resp = pause_target(State(state.clone()), Path(1)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = resume_target(State(state.clone()), Path(1)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        state.scheduler.stop_all().await;
    }

    #[tokio::test]
    async fn pause_nonexistent_is_not_found() {
        let state = test_state();
        let resp = pause_target(State(state), Path(42)).await.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_target_then_delete_again() {
        let state = test_state();
        add_target(State(state.clone()), Json(add_request("https://app.example"))).await;

        let resp = delete_target(State(state.clone()), Path(1)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = delete_target(State(state), Path(1)).await.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
