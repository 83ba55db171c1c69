//! keepwarm-api — REST control surface for KeepWarm.
//!
//! Provides axum route handlers over the scheduler: target CRUD,
//! pause/resume, and the stats aggregate. This layer owns no scheduling
//! logic; every operation delegates to `SchedulerCore`.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/stats` | Aggregate counts (total/active/failing) |
//! | GET | `/api/v1/targets` | List all targets |
//! | POST | `/api/v1/targets` | Add a target |
//! | GET | `/api/v1/targets/{id}` | Get one target |
//! | DELETE | `/api/v1/targets/{id}` | Delete a target |
//! | POST | `/api/v1/targets/{id}/pause` | Stop probing |
//! | POST | `/api/v1/targets/{id}/resume` | Restart probing, counter reset |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use keepwarm_scheduler::SchedulerCore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub scheduler: Arc<SchedulerCore>,
}

/// Build the complete API router.
pub fn build_router(scheduler: Arc<SchedulerCore>) -> Router {
    let state = ApiState { scheduler };

    let api_routes = Router::new()
        .route("/stats", get(handlers::get_stats))
        .route(
            "/targets",
            get(handlers::list_targets).post(handlers::add_target),
        )
        .route(
            "/targets/{id}",
            get(handlers::get_target).delete(handlers::delete_target),
        )
        .route("/targets/{id}/pause", post(handlers::pause_target))
        .route("/targets/{id}/resume", post(handlers::resume_target))
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}
