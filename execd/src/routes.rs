//! HTTP routes. Request validation failures return 422 with a
//! `{"detail": "..."}` body; job-level failures are folded into a 200
//! `ExecResult` instead — HTTP status encodes whether the job could run at
//! all, not whether the user's program succeeded.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use log::error;
use serde::Serialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use executor::{ExecRequest, Executor};

use crate::config::AppConfig;

/// Shared, read-only application state injected into every handler. No
/// module-level singleton: this is constructed once in `main` and cloned
/// (cheaply, via `Arc`) into axum's router.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub executor: Arc<Executor>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/v2/runtimes", get(runtimes))
        .route("/api/v2/execute", post(execute))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "name": state.config.api_title,
        "version": state.config.api_version,
        "status": "running",
    }))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    execution_mode: String,
    jail_installed: bool,
    jail_working: bool,
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let cap = sandbox::capability::probe();
    let jail_working = state.config.use_bubblewrap && cap.working;

    let execution_mode = if jail_working {
        "sandboxed (bubblewrap)".to_owned()
    } else if !state.config.use_bubblewrap {
        "direct (bubblewrap disabled by configuration)".to_owned()
    } else if cap.installed {
        "direct (bubblewrap installed but not working)".to_owned()
    } else {
        "direct (bubblewrap not installed)".to_owned()
    };

    Json(HealthResponse {
        status: if jail_working { "healthy" } else { "degraded" },
        execution_mode,
        jail_installed: cap.installed,
        jail_working: cap.working,
    })
}

#[derive(Serialize)]
struct RuntimeEntry {
    language: String,
    version: String,
    runtime: String,
}

async fn runtimes(State(state): State<AppState>) -> impl IntoResponse {
    let runtimes: Vec<RuntimeEntry> = state
        .executor
        .list_runtimes()
        .into_iter()
        .map(|(language, version)| {
            let runtime = format!("{}-{}", language, version);
            RuntimeEntry { language, version, runtime }
        })
        .collect();

    Json(json!({ "runtimes": runtimes }))
}

async fn execute(
    State(state): State<AppState>,
    Json(request): Json<ExecRequest>,
) -> impl IntoResponse {
    let limits = state.config.request_limits();
    if let Err(reason) = request.validate(&limits) {
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "detail": reason }))).into_response();
    }

    if !state.executor.is_language_supported(&request.language_lower()) {
        let detail = format!("language '{}' is not supported", request.language);
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "detail": detail }))).into_response();
    }

    // The job runs a real OS process for up to `time_limit` seconds on a
    // dedicated thread; spawn_blocking keeps it off the async runtime's
    // worker pool so concurrent jobs don't starve other handlers.
    let executor = state.executor.clone();
    let job_request = request.clone();
    let result = match tokio::task::spawn_blocking(move || executor.execute(&job_request)).await {
        Ok(result) => result,
        Err(join_err) => {
            error!("executor task did not complete: {}", join_err);
            executor::internal_error_result(&request, &join_err.to_string())
        }
    };
    (StatusCode::OK, Json(result)).into_response()
}
