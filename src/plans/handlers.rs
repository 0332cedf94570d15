use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tracing::{error, instrument};

use super::dto::{GenerateOptions, GenerateOutcome};
use super::{hasher, orchestrator};
use crate::errors::GenerationError;
use crate::gateway::GatewayUser;
use crate::state::AppState;

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/plans", get(get_plan))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/plans/generate", post(generate_plan))
        .route("/plans", axum::routing::delete(invalidate_plan))
}

// --- handlers ---

/// POST /plans/generate — run (or schedule) the tiered generation pipeline.
#[instrument(skip(state, opts))]
pub async fn generate_plan(
    State(state): State<AppState>,
    GatewayUser(user_id): GatewayUser,
    opts: Option<Json<GenerateOptions>>,
) -> Result<Response, (StatusCode, String)> {
    let opts = opts.map(|Json(o)| o).unwrap_or_default();
    match orchestrator::generate(&state, user_id, opts).await {
        Ok(GenerateOutcome::Plan(plan)) => Ok(Json(plan).into_response()),
        Ok(GenerateOutcome::Started) => {
            Ok((StatusCode::ACCEPTED, Json(json!({"started": true}))).into_response())
        }
        Ok(GenerateOutcome::Pending) => {
            Ok((StatusCode::ACCEPTED, Json(json!({"pending": true}))).into_response())
        }
        Err(GenerationError::IncompleteOutput) => Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "Generation produced incomplete output".into(),
        )),
        Err(GenerationError::ProfileNotFound) => {
            Err((StatusCode::NOT_FOUND, "Profile not found".into()))
        }
        Err(e) => {
            error!(error = %e, %user_id, "generate_plan failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

/// GET /plans — the current cached plan, if still valid for the profile.
/// Poll target for prefetch callers.
#[instrument(skip(state))]
pub async fn get_plan(
    State(state): State<AppState>,
    GatewayUser(user_id): GatewayUser,
) -> Result<Response, (StatusCode, String)> {
    let snapshot = state
        .profiles
        .snapshot(user_id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "Profile not found".into()))?;
    let hash = hasher::plan_hash(&snapshot, snapshot.resolved_protein_target());

    match state.plan_cache.get(user_id, &hash).await.map_err(internal)? {
        Some(plan) => Ok(Json(super::dto::PlanResponse::from_cached(plan, 0)).into_response()),
        None if state.jobs.is_live(user_id) => {
            Ok((StatusCode::ACCEPTED, Json(json!({"pending": true}))).into_response())
        }
        None => Err((StatusCode::NOT_FOUND, "No plan available".into())),
    }
}

/// DELETE /plans — explicit invalidation; the next generate starts fresh.
#[instrument(skip(state))]
pub async fn invalidate_plan(
    State(state): State<AppState>,
    GatewayUser(user_id): GatewayUser,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .plan_cache
        .invalidate(user_id)
        .await
        .map_err(internal)?;
    Ok(StatusCode::NO_CONTENT)
}

fn internal<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
