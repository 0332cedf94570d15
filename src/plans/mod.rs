pub mod cache;
pub mod dto;
pub mod extractor;
pub mod fallback;
mod handlers;
pub mod hasher;
pub mod jobs;
pub mod orchestrator;
pub mod prompts;

use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::read_routes())
        .merge(handlers::write_routes())
}
