//! Command route: any GET path is parsed as a command URI.

use crate::handlers::execute;
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn command_routes(state: AppState) -> Router {
    Router::new()
        .route("/*uri", get(execute))
        .with_state(state)
}
