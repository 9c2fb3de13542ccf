//! Routers.

mod command;
mod common;

pub use command::command_routes;
pub use common::common_routes;

use crate::state::AppState;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Common and command routes with request tracing.
pub fn app(state: AppState) -> Router {
    common_routes()
        .merge(command_routes(state))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}
