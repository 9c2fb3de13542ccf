//! Command handler: parse the request path and query into a command and run it on a blocking thread.

use crate::command::{Action, Command};
use crate::error::AppError;
use crate::extractors::SessionHeaders;
use crate::response::{success_many, success_many_created};
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::Uri,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::sync::Arc;

pub async fn execute(
    State(state): State<AppState>,
    SessionHeaders(session): SessionHeaders,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let command = Command::parse(uri.path(), &params)?;
    let created = command.action() == Action::New;
    let gateway = Arc::clone(&state.gateway);
    let outputs = tokio::task::spawn_blocking(move || gateway.execute_command(command, session))
        .await
        .map_err(|e| AppError::InvalidState(format!("command task failed: {}", e)))??;
    Ok(if created {
        success_many_created(outputs.outputs).into_response()
    } else {
        success_many(outputs.outputs).into_response()
    })
}
