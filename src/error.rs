//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("duplicate model alias: {0}")]
    DuplicateAlias(String),
    #[error("cyclic mapsTo configuration: {0}")]
    CyclicMapping(String),
    #[error("no model configured for alias '{0}'")]
    UnknownModel(String),
    #[error("no repository registered for backend '{0}'")]
    UnknownBackend(String),
    #[error("no function handler '{name}' registered for action {action}")]
    UnknownHandler { action: String, name: String },
    #[error("{0} must have a repository configured for persistence, but found none")]
    MissingRepository(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("cannot compile query for type '{type_name}': {message}")]
    Compile { type_name: String, message: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("repository: {0}")]
    Repository(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}

impl AppError {
    pub(crate) fn compile(type_name: &str, message: impl Into<String>) -> Self {
        AppError::Compile {
            type_name: type_name.to_string(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Repository(format!("document conversion: {}", err))
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::InvalidState(_) => (StatusCode::INTERNAL_SERVER_ERROR, "invalid_state"),
            AppError::Compile { .. } => (StatusCode::BAD_REQUEST, "compile_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Repository(_) => (StatusCode::INTERNAL_SERVER_ERROR, "repository_error"),
            AppError::Db(e) => {
                if let sqlx::Error::RowNotFound = e {
                    (StatusCode::NOT_FOUND, "not_found")
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
                }
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let details = match &self {
            AppError::Compile { type_name, .. } => Some(serde_json::json!({ "type": type_name })),
            _ => None,
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}
