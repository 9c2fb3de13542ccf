//! Extract the caller session from request headers (`X-User-ID`, `X-User-Roles`).

use crate::model::Session;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

pub const USER_ID_HEADER: &str = "X-User-ID";
/// Comma-separated role names.
pub const USER_ROLES_HEADER: &str = "X-User-Roles";

/// Session built from headers; anonymous when none are present.
#[derive(Clone, Debug)]
pub struct SessionHeaders(pub Session);

fn header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionHeaders
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let roles = header(parts, USER_ROLES_HEADER)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        Ok(SessionHeaders(Session {
            user_id: header(parts, USER_ID_HEADER),
            roles,
        }))
    }
}
