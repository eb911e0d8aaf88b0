use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

use super::{claims::Identity, jwt::JwtKeys};
use crate::error::ApiError;

/// Verified caller identity. Extracting it is the access gate for every
/// protected route: a rejection ends the request before the handler runs.
pub struct AuthUser(pub Identity);

/// Pulls the token out of `Authorization: Bearer <token>`.
fn bearer_token(header: Option<&str>) -> Result<&str, ApiError> {
    let header = header.map(str::trim).filter(|h| !h.is_empty());
    let Some(header) = header else {
        return Err(ApiError::MissingToken);
    };
    let (scheme, token) = header.split_once(' ').unwrap_or((header, ""));
    let token = token.trim();
    if token.is_empty() {
        return Err(ApiError::MissingToken);
    }
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(ApiError::InvalidToken);
    }
    Ok(token)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<Identity>() {
            return Ok(AuthUser(identity.clone()));
        }

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let token = bearer_token(header).map_err(|e| {
            warn!(uri = %parts.uri, "missing bearer token");
            e
        })?;

        let identity = JwtKeys::from_ref(state).verify(token)?;
        parts.extensions.insert(identity.clone());
        Ok(AuthUser(identity))
    }
}
