use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};

use crate::auth::{AppState, AuthError};
use crate::error::ApiError;

/// Verify the bearer token and attach the resulting `Principal` to the request.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())?;
    let principal = state.verifier.verify(token).await?;

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::Missing)?
        .to_str()
        .map_err(|_| AuthError::Invalid("authorization header is not valid text".into()))?;

    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or_else(|| AuthError::Invalid("expected a Bearer token".into()))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::Invalid("expected a Bearer token".into()));
    }

    Ok(token.trim())
}
