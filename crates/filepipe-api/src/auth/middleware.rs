use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use filepipe_core::AppError;
use std::sync::Arc;

use super::jwt::JwtVerifier;
use super::models::OwnerContext;
use crate::error::HttpAppError;

/// Require `Authorization: Bearer <jwt>` and attach the owner to the request.
pub async fn auth_middleware(
    State(verifier): State<Arc<JwtVerifier>>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = match request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
    {
        Some(h) => h,
        None => {
            return HttpAppError(AppError::Unauthorized(
                "Missing authorization header".to_string(),
            ))
            .into_response();
        }
    };

    let Some(token) = auth_header.strip_prefix("Bearer ") else {
        return HttpAppError(AppError::Unauthorized(
            "Invalid authorization header format".to_string(),
        ))
        .into_response();
    };

    match verifier.verify(token.trim()) {
        Ok(claims) => {
            tracing::debug!(owner_id = %claims.sub, "Request authenticated");
            request.extensions_mut().insert(OwnerContext {
                owner_id: claims.sub,
            });
            next.run(request).await
        }
        Err(e) => HttpAppError(e).into_response(),
    }
}
