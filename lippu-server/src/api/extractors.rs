//! Custom Axum extractors for request authentication.
//!
//! Provides `AdminAuth`, which checks the `Lippu-Admin-Authorization`
//! header carrying the plaintext admin secret against the argon2 hash
//! from the configuration.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};

use crate::state::AppState;

/// Header carrying the plaintext admin secret.
pub const ADMIN_AUTH_HEADER: &str = "Lippu-Admin-Authorization";

/// An Axum extractor that authenticates Admin API requests.
///
/// Implements `FromRequestParts` so it can be combined with `Json<T>`,
/// `Path<T>`, etc.
pub struct AdminAuth;

/// Errors returned by the [`AdminAuth`] extractor.
#[derive(Debug)]
pub enum AdminAuthError {
    MissingHeader,
    InvalidHeader,
    Unauthorized,
}

impl IntoResponse for AdminAuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AdminAuthError::MissingHeader => (
                StatusCode::UNAUTHORIZED,
                "missing Lippu-Admin-Authorization header",
            ),
            AdminAuthError::InvalidHeader => {
                (StatusCode::BAD_REQUEST, "invalid header format")
            }
            AdminAuthError::Unauthorized => (StatusCode::UNAUTHORIZED, "invalid admin secret"),
        };
        (status, message).into_response()
    }
}

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = AdminAuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(ADMIN_AUTH_HEADER)
            .ok_or(AdminAuthError::MissingHeader)?
            .to_str()
            .map_err(|_| AdminAuthError::InvalidHeader)?;

        let admin = state.admin.read().await;
        if !admin.verify(presented) {
            return Err(AdminAuthError::Unauthorized);
        }
        drop(admin);

        Ok(AdminAuth)
    }
}
