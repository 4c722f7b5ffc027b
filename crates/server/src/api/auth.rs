//! Bearer-token authentication extractor.
//!
//! Validates the `Authorization: Bearer <jwt>` header against the token
//! issuer and exposes the authenticated subject to handlers. Failures are
//! surfaced in the uniform result envelope with the Unauthenticated status.

use crate::AppResources;
use crate::result::{ApiResponse, ApiStatus};
use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};

/// The authenticated caller, as carried by a validated access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

pub struct BearerAuth(pub AuthUser);

fn unauthenticated(message: &str) -> Response {
    ApiResponse::<()>::failure(ApiStatus::Unauthenticated, vec![message.to_string()])
        .into_response()
}

impl<S> FromRequestParts<S> for BearerAuth
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let resources = parts
            .extensions
            .get::<AppResources>()
            .cloned()
            .ok_or_else(|| {
                tracing::error!("AppResources not found in extensions");
                ApiResponse::<()>::failure(
                    ApiStatus::InternalError,
                    vec!["An error occurred while processing your request".to_string()],
                )
                .into_response()
            })?;

        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok());

        let token = match auth_header {
            Some(header) if header.starts_with("Bearer ") => &header[7..],
            Some(_) => {
                return Err(unauthenticated("Authorization header must use Bearer scheme"));
            }
            None => return Err(unauthenticated("Missing Authorization header")),
        };

        let claims = resources
            .issuer
            .decode(token)
            .map_err(|_| unauthenticated("Invalid or expired token"))?;

        Ok(BearerAuth(AuthUser {
            user_id: claims.sub,
        }))
    }
}
