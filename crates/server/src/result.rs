//! Uniform result envelope returned by every account operation.
//!
//! The wire format mirrors the historical contract: PascalCase field names,
//! a closed status enumeration, an optional error list and an optional
//! success message. Internally operations never build this struct directly -
//! they return `Result<T, ServiceError>` and the envelope is produced once,
//! here, together with the HTTP status mapping.

use crate::error::ServiceError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

/// Closed status enumeration carried in every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ApiStatus {
    Success,
    NoContent,
    BadRequest,
    Unauthorized,
    Unauthenticated,
    NotFound,
    InternalError,
    AlreadyExist,
}

impl ApiStatus {
    /// Deterministic HTTP mapping; every status maps to exactly one code.
    pub fn http_status(&self) -> StatusCode {
        match self {
            ApiStatus::Success => StatusCode::OK,
            ApiStatus::NoContent => StatusCode::NO_CONTENT,
            ApiStatus::BadRequest => StatusCode::BAD_REQUEST,
            ApiStatus::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiStatus::Unauthorized => StatusCode::FORBIDDEN,
            ApiStatus::NotFound => StatusCode::NOT_FOUND,
            ApiStatus::AlreadyExist => StatusCode::CONFLICT,
            ApiStatus::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct ApiResponse<T> {
    pub version: String,
    pub status_code: ApiStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_messages: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_message: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub time_stamp: OffsetDateTime,
}

const ENVELOPE_VERSION: &str = "1.0";

impl<T> ApiResponse<T> {
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            version: ENVELOPE_VERSION.to_string(),
            status_code: ApiStatus::Success,
            error_messages: None,
            data: Some(data),
            success_message: Some(message.into()),
            time_stamp: OffsetDateTime::now_utc(),
        }
    }

    pub fn failure(status: ApiStatus, messages: Vec<String>) -> Self {
        Self {
            version: ENVELOPE_VERSION.to_string(),
            status_code: status,
            error_messages: Some(messages),
            data: None,
            success_message: None,
            time_stamp: OffsetDateTime::now_utc(),
        }
    }
}

impl<T> From<&ServiceError> for ApiResponse<T> {
    fn from(err: &ServiceError) -> Self {
        let status = match err {
            ServiceError::NotFound(_) => ApiStatus::NotFound,
            ServiceError::BadRequest(_) => ApiStatus::BadRequest,
            ServiceError::AlreadyExist(_) => ApiStatus::AlreadyExist,
            ServiceError::Unauthenticated(_) => ApiStatus::Unauthenticated,
            ServiceError::Unauthorized(_) => ApiStatus::Unauthorized,
            ServiceError::Internal(_) => ApiStatus::InternalError,
        };
        Self::failure(status, err.messages())
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status_code.http_status(), Json(self)).into_response()
    }
}

/// Materialize a service result as an HTTP response.
pub fn respond<T: Serialize>(
    result: Result<T, ServiceError>,
    success_message: &str,
) -> Response {
    match result {
        Ok(data) => ApiResponse::success(data, success_message).into_response(),
        Err(err) => ApiResponse::<T>::from(&err).into_response(),
    }
}
