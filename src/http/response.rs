//! JSON response envelopes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::admission::Rejection;
use crate::error::TollgateError;
use crate::ratelimit::ClientRecord;

/// The `{status, message}` body returned by every route except the
/// rate-limited resources themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: u16,
    pub message: String,
}

impl ApiResponse {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// Body of the client listing route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientListResponse {
    pub status: u16,
    pub message: String,
    pub clients: Vec<ClientRecord>,
}

impl IntoResponse for ClientListResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

impl From<Rejection> for ApiResponse {
    fn from(rejection: Rejection) -> Self {
        let status =
            StatusCode::from_u16(rejection.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        ApiResponse::new(status, rejection.message())
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        ApiResponse::from(self).into_response()
    }
}

impl From<TollgateError> for ApiResponse {
    fn from(err: TollgateError) -> Self {
        match err {
            TollgateError::Validation(message) => ApiResponse::new(StatusCode::BAD_REQUEST, message),
            TollgateError::ClientExists(_) => {
                ApiResponse::new(StatusCode::BAD_REQUEST, "Client with IP already exists")
            }
            TollgateError::ClientNotFound(_) => {
                ApiResponse::new(StatusCode::NOT_FOUND, "Client not found")
            }
            TollgateError::Config(_) | TollgateError::Io(_) => {
                ApiResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }
}

impl IntoResponse for TollgateError {
    fn into_response(self) -> Response {
        ApiResponse::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_envelopes() {
        let busy = ApiResponse::from(Rejection::ServerBusy);
        assert_eq!(busy.status, 503);
        assert_eq!(busy.message, "Server busy, try again later");

        let limited = ApiResponse::from(Rejection::RateLimited);
        assert_eq!(limited.status, 429);
        assert_eq!(limited.message, "Rate limit exceeded");

        let endpoint = ApiResponse::from(Rejection::EndpointUnauthorized);
        assert_eq!(endpoint.status, 400);
        assert_eq!(endpoint.message, "Endpoint not found for the client");
    }

    #[test]
    fn test_error_envelopes() {
        let exists = ApiResponse::from(TollgateError::ClientExists("1.2.3.4".to_string()));
        assert_eq!(exists.status, 400);
        assert_eq!(exists.message, "Client with IP already exists");

        let missing = ApiResponse::from(TollgateError::ClientNotFound("1.2.3.4".to_string()));
        assert_eq!(missing.status, 404);

        let invalid = ApiResponse::from(TollgateError::Validation("bad".to_string()));
        assert_eq!(invalid, ApiResponse::new(StatusCode::BAD_REQUEST, "bad"));
    }

    #[test]
    fn test_envelope_serialization() {
        let json = serde_json::to_value(ApiResponse::new(StatusCode::CREATED, "ok")).unwrap();
        assert_eq!(json, serde_json::json!({"status": 201, "message": "ok"}));
    }

    #[test]
    fn test_into_response_status() {
        let response = Rejection::ServerBusy.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.headers().get(axum::http::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }
}
