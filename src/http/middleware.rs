//! Route middleware: admin token gate and admission control.

use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use tracing::{debug_span, warn, Instrument};
use uuid::Uuid;

use super::response::ApiResponse;
use super::AppState;
use crate::admission::AdmissionRequest;

/// Run the admission pipeline before a rate-limited handler.
///
/// The caller's IP is the client identifier and the request path is the
/// endpoint.
pub async fn admission_control(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let admission = AdmissionRequest::new(addr.ip().to_string(), addr.port(), request.uri().path());
    let span = debug_span!(
        "admission",
        request_id = %Uuid::new_v4(),
        client = %admission.client,
        endpoint = %admission.endpoint
    );

    match span.in_scope(|| state.pipeline.admit(&admission)) {
        Ok(()) => next.run(request).instrument(span).await,
        Err(rejection) => rejection.into_response(),
    }
}

/// Reject client management calls without a valid `Authorization` header.
pub async fn require_admin_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if let Err(message) = check_token(request.headers(), state.admin_token.as_deref()) {
        warn!(
            path = %request.uri().path(),
            reason = message,
            "Admin request rejected"
        );
        return ApiResponse::new(StatusCode::UNAUTHORIZED, message).into_response();
    }

    next.run(request).await
}

fn check_token(headers: &HeaderMap, expected: Option<&str>) -> Result<(), &'static str> {
    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.strip_prefix("Bearer ").unwrap_or(value).trim())
        .filter(|value| !value.is_empty())
        .ok_or("Unauthorized")?;

    match expected {
        Some(expected) if presented != expected => Err("Invalid token"),
        _ => Ok(()),
    }
}
