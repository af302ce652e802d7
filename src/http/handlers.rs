//! Route handlers.

use axum::body::Bytes;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use std::net::SocketAddr;
use tracing::{debug, instrument};

use super::response::{ApiResponse, ClientListResponse};
use super::AppState;
use crate::ratelimit::{ClientSpec, ResourceLimits};

/// `?ip=` selector for update and delete.
#[derive(Debug, Deserialize)]
pub struct ClientQuery {
    pub ip: Option<String>,
}

impl ClientQuery {
    fn ip(&self) -> Option<&str> {
        self.ip.as_deref().filter(|ip| !ip.is_empty())
    }
}

/// Body of an update request.
#[derive(Debug, Deserialize)]
pub struct UpdateClientBody {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub resources: ResourceLimits,
}

pub async fn list_clients(State(state): State<AppState>) -> ClientListResponse {
    ClientListResponse {
        status: StatusCode::OK.as_u16(),
        message: "Clients retrieved successfully".to_string(),
        clients: state.registry.list(),
    }
}

pub async fn create_client(State(state): State<AppState>, body: Bytes) -> ApiResponse {
    let spec: ClientSpec = match serde_json::from_slice(&body) {
        Ok(spec) => spec,
        Err(e) => {
            debug!(error = %e, "Rejected client body");
            return ApiResponse::new(StatusCode::BAD_REQUEST, "Error decoding JSON");
        }
    };

    match state.registry.register(spec) {
        Ok(_) => ApiResponse::new(StatusCode::CREATED, "Client created successfully"),
        Err(e) => e.into(),
    }
}

#[instrument(skip_all, fields(ip = ?query.ip))]
pub async fn update_client(
    State(state): State<AppState>,
    Query(query): Query<ClientQuery>,
    body: Bytes,
) -> ApiResponse {
    let Some(ip) = query.ip() else {
        return ApiResponse::new(StatusCode::BAD_REQUEST, "Client IP is required");
    };

    let update: UpdateClientBody = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            debug!(error = %e, "Rejected client body");
            return ApiResponse::new(StatusCode::BAD_REQUEST, "Error decoding JSON");
        }
    };

    match state.registry.update(ip, update.name, update.resources) {
        Ok(_) => ApiResponse::new(StatusCode::OK, "Client updated successfully"),
        Err(e) => e.into(),
    }
}

#[instrument(skip_all, fields(ip = ?query.ip))]
pub async fn delete_client(
    State(state): State<AppState>,
    Query(query): Query<ClientQuery>,
) -> ApiResponse {
    let Some(ip) = query.ip() else {
        return ApiResponse::new(StatusCode::BAD_REQUEST, "Client IP is required");
    };

    match state.registry.remove(ip) {
        Ok(_) => ApiResponse::new(StatusCode::OK, "Client deleted successfully"),
        Err(e) => e.into(),
    }
}

/// Register the caller's own address with the configured seed limits.
pub async fn seed_client(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> ApiResponse {
    let spec = ClientSpec::new(
        state.seed.name.clone(),
        addr.ip().to_string(),
        state.seed.resources.clone(),
    );

    match state.registry.upsert(spec) {
        Ok(_) => ApiResponse::new(StatusCode::OK, "Default Client details added successfully"),
        Err(e) => e.into(),
    }
}

pub async fn resource1() -> &'static str {
    "Resource1 accessed"
}

pub async fn resource2() -> &'static str {
    "Resource2 accessed"
}

pub async fn resource3() -> &'static str {
    "Resource3 accessed"
}
