//! HTTP surface: client management routes and the rate-limited resources.

mod handlers;
mod middleware;
mod response;
mod server;

pub use response::{ApiResponse, ClientListResponse};
pub use server::HttpServer;

use axum::routing::{any, get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::admission::AdmissionPipeline;
use crate::config::{SeedConfig, TollgateConfig};
use crate::ratelimit::ClientRegistry;

/// Paths served behind the admission pipeline.
pub const RATE_LIMITED_PATHS: [&str; 3] = ["/api/resource1", "/api/resource2", "/api/resource3"];

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ClientRegistry>,
    pub pipeline: AdmissionPipeline,
    pub admin_token: Option<Arc<str>>,
    pub seed: Arc<SeedConfig>,
}

impl AppState {
    pub fn new(pipeline: AdmissionPipeline, config: &TollgateConfig) -> Self {
        Self {
            registry: pipeline.registry().clone(),
            pipeline,
            admin_token: config.server.admin_token.as_deref().map(Arc::from),
            seed: Arc::new(config.seed.clone()),
        }
    }
}

/// Build the application router.
///
/// Rate-limited routes need `ConnectInfo<SocketAddr>`; serve with
/// `into_make_service_with_connect_info` or add `MockConnectInfo` in tests.
pub fn router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/clients", get(handlers::list_clients))
        .route(
            "/client",
            post(handlers::create_client)
                .patch(handlers::update_client)
                .delete(handlers::delete_client),
        )
        .route("/seed-client", post(handlers::seed_client))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_admin_token,
        ));

    let limited = Router::new()
        .route(RATE_LIMITED_PATHS[0], any(handlers::resource1))
        .route(RATE_LIMITED_PATHS[1], any(handlers::resource2))
        .route(RATE_LIMITED_PATHS[2], any(handlers::resource3))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::admission_control,
        ));

    Router::new()
        .merge(admin)
        .merge(limited)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
