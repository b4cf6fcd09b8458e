use axum::{
    http::Method,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

use crate::catalog::mirror::CatalogMirror;
use crate::gateway::Gateway;
use crate::server::config::ServerConfig;
use crate::services::auth_service;
use crate::web::models::push_models::WsMessage;
use crate::web::{middleware::auth, routes::*};

pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod websocket;

pub use error::AppError;

pub struct AppState {
    pub gateway: Arc<dyn Gateway>,
    pub mirror: Arc<CatalogMirror>,
    pub catalog_broadcaster_tx: broadcast::Sender<WsMessage>,
    pub config: Arc<ServerConfig>,
}

async fn health_check_handler() -> &'static str {
    "OK"
}

pub fn create_axum_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_check_handler))
        .route(
            "/api/auth/session",
            post(auth_service::create_session).delete(auth_service::destroy_session),
        )
        .route(
            "/api/auth/me",
            get(auth_service::me).route_layer(axum_middleware::from_fn_with_state(
                app_state.clone(),
                auth::auth,
            )),
        )
        .nest("/api/catalog", catalog_routes::create_catalog_router())
        .route("/api/tags", get(catalog_routes::list_tags_handler))
        .route("/ws/catalog", get(websocket::catalog_ws_handler))
        .nest(
            "/api/admin/entries",
            entry_routes::create_entries_router().route_layer(
                axum_middleware::from_fn_with_state(app_state.clone(), auth::auth),
            ),
        )
        .nest(
            "/api/admin/tags",
            tag_routes::create_tags_router().route_layer(axum_middleware::from_fn_with_state(
                app_state.clone(),
                auth::auth,
            )),
        )
        .with_state(app_state.clone())
        .layer(cors)
}
