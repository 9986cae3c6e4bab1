use super::handlers;
use super::state::AppState;
use crate::engine::TransportEngine;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router<E: TransportEngine>(state: AppState<E>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session queries
        .route("/session/status", get(handlers::get_status::<E>))
        // Session control
        .route("/session/connect", post(handlers::connect::<E>))
        .route("/session/disconnect", post(handlers::disconnect::<E>))
        .route("/session/transmit/begin", post(handlers::begin_transmit::<E>))
        .route("/session/transmit/end", post(handlers::end_transmit::<E>))
        .route("/session/bitrate", put(handlers::set_bitrate::<E>))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
