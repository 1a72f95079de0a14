//! Router assembly: GraphQL, WebSocket broadcast, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - GraphQL at `/graphql` (GET + POST) and GraphiQL at `/graphiql`
/// - WebSocket broadcast at `/ws`
/// - Files from the configured static dir under `/static`
/// - Plain-text 404 for anything else
/// - CORS (allow any origin/method/headers) and per-request trace spans
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new(&state.server.static_dir);

    Router::new()
        .route("/graphql", get(http::http_graphql).post(http::http_graphql))
        .route("/graphiql", get(http::http_graphiql))
        .route("/ws", get(ws::ws_upgrade))
        .route("/health", get(http::http_health))
        .nest_service("/static", static_service)
        // /chat, /quest and anything else unknown land here.
        .fallback(http::not_found)
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}
