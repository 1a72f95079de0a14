//! HTTP endpoint handlers. These are thin wrappers around the schema.

use std::sync::Arc;

use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
  extract::State,
  http::StatusCode,
  response::{Html, IntoResponse},
  Json,
};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthOut {
  pub ok: bool,
  pub peers: usize,
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, peers: state.hub.peer_count().await })
}

/// GET and POST `/graphql`.
#[instrument(level = "info", skip(state, req))]
pub async fn http_graphql(State(state): State<Arc<AppState>>, req: GraphQLRequest) -> GraphQLResponse {
  let req = req.into_inner();
  debug!(target: "questline_backend", operation = ?req.operation_name, query_len = req.query.len(), "GraphQL request");
  let res = state.schema.execute(req).await;
  if res.is_err() {
    debug!(target: "questline_backend", errors = res.errors.len(), "GraphQL response carries errors");
  }
  res.into()
}

pub async fn http_graphiql(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  if !state.server.graphiql {
    return not_found().await.into_response();
  }
  Html(GraphiQLSource::build().endpoint("/graphql").finish()).into_response()
}

pub async fn not_found() -> impl IntoResponse {
  (StatusCode::NOT_FOUND, "404 Not Found")
}
