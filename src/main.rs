//! Questline · Chapter/Quest Catalog Backend
//!
//! - GraphQL API over an ArangoDB chapter catalog (`/graphql`, GraphiQL at `/graphiql`)
//! - WebSocket broadcast relay (`/ws`)
//! - Static files (`/static/*`)
//!
//! Important env variables:
//!   QUESTLINE_CONFIG   : path to TOML config (see `config.rs` for the schema)
//!   PORT               : u16 (default 80)
//!   ARANGO_URL         : default "http://localhost:8529"
//!   ARANGO_USER        : default "root"
//!   ARANGO_PASSWORD    : default "password"
//!   ARANGO_DATABASE    : default "func_hell"
//!   QUERY_TIMEOUT_MS   : deadline per store round (default 5000)
//!   COMMENTS_API_URL   : comments API for the post demo ("" disables it)
//!   LOG_LEVEL          : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT         : "pretty" (default) or "json"
//!
//! `--print-schema` prints the GraphQL SDL and exits.

mod broadcast;
mod catalog;
mod comments;
mod config;
mod domain;
mod graphql;
mod routes;
mod state;
mod store;
mod telemetry;
mod util;

#[cfg(test)]
mod testing;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::ArangoStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  if std::env::args().any(|a| a == "--print-schema") {
    println!("{}", graphql::schema_sdl());
    return Ok(());
  }

  telemetry::init_tracing();
  let config = AppConfig::load();

  // No store, no service: a failed connect ends the process here.
  let store = match ArangoStore::connect(&config.store).await {
    Ok(store) => store,
    Err(e) => {
      error!(target: "questline_backend", url = %config.store.url, database = %config.store.database, error = %e, "Cannot reach document store");
      return Err(e.into());
    }
  };

  let state = Arc::new(AppState::new(&config, Arc::new(store)));
  let app = build_router(state);

  // Bind on all interfaces; containers publish the port.
  let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
  let listener = TcpListener::bind(addr).await?;
  info!(target: "questline_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "questline_backend", "HTTP server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    error!(target: "questline_backend", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
}
