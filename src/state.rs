//! Application state shared by every handler.
//!
//! This module owns:
//!   - the GraphQL schema (with the catalog and comments client injected)
//!   - the broadcast hub for `/ws`
//!   - the server settings the router needs (static dir, GraphiQL switch)
//!
//! The store handle is built by the caller and passed in; nothing here reaches
//! for globals or the environment.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::broadcast::Hub;
use crate::catalog::Catalog;
use crate::comments::CommentsApi;
use crate::config::{AppConfig, ServerConfig};
use crate::graphql::{build_schema, CatalogSchema};
use crate::store::DocumentStore;

#[derive(Clone)]
pub struct AppState {
    pub schema: CatalogSchema,
    pub hub: Hub,
    pub server: ServerConfig,
}

impl AppState {
    /// Wire the catalog over `store` and build the schema.
    #[instrument(level = "info", skip_all)]
    pub fn new(config: &AppConfig, store: Arc<dyn DocumentStore>) -> Self {
        let catalog = Arc::new(Catalog::from_config(store, &config.store));

        let comments = match CommentsApi::from_config(&config.comments) {
            Ok(Some(api)) => {
                info!(target: "questline_backend", base_url = %api.base_url(), "Comments API enabled.");
                Some(api)
            }
            Ok(None) => {
                info!(target: "questline_backend", "Comments API disabled (empty base URL).");
                None
            }
            // The catalog still serves; only `Post.comments` reports COMMENTS_DISABLED.
            Err(e) => {
                warn!(target: "questline_backend", error = %e, "Comments API disabled: client build failed.");
                None
            }
        };

        Self {
            schema: build_schema(catalog, comments),
            hub: Hub::new(),
            server: config.server.clone(),
        }
    }
}
