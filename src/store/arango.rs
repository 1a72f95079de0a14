//! ArangoDB client over the HTTP cursor API.
//!
//! - `POST /_db/{db}/_api/cursor` opens a cursor and returns the first batch
//! - `POST /_db/{db}/_api/cursor/{id}` returns the following batches
//! - `DELETE /_db/{db}/_api/cursor/{id}` releases a cursor we stopped reading
//!
//! Calls are instrumented and log query sizes and latencies, never credentials.

use std::time::{Duration, Instant};

use reqwest::{header::USER_AGENT, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use super::{AqlQuery, DocumentStore, RawCursor, StoreError};
use crate::config::StoreConfig;
use crate::util::trunc_for_log;

/// ArangoDB "database not found".
const ERROR_DATABASE_NOT_FOUND: i64 = 1228;

#[derive(Clone)]
pub struct ArangoStore {
  client: reqwest::Client,
  db_url: String,
  username: String,
  password: String,
  batch_size: u32,
}

impl ArangoStore {
  /// Build the client without touching the network.
  pub fn new(cfg: &StoreConfig) -> Result<Self, StoreError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_millis(cfg.query_timeout_ms))
      .build()
      .map_err(|e| StoreError::Connection(e.to_string()))?;

    Ok(Self {
      client,
      db_url: format!("{}/_db/{}", cfg.url.trim_end_matches('/'), cfg.database),
      username: cfg.username.clone(),
      password: cfg.password.clone(),
      batch_size: cfg.batch_size,
    })
  }

  /// Build the client and verify the database answers.
  pub async fn connect(cfg: &StoreConfig) -> Result<Self, StoreError> {
    let store = Self::new(cfg)?;
    store.ping().await?;
    info!(target: "store", url = %cfg.url, database = %cfg.database, "Connected to ArangoDB");
    Ok(store)
  }

  fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
    self.client
      .request(method, format!("{}{}", self.db_url, path))
      .header(USER_AGENT, "questline-backend/0.1")
      .basic_auth(&self.username, Some(&self.password))
  }
}

#[async_trait::async_trait]
impl DocumentStore for ArangoStore {
  #[instrument(level = "debug", skip(self, query), fields(query = %trunc_for_log(query.text, 120), vars = query.bind_vars.len()))]
  async fn open_cursor(&self, query: &AqlQuery) -> Result<Box<dyn RawCursor>, StoreError> {
    let body = CursorRequest {
      query: query.text,
      bind_vars: &query.bind_vars,
      batch_size: self.batch_size,
    };

    let start = Instant::now();
    let res = self.request(reqwest::Method::POST, "/_api/cursor")
      .json(&body)
      .send()
      .await
      .map_err(transport_error)?;
    let batch: CursorResponse = read_response(res).await?;
    debug!(target: "store", elapsed = ?start.elapsed(), rows = batch.result.len(), has_more = batch.has_more, "Cursor opened");

    Ok(Box::new(ArangoCursor {
      store: self.clone(),
      id: batch.id,
      first: Some(batch.result),
      has_more: batch.has_more,
    }))
  }

  #[instrument(level = "info", skip(self))]
  async fn ping(&self) -> Result<(), StoreError> {
    let res = self.request(reqwest::Method::GET, "/_api/database/current")
      .send()
      .await
      .map_err(transport_error)?;
    let _: Value = read_response(res).await?;
    Ok(())
  }
}

/// Open server cursor. Dropping it before exhaustion releases it in the background.
struct ArangoCursor {
  store: ArangoStore,
  id: Option<String>,
  first: Option<Vec<Value>>,
  has_more: bool,
}

impl ArangoCursor {
  fn open_id(&self) -> Option<&str> {
    if self.has_more { self.id.as_deref() } else { None }
  }
}

#[async_trait::async_trait]
impl RawCursor for ArangoCursor {
  async fn next_batch(&mut self) -> Result<Option<Vec<Value>>, StoreError> {
    if let Some(first) = self.first.take() {
      return Ok(Some(first));
    }
    let Some(id) = self.open_id().map(str::to_owned) else {
      return Ok(None);
    };

    let res = self.store.request(reqwest::Method::POST, &format!("/_api/cursor/{id}"))
      .send()
      .await
      .map_err(transport_error)?;
    let batch: CursorResponse = read_response(res).await?;
    self.has_more = batch.has_more;
    debug!(target: "store", cursor = %id, rows = batch.result.len(), has_more = batch.has_more, "Cursor batch");
    Ok(Some(batch.result))
  }

  async fn close(&mut self) {
    self.first = None;
    let Some(id) = self.open_id().map(str::to_owned) else {
      return;
    };
    self.has_more = false;
    // 404 means the server already expired it.
    match self.store.request(reqwest::Method::DELETE, &format!("/_api/cursor/{id}")).send().await {
      Ok(res) if res.status().is_success() || res.status() == StatusCode::NOT_FOUND => {
        debug!(target: "store", cursor = %id, "Cursor released");
      }
      Ok(res) => warn!(target: "store", cursor = %id, status = %res.status(), "Cursor release refused"),
      Err(e) => warn!(target: "store", cursor = %id, error = %e, "Cursor release failed"),
    }
  }
}

impl Drop for ArangoCursor {
  fn drop(&mut self) {
    let Some(id) = self.open_id().map(str::to_owned) else {
      return;
    };
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
      warn!(target: "store", cursor = %id, "No runtime to release dropped cursor");
      return;
    };
    // Drop can't await; hand the DELETE to the runtime.
    let req = self.store.request(reqwest::Method::DELETE, &format!("/_api/cursor/{id}"));
    handle.spawn(async move {
      if let Err(e) = req.send().await {
        warn!(target: "store", cursor = %id, error = %e, "Background cursor release failed");
      }
    });
  }
}

// --- Wire DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CursorRequest<'a> {
  query: &'a str,
  bind_vars: &'a Map<String, Value>,
  batch_size: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CursorResponse {
  #[serde(default)] result: Vec<Value>,
  #[serde(default)] has_more: bool,
  #[serde(default)] id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArangoErrorBody {
  #[serde(default)] error_message: Option<String>,
  #[serde(default)] error_num: Option<i64>,
}

fn transport_error(e: reqwest::Error) -> StoreError {
  StoreError::Connection(e.to_string())
}

/// Map a response to either its decoded body or a classified store error.
async fn read_response<T: for<'a> Deserialize<'a>>(res: reqwest::Response) -> Result<T, StoreError> {
  let status = res.status();
  let body = res.text().await.map_err(transport_error)?;

  if status.is_success() {
    return serde_json::from_str::<T>(&body).map_err(StoreError::from);
  }

  // Arango error bodies look like {"error":true,"errorNum":1501,"errorMessage":"..."}.

  let parsed = serde_json::from_str::<ArangoErrorBody>(&body).ok();
  let code = parsed.as_ref().and_then(|e| e.error_num);
  let message = parsed
    .and_then(|e| e.error_message)
    .unwrap_or_else(|| format!("HTTP {}: {}", status, trunc_for_log(&body, 200)));

  // Bad credentials or a missing database: nothing a retry of this query fixes.
  if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN || code == Some(ERROR_DATABASE_NOT_FOUND) {
    return Err(StoreError::Connection(message));
  }
  Err(StoreError::Query { message, code })
}
