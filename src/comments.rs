//! Minimal client for the remote comments API used by the post demo.
//!
//! One call: `GET {base_url}/posts/{id}/comments`, decoded as a list of `Comment`.

use std::time::Duration;

use reqwest::{header::USER_AGENT, StatusCode};
use thiserror::Error;
use tracing::{info, instrument};

use crate::config::CommentsConfig;
use crate::domain::{Comment, RecordId};

#[derive(Debug, Error)]
pub enum CommentsError {
  #[error("could not reach comments API: {0}")]
  Http(#[from] reqwest::Error),
  #[error("could not fetch data: {0}")]
  Status(StatusCode),
  #[error("could not unmarshal data: {0}")]
  Decode(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct CommentsApi {
  client: reqwest::Client,
  base_url: String,
}

impl CommentsApi {
  /// Construct the client if a base URL is configured; `Ok(None)` means disabled.
  pub fn from_config(cfg: &CommentsConfig) -> Result<Option<Self>, CommentsError> {
    let base_url = cfg.base_url.trim_end_matches('/').to_string();
    if base_url.is_empty() {
      return Ok(None);
    }
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(10))
      .build()?;
    Ok(Some(Self { client, base_url }))
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  #[instrument(level = "info", skip(self))]
  pub async fn comments_for_post(&self, post_id: RecordId) -> Result<Vec<Comment>, CommentsError> {
    let url = format!("{}/posts/{}/comments", self.base_url, post_id);
    let res = self.client.get(&url)
      .header(USER_AGENT, "questline-backend/0.1")
      .send()
      .await?;

    if res.status() != StatusCode::OK {
      return Err(CommentsError::Status(res.status()));
    }

    let body = res.bytes().await?;
    let comments: Vec<Comment> = serde_json::from_slice(&body)?;
    info!(target: "questline_backend", post_id, count = comments.len(), "Fetched comments");
    Ok(comments)
  }
}
