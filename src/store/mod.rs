//! Document store access: query values, the store/cursor traits, and lazy record decoding.
//!
//! A store hands out raw cursors (batches of JSON documents). `Records<T>` sits on
//! top and decodes one document at a time, so callers can stop early and release
//! the server-side cursor without pulling the rest of the result set.

use std::{collections::VecDeque, marker::PhantomData};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

pub mod arango;

pub use arango::ArangoStore;

/// Failures of the store layer.
#[derive(Debug, Error)]
pub enum StoreError {
  /// Store cannot be reached, rejected our credentials, or the database is missing.
  #[error("document store unreachable: {0}")]
  Connection(String),
  /// Store answered but refused the query (syntax, unknown collection, bind mismatch).
  #[error("query rejected by document store: {message}")]
  Query { message: String, code: Option<i64> },
  /// Response or record did not have the expected shape.
  #[error("failed to decode record: {0}")]
  Decode(#[from] serde_json::Error),
}

/// AQL text plus its bind parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct AqlQuery {
  pub text: &'static str,
  pub bind_vars: Map<String, Value>,
}

impl AqlQuery {
  pub fn new(text: &'static str) -> Self {
    Self { text, bind_vars: Map::new() }
  }

  /// Bind `@name` (or `@@name` when `name` starts with `@`).
  pub fn bind(mut self, name: &str, value: impl Into<Value>) -> Self {
    self.bind_vars.insert(name.to_string(), value.into());
    self
  }

  #[cfg(test)]
  pub fn var(&self, name: &str) -> Option<&Value> {
    self.bind_vars.get(name)
  }
}

/// A backend able to run AQL.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
  async fn open_cursor(&self, query: &AqlQuery) -> Result<Box<dyn RawCursor>, StoreError>;

  /// Cheap reachability check used once at startup.
  async fn ping(&self) -> Result<(), StoreError>;
}

/// Server-side iterator over raw documents.
#[async_trait::async_trait]
pub trait RawCursor: Send {
  /// Next batch, or `None` once the server has nothing left.
  async fn next_batch(&mut self) -> Result<Option<Vec<Value>>, StoreError>;

  /// Release the server-side cursor. Safe to call more than once.
  async fn close(&mut self);
}

/// Typed, lazily decoded view over a raw cursor.
pub struct Records<T> {
  cursor: Box<dyn RawCursor>,
  pending: VecDeque<Value>,
  exhausted: bool,
  _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Records<T> {
  pub fn new(cursor: Box<dyn RawCursor>) -> Self {
    Self { cursor, pending: VecDeque::new(), exhausted: false, _marker: PhantomData }
  }

  /// Decode the next record, fetching another batch when the buffer runs dry.
  pub async fn next(&mut self) -> Option<Result<T, StoreError>> {
    loop {
      if let Some(doc) = self.pending.pop_front() {
        return Some(serde_json::from_value(doc).map_err(StoreError::from));
      }
      if self.exhausted {
        return None;
      }
      match self.cursor.next_batch().await {
        Ok(Some(batch)) => self.pending.extend(batch),
        Ok(None) => self.exhausted = true,
        Err(e) => {
          self.exhausted = true;
          return Some(Err(e));
        }
      }
    }
  }

  /// Drain every record in store order. The cursor is released on success and on failure.
  pub async fn collect_all(mut self) -> Result<Vec<T>, StoreError> {
    let mut out = Vec::new();
    while let Some(item) = self.next().await {
      match item {
        Ok(record) => out.push(record),
        Err(e) => {
          self.close().await;
          return Err(e);
        }
      }
    }
    self.close().await;
    Ok(out)
  }

  pub async fn close(mut self) {
    self.pending.clear();
    self.cursor.close().await;
  }
}

/// Run `query` and return its records as a lazy sequence of `T`.
pub async fn query<T: DeserializeOwned>(
  store: &dyn DocumentStore,
  query: &AqlQuery,
) -> Result<Records<T>, StoreError> {
  let cursor = store.open_cursor(query).await?;
  Ok(Records::new(cursor))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::VecCursor;
  use serde::Deserialize;
  use serde_json::json;

  #[derive(Debug, Deserialize, PartialEq)]
  struct Row {
    id: i64,
  }

  #[tokio::test]
  async fn records_decode_across_batches_in_order() {
    let (cursor, probe) = VecCursor::new(vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 3})], 2);
    let rows = Records::<Row>::new(Box::new(cursor)).collect_all().await.unwrap();
    assert_eq!(rows, vec![Row { id: 1 }, Row { id: 2 }, Row { id: 3 }]);
    assert_eq!(probe.batches_served(), 2);
    assert_eq!(probe.closed(), 1);
  }

  #[tokio::test]
  async fn early_close_does_not_fetch_remaining_batches() {
    let (cursor, probe) = VecCursor::new(vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 3})], 1);
    let mut records = Records::<Row>::new(Box::new(cursor));
    assert_eq!(records.next().await.unwrap().unwrap(), Row { id: 1 });
    records.close().await;
    assert_eq!(probe.batches_served(), 1);
    assert_eq!(probe.closed(), 1);
  }

  #[tokio::test]
  async fn shape_mismatch_is_a_decode_error_and_releases_cursor() {
    let (cursor, probe) = VecCursor::new(vec![json!({"id": "not a number"})], 10);
    let err = Records::<Row>::new(Box::new(cursor)).collect_all().await.unwrap_err();
    assert!(matches!(err, StoreError::Decode(_)));
    assert_eq!(probe.closed(), 1);
  }

  #[test]
  fn bind_keeps_collection_parameters_verbatim() {
    let q = AqlQuery::new("FOR c IN @@chapters FILTER c.id == @chapter RETURN c")
      .bind("@chapters", "chapters")
      .bind("chapter", 7);
    assert_eq!(q.var("@chapters"), Some(&json!("chapters")));
    assert_eq!(q.var("chapter"), Some(&json!(7)));
  }
}
