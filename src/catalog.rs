//! Catalog lookups: maps a field request onto one of the AQL query shapes and
//! decodes the cursor back into domain records.
//!
//! Shapes:
//!   - list-all                 `chapters`
//!   - by-id                    `chapters(id)`, `post(id)`
//!   - children-of-parent       `quests` under a chapter
//!   - child-by-id-in-parent    `quests(id)` under a chapter
//!
//! By-id shapes read at most two rows: a second match is reported as a
//! duplicate instead of silently picking one. Every store round is bounded
//! by the configured deadline.

use std::{sync::Arc, time::Duration};

use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, error, instrument};

use crate::config::StoreConfig;
use crate::domain::{Chapter, Post, Quest, RecordId};
use crate::store::{self, AqlQuery, DocumentStore, StoreError};

pub(crate) mod aql {
  // KEEP drops missing attributes instead of projecting them as null.
  pub const CHAPTERS: &str = "FOR c IN @@chapters RETURN KEEP(c, 'id', 'title')";
  pub const CHAPTER_BY_ID: &str =
    "FOR c IN @@chapters FILTER c.id == @chapter LIMIT 2 RETURN KEEP(c, 'id', 'title')";
  pub const QUESTS_OF_CHAPTER: &str = "FOR c IN @@chapters FILTER c.id == @chapter FOR q IN c.quests RETURN q";
  pub const QUEST_BY_ID: &str =
    "FOR c IN @@chapters FILTER c.id == @chapter FOR q IN c.quests FILTER q.id == @quest LIMIT 2 RETURN q";
  pub const POST_BY_ID: &str = "FOR p IN @@posts FILTER p.id == @post LIMIT 2 RETURN p";
}

/// Collection names the queries are bound to.
#[derive(Clone, Debug)]
pub struct Collections {
  pub chapters: String,
  pub posts: String,
}

impl Default for Collections {
  fn default() -> Self {
    Self { chapters: "chapters".into(), posts: "posts".into() }
  }
}

/// One lookup the GraphQL layer can ask for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CatalogQuery {
  Chapters,
  Chapter { chapter: RecordId },
  Quests { chapter: RecordId },
  Quest { chapter: RecordId, quest: RecordId },
  Post { post: RecordId },
}

impl CatalogQuery {
  /// Pick the shape from the identifiers present in the request.
  pub fn chapters(id: Option<RecordId>) -> Self {
    match id {
      Some(chapter) => CatalogQuery::Chapter { chapter },
      None => CatalogQuery::Chapters,
    }
  }

  pub fn quests(chapter: RecordId, id: Option<RecordId>) -> Self {
    match id {
      Some(quest) => CatalogQuery::Quest { chapter, quest },
      None => CatalogQuery::Quests { chapter },
    }
  }

  pub fn to_aql(&self, collections: &Collections) -> AqlQuery {
    match *self {
      CatalogQuery::Chapters => AqlQuery::new(aql::CHAPTERS).bind("@chapters", collections.chapters.as_str()),
      CatalogQuery::Chapter { chapter } => AqlQuery::new(aql::CHAPTER_BY_ID)
        .bind("@chapters", collections.chapters.as_str())
        .bind("chapter", chapter),
      CatalogQuery::Quests { chapter } => AqlQuery::new(aql::QUESTS_OF_CHAPTER)
        .bind("@chapters", collections.chapters.as_str())
        .bind("chapter", chapter),
      CatalogQuery::Quest { chapter, quest } => AqlQuery::new(aql::QUEST_BY_ID)
        .bind("@chapters", collections.chapters.as_str())
        .bind("chapter", chapter)
        .bind("quest", quest),
      CatalogQuery::Post { post } => AqlQuery::new(aql::POST_BY_ID)
        .bind("@posts", collections.posts.as_str())
        .bind("post", post),
    }
  }

  fn label(&self) -> &'static str {
    match self {
      CatalogQuery::Chapters | CatalogQuery::Chapter { .. } => "chapter",
      CatalogQuery::Quests { .. } | CatalogQuery::Quest { .. } => "quest",
      CatalogQuery::Post { .. } => "post",
    }
  }

  fn lookup_id(&self) -> Option<RecordId> {
    match *self {
      CatalogQuery::Chapter { chapter } => Some(chapter),
      CatalogQuery::Quest { quest, .. } => Some(quest),
      CatalogQuery::Post { post } => Some(post),
      CatalogQuery::Chapters | CatalogQuery::Quests { .. } => None,
    }
  }
}

#[derive(Debug, Error)]
pub enum CatalogError {
  #[error(transparent)]
  Store(#[from] StoreError),
  #[error("document store did not answer within {0:?}")]
  Timeout(Duration),
  #[error("{kind} lookup for id {id} matched more than one record")]
  Duplicate { kind: &'static str, id: RecordId },
}

impl CatalogError {
  /// Stable code attached to GraphQL errors.
  pub fn code(&self) -> &'static str {
    match self {
      CatalogError::Store(StoreError::Connection(_)) => "STORE_UNAVAILABLE",
      CatalogError::Store(StoreError::Query { .. }) => "QUERY_FAILED",
      CatalogError::Store(StoreError::Decode(_)) => "DECODE_FAILED",
      CatalogError::Timeout(_) => "STORE_TIMEOUT",
      CatalogError::Duplicate { .. } => "DUPLICATE_RECORD",
    }
  }
}

/// Read-only view of the chapter/quest catalog, shared by all resolvers.
pub struct Catalog {
  store: Arc<dyn DocumentStore>,
  collections: Collections,
  deadline: Duration,
}

impl Catalog {
  pub fn new(store: Arc<dyn DocumentStore>, collections: Collections, deadline: Duration) -> Self {
    Self { store, collections, deadline }
  }

  pub fn from_config(store: Arc<dyn DocumentStore>, cfg: &StoreConfig) -> Self {
    let collections = Collections {
      chapters: cfg.chapters_collection.clone(),
      posts: cfg.posts_collection.clone(),
    };
    Self::new(store, collections, Duration::from_millis(cfg.query_timeout_ms))
  }

  /// All chapters, or the one with `id` (empty when absent).
  #[instrument(level = "debug", skip(self))]
  pub async fn chapters(&self, id: Option<RecordId>) -> Result<Vec<Chapter>, CatalogError> {
    let query = CatalogQuery::chapters(id);
    match id {
      Some(_) => Ok(self.fetch_unique::<Chapter>(query).await?.into_iter().collect()),
      None => self.fetch_all(query).await,
    }
  }

  /// Quests embedded in `chapter`, optionally narrowed to `id`.
  #[instrument(level = "debug", skip(self))]
  pub async fn quests(&self, chapter: RecordId, id: Option<RecordId>) -> Result<Vec<Quest>, CatalogError> {
    let query = CatalogQuery::quests(chapter, id);
    match id {
      Some(_) => Ok(self.fetch_unique::<Quest>(query).await?.into_iter().collect()),
      None => self.fetch_all(query).await,
    }
  }

  #[instrument(level = "debug", skip(self))]
  pub async fn post(&self, id: RecordId) -> Result<Option<Post>, CatalogError> {
    self.fetch_unique(CatalogQuery::Post { post: id }).await
  }

  async fn fetch_all<T: DeserializeOwned>(&self, query: CatalogQuery) -> Result<Vec<T>, CatalogError> {
    let aql = query.to_aql(&self.collections);
    let round = async {
      let records = store::query::<T>(self.store.as_ref(), &aql).await?;
      records.collect_all().await
    };

    let rows = self.bounded(query, round).await?;
    debug!(target: "catalog", ?query, rows = rows.len(), "Fetched");
    Ok(rows)
  }

  async fn fetch_unique<T: DeserializeOwned>(&self, query: CatalogQuery) -> Result<Option<T>, CatalogError> {
    let aql = query.to_aql(&self.collections);
    let round = async {
      let mut records = store::query::<T>(self.store.as_ref(), &aql).await?;
      let first = records.next().await.transpose()?;
      // LIMIT 2: a second row means the id is not unique.
      let extra = match first {
        Some(_) => records.next().await.transpose()?.is_some(),
        None => false,
      };
      records.close().await;
      Ok::<_, StoreError>((first, extra))
    };

    let (first, extra) = self.bounded(query, round).await?;
    if extra {
      let err = CatalogError::Duplicate { kind: query.label(), id: query.lookup_id().unwrap_or_default() };
      error!(target: "catalog", ?query, error = %err, "Ambiguous by-id lookup");
      return Err(err);
    }
    debug!(target: "catalog", ?query, found = first.is_some(), "Fetched");
    Ok(first)
  }

  /// Run one store round under the deadline. A timed-out round is dropped, which releases its cursor.
  async fn bounded<R>(
    &self,
    query: CatalogQuery,
    round: impl std::future::Future<Output = Result<R, StoreError>>,
  ) -> Result<R, CatalogError> {
    let result = match timeout(self.deadline, round).await {
      Ok(inner) => inner.map_err(CatalogError::from),
      Err(_) => Err(CatalogError::Timeout(self.deadline)),
    };
    if let Err(e) = &result {
      error!(target: "catalog", ?query, code = e.code(), error = %e, "Store round failed");
    }
    result
  }
}
