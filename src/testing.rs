//! Test doubles for the store layer: an in-memory cursor and a fixture store that
//! answers the catalog's AQL shapes from seeded documents.

use std::{
  collections::VecDeque,
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  },
  time::Duration,
};

use serde_json::{json, Value};

use crate::catalog::aql;
use crate::store::{AqlQuery, DocumentStore, RawCursor, StoreError};

/// Counters shared between a store/cursor and the test that drives it.
#[derive(Clone, Default)]
pub struct CursorProbe {
  opened: Arc<AtomicUsize>,
  closed: Arc<AtomicUsize>,
  batches: Arc<AtomicUsize>,
}

impl CursorProbe {
  /// Queries sent to the store, successful or not.
  pub fn opened(&self) -> usize {
    self.opened.load(Ordering::SeqCst)
  }

  /// Cursors released while still open.
  pub fn closed(&self) -> usize {
    self.closed.load(Ordering::SeqCst)
  }

  pub fn batches_served(&self) -> usize {
    self.batches.load(Ordering::SeqCst)
  }
}

/// Cursor over an in-memory document list, served in fixed-size batches.
pub struct VecCursor {
  docs: VecDeque<Value>,
  batch: usize,
  open: bool,
  probe: CursorProbe,
}

impl VecCursor {
  pub fn new(docs: Vec<Value>, batch: usize) -> (Self, CursorProbe) {
    let probe = CursorProbe::default();
    (Self::with_probe(docs, batch, probe.clone()), probe)
  }

  fn with_probe(docs: Vec<Value>, batch: usize, probe: CursorProbe) -> Self {
    Self { docs: docs.into(), batch: batch.max(1), open: true, probe }
  }
}

#[async_trait::async_trait]
impl RawCursor for VecCursor {
  async fn next_batch(&mut self) -> Result<Option<Vec<Value>>, StoreError> {
    if !self.open || self.docs.is_empty() {
      return Ok(None);
    }
    let take = self.batch.min(self.docs.len());
    self.probe.batches.fetch_add(1, Ordering::SeqCst);
    Ok(Some(self.docs.drain(..take).collect()))
  }

  async fn close(&mut self) {
    if self.open {
      self.open = false;
      self.probe.closed.fetch_add(1, Ordering::SeqCst);
    }
  }
}

/// Store that evaluates the catalog query shapes against seeded documents.
pub struct FixtureStore {
  chapters: Vec<Value>,
  posts: Vec<Value>,
  unreachable: bool,
  delay: Option<Duration>,
  probe: CursorProbe,
}

impl FixtureStore {
  pub fn new(chapters: Vec<Value>) -> Self {
    Self { chapters, posts: Vec::new(), unreachable: false, delay: None, probe: CursorProbe::default() }
  }

  pub fn unreachable() -> Self {
    Self { unreachable: true, ..Self::new(Vec::new()) }
  }

  pub fn with_posts(mut self, posts: Vec<Value>) -> Self {
    self.posts = posts;
    self
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  pub fn probe(&self) -> CursorProbe {
    self.probe.clone()
  }

  fn evaluate(&self, query: &AqlQuery) -> Result<Vec<Value>, StoreError> {
    let docs = match query.text {
      aql::CHAPTERS => {
        collection(query, "@chapters", "chapters")?;
        self.chapters.iter().map(project_chapter).collect()
      }
      aql::CHAPTER_BY_ID => {
        collection(query, "@chapters", "chapters")?;
        let id = var(query, "chapter")?;
        self.chapters.iter().filter(|c| &c["id"] == id).map(project_chapter).take(2).collect()
      }
      aql::QUESTS_OF_CHAPTER => {
        collection(query, "@chapters", "chapters")?;
        let id = var(query, "chapter")?;
        self.quests_of(id).collect()
      }
      aql::QUEST_BY_ID => {
        collection(query, "@chapters", "chapters")?;
        let chapter = var(query, "chapter")?;
        let quest = var(query, "quest")?;
        self.quests_of(chapter).filter(|q| &q["id"] == quest).take(2).collect()
      }
      aql::POST_BY_ID => {
        collection(query, "@posts", "posts")?;
        let id = var(query, "post")?;
        self.posts.iter().filter(|p| &p["id"] == id).take(2).cloned().collect()
      }
      other => {
        return Err(StoreError::Query { message: format!("syntax error in `{other}`"), code: Some(1501) });
      }
    };
    Ok(docs)
  }

  fn quests_of<'a>(&'a self, chapter: &'a Value) -> impl Iterator<Item = Value> + 'a {
    self.chapters
      .iter()
      .filter(move |c| &c["id"] == chapter)
      .flat_map(|c| c["quests"].as_array().cloned().unwrap_or_default())
  }
}

#[async_trait::async_trait]
impl DocumentStore for FixtureStore {
  async fn open_cursor(&self, query: &AqlQuery) -> Result<Box<dyn RawCursor>, StoreError> {
    self.probe.opened.fetch_add(1, Ordering::SeqCst);
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    if self.unreachable {
      return Err(StoreError::Connection("connection refused".into()));
    }
    let docs = self.evaluate(query)?;
    Ok(Box::new(VecCursor::with_probe(docs, 1, self.probe.clone())))
  }

  async fn ping(&self) -> Result<(), StoreError> {
    if self.unreachable {
      return Err(StoreError::Connection("connection refused".into()));
    }
    Ok(())
  }
}

/// Mirrors `KEEP(c, 'id', 'title')`: attributes the document lacks stay absent.
fn project_chapter(c: &Value) -> Value {
  let mut out = serde_json::Map::new();
  for key in ["id", "title"] {
    if let Some(v) = c.get(key) {
      out.insert(key.to_string(), v.clone());
    }
  }
  Value::Object(out)
}

fn var<'a>(query: &'a AqlQuery, name: &str) -> Result<&'a Value, StoreError> {
  query.var(name).ok_or_else(|| StoreError::Query {
    message: format!("bind parameter '{name}' was not declared in the query"),
    code: Some(1552),
  })
}

fn collection(query: &AqlQuery, name: &str, expected: &str) -> Result<(), StoreError> {
  match var(query, name)?.as_str() {
    Some(c) if c == expected => Ok(()),
    other => Err(StoreError::Query { message: format!("collection or view not found: {other:?}"), code: Some(1203) }),
  }
}

/// Three chapters; quest ids repeat across chapters on purpose.
pub fn sample_chapters() -> Vec<Value> {
  vec![
    json!({
      "id": 1,
      "title": "Intro",
      "quests": [
        {"id": 1, "title": "Hello"},
        {
          "id": 3,
          "title": "Variables",
          "text": "Declare a variable named answer.",
          "matchPatterns": ["let\\s+answer"],
          "rejectPatterns": ["var\\s"],
          "code": "// your code here",
          "hints": ["Use let", "Assign 42"],
          "test": {"code": "answer", "answer": "42"}
        }
      ]
    }),
    json!({
      "id": 2,
      "title": "Functions",
      "quests": [
        {"id": 1, "title": "Fn intro"},
        {"id": 2, "title": "Fn return", "regexps": ["return"]}
      ]
    }),
    json!({"id": 3, "title": "Closures", "quests": []}),
  ]
}
