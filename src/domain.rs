//! Domain records read from the document store and exposed over GraphQL.
//!
//! Documents are provisioned out-of-band, so decoding is lenient: absent fields
//! fall back to empty values. A field of the wrong type still fails to decode.

use async_graphql::SimpleObject;
use serde::{Deserialize, Serialize};

/// Store-assigned identifier, opaque to the API.
pub type RecordId = i64;

/// Top-level grouping of quests. Quests are resolved by a nested field, see `graphql`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, SimpleObject)]
#[graphql(complex)]
#[serde(default)]
pub struct Chapter {
  pub id: RecordId,
  pub title: String,
}

/// A single coding exercise.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, SimpleObject)]
#[serde(default, rename_all = "camelCase")]
pub struct Quest {
  pub id: RecordId,
  pub title: String,
  pub text: String,
  /// Patterns a correct answer must match. Older documents call these `regexps`.
  #[serde(alias = "regexps")]
  pub match_patterns: Vec<String>,
  /// Patterns a correct answer must not match. Older documents call these `regexpsNone`.
  #[serde(alias = "regexpsNone")]
  pub reject_patterns: Vec<String>,
  pub code: String,
  pub hints: Vec<String>,
  pub test: TestInfo,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, SimpleObject)]
#[serde(default)]
pub struct TestInfo {
  pub code: String,
  pub answer: String,
}

/// Forum-style demo record; comments come from the remote comments API.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, SimpleObject)]
#[graphql(complex)]
#[serde(default, rename_all = "camelCase")]
pub struct Post {
  pub user_id: RecordId,
  pub id: RecordId,
  pub title: String,
  pub body: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, SimpleObject)]
#[serde(default, rename_all = "camelCase")]
pub struct Comment {
  pub post_id: RecordId,
  pub id: RecordId,
  pub name: String,
  pub email: String,
  pub body: String,
}
