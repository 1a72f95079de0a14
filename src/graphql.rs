//! GraphQL surface: root query, nested resolvers and schema construction.
//!
//! Resolvers only pick the catalog call and translate its errors. Each error carries
//! `extensions.code` so clients can tell an unreachable store from a bad record.

use std::sync::Arc;

use async_graphql::{ComplexObject, Context, EmptyMutation, EmptySubscription, ErrorExtensions, Object, Schema};

use crate::catalog::{Catalog, CatalogError};
use crate::comments::{CommentsApi, CommentsError};
use crate::domain::{Chapter, Comment, Post, Quest, RecordId};
use crate::store::StoreError;

pub type CatalogSchema = Schema<QueryRoot, EmptyMutation, EmptySubscription>;

pub struct QueryRoot;

#[Object]
impl QueryRoot {
  /// Every chapter in store order, or only the chapter with `id`.
  async fn chapters(&self, ctx: &Context<'_>, id: Option<RecordId>) -> async_graphql::Result<Vec<Chapter>> {
    let catalog = ctx.data::<Arc<Catalog>>()?;
    catalog.chapters(id).await.map_err(field_error)
  }

  /// Demo post lookup.
  async fn post(&self, ctx: &Context<'_>, id: RecordId) -> async_graphql::Result<Option<Post>> {
    let catalog = ctx.data::<Arc<Catalog>>()?;
    catalog.post(id).await.map_err(field_error)
  }
}

#[ComplexObject]
impl Chapter {
  /// Quests of this chapter, or only the quest with `id`. Null when the lookup failed.
  async fn quests(&self, ctx: &Context<'_>, id: Option<RecordId>) -> async_graphql::Result<Option<Vec<Quest>>> {
    let catalog = ctx.data::<Arc<Catalog>>()?;
    // Nullable so a failure stays on this chapter instead of nulling the whole list.
    catalog.quests(self.id, id).await.map(Some).map_err(field_error)
  }
}

#[ComplexObject]
impl Post {
  async fn comments(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<Comment>> {
    let Some(api) = ctx.data_opt::<CommentsApi>() else {
      return Err(async_graphql::Error::new("comments API is not configured")
        .extend_with(|_, e| e.set("code", "COMMENTS_DISABLED")));
    };
    api.comments_for_post(self.id).await.map_err(comments_error)
  }
}

fn field_error(err: CatalogError) -> async_graphql::Error {
  async_graphql::Error::new(err.to_string()).extend_with(|_, e| {
    e.set("code", err.code());
    if let CatalogError::Store(StoreError::Query { code: Some(num), .. }) = &err {
      e.set("errorNum", *num);
    }
  })
}

fn comments_error(err: CommentsError) -> async_graphql::Error {
  tracing::error!(target: "questline_backend", error = %err, "Comments lookup failed");
  async_graphql::Error::new(err.to_string()).extend_with(|_, e| e.set("code", "COMMENTS_FAILED"))
}

/// Build the schema with the catalog (and optional comments client) injected.
pub fn build_schema(catalog: Arc<Catalog>, comments: Option<CommentsApi>) -> CatalogSchema {
  let mut builder = Schema::build(QueryRoot, EmptyMutation, EmptySubscription).data(catalog);
  if let Some(api) = comments {
    builder = builder.data(api);
  }
  builder.finish()
}

/// SDL of the public schema; needs no store.
pub fn schema_sdl() -> String {
  Schema::build(QueryRoot, EmptyMutation, EmptySubscription).finish().sdl()
}
