//! Loading service configuration from TOML, with environment overrides.
//!
//! The file path comes from QUESTLINE_CONFIG. A missing or broken file is logged and
//! defaults are used instead. See `AppConfig` for the expected schema.

use serde::Deserialize;
use tracing::{error, info, warn};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub server: ServerConfig,
  #[serde(default)]
  pub store: StoreConfig,
  #[serde(default)]
  pub comments: CommentsConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub port: u16,
  pub static_dir: String,
  pub graphiql: bool,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self { port: 80, static_dir: "./static".into(), graphiql: true }
  }
}

/// Where the chapter catalog lives.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
  pub url: String,
  pub username: String,
  pub password: String,
  pub database: String,
  pub chapters_collection: String,
  pub posts_collection: String,
  pub batch_size: u32,
  /// Deadline for one store round (open cursor + drain).
  pub query_timeout_ms: u64,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      url: "http://localhost:8529".into(),
      username: "root".into(),
      password: "password".into(),
      database: "func_hell".into(),
      chapters_collection: "chapters".into(),
      posts_collection: "posts".into(),
      batch_size: 100,
      query_timeout_ms: 5_000,
    }
  }
}

/// Remote comments API for the post demo. An empty base URL disables it.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CommentsConfig {
  pub base_url: String,
}

impl Default for CommentsConfig {
  fn default() -> Self {
    Self { base_url: "https://jsonplaceholder.typicode.com".into() }
  }
}

impl AppConfig {
  /// File (if any) first, then environment overrides.
  pub fn load() -> Self {
    let mut cfg = load_config_file_from_env().unwrap_or_default();
    cfg.apply_env(|key| std::env::var(key).ok());
    cfg
  }

  /// Apply overrides from a key lookup. Values that fail to parse are ignored with a warning.
  pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
    // Server
    if let Some(port) = parse_var(&lookup, "PORT") { self.server.port = port; }
    if let Some(dir) = lookup("STATIC_DIR") { self.server.static_dir = dir; }
    if let Some(on) = parse_var(&lookup, "GRAPHIQL") { self.server.graphiql = on; }

    // Store
    if let Some(url) = lookup("ARANGO_URL") { self.store.url = url; }
    if let Some(user) = lookup("ARANGO_USER") { self.store.username = user; }
    if let Some(password) = lookup("ARANGO_PASSWORD") { self.store.password = password; }
    if let Some(db) = lookup("ARANGO_DATABASE") { self.store.database = db; }
    if let Some(ms) = parse_var(&lookup, "QUERY_TIMEOUT_MS") { self.store.query_timeout_ms = ms; }

    // Comments demo; "" turns it off.
    if let Some(url) = lookup("COMMENTS_API_URL") { self.comments.base_url = url; }
  }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
  let raw = lookup(key)?;
  match raw.parse::<T>() {
    Ok(v) => Some(v),
    Err(_) => {
      warn!(target: "questline_backend", %key, value = %raw, "Ignoring unparsable environment override");
      None
    }
  }
}

/// Attempt to load `AppConfig` from QUESTLINE_CONFIG. On any parsing/IO error, returns None.
pub fn load_config_file_from_env() -> Option<AppConfig> {
  let path = std::env::var("QUESTLINE_CONFIG").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AppConfig>(&s) {
      Ok(cfg) => {
        info!(target: "questline_backend", %path, "Loaded config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "questline_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "questline_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  #[test]
  fn partial_toml_keeps_defaults_for_missing_keys() {
    let cfg: AppConfig = toml::from_str(
      r#"
        [store]
        url = "http://arango:8529"
        database = "quests"

        [server]
        graphiql = false
      "#,
    )
    .unwrap();

    assert_eq!(cfg.store.url, "http://arango:8529");
    assert_eq!(cfg.store.database, "quests");
    assert_eq!(cfg.store.username, "root");
    assert_eq!(cfg.store.chapters_collection, "chapters");
    assert_eq!(cfg.server.port, 80);
    assert!(!cfg.server.graphiql);
    assert_eq!(cfg.comments.base_url, "https://jsonplaceholder.typicode.com");
  }

  #[test]
  fn env_overrides_win_and_bad_numbers_are_ignored() {
    let env: HashMap<&str, &str> = HashMap::from([
      ("PORT", "8080"),
      ("ARANGO_PASSWORD", "s3cret"),
      ("QUERY_TIMEOUT_MS", "soon"),
      ("COMMENTS_API_URL", ""),
    ]);
    let mut cfg = AppConfig::default();
    cfg.apply_env(|k| env.get(k).map(|v| v.to_string()));

    assert_eq!(cfg.server.port, 8080);
    assert_eq!(cfg.store.password, "s3cret");
    assert_eq!(cfg.store.query_timeout_ms, 5_000);
    assert!(cfg.comments.base_url.is_empty());
  }
}
