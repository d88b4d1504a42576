//! HTTP server for Vansh.
//!
//! Mounts the [`vansh_api`] router under `/api`, serves uploaded photos under
//! `/photos`, and resolves every request's [`vansh_core::session::Session`]
//! from HTTP Basic credentials.

pub mod auth;
pub mod error;
pub mod photos;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{Router, middleware};
use serde::Deserialize;
use tower_http::{services::ServeDir, trace::TraceLayer};
use vansh_api::ApiState;
use vansh_core::{clan::ClanRegistry, store::PersonStore};

use auth::{AuthConfig, UserConfig, session_layer};
use photos::FsBlobStore;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `VANSH_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:           String,
  pub port:           u16,
  pub store_path:     PathBuf,
  pub photo_dir:      PathBuf,
  /// URL prefix photo links are issued under; must match the mount point.
  #[serde(default = "default_photo_base_url")]
  pub photo_base_url: String,
  /// Clans offered before anyone has added one.
  #[serde(default)]
  pub seed_clans:     Vec<String>,
  #[serde(default)]
  pub users:          Vec<UserConfig>,
}

fn default_photo_base_url() -> String { "/photos".to_string() }

// ─── Application state ────────────────────────────────────────────────────────

/// Everything the router needs.
pub struct AppState<S> {
  pub store:    Arc<S>,
  pub blobs:    Arc<FsBlobStore>,
  pub registry: Arc<ClanRegistry>,
  pub auth:     Arc<AuthConfig>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:    self.store.clone(),
      blobs:    self.blobs.clone(),
      registry: self.registry.clone(),
      auth:     self.auth.clone(),
    }
  }
}

impl<S> AppState<S> {
  /// Assemble state from configuration and an opened store.
  pub fn new(store: S, config: &ServerConfig) -> Self {
    Self {
      store:    Arc::new(store),
      blobs:    Arc::new(FsBlobStore::new(&config.photo_dir, &config.photo_base_url)),
      registry: Arc::new(ClanRegistry::new(&config.seed_clans)),
      auth:     Arc::new(AuthConfig::new(config.users.clone())),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router.
pub fn router<S>(state: AppState<S>, photo_mount: &str) -> Router
where
  S: PersonStore + 'static,
{
  let api = vansh_api::api_router(ApiState {
    store:    state.store.clone(),
    blobs:    state.blobs.clone(),
    registry: state.registry.clone(),
  });

  Router::new()
    .nest("/api", api)
    .layer(middleware::from_fn_with_state(state.auth.clone(), session_layer))
    .nest_service(photo_mount, ServeDir::new(state.blobs.dir()))
    .layer(TraceLayer::new_for_http())
}

// ─── Integration tests ────────────────────────────────────────────────────────
