//! JSON REST API for Vansh.
//!
//! Exposes an axum [`Router`] backed by any [`vansh_core::store::PersonStore`]
//! and [`vansh_core::photo::BlobStore`]. Handlers expect a
//! [`vansh_core::session::Session`] request extension; inserting it (and
//! authenticating the caller) is the embedding server's job.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", vansh_api::api_router(state))
//! ```

pub mod clans;
pub mod error;
pub mod people;
pub mod photos;
pub mod profile;
pub mod tree;

use std::sync::Arc;

use axum::{
  Router,
  extract::DefaultBodyLimit,
  routing::{get, patch, post, put},
};
use serde::Deserialize;
use vansh_core::{
  clan::ClanRegistry,
  graph::Graph,
  ops,
  photo::{BlobStore, MAX_PHOTO_BYTES},
  session::Confirmation,
  store::PersonStore,
};

pub use error::ApiError;

// ─── State ───────────────────────────────────────────────────────────────────

/// Shared state threaded through all API handlers.
pub struct ApiState<S, B> {
  pub store:    Arc<S>,
  pub blobs:    Arc<B>,
  pub registry: Arc<ClanRegistry>,
}

impl<S, B> Clone for ApiState<S, B> {
  fn clone(&self) -> Self {
    Self {
      store:    self.store.clone(),
      blobs:    self.blobs.clone(),
      registry: self.registry.clone(),
    }
  }
}

impl<S: PersonStore, B> ApiState<S, B> {
  /// A graph over the store's latest snapshot. Stores publish before a write
  /// returns, so this always reflects completed writes.
  pub fn graph(&self) -> Graph { Graph::new(self.store.subscribe().current().iter().cloned()) }

  /// `raw` in the spelling of the matching known clan.
  pub async fn clan_name(&self, raw: &str) -> Result<String, ApiError> {
    Ok(ops::resolve_clan(self.store.as_ref(), &self.registry, raw).await?)
  }
}

// ─── Confirmation ────────────────────────────────────────────────────────────

/// `?confirm=true`, required by destructive endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ConfirmParams {
  #[serde(default)]
  pub confirm: bool,
}

impl ConfirmParams {
  pub fn confirmation(&self) -> Result<Confirmation, ApiError> {
    if self.confirm {
      Ok(Confirmation::granted())
    } else {
      Err(ApiError::bad_request("this action must be confirmed with ?confirm=true"))
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, B>(state: ApiState<S, B>) -> Router<()>
where
  S: PersonStore + 'static,
  B: BlobStore + 'static,
{
  Router::new()
    // People
    .route("/people", get(people::list::<S, B>).post(people::create::<S, B>))
    .route(
      "/people/{id}",
      get(people::get_one::<S, B>)
        .patch(people::update::<S, B>)
        .delete(people::delete::<S, B>),
    )
    .route("/people/{id}/delete-plan", get(people::delete_plan::<S, B>))
    .route("/people/{id}/details", patch(people::edit::<S, B>))
    .route("/people/{id}/dob", put(people::set_dob::<S, B>))
    .route("/people/{id}/relatives", get(people::relatives::<S, B>))
    .route(
      "/people/{id}/photo",
      put(photos::upload::<S, B>)
        .delete(photos::remove::<S, B>)
        .layer(DefaultBodyLimit::max(2 * MAX_PHOTO_BYTES)),
    )
    .route("/reset", post(people::reset::<S, B>))
    // Clans
    .route("/clans", get(clans::list::<S, B>).post(clans::create::<S, B>))
    .route("/clans/{name}", axum::routing::delete(clans::remove::<S, B>))
    // Tree and search
    .route("/tree/{clan}", get(tree::tree::<S, B>))
    .route("/search", get(tree::search::<S, B>))
    // Identity and profile
    .route("/me", get(profile::me))
    .route(
      "/profile",
      get(profile::get_own::<S, B>)
        .put(profile::register::<S, B>)
        .patch(profile::rename::<S, B>),
    )
    .route("/profile/matches", get(profile::matches::<S, B>))
    .route("/profile/link", post(profile::link::<S, B>))
    .with_state(state)
}
