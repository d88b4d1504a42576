//! Handlers for `GET /tree/:clan` and `GET /search`.
//!
//! Both are pure derivations over the latest snapshot.

use axum::{
  Extension, Json,
  extract::{Path, Query, State},
};
use serde::Deserialize;
use vansh_core::{
  candidates,
  person::Person,
  photo::BlobStore,
  session::Session,
  store::PersonStore,
  tree::{DisplayNode, build_tree},
};

use crate::{ApiState, error::ApiError};

/// `GET /tree/:clan`: the display tree, or `null` when the clan has no head.
pub async fn tree<S, B>(
  State(state): State<ApiState<S, B>>,
  Path(clan): Path<String>,
) -> Result<Json<Option<DisplayNode>>, ApiError>
where
  S: PersonStore,
  B: BlobStore,
{
  let clan = state.clan_name(&clan).await?;
  Ok(Json(build_tree(&state.graph(), &clan)))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
  /// Men of the clan, for choosing a father or an ancestor.
  #[default]
  Father,
  /// Generation-1 men of the clan, for inserting a new head.
  Root,
  /// The unfathered record a new child entry should link to.
  Child,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
  /// Defaults to the session's selected clan.
  pub clan: Option<String>,
  #[serde(default)]
  pub q:    String,
  #[serde(default)]
  pub mode: SearchMode,
}

/// `GET /search[?clan=...][&q=...][&mode=father|root|child]`
pub async fn search<S, B>(
  State(state): State<ApiState<S, B>>,
  Extension(session): Extension<Session>,
  Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Person>>, ApiError>
where
  S: PersonStore,
  B: BlobStore,
{
  let clan = match params.clan.as_deref() {
    Some(c) => c,
    None => session.clan()?,
  };
  let clan = state.clan_name(clan).await?;
  let clan = clan.as_str();
  let graph = state.graph();
  let found: Vec<Person> = match params.mode {
    SearchMode::Father => candidates::father_candidates(&graph, clan, &params.q)
      .into_iter()
      .cloned()
      .collect(),
    SearchMode::Root => candidates::root_candidates(&graph, clan, &params.q)
      .into_iter()
      .cloned()
      .collect(),
    SearchMode::Child => candidates::child_link_candidate(&graph, clan, &params.q)
      .into_iter()
      .cloned()
      .collect(),
  };
  Ok(Json(found))
}
