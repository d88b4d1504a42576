//! Handlers for `/clans` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`    | `/clans` | Seed clans merged with stored ones, sorted |
//! | `POST`   | `/clans` | Body: `{"name":"..."}`; 201 if new, 200 if present |
//! | `DELETE` | `/clans/:name?confirm=true` | Admin; seed clans are kept |

use axum::{
  Extension, Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use serde::{Deserialize, Serialize};
use vansh_core::{ops, photo::BlobStore, session::Session, store::PersonStore};

use crate::{
  ApiState, ConfirmParams,
  error::{ApiError, store_err},
};

/// `GET /clans`
pub async fn list<S, B>(State(state): State<ApiState<S, B>>) -> Result<Json<Vec<String>>, ApiError>
where
  S: PersonStore,
  B: BlobStore,
{
  let stored = state.store.list_clans().await.map_err(store_err)?;
  Ok(Json(state.registry.merge(stored)))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ClanOutcome {
  /// The name as stored, which may differ in case from the request.
  pub name:    String,
  pub created: bool,
}

/// `POST /clans`, body: `{"name":"Yadav"}`
pub async fn create<S, B>(
  State(state): State<ApiState<S, B>>,
  Extension(session): Extension<Session>,
  Json(body): Json<CreateBody>,
) -> Result<(StatusCode, Json<ClanOutcome>), ApiError>
where
  S: PersonStore,
  B: BlobStore,
{
  session.identity()?;
  let (name, created) = ops::add_clan(state.store.as_ref(), &state.registry, &body.name).await?;
  let status = if created { StatusCode::CREATED } else { StatusCode::OK };
  Ok((status, Json(ClanOutcome { name, created })))
}

#[derive(Debug, Serialize)]
pub struct RemoveOutcome {
  pub removed: bool,
}

/// `DELETE /clans/:name?confirm=true`
pub async fn remove<S, B>(
  State(state): State<ApiState<S, B>>,
  Extension(session): Extension<Session>,
  Path(name): Path<String>,
  Query(params): Query<ConfirmParams>,
) -> Result<Json<RemoveOutcome>, ApiError>
where
  S: PersonStore,
  B: BlobStore,
{
  session.require_admin("delete clans")?;
  let confirmed = params.confirmation()?;
  let removed = ops::remove_clan(
    state.store.as_ref(),
    &state.registry,
    &session,
    &name,
    confirmed,
  )
  .await?;
  Ok(Json(RemoveOutcome { removed }))
}
