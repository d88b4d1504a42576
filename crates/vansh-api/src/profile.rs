//! Handlers for the caller's identity and profile.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`   | `/me` | The request [`Session`] |
//! | `GET`   | `/profile` | Own profile or `null`; stale links are cleared |
//! | `PUT`   | `/profile` | Body: `{"name","clan"}`; onboarding |
//! | `PATCH` | `/profile` | Body: `{"name"}`; renames profile and linked person |
//! | `GET`   | `/profile/matches` | People the profile could link to |
//! | `POST`  | `/profile/link` | Body: `{"personId"}` |

use axum::{
  Extension, Json,
  extract::State,
  http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;
use vansh_core::{
  person::Person,
  photo::BlobStore,
  profile::{self, UserProfile},
  session::Session,
  store::PersonStore,
};

use crate::{
  ApiState,
  error::{ApiError, store_err},
};

/// `GET /me`
pub async fn me(Extension(session): Extension<Session>) -> Json<Session> { Json(session) }

async fn own_profile<S: PersonStore>(store: &S, session: &Session) -> Result<UserProfile, ApiError> {
  let identity = session.identity()?;
  store
    .get_profile(identity.uid.clone())
    .await
    .map_err(store_err)?
    .ok_or_else(|| ApiError::NotFound("no profile registered".into()))
}

/// `GET /profile`
pub async fn get_own<S, B>(
  State(state): State<ApiState<S, B>>,
  Extension(session): Extension<Session>,
) -> Result<Json<Option<UserProfile>>, ApiError>
where
  S: PersonStore,
  B: BlobStore,
{
  let mut profile = match own_profile(state.store.as_ref(), &session).await {
    Ok(p) => p,
    Err(ApiError::NotFound(_)) => return Ok(Json(None)),
    Err(e) => return Err(e),
  };
  let graph = state.graph();
  profile::linked_person(state.store.as_ref(), &graph, &mut profile).await?;
  Ok(Json(Some(profile)))
}

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  pub name: String,
  #[serde(alias = "gotra")]
  pub clan: String,
}

/// `PUT /profile`
pub async fn register<S, B>(
  State(state): State<ApiState<S, B>>,
  Extension(session): Extension<Session>,
  Json(body): Json<RegisterBody>,
) -> Result<Json<UserProfile>, ApiError>
where
  S: PersonStore,
  B: BlobStore,
{
  let identity = session.identity()?;
  let profile = profile::register(
    state.store.as_ref(),
    &state.registry,
    identity,
    &body.name,
    &body.clan,
  )
  .await?;
  Ok(Json(profile))
}

#[derive(Debug, Deserialize)]
pub struct RenameBody {
  pub name: String,
}

/// `PATCH /profile`
pub async fn rename<S, B>(
  State(state): State<ApiState<S, B>>,
  Extension(session): Extension<Session>,
  Json(body): Json<RenameBody>,
) -> Result<StatusCode, ApiError>
where
  S: PersonStore,
  B: BlobStore,
{
  let mut profile = own_profile(state.store.as_ref(), &session).await?;
  profile::rename(state.store.as_ref(), &mut profile, &body.name).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `GET /profile/matches`
pub async fn matches<S, B>(
  State(state): State<ApiState<S, B>>,
  Extension(session): Extension<Session>,
) -> Result<Json<Vec<Person>>, ApiError>
where
  S: PersonStore,
  B: BlobStore,
{
  let profile = own_profile(state.store.as_ref(), &session).await?;
  let graph = state.graph();
  let found = profile::profile_matches(&graph, &profile).into_iter().cloned().collect();
  Ok(Json(found))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkBody {
  pub person_id: Uuid,
}

/// `POST /profile/link`
pub async fn link<S, B>(
  State(state): State<ApiState<S, B>>,
  Extension(session): Extension<Session>,
  Json(body): Json<LinkBody>,
) -> Result<Json<UserProfile>, ApiError>
where
  S: PersonStore,
  B: BlobStore,
{
  let identity = session.identity()?;
  let graph = state.graph();
  let profile =
    profile::link_profile(state.store.as_ref(), &graph, identity, body.person_id).await?;
  Ok(Json(profile))
}
