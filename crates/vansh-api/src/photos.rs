//! Handlers for `/people/:id/photo`.
//!
//! `PUT` takes the raw image as the request body, typed by `Content-Type`.
//! Validation happens before anything is uploaded.

use axum::{
  Extension, Json,
  body::Bytes,
  extract::{Path, State},
  http::{HeaderMap, header},
};
use serde::Serialize;
use uuid::Uuid;
use vansh_core::{
  photo::{self, BlobStore, PhotoUpload},
  session::Session,
  store::PersonStore,
};

use crate::{ApiState, error::ApiError};

#[derive(Debug, Serialize)]
pub struct PhotoOutcome {
  #[serde(rename = "photoURL")]
  pub photo_url: Option<String>,
}

/// `PUT /people/:id/photo`
pub async fn upload<S, B>(
  State(state): State<ApiState<S, B>>,
  Extension(session): Extension<Session>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
  body: Bytes,
) -> Result<Json<PhotoOutcome>, ApiError>
where
  S: PersonStore,
  B: BlobStore,
{
  session.identity()?;
  let media_type = headers
    .get(header::CONTENT_TYPE)
    .and_then(|v| v.to_str().ok())
    .unwrap_or_default();
  let upload = PhotoUpload::new(media_type, body.to_vec());
  let url = photo::set_photo(state.store.as_ref(), state.blobs.as_ref(), id, upload).await?;
  Ok(Json(PhotoOutcome { photo_url: Some(url) }))
}

/// `DELETE /people/:id/photo`
pub async fn remove<S, B>(
  State(state): State<ApiState<S, B>>,
  Extension(session): Extension<Session>,
  Path(id): Path<Uuid>,
) -> Result<Json<PhotoOutcome>, ApiError>
where
  S: PersonStore,
  B: BlobStore,
{
  session.identity()?;
  if !photo::remove_photo(state.store.as_ref(), state.blobs.as_ref(), id).await? {
    return Err(ApiError::NotFound(format!("person {id} has no photo")));
  }
  Ok(Json(PhotoOutcome { photo_url: None }))
}
