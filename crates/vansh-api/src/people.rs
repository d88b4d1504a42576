//! Handlers for `/people` endpoints and `/reset`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`    | `/people` | Full snapshot, ordered by name |
//! | `POST`   | `/people` | Body: [`NewPerson`]; names normalised; 201 |
//! | `GET`    | `/people/:id` | 404 if not found |
//! | `PATCH`  | `/people/:id` | Body: [`PersonPatch`]; 404 if not found |
//! | `DELETE` | `/people/:id?confirm=true` | Admin; clears every reference |
//! | `GET`    | `/people/:id/delete-plan` | What a delete would touch |
//! | `PATCH`  | `/people/:id/details` | Admin; body: [`PersonEdit`] |
//! | `PUT`    | `/people/:id/dob` | Body: `{"dob":"YYYY-MM-DD"}` |
//! | `GET`    | `/people/:id/relatives` | [`Relatives`] |
//! | `POST`   | `/reset?confirm=true` | Admin; deletes everyone |

use axum::{
  Extension, Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;
use vansh_core::{
  graph::Graph,
  ops::{self, DeletePlan, PersonEdit},
  person::{NewPerson, Person, PersonPatch, normalize_name},
  photo::BlobStore,
  profile::Relatives,
  session::Session,
  store::PersonStore,
};

use crate::{
  ApiState, ConfirmParams,
  error::{ApiError, store_err},
};

// ─── Read ────────────────────────────────────────────────────────────────────

/// `GET /people`
pub async fn list<S, B>(State(state): State<ApiState<S, B>>) -> Result<Json<Vec<Person>>, ApiError>
where
  S: PersonStore,
  B: BlobStore,
{
  let people = state.store.list_people().await.map_err(store_err)?;
  Ok(Json(people))
}

/// `GET /people/:id`
pub async fn get_one<S, B>(
  State(state): State<ApiState<S, B>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Person>, ApiError>
where
  S: PersonStore,
  B: BlobStore,
{
  let person = state
    .store
    .get_person(id)
    .await
    .map_err(store_err)?
    .ok_or_else(|| ApiError::NotFound(format!("person {id} not found")))?;
  Ok(Json(person))
}

/// `GET /people/:id/relatives`
pub async fn relatives<S, B>(
  State(state): State<ApiState<S, B>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Relatives>, ApiError>
where
  S: PersonStore,
  B: BlobStore,
{
  let graph = state.graph();
  let person = graph
    .get(id)
    .ok_or_else(|| ApiError::NotFound(format!("person {id} not found")))?;
  Ok(Json(Relatives::of(&graph, person)))
}

// ─── Write ───────────────────────────────────────────────────────────────────

/// `POST /people`
pub async fn create<S, B>(
  State(state): State<ApiState<S, B>>,
  Extension(session): Extension<Session>,
  Json(body): Json<NewPerson>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PersonStore,
  B: BlobStore,
{
  session.identity()?;
  let input = body.normalized();
  if input.name.is_empty() {
    return Err(ApiError::bad_request("name is required"));
  }
  check_generation(Some(input.generation))?;
  check_references(&state.graph(), None, [input.father_id, input.mother_id, input.spouse_id])?;
  let person = state.store.create_person(input).await.map_err(store_err)?;
  Ok((StatusCode::CREATED, Json(person)))
}

/// `PATCH /people/:id`
pub async fn update<S, B>(
  State(state): State<ApiState<S, B>>,
  Extension(session): Extension<Session>,
  Path(id): Path<Uuid>,
  Json(mut patch): Json<PersonPatch>,
) -> Result<StatusCode, ApiError>
where
  S: PersonStore,
  B: BlobStore,
{
  session.identity()?;
  if let Some(name) = patch.name.as_mut() {
    *name = normalize_name(name);
  }
  check_generation(patch.generation)?;
  check_references(&state.graph(), Some(id), [
    patch.father_id.flatten(),
    patch.mother_id.flatten(),
    patch.spouse_id.flatten(),
  ])?;
  if !state.store.update_person(id, patch).await.map_err(store_err)? {
    return Err(ApiError::NotFound(format!("person {id} not found")));
  }
  Ok(StatusCode::NO_CONTENT)
}

fn check_generation(generation: Option<u32>) -> Result<(), ApiError> {
  match generation {
    Some(0) => Err(ApiError::bad_request("generation starts at 1")),
    _ => Ok(()),
  }
}

/// Every reference a write sets must name another existing record.
fn check_references(graph: &Graph, id: Option<Uuid>, refs: [Option<Uuid>; 3]) -> Result<(), ApiError> {
  for target in refs.into_iter().flatten() {
    if Some(target) == id {
      return Err(ApiError::bad_request("a person cannot refer to themselves"));
    }
    if graph.get(target).is_none() {
      debug!(person_id = %target, "rejecting reference to a missing person");
      return Err(ApiError::bad_request(format!("person {target} does not exist")));
    }
  }
  Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
  /// Records whose references to the deleted person were cleared.
  pub cleared: usize,
}

/// `GET /people/:id/delete-plan`
pub async fn delete_plan<S, B>(
  State(state): State<ApiState<S, B>>,
  Path(id): Path<Uuid>,
) -> Result<Json<DeletePlan>, ApiError>
where
  S: PersonStore,
  B: BlobStore,
{
  Ok(Json(ops::plan_delete(&state.graph(), id)?))
}

/// `DELETE /people/:id?confirm=true`
pub async fn delete<S, B>(
  State(state): State<ApiState<S, B>>,
  Extension(session): Extension<Session>,
  Path(id): Path<Uuid>,
  Query(params): Query<ConfirmParams>,
) -> Result<Json<DeleteOutcome>, ApiError>
where
  S: PersonStore,
  B: BlobStore,
{
  session.require_admin("delete people")?;
  let confirmed = params.confirmation()?;
  let plan = ops::plan_delete(&state.graph(), id)?;
  let cleared = plan.execute(state.store.as_ref(), &session, confirmed).await?;
  Ok(Json(DeleteOutcome { cleared }))
}

/// `PATCH /people/:id/details`
pub async fn edit<S, B>(
  State(state): State<ApiState<S, B>>,
  Extension(session): Extension<Session>,
  Path(id): Path<Uuid>,
  Json(body): Json<PersonEdit>,
) -> Result<StatusCode, ApiError>
where
  S: PersonStore,
  B: BlobStore,
{
  ops::edit_person(state.store.as_ref(), &session, id, body).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct DobBody {
  pub dob: NaiveDate,
}

/// `PUT /people/:id/dob`
pub async fn set_dob<S, B>(
  State(state): State<ApiState<S, B>>,
  Extension(session): Extension<Session>,
  Path(id): Path<Uuid>,
  Json(body): Json<DobBody>,
) -> Result<StatusCode, ApiError>
where
  S: PersonStore,
  B: BlobStore,
{
  ops::set_dob(state.store.as_ref(), &session, id, body.dob).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct ResetOutcome {
  pub removed: usize,
}

/// `POST /reset?confirm=true`
pub async fn reset<S, B>(
  State(state): State<ApiState<S, B>>,
  Extension(session): Extension<Session>,
  Query(params): Query<ConfirmParams>,
) -> Result<Json<ResetOutcome>, ApiError>
where
  S: PersonStore,
  B: BlobStore,
{
  session.require_admin("reset all data")?;
  let confirmed = params.confirmation()?;
  let removed = ops::reset_all(state.store.as_ref(), &session, confirmed).await?;
  debug!(removed, "reset via api");
  Ok(Json(ResetOutcome { removed }))
}
