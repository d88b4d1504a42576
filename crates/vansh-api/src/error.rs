//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::error;
use vansh_core::error::{Field, ValidationError};

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {message}")]
  BadRequest { message: String, field: Option<Field> },

  #[error("unauthorized: {0}")]
  Unauthorized(String),

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn bad_request(message: impl Into<String>) -> Self {
    Self::BadRequest { message: message.into(), field: None }
  }
}

impl From<ValidationError> for ApiError {
  fn from(v: ValidationError) -> Self {
    Self::BadRequest { message: v.to_string(), field: Some(v.field) }
  }
}

impl From<vansh_core::Error> for ApiError {
  fn from(e: vansh_core::Error) -> Self {
    use vansh_core::Error as E;
    match e {
      E::PersonNotFound(_) | E::NoHead(_) => Self::NotFound(e.to_string()),
      E::NoClanSelected => Self::bad_request(e.to_string()),
      E::Validation(v) => v.into(),
      E::LinkConflict(_) | E::WrongStep { .. } => Self::Conflict(e.to_string()),
      E::AdminRequired(_) => Self::Forbidden(e.to_string()),
      E::NotSignedIn | E::Auth(_) => Self::Unauthorized(e.to_string()),
      E::Store(inner) => Self::Store(inner),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
      ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::Store(e) => {
        error!(error = %e, "store failure");
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };

    let mut body = match &self {
      ApiError::NotFound(m)
      | ApiError::Unauthorized(m)
      | ApiError::Forbidden(m)
      | ApiError::Conflict(m) => json!({ "error": m }),
      ApiError::BadRequest { message, .. } => json!({ "error": message }),
      ApiError::Store(e) => json!({ "error": e.to_string() }),
    };
    // flatten the field tag next to the message: {"error", "field", "index"}
    if let ApiError::BadRequest { field: Some(field), .. } = &self
      && let (Some(obj), Ok(Value::Object(extra))) =
        (body.as_object_mut(), serde_json::to_value(field))
    {
      obj.extend(extra);
    }

    let mut res = (status, Json(body)).into_response();
    if status == StatusCode::UNAUTHORIZED {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"vansh\""),
      );
    }
    res
  }
}

/// Shorthand used by every handler.
pub(crate) fn store_err<E>(e: E) -> ApiError
where
  E: std::error::Error + Send + Sync + 'static,
{
  ApiError::Store(Box::new(e))
}
