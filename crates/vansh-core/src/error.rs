//! Error types for `vansh-core`.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::{identity::AuthError, wizard::Step};

/// The input field a [`ValidationError`] is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "field", content = "index", rename_all = "snake_case")]
pub enum Field {
  PersonName,
  FatherName,
  MotherName,
  MaidenClan,
  ClanName,
  /// Name of the child entry at this position in the wizard's list.
  ChildName(usize),
  /// Gender of the child entry at this position in the wizard's list.
  ChildGender(usize),
  Photo,
}

impl fmt::Display for Field {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::PersonName => f.write_str("name"),
      Self::FatherName => f.write_str("father name"),
      Self::MotherName => f.write_str("mother name"),
      Self::MaidenClan => f.write_str("maiden clan"),
      Self::ClanName => f.write_str("clan name"),
      Self::ChildName(i) => write!(f, "child #{} name", i + 1),
      Self::ChildGender(i) => write!(f, "child #{} gender", i + 1),
      Self::Photo => f.write_str("photo"),
    }
  }
}

/// Local input problem detected before any write is issued.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{field}: {message}")]
pub struct ValidationError {
  pub field:   Field,
  pub message: String,
}

impl ValidationError {
  pub fn new(field: Field, message: impl Into<String>) -> Self {
    Self { field, message: message.into() }
  }
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("person not found: {0}")]
  PersonNotFound(Uuid),

  #[error("clan {0:?} has no head")]
  NoHead(String),

  #[error("no clan selected")]
  NoClanSelected,

  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error("link conflict: {0}")]
  LinkConflict(String),

  #[error("admin mode is required to {0}")]
  AdminRequired(&'static str),

  #[error("not signed in")]
  NotSignedIn,

  #[error("cannot {action} during the {step} step")]
  WrongStep { action: &'static str, step: Step },

  #[error(transparent)]
  Auth(#[from] AuthError),

  /// A remote write or read failed. The caller may retry.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend error.
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }

  /// Whether repeating the same call may succeed without changing input.
  pub fn is_retryable(&self) -> bool { matches!(self, Self::Store(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
