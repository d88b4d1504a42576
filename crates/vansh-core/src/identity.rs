//! Signed-in users and the identity-provider seam.

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

/// A signed-in user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
  pub uid:          String,
  pub display_name: String,
  #[serde(default)]
  pub email:        Option<String>,
  #[serde(default, rename = "photoURL")]
  pub photo_url:    Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
  #[error("sign-in cancelled")]
  Cancelled,
  #[error("invalid credentials")]
  InvalidCredentials,
  #[error("identity provider unavailable: {0}")]
  Unavailable(String),
}

/// Abstraction over whoever vouches for the current user.
pub trait IdentityProvider: Send + Sync {
  /// Authenticate and return the signed-in identity.
  fn sign_in(&self) -> impl Future<Output = Result<Identity, AuthError>> + Send + '_;

  fn sign_out(&self) -> impl Future<Output = ()> + Send + '_;

  /// Observable identity; holds `None` while signed out.
  fn current_identity(&self) -> watch::Receiver<Option<Identity>>;
}
