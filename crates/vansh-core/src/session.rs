//! Explicit per-user application context.
//!
//! The selected clan and the admin capability travel with the caller instead
//! of living in globals. Operations that need them take a `&Session`.

use serde::{Deserialize, Serialize};

use crate::{Error, Result, identity::Identity};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
  pub clan:     Option<String>,
  pub identity: Option<Identity>,
  /// Capability flag for destructive and corrective operations.
  pub admin:    bool,
}

impl Session {
  pub fn anonymous() -> Self { Self::default() }

  pub fn signed_in(identity: Identity, admin: bool) -> Self {
    Self { clan: None, identity: Some(identity), admin }
  }

  pub fn with_clan(mut self, clan: impl Into<String>) -> Self {
    self.clan = Some(clan.into());
    self
  }

  pub fn select_clan(&mut self, clan: impl Into<String>) { self.clan = Some(clan.into()); }

  /// The selected clan, or [`Error::NoClanSelected`].
  pub fn clan(&self) -> Result<&str> {
    self.clan.as_deref().ok_or(Error::NoClanSelected)
  }

  pub fn identity(&self) -> Result<&Identity> {
    self.identity.as_ref().ok_or(Error::NotSignedIn)
  }

  /// The single admin gate. `action` completes "admin mode is required to …".
  pub fn require_admin(&self, action: &'static str) -> Result<()> {
    if self.admin {
      Ok(())
    } else {
      Err(Error::AdminRequired(action))
    }
  }

  /// Drop the identity; admin mode never outlives a sign-out.
  pub fn sign_out(&mut self) {
    self.identity = None;
    self.admin = false;
  }
}

/// Proof that the user explicitly confirmed a destructive action.
///
/// Destructive operations take one of these by value; callers obtain it only
/// after showing the consequences and receiving a yes.
#[derive(Debug)]
pub struct Confirmation(());

impl Confirmation {
  pub fn granted() -> Self { Self(()) }
}
