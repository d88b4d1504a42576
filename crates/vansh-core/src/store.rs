//! The `PersonStore` trait and snapshot subscriptions.
//!
//! The trait is implemented by storage backends (`vansh-store-sqlite`, the
//! CLI's HTTP client, and [`crate::memory::MemoryStore`]). Higher layers depend
//! on this abstraction, never on a concrete backend.

use std::{future::Future, sync::Arc};

use tokio::sync::watch;
use uuid::Uuid;

use crate::{
  person::{NewPerson, Person, PersonPatch},
  profile::UserProfile,
};

/// A full, immutable copy of every person record at one point in time.
pub type Snapshot = Arc<[Person]>;

// ─── Subscription ────────────────────────────────────────────────────────────

/// A live feed of full snapshots. Dropping it unsubscribes.
#[derive(Debug, Clone)]
pub struct Subscription {
  rx: watch::Receiver<Snapshot>,
}

impl Subscription {
  pub fn new(rx: watch::Receiver<Snapshot>) -> Self { Self { rx } }

  /// The most recent snapshot, without waiting.
  pub fn current(&self) -> Snapshot { self.rx.borrow().clone() }

  /// Wait for the next snapshot. Returns `None` once the store has gone away.
  pub async fn next(&mut self) -> Option<Snapshot> {
    self.rx.changed().await.ok()?;
    Some(self.rx.borrow_and_update().clone())
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the durable person record collection.
///
/// Every write is independent; there are no multi-record transactions. After
/// each successful write the backend publishes a new snapshot to all
/// subscribers.
pub trait PersonStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── People ────────────────────────────────────────────────────────────

  /// All records, ordered by name.
  fn list_people(
    &self,
  ) -> impl Future<Output = Result<Vec<Person>, Self::Error>> + Send + '_;

  fn get_person(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Person>, Self::Error>> + Send + '_;

  /// Persist a new record; the store assigns `id` and `created_at`.
  fn create_person(
    &self,
    input: NewPerson,
  ) -> impl Future<Output = Result<Person, Self::Error>> + Send + '_;

  /// Apply a partial update. Returns `false` if `id` does not exist, which
  /// callers treat as "already deleted" rather than an error.
  fn update_person(
    &self,
    id: Uuid,
    patch: PersonPatch,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Remove one record. Reference cleanup is the caller's job; see
  /// [`crate::ops::DeletePlan`].
  fn delete_person(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Remove every record and return how many were deleted.
  fn delete_all(&self) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Clans ─────────────────────────────────────────────────────────────

  /// Ad hoc clan names added at runtime (the seed list lives in config).
  fn list_clans(
    &self,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  /// Returns `false` if a name equal ignoring case already exists.
  fn add_clan(
    &self,
    name: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn remove_clan(
    &self,
    name: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Profiles ──────────────────────────────────────────────────────────

  fn get_profile(
    &self,
    uid: String,
  ) -> impl Future<Output = Result<Option<UserProfile>, Self::Error>> + Send + '_;

  /// Insert or replace the profile keyed by `profile.uid`.
  fn put_profile(
    &self,
    profile: UserProfile,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Change feed ───────────────────────────────────────────────────────

  /// Subscribe to full snapshots. The current snapshot is available
  /// immediately through [`Subscription::current`].
  fn subscribe(&self) -> Subscription;
}
