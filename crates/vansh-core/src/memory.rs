//! An in-process [`PersonStore`] for tests and demos.
//!
//! Writes are recorded in a log, and the store can be told to fail upcoming
//! writes so callers can exercise their retry paths.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, MutexGuard},
};

use chrono::Utc;
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

use crate::{
  clan::same_clan,
  graph::Graph,
  person::{NewPerson, Person, PersonPatch},
  profile::UserProfile,
  store::{PersonStore, Snapshot, Subscription},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
  #[error("injected failure on {0}")]
  Injected(&'static str),
}

/// One successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
  Create(Uuid),
  Update(Uuid),
  Delete(Uuid),
  DeleteAll,
}

#[derive(Debug, Default)]
struct Inner {
  people:   Vec<Person>,
  clans:    Vec<String>,
  profiles: HashMap<String, UserProfile>,
  log:      Vec<Write>,
  skip:     usize,
  fail:     usize,
}

#[derive(Debug, Clone)]
pub struct MemoryStore {
  inner: Arc<Mutex<Inner>>,
  tx:    Arc<watch::Sender<Snapshot>>,
}

impl Default for MemoryStore {
  fn default() -> Self { Self::new() }
}

impl MemoryStore {
  pub fn new() -> Self {
    let (tx, _) = watch::channel(Snapshot::from(Vec::new()));
    Self { inner: Arc::default(), tx: Arc::new(tx) }
  }

  fn lock(&self) -> MutexGuard<'_, Inner> {
    // a panic while holding the lock leaves the data usable
    self.inner.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Fail the next `n` writes.
  pub fn fail_next(&self, n: usize) { self.fail_after(0, n); }

  /// Let `skip` writes through, then fail the `n` after them.
  pub fn fail_after(&self, skip: usize, n: usize) {
    let mut inner = self.lock();
    inner.skip = skip;
    inner.fail = n;
  }

  pub fn log(&self) -> Vec<Write> { self.lock().log.clone() }

  pub fn clear_log(&self) { self.lock().log.clear(); }

  pub fn len(&self) -> usize { self.lock().people.len() }

  pub fn is_empty(&self) -> bool { self.lock().people.is_empty() }

  /// A graph over the current records.
  pub fn graph(&self) -> Graph { Graph::new(self.lock().people.iter().cloned()) }

  /// Consume one slot of the failure schedule.
  fn check(inner: &mut Inner, op: &'static str) -> Result<(), MemoryError> {
    if inner.skip > 0 {
      inner.skip -= 1;
      return Ok(());
    }
    if inner.fail > 0 {
      inner.fail -= 1;
      return Err(MemoryError::Injected(op));
    }
    Ok(())
  }

  fn publish(&self, inner: &Inner) {
    let mut people = inner.people.clone();
    people.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    self.tx.send_replace(Snapshot::from(people));
  }
}

impl PersonStore for MemoryStore {
  type Error = MemoryError;

  async fn list_people(&self) -> Result<Vec<Person>, MemoryError> {
    let mut people = self.lock().people.clone();
    people.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    Ok(people)
  }

  async fn get_person(&self, id: Uuid) -> Result<Option<Person>, MemoryError> {
    Ok(self.lock().people.iter().find(|p| p.id == id).cloned())
  }

  async fn create_person(&self, input: NewPerson) -> Result<Person, MemoryError> {
    let mut inner = self.lock();
    Self::check(&mut inner, "create")?;
    let person = Person::from_new(Uuid::new_v4(), Utc::now(), input);
    inner.people.push(person.clone());
    inner.log.push(Write::Create(person.id));
    self.publish(&inner);
    Ok(person)
  }

  async fn update_person(&self, id: Uuid, patch: PersonPatch) -> Result<bool, MemoryError> {
    let mut inner = self.lock();
    Self::check(&mut inner, "update")?;
    let Some(person) = inner.people.iter_mut().find(|p| p.id == id) else {
      return Ok(false);
    };
    patch.apply(person);
    inner.log.push(Write::Update(id));
    self.publish(&inner);
    Ok(true)
  }

  async fn delete_person(&self, id: Uuid) -> Result<bool, MemoryError> {
    let mut inner = self.lock();
    Self::check(&mut inner, "delete")?;
    let before = inner.people.len();
    inner.people.retain(|p| p.id != id);
    if inner.people.len() == before {
      return Ok(false);
    }
    inner.log.push(Write::Delete(id));
    self.publish(&inner);
    Ok(true)
  }

  async fn delete_all(&self) -> Result<usize, MemoryError> {
    let mut inner = self.lock();
    Self::check(&mut inner, "delete all")?;
    let removed = inner.people.len();
    inner.people.clear();
    inner.log.push(Write::DeleteAll);
    self.publish(&inner);
    Ok(removed)
  }

  async fn list_clans(&self) -> Result<Vec<String>, MemoryError> {
    let mut clans = self.lock().clans.clone();
    clans.sort_by_key(|c| c.to_lowercase());
    Ok(clans)
  }

  async fn add_clan(&self, name: String) -> Result<bool, MemoryError> {
    let mut inner = self.lock();
    if inner.clans.iter().any(|c| same_clan(c, &name)) {
      return Ok(false);
    }
    inner.clans.push(name);
    Ok(true)
  }

  async fn remove_clan(&self, name: String) -> Result<bool, MemoryError> {
    let mut inner = self.lock();
    let before = inner.clans.len();
    inner.clans.retain(|c| !same_clan(c, &name));
    Ok(inner.clans.len() != before)
  }

  async fn get_profile(&self, uid: String) -> Result<Option<UserProfile>, MemoryError> {
    Ok(self.lock().profiles.get(&uid).cloned())
  }

  async fn put_profile(&self, profile: UserProfile) -> Result<(), MemoryError> {
    self.lock().profiles.insert(profile.uid.clone(), profile);
    Ok(())
  }

  fn subscribe(&self) -> Subscription { Subscription::new(self.tx.subscribe()) }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::person::Gender;

  #[tokio::test]
  async fn writes_publish_snapshots() {
    let store = MemoryStore::new();
    let mut sub = store.subscribe();
    assert!(sub.current().is_empty());

    let ram = store
      .create_person(NewPerson::new("Ram", Gender::Male, "Yadav", 1))
      .await
      .unwrap();
    let snap = sub.next().await.unwrap();
    assert_eq!(snap.len(), 1);
    assert_eq!(snap[0].id, ram.id);
  }

  #[tokio::test]
  async fn failure_schedule() {
    let store = MemoryStore::new();
    store.fail_after(1, 1);
    let input = NewPerson::new("Ram", Gender::Male, "Yadav", 1);
    assert!(store.create_person(input.clone()).await.is_ok());
    assert!(store.create_person(input.clone()).await.is_err());
    assert!(store.create_person(input).await.is_ok());
    assert_eq!(store.len(), 2);
    assert_eq!(store.log().len(), 2);
  }

  #[tokio::test]
  async fn update_of_missing_record_is_not_an_error() {
    let store = MemoryStore::new();
    let found = store
      .update_person(Uuid::new_v4(), PersonPatch::generation(2))
      .await
      .unwrap();
    assert!(!found);
  }
}
