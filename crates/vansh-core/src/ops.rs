//! Corrective and destructive operations outside the wizard.
//!
//! All of these go through [`Session::require_admin`] except date-of-birth
//! entry and adding a clan, which any signed-in user may do.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  clan::{ClanRegistry, normalize_clan},
  error::{Field, ValidationError},
  graph::Graph,
  person::{Gender, Person, PersonPatch, normalize_name},
  session::{Confirmation, Session},
  store::PersonStore,
};

// ─── Delete ──────────────────────────────────────────────────────────────────

/// What deleting one person will touch. Shown to the user before they
/// confirm.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePlan {
  pub person:    Person,
  /// Records whose father, mother or spouse reference will be nulled.
  pub referrers: Vec<Person>,
}

/// Describe the delete of `id` against the current graph.
pub fn plan_delete(graph: &Graph, id: Uuid) -> Result<DeletePlan> {
  let person = graph.get(id).cloned().ok_or(Error::PersonNotFound(id))?;
  let referrers = graph.referrers_of(id).cloned().collect();
  Ok(DeletePlan { person, referrers })
}

impl DeletePlan {
  /// Delete the person, then clear every reference to them.
  ///
  /// A retry after a partial failure is safe: deleting an absent record and
  /// clearing an already-null reference are both no-ops.
  pub async fn execute<S: PersonStore>(
    &self,
    store: &S,
    session: &Session,
    _confirmed: Confirmation,
  ) -> Result<usize> {
    session.require_admin("delete people")?;
    let id = self.person.id;

    let removed = store.delete_person(id).await.map_err(Error::store)?;
    if !removed {
      debug!(person_id = %id, "person already deleted");
    }

    let mut cleared = 0;
    for referrer in &self.referrers {
      let patch = PersonPatch::clear_references(referrer, id);
      if patch.is_empty() {
        continue;
      }
      if store.update_person(referrer.id, patch).await.map_err(Error::store)? {
        cleared += 1;
      }
    }
    info!(person_id = %id, name = %self.person.name, cleared, "deleted person");
    Ok(cleared)
  }
}

/// Wipe every person record.
pub async fn reset_all<S: PersonStore>(
  store: &S,
  session: &Session,
  _confirmed: Confirmation,
) -> Result<usize> {
  session.require_admin("reset all data")?;
  let removed = store.delete_all().await.map_err(Error::store)?;
  warn!(removed, "all person records deleted");
  Ok(removed)
}

// ─── Edits ───────────────────────────────────────────────────────────────────

/// Admin corrections to a person's descriptive fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonEdit {
  #[serde(default)]
  pub name:   Option<String>,
  #[serde(default)]
  pub gender: Option<Gender>,
  #[serde(default)]
  pub dob:    Option<NaiveDate>,
}

pub async fn edit_person<S: PersonStore>(
  store: &S,
  session: &Session,
  id: Uuid,
  edit: PersonEdit,
) -> Result<()> {
  session.require_admin("edit people")?;
  let name = match edit.name {
    Some(raw) => {
      let name = normalize_name(&raw);
      if name.is_empty() {
        return Err(ValidationError::new(Field::PersonName, "name cannot be empty").into());
      }
      Some(name)
    }
    None => None,
  };
  let patch = PersonPatch {
    name,
    gender: edit.gender,
    dob: edit.dob.map(Some),
    ..PersonPatch::default()
  };
  if patch.is_empty() {
    return Ok(());
  }
  if !store.update_person(id, patch).await.map_err(Error::store)? {
    return Err(Error::PersonNotFound(id));
  }
  debug!(person_id = %id, "person edited");
  Ok(())
}

/// Record a date of birth. Open to any signed-in user.
pub async fn set_dob<S: PersonStore>(
  store: &S,
  session: &Session,
  id: Uuid,
  dob: NaiveDate,
) -> Result<()> {
  session.identity()?;
  let patch = PersonPatch { dob: Some(Some(dob)), ..PersonPatch::default() };
  if !store.update_person(id, patch).await.map_err(Error::store)? {
    return Err(Error::PersonNotFound(id));
  }
  Ok(())
}

// ─── Clans ───────────────────────────────────────────────────────────────────

/// Add a clan unless it already exists ignoring case. Returns the canonical
/// name and whether it was newly stored.
pub async fn add_clan<S: PersonStore>(
  store: &S,
  registry: &ClanRegistry,
  raw: &str,
) -> Result<(String, bool)> {
  let name = normalize_clan(raw)?;
  let stored = store.list_clans().await.map_err(Error::store)?;
  let known = registry.merge(stored);
  if let Some(existing) = ClanRegistry::find(&known, &name) {
    return Ok((existing.to_owned(), false));
  }
  let added = store.add_clan(name.clone()).await.map_err(Error::store)?;
  if added {
    info!(clan = %name, "clan added");
  }
  Ok((name, added))
}

/// The known spelling of `raw` ignoring case, or its normalised form when
/// no clan matches yet.
pub async fn resolve_clan<S: PersonStore>(
  store: &S,
  registry: &ClanRegistry,
  raw: &str,
) -> Result<String> {
  let name = normalize_clan(raw)?;
  let stored = store.list_clans().await.map_err(Error::store)?;
  let known = registry.merge(stored);
  Ok(ClanRegistry::find(&known, &name).map_or(name, str::to_owned))
}

/// Remove a runtime-added clan. Seed clans cannot be removed; asking to
/// returns `false`.
pub async fn remove_clan<S: PersonStore>(
  store: &S,
  registry: &ClanRegistry,
  session: &Session,
  name: &str,
  _confirmed: Confirmation,
) -> Result<bool> {
  session.require_admin("delete clans")?;
  if registry.is_seed(name) {
    debug!(clan = %name, "refusing to remove a seed clan");
    return Ok(false);
  }
  let removed = store.remove_clan(name.to_owned()).await.map_err(Error::store)?;
  if removed {
    info!(clan = %name, "clan removed");
  }
  Ok(removed)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    identity::Identity,
    memory::MemoryStore,
    person::NewPerson,
    tree::build_tree,
  };

  fn admin() -> Session {
    Session::signed_in(
      Identity {
        uid:          "admin".into(),
        display_name: "Admin".into(),
        email:        None,
        photo_url:    None,
      },
      true,
    )
  }

  async fn ram_family(store: &MemoryStore) -> (Person, Person, Person) {
    let ram = store.create_person(NewPerson::new("Ram", Gender::Male, "Yadav", 1)).await.unwrap();
    let sita = store
      .create_person(NewPerson {
        birth_clan: "Gupta".into(),
        spouse_id: Some(ram.id),
        ..NewPerson::new("Sita", Gender::Female, "Yadav", 1)
      })
      .await
      .unwrap();
    store
      .update_person(ram.id, PersonPatch { spouse_id: Some(Some(sita.id)), ..Default::default() })
      .await
      .unwrap();
    let lakshman = store
      .create_person(NewPerson {
        father_id: Some(ram.id),
        mother_id: Some(sita.id),
        ..NewPerson::new("Lakshman", Gender::Male, "Yadav", 2)
      })
      .await
      .unwrap();
    (ram, sita, lakshman)
  }

  #[tokio::test]
  async fn delete_clears_every_reference() {
    let store = MemoryStore::new();
    let (ram, sita, lakshman) = ram_family(&store).await;

    let plan = plan_delete(&store.graph(), sita.id).unwrap();
    assert_eq!(plan.referrers.len(), 2);
    let cleared = plan.execute(&store, &admin(), Confirmation::granted()).await.unwrap();
    assert_eq!(cleared, 2);

    let g = store.graph();
    assert!(g.get(sita.id).is_none());
    assert!(g.people().iter().all(|p| !p.references(sita.id)));
    assert_eq!(g.get(ram.id).unwrap().spouse_id, None);
    assert_eq!(g.get(lakshman.id).unwrap().mother_id, None);
    assert_eq!(g.get(lakshman.id).unwrap().father_id, Some(ram.id));

    let tree = build_tree(&g, "Yadav").unwrap();
    assert_eq!(tree.person.id, ram.id);
    assert!(tree.partner.is_none());
    assert_eq!(tree.children[0].person.id, lakshman.id);
  }

  #[tokio::test]
  async fn delete_requires_admin() {
    let store = MemoryStore::new();
    let (_, sita, _) = ram_family(&store).await;
    let plan = plan_delete(&store.graph(), sita.id).unwrap();
    let err = plan
      .execute(&store, &Session::anonymous(), Confirmation::granted())
      .await
      .unwrap_err();
    assert!(matches!(err, Error::AdminRequired(_)));
    assert!(store.graph().get(sita.id).is_some());
  }

  #[tokio::test]
  async fn reset_wipes_everything() {
    let store = MemoryStore::new();
    ram_family(&store).await;
    assert_eq!(reset_all(&store, &admin(), Confirmation::granted()).await.unwrap(), 3);
    assert!(store.is_empty());
  }

  #[tokio::test]
  async fn edit_normalises_and_rejects_blank_names() {
    let store = MemoryStore::new();
    let (ram, ..) = ram_family(&store).await;
    let edit = PersonEdit { name: Some("  raja ram ".into()), ..Default::default() };
    edit_person(&store, &admin(), ram.id, edit).await.unwrap();
    assert_eq!(store.graph().get(ram.id).unwrap().name, "Raja Ram");

    let blank = PersonEdit { name: Some(" ".into()), ..Default::default() };
    assert!(matches!(
      edit_person(&store, &admin(), ram.id, blank).await,
      Err(Error::Validation(_))
    ));

    let missing = PersonEdit { gender: Some(Gender::Male), ..Default::default() };
    assert!(matches!(
      edit_person(&store, &admin(), Uuid::new_v4(), missing).await,
      Err(Error::PersonNotFound(_))
    ));
  }

  #[tokio::test]
  async fn clans_dedup_ignoring_case() {
    let store = MemoryStore::new();
    let registry = ClanRegistry::new(["Yadav"]);
    assert_eq!(add_clan(&store, &registry, "yadav").await.unwrap(), ("Yadav".into(), false));
    assert_eq!(add_clan(&store, &registry, "besra").await.unwrap(), ("Besra".into(), true));
    assert_eq!(add_clan(&store, &registry, "BESRA").await.unwrap(), ("Besra".into(), false));

    let removed =
      remove_clan(&store, &registry, &admin(), "Yadav", Confirmation::granted()).await.unwrap();
    assert!(!removed);
    let removed =
      remove_clan(&store, &registry, &admin(), "Besra", Confirmation::granted()).await.unwrap();
    assert!(removed);
  }

  #[tokio::test]
  async fn selected_clan_resolves_to_known_spelling() {
    let store = MemoryStore::new();
    let registry = ClanRegistry::new(["Yadav"]);
    store.add_clan("McLeod".into()).await.unwrap();
    assert_eq!(resolve_clan(&store, &registry, "YADAV").await.unwrap(), "Yadav");
    assert_eq!(resolve_clan(&store, &registry, " mcleod ").await.unwrap(), "McLeod");
    assert_eq!(resolve_clan(&store, &registry, "besra").await.unwrap(), "Besra");
    assert!(resolve_clan(&store, &registry, "  ").await.is_err());
  }
}
