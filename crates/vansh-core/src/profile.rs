//! User profiles and their link to a person in the graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  clan::{ClanRegistry, same_clan},
  error::{Field, ValidationError},
  graph::Graph,
  identity::Identity,
  ops,
  person::{Person, PersonPatch, normalize_name},
  store::PersonStore,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
  pub uid:              String,
  pub display_name:     String,
  #[serde(default)]
  pub email:            Option<String>,
  #[serde(alias = "gotra")]
  pub clan:             String,
  #[serde(default)]
  pub linked_person_id: Option<Uuid>,
  pub created_at:       DateTime<Utc>,
}

/// Onboarding: store the caller's profile and make sure their clan exists.
///
/// Re-registering keeps the original `created_at` and any existing link.
pub async fn register<S: PersonStore>(
  store: &S,
  registry: &ClanRegistry,
  identity: &Identity,
  name: &str,
  clan: &str,
) -> Result<UserProfile> {
  let display_name = normalize_name(name);
  if display_name.is_empty() {
    return Err(ValidationError::new(Field::PersonName, "name is required").into());
  }
  let (clan, _) = ops::add_clan(store, registry, clan).await?;

  let previous = store
    .get_profile(identity.uid.clone())
    .await
    .map_err(Error::store)?;
  let profile = UserProfile {
    uid: identity.uid.clone(),
    display_name,
    email: identity.email.clone(),
    clan,
    linked_person_id: previous.as_ref().and_then(|p| p.linked_person_id),
    created_at: previous.map_or_else(Utc::now, |p| p.created_at),
  };
  store.put_profile(profile.clone()).await.map_err(Error::store)?;
  info!(uid = %profile.uid, clan = %profile.clan, "profile registered");
  Ok(profile)
}

/// People the profile could be linked to: same name ignoring case, born
/// into the profile's clan, not linked to another user.
pub fn profile_matches<'g>(graph: &'g Graph, profile: &UserProfile) -> Vec<&'g Person> {
  if profile.linked_person_id.is_some() {
    return Vec::new();
  }
  let name = profile.display_name.to_lowercase();
  graph
    .people()
    .iter()
    .filter(|p| p.name.to_lowercase() == name && same_clan(&p.birth_clan, &profile.clan))
    .filter(|p| p.linked_user_id.as_deref().is_none_or(|uid| uid == profile.uid))
    .collect()
}

/// Link the caller's profile to `person_id`, in both directions.
pub async fn link_profile<S: PersonStore>(
  store: &S,
  graph: &Graph,
  identity: &Identity,
  person_id: Uuid,
) -> Result<UserProfile> {
  let mut profile = store
    .get_profile(identity.uid.clone())
    .await
    .map_err(Error::store)?
    .ok_or_else(|| Error::LinkConflict("register a profile before linking".into()))?;

  let person = graph.get(person_id).ok_or(Error::PersonNotFound(person_id))?;
  if let Some(other) = person.linked_user_id.as_deref().filter(|uid| *uid != identity.uid) {
    return Err(Error::LinkConflict(format!("{} is already linked to {other}", person.name)));
  }

  let patch = PersonPatch {
    linked_user_id: Some(Some(identity.uid.clone())),
    ..PersonPatch::default()
  };
  if !store.update_person(person_id, patch).await.map_err(Error::store)? {
    return Err(Error::PersonNotFound(person_id));
  }

  if let Some(old) = profile.linked_person_id.filter(|old| *old != person_id) {
    let unlink = PersonPatch { linked_user_id: Some(None), ..PersonPatch::default() };
    store.update_person(old, unlink).await.map_err(Error::store)?;
  }

  profile.linked_person_id = Some(person_id);
  store.put_profile(profile.clone()).await.map_err(Error::store)?;
  info!(uid = %identity.uid, person_id = %person_id, "profile linked");
  Ok(profile)
}

/// The person a profile is linked to. A link to a person who no longer
/// exists is cleared and reported as unlinked.
pub async fn linked_person<'g, S: PersonStore>(
  store: &S,
  graph: &'g Graph,
  profile: &mut UserProfile,
) -> Result<Option<&'g Person>> {
  let Some(id) = profile.linked_person_id else {
    return Ok(None);
  };
  if let Some(person) = graph.get(id) {
    return Ok(Some(person));
  }
  warn!(uid = %profile.uid, person_id = %id, "linked person is gone, clearing link");
  profile.linked_person_id = None;
  store.put_profile(profile.clone()).await.map_err(Error::store)?;
  Ok(None)
}

/// Rename the caller everywhere: the profile and the linked person.
pub async fn rename<S: PersonStore>(
  store: &S,
  profile: &mut UserProfile,
  name: &str,
) -> Result<()> {
  let name = normalize_name(name);
  if name.is_empty() {
    return Err(ValidationError::new(Field::PersonName, "name is required").into());
  }
  if let Some(id) = profile.linked_person_id {
    let patch = PersonPatch { name: Some(name.clone()), ..PersonPatch::default() };
    store.update_person(id, patch).await.map_err(Error::store)?;
  }
  profile.display_name = name;
  store.put_profile(profile.clone()).await.map_err(Error::store)?;
  Ok(())
}

// ─── Relatives ───────────────────────────────────────────────────────────────

/// Immediate family of one person, as shown on a profile page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Relatives {
  pub father:   Option<Person>,
  pub mother:   Option<Person>,
  pub spouse:   Option<Person>,
  /// Anyone naming this person as father or mother.
  pub children: Vec<Person>,
  /// Only filled in for unmarried people.
  pub siblings: Vec<Person>,
}

impl Relatives {
  pub fn of(graph: &Graph, person: &Person) -> Self {
    let children = graph
      .people()
      .iter()
      .filter(|p| p.father_id == Some(person.id) || p.mother_id == Some(person.id))
      .cloned()
      .collect();

    let has_parent = person.father_id.is_some() || person.mother_id.is_some();
    let siblings = if person.spouse_id.is_none() && has_parent {
      graph
        .people()
        .iter()
        .filter(|p| p.id != person.id)
        .filter(|p| {
          (person.father_id.is_some() && p.father_id == person.father_id)
            || (person.mother_id.is_some() && p.mother_id == person.mother_id)
        })
        .cloned()
        .collect()
    } else {
      Vec::new()
    };

    Self {
      father: graph.resolve(person.father_id).cloned(),
      mother: graph.resolve(person.mother_id).cloned(),
      spouse: graph.resolve(person.spouse_id).cloned(),
      children,
      siblings,
    }
  }
}
