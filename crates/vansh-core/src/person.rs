//! Person records: the nodes of the genealogical graph.
//!
//! Records are flat: relations are weak id references (`father_id`,
//! `mother_id`, `spouse_id`) resolved through [`crate::graph::Graph`], never
//! owned pointers.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clan::same_clan;

// ─── Gender ──────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Gender {
  Male,
  Female,
}

// ─── Person ──────────────────────────────────────────────────────────────────

/// A stored person record. `id` and `created_at` are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
  pub id:             Uuid,
  pub name:           String,
  pub gender:         Gender,
  /// The clan the person was born into. Never changes.
  #[serde(alias = "birthGotra")]
  pub birth_clan:     String,
  /// The clan the person is displayed under.
  #[serde(alias = "currentGotra")]
  pub current_clan:   String,
  /// Depth from the clan head; the head is generation 1.
  pub generation:     u32,
  #[serde(default)]
  pub father_id:      Option<Uuid>,
  #[serde(default)]
  pub mother_id:      Option<Uuid>,
  #[serde(default)]
  pub spouse_id:      Option<Uuid>,
  #[serde(default)]
  pub dob:            Option<NaiveDate>,
  #[serde(default, rename = "photoURL", alias = "photoUrl")]
  pub photo_url:      Option<String>,
  #[serde(default)]
  pub linked_user_id: Option<String>,
  pub created_at:     DateTime<Utc>,
}

impl Person {
  pub fn is_male(&self) -> bool { self.gender == Gender::Male }

  /// A woman born into `clan`. Rendered without a partner in that clan's tree.
  pub fn is_daughter_of(&self, clan: &str) -> bool {
    self.gender == Gender::Female && same_clan(&self.birth_clan, clan)
  }

  /// Whether this record names `id` as father, mother or spouse.
  pub fn references(&self, id: Uuid) -> bool {
    self.father_id == Some(id)
      || self.mother_id == Some(id)
      || self.spouse_id == Some(id)
  }

  /// Build a record from creation input; used by store backends.
  pub fn from_new(id: Uuid, created_at: DateTime<Utc>, input: NewPerson) -> Self {
    Self {
      id,
      name: input.name,
      gender: input.gender,
      birth_clan: input.birth_clan,
      current_clan: input.current_clan,
      generation: input.generation,
      father_id: input.father_id,
      mother_id: input.mother_id,
      spouse_id: input.spouse_id,
      dob: input.dob,
      photo_url: input.photo_url,
      linked_user_id: input.linked_user_id,
      created_at,
    }
  }
}

// ─── NewPerson ───────────────────────────────────────────────────────────────

/// Input to [`crate::store::PersonStore::create_person`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPerson {
  pub name:           String,
  pub gender:         Gender,
  #[serde(alias = "birthGotra")]
  pub birth_clan:     String,
  #[serde(alias = "currentGotra")]
  pub current_clan:   String,
  pub generation:     u32,
  #[serde(default)]
  pub father_id:      Option<Uuid>,
  #[serde(default)]
  pub mother_id:      Option<Uuid>,
  #[serde(default)]
  pub spouse_id:      Option<Uuid>,
  #[serde(default)]
  pub dob:            Option<NaiveDate>,
  #[serde(default, rename = "photoURL", alias = "photoUrl")]
  pub photo_url:      Option<String>,
  #[serde(default)]
  pub linked_user_id: Option<String>,
}

impl NewPerson {
  /// A person born into `clan` and displayed under it, with no relations.
  pub fn new(name: &str, gender: Gender, clan: &str, generation: u32) -> Self {
    Self {
      name: normalize_name(name),
      gender,
      birth_clan: clan.to_owned(),
      current_clan: clan.to_owned(),
      generation,
      father_id: None,
      mother_id: None,
      spouse_id: None,
      dob: None,
      photo_url: None,
      linked_user_id: None,
    }
  }

  /// Normalise the name and both clan names in place.
  pub fn normalized(mut self) -> Self {
    self.name = normalize_name(&self.name);
    self.birth_clan = normalize_name(&self.birth_clan);
    self.current_clan = normalize_name(&self.current_clan);
    self
  }
}

// ─── PersonPatch ─────────────────────────────────────────────────────────────

/// A partial update. `None` leaves a field untouched; for nullable fields
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonPatch {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name:           Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub gender:         Option<Gender>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub birth_clan:     Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub current_clan:   Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub generation:     Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "nullable")]
  pub father_id:      Option<Option<Uuid>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "nullable")]
  pub mother_id:      Option<Option<Uuid>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "nullable")]
  pub spouse_id:      Option<Option<Uuid>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "nullable")]
  pub dob:            Option<Option<NaiveDate>>,
  #[serde(
    default,
    rename = "photoURL",
    skip_serializing_if = "Option::is_none",
    with = "nullable"
  )]
  pub photo_url:      Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "nullable")]
  pub linked_user_id: Option<Option<String>>,
}

impl PersonPatch {
  pub fn is_empty(&self) -> bool { *self == Self::default() }

  pub fn generation(generation: u32) -> Self {
    Self { generation: Some(generation), ..Self::default() }
  }

  /// Null every reference on `person` that points at `id`.
  pub fn clear_references(person: &Person, id: Uuid) -> Self {
    let clear = |r: Option<Uuid>| (r == Some(id)).then_some(None);
    Self {
      father_id: clear(person.father_id),
      mother_id: clear(person.mother_id),
      spouse_id: clear(person.spouse_id),
      ..Self::default()
    }
  }

  /// Apply this patch to an in-memory record.
  pub fn apply(self, person: &mut Person) {
    if let Some(v) = self.name {
      person.name = v;
    }
    if let Some(v) = self.gender {
      person.gender = v;
    }
    if let Some(v) = self.birth_clan {
      person.birth_clan = v;
    }
    if let Some(v) = self.current_clan {
      person.current_clan = v;
    }
    if let Some(v) = self.generation {
      person.generation = v;
    }
    if let Some(v) = self.father_id {
      person.father_id = v;
    }
    if let Some(v) = self.mother_id {
      person.mother_id = v;
    }
    if let Some(v) = self.spouse_id {
      person.spouse_id = v;
    }
    if let Some(v) = self.dob {
      person.dob = v;
    }
    if let Some(v) = self.photo_url {
      person.photo_url = v;
    }
    if let Some(v) = self.linked_user_id {
      person.linked_user_id = v;
    }
  }
}

/// Serde adapter distinguishing an absent field from an explicit `null`.
mod nullable {
  use serde::{Deserialize, Deserializer, Serialize, Serializer};

  pub fn serialize<T, S>(value: &Option<Option<T>>, s: S) -> Result<S::Ok, S::Error>
  where
    T: Serialize,
    S: Serializer,
  {
    match value {
      Some(inner) => inner.serialize(s),
      None => s.serialize_none(),
    }
  }

  pub fn deserialize<'de, T, D>(d: D) -> Result<Option<Option<T>>, D::Error>
  where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
  {
    Option::<T>::deserialize(d).map(Some)
  }
}

// ─── Text helpers ────────────────────────────────────────────────────────────

/// Trim, collapse runs of whitespace, and upper-case the first letter of every
/// word. Letters after the first are left as typed ("mcDonald" stays
/// "McDonald").
pub fn normalize_name(raw: &str) -> String {
  let mut out = String::with_capacity(raw.len());
  for word in raw.split_whitespace() {
    if !out.is_empty() {
      out.push(' ');
    }
    let mut prev_is_word = false;
    for c in word.chars() {
      let is_word = c.is_alphanumeric() || c == '_';
      if is_word && !prev_is_word {
        out.extend(c.to_uppercase());
      } else {
        out.push(c);
      }
      prev_is_word = is_word;
    }
  }
  out
}

/// Age in whole years on `today`; `None` for a date of birth in the future.
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> Option<u32> {
  if dob > today {
    return None;
  }
  let mut age = today.year() - dob.year();
  if (today.month(), today.day()) < (dob.month(), dob.day()) {
    age -= 1;
  }
  u32::try_from(age).ok()
}
