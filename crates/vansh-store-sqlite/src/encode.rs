//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, dates are `YYYY-MM-DD`, and UUIDs are
//! hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Value;
use uuid::Uuid;
use vansh_core::{
  person::{Gender, Person, PersonPatch},
  profile::UserProfile,
};

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

// ─── Dates ───────────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Gender ──────────────────────────────────────────────────────────────────

pub fn encode_gender(g: Gender) -> &'static str {
  match g {
    Gender::Male => "male",
    Gender::Female => "female",
  }
}

pub fn decode_gender(s: &str) -> Result<Gender> {
  s.parse().map_err(|_| Error::UnknownGender(s.to_owned()))
}

// ─── Patches ─────────────────────────────────────────────────────────────────

fn text(v: Option<String>) -> Value { v.map_or(Value::Null, Value::Text) }

/// `(column, value)` pairs for every field the patch touches, in column
/// order.
pub fn patch_assignments(patch: PersonPatch) -> Vec<(&'static str, Value)> {
  let mut out = Vec::new();
  if let Some(v) = patch.name {
    out.push(("name", Value::Text(v)));
  }
  if let Some(v) = patch.gender {
    out.push(("gender", Value::Text(encode_gender(v).to_owned())));
  }
  if let Some(v) = patch.birth_clan {
    out.push(("birth_clan", Value::Text(v)));
  }
  if let Some(v) = patch.current_clan {
    out.push(("current_clan", Value::Text(v)));
  }
  if let Some(v) = patch.generation {
    out.push(("generation", Value::Integer(i64::from(v))));
  }
  if let Some(v) = patch.father_id {
    out.push(("father_id", text(v.map(encode_uuid))));
  }
  if let Some(v) = patch.mother_id {
    out.push(("mother_id", text(v.map(encode_uuid))));
  }
  if let Some(v) = patch.spouse_id {
    out.push(("spouse_id", text(v.map(encode_uuid))));
  }
  if let Some(v) = patch.dob {
    out.push(("dob", text(v.map(encode_date))));
  }
  if let Some(v) = patch.photo_url {
    out.push(("photo_url", text(v)));
  }
  if let Some(v) = patch.linked_user_id {
    out.push(("linked_user_id", text(v)));
  }
  out
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const PERSON_COLUMNS: &str = "person_id, name, gender, birth_clan, current_clan, generation, \
                                  father_id, mother_id, spouse_id, dob, photo_url, \
                                  linked_user_id, created_at";

/// Raw values read directly from a `people` row.
pub struct RawPerson {
  pub person_id:      String,
  pub name:           String,
  pub gender:         String,
  pub birth_clan:     String,
  pub current_clan:   String,
  pub generation:     u32,
  pub father_id:      Option<String>,
  pub mother_id:      Option<String>,
  pub spouse_id:      Option<String>,
  pub dob:            Option<String>,
  pub photo_url:      Option<String>,
  pub linked_user_id: Option<String>,
  pub created_at:     String,
}

impl RawPerson {
  /// Read a row selected with [`PERSON_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      person_id:      row.get(0)?,
      name:           row.get(1)?,
      gender:         row.get(2)?,
      birth_clan:     row.get(3)?,
      current_clan:   row.get(4)?,
      generation:     row.get(5)?,
      father_id:      row.get(6)?,
      mother_id:      row.get(7)?,
      spouse_id:      row.get(8)?,
      dob:            row.get(9)?,
      photo_url:      row.get(10)?,
      linked_user_id: row.get(11)?,
      created_at:     row.get(12)?,
    })
  }

  pub fn into_person(self) -> Result<Person> {
    Ok(Person {
      id:             decode_uuid(&self.person_id)?,
      name:           self.name,
      gender:         decode_gender(&self.gender)?,
      birth_clan:     self.birth_clan,
      current_clan:   self.current_clan,
      generation:     self.generation,
      father_id:      decode_opt_uuid(self.father_id)?,
      mother_id:      decode_opt_uuid(self.mother_id)?,
      spouse_id:      decode_opt_uuid(self.spouse_id)?,
      dob:            self.dob.as_deref().map(decode_date).transpose()?,
      photo_url:      self.photo_url,
      linked_user_id: self.linked_user_id,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `profiles` row.
pub struct RawProfile {
  pub uid:              String,
  pub display_name:     String,
  pub email:            Option<String>,
  pub clan:             String,
  pub linked_person_id: Option<String>,
  pub created_at:       String,
}

impl RawProfile {
  pub fn into_profile(self) -> Result<UserProfile> {
    Ok(UserProfile {
      uid:              self.uid,
      display_name:     self.display_name,
      email:            self.email,
      clan:             self.clan,
      linked_person_id: decode_opt_uuid(self.linked_person_id)?,
      created_at:       decode_dt(&self.created_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn patch_assignments_distinguish_null_from_absent() {
    let id = Uuid::new_v4();
    let patch = PersonPatch {
      father_id: Some(Some(id)),
      mother_id: Some(None),
      ..PersonPatch::generation(3)
    };
    let cols = patch_assignments(patch);
    let names: Vec<_> = cols.iter().map(|(c, _)| *c).collect();
    assert_eq!(names, ["generation", "father_id", "mother_id"]);
    assert_eq!(cols[0].1, Value::Integer(3));
    assert_eq!(cols[1].1, Value::Text(encode_uuid(id)));
    assert_eq!(cols[2].1, Value::Null);
  }

  #[test]
  fn gender_round_trips_and_rejects_junk() {
    assert_eq!(decode_gender(encode_gender(Gender::Female)).unwrap(), Gender::Female);
    assert!(matches!(decode_gender("other"), Err(Error::UnknownGender(_))));
  }
}
