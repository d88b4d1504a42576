//! [`SqliteStore`], the SQLite implementation of [`PersonStore`].

use std::{path::Path, sync::Arc};

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use tokio::sync::{Mutex, watch};
use tracing::{debug, warn};
use uuid::Uuid;
use vansh_core::{
  person::{NewPerson, Person, PersonPatch},
  profile::UserProfile,
  store::{PersonStore, Snapshot, Subscription},
};

use crate::{
  Result,
  encode::{
    PERSON_COLUMNS, RawPerson, RawProfile, encode_date, encode_dt, encode_gender, encode_uuid,
    patch_assignments,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A person record store backed by a single SQLite file.
///
/// Cloning is cheap: the connection and the snapshot channel are
/// reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:         tokio_rusqlite::Connection,
  tx:           Arc<watch::Sender<Snapshot>>,
  // reload and send happen as one step, so the last send is the newest read
  publish_lock: Arc<Mutex<()>>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;

    let (tx, _) = watch::channel(Snapshot::from(Vec::new()));
    let store = Self { conn, tx: Arc::new(tx), publish_lock: Arc::new(Mutex::new(())) };
    let people = store.load_people().await?;
    store.tx.send_replace(Snapshot::from(people));
    Ok(store)
  }

  async fn load_people(&self) -> Result<Vec<Person>> {
    let raws: Vec<RawPerson> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {PERSON_COLUMNS} FROM people ORDER BY name, person_id"
        ))?;
        let rows = stmt
          .query_map([], RawPerson::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPerson::into_person).collect()
  }

  /// Push the current record set to subscribers. A failed read keeps the
  /// previous snapshot in place.
  async fn publish(&self) {
    let _guard = self.publish_lock.lock().await;
    match self.load_people().await {
      Ok(people) => {
        self.tx.send_replace(Snapshot::from(people));
      }
      Err(e) => warn!(error = %e, "snapshot reload failed, keeping the last one"),
    }
  }
}

// ─── PersonStore impl ────────────────────────────────────────────────────────

impl PersonStore for SqliteStore {
  type Error = crate::Error;

  // ── People ────────────────────────────────────────────────────────────────

  async fn list_people(&self) -> Result<Vec<Person>> { self.load_people().await }

  async fn get_person(&self, id: Uuid) -> Result<Option<Person>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawPerson> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {PERSON_COLUMNS} FROM people WHERE person_id = ?1"),
              rusqlite::params![id_str],
              RawPerson::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPerson::into_person).transpose()
  }

  async fn create_person(&self, input: NewPerson) -> Result<Person> {
    let person = Person::from_new(Uuid::new_v4(), Utc::now(), input);

    let id_str       = encode_uuid(person.id);
    let name         = person.name.clone();
    let gender       = encode_gender(person.gender);
    let birth_clan   = person.birth_clan.clone();
    let current_clan = person.current_clan.clone();
    let generation   = person.generation;
    let father_str   = person.father_id.map(encode_uuid);
    let mother_str   = person.mother_id.map(encode_uuid);
    let spouse_str   = person.spouse_id.map(encode_uuid);
    let dob_str      = person.dob.map(encode_date);
    let photo_url    = person.photo_url.clone();
    let linked_user  = person.linked_user_id.clone();
    let at_str       = encode_dt(person.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "INSERT INTO people ({PERSON_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
          ),
          rusqlite::params![
            id_str,
            name,
            gender,
            birth_clan,
            current_clan,
            generation,
            father_str,
            mother_str,
            spouse_str,
            dob_str,
            photo_url,
            linked_user,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    debug!(person_id = %person.id, name = %person.name, "person created");
    self.publish().await;
    Ok(person)
  }

  async fn update_person(&self, id: Uuid, patch: PersonPatch) -> Result<bool> {
    let id_str = encode_uuid(id);
    let assignments = patch_assignments(patch);

    let found = self
      .conn
      .call(move |conn| {
        if assignments.is_empty() {
          let exists = conn
            .query_row(
              "SELECT 1 FROM people WHERE person_id = ?1",
              rusqlite::params![id_str],
              |_| Ok(()),
            )
            .optional()?
            .is_some();
          return Ok(exists);
        }

        let set = assignments
          .iter()
          .enumerate()
          .map(|(i, (col, _))| format!("{col} = ?{}", i + 1))
          .collect::<Vec<_>>()
          .join(", ");
        let sql = format!(
          "UPDATE people SET {set} WHERE person_id = ?{}",
          assignments.len() + 1
        );
        let values = assignments
          .into_iter()
          .map(|(_, v)| v)
          .chain(std::iter::once(rusqlite::types::Value::Text(id_str)));
        let changed = conn.execute(&sql, rusqlite::params_from_iter(values))?;
        Ok(changed > 0)
      })
      .await?;

    if found {
      debug!(person_id = %id, "person updated");
      self.publish().await;
    } else {
      debug!(person_id = %id, "update of absent person ignored");
    }
    Ok(found)
  }

  async fn delete_person(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM people WHERE person_id = ?1", rusqlite::params![id_str])?)
      })
      .await?;

    if changed > 0 {
      debug!(person_id = %id, "person deleted");
      self.publish().await;
    }
    Ok(changed > 0)
  }

  async fn delete_all(&self) -> Result<usize> {
    let removed = self
      .conn
      .call(|conn| Ok(conn.execute("DELETE FROM people", [])?))
      .await?;

    debug!(removed, "all people deleted");
    self.publish().await;
    Ok(removed)
  }

  // ── Clans ─────────────────────────────────────────────────────────────────

  async fn list_clans(&self) -> Result<Vec<String>> {
    let names = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT name FROM clans ORDER BY name")?;
        let rows = stmt
          .query_map([], |row| row.get::<_, String>(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(names)
  }

  async fn add_clan(&self, name: String) -> Result<bool> {
    let added = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT OR IGNORE INTO clans (name) VALUES (?1)",
          rusqlite::params![name],
        )?)
      })
      .await?;
    Ok(added > 0)
  }

  async fn remove_clan(&self, name: String) -> Result<bool> {
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM clans WHERE name = ?1", rusqlite::params![name])?)
      })
      .await?;
    Ok(removed > 0)
  }

  // ── Profiles ──────────────────────────────────────────────────────────────

  async fn get_profile(&self, uid: String) -> Result<Option<UserProfile>> {
    let raw: Option<RawProfile> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT uid, display_name, email, clan, linked_person_id, created_at
               FROM profiles WHERE uid = ?1",
              rusqlite::params![uid],
              |row| {
                Ok(RawProfile {
                  uid:              row.get(0)?,
                  display_name:     row.get(1)?,
                  email:            row.get(2)?,
                  clan:             row.get(3)?,
                  linked_person_id: row.get(4)?,
                  created_at:       row.get(5)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawProfile::into_profile).transpose()
  }

  async fn put_profile(&self, profile: UserProfile) -> Result<()> {
    let linked_str = profile.linked_person_id.map(encode_uuid);
    let at_str     = encode_dt(profile.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO profiles (uid, display_name, email, clan, linked_person_id, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT (uid) DO UPDATE SET
             display_name     = excluded.display_name,
             email            = excluded.email,
             clan             = excluded.clan,
             linked_person_id = excluded.linked_person_id",
          rusqlite::params![
            profile.uid,
            profile.display_name,
            profile.email,
            profile.clan,
            linked_str,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Change feed ───────────────────────────────────────────────────────────

  fn subscribe(&self) -> Subscription { Subscription::new(self.tx.subscribe()) }
}
