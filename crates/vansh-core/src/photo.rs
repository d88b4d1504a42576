//! Profile photos and the blob-storage seam.

use std::future::Future;

use tracing::debug;
use uuid::Uuid;

use crate::{
  Error, Result,
  error::{Field, ValidationError},
  person::PersonPatch,
  store::PersonStore,
};

/// Largest accepted photo, in bytes.
pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

/// An image as received from the user, not yet uploaded.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
  pub media_type: String,
  pub bytes:      Vec<u8>,
}

impl PhotoUpload {
  pub fn new(media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
    Self { media_type: media_type.into(), bytes }
  }

  /// Reject non-images and anything over [`MAX_PHOTO_BYTES`].
  pub fn validate(&self) -> Result<(), ValidationError> {
    let essence = self.media_type.split(';').next().unwrap_or_default().trim();
    if !essence.to_ascii_lowercase().starts_with("image/") {
      return Err(ValidationError::new(Field::Photo, "please select an image file"));
    }
    if self.bytes.is_empty() {
      return Err(ValidationError::new(Field::Photo, "image is empty"));
    }
    if self.bytes.len() > MAX_PHOTO_BYTES {
      return Err(ValidationError::new(Field::Photo, "image must be less than 5MB"));
    }
    Ok(())
  }

  /// File extension for the media subtype (`image/jpeg` → `jpeg`).
  pub fn extension(&self) -> &str {
    self
      .media_type
      .split(';')
      .next()
      .and_then(|t| t.trim().split('/').nth(1))
      .map(|s| s.trim_start_matches("x-"))
      .filter(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric()))
      .unwrap_or("bin")
  }
}

/// Where photo bytes live. Returns public URLs.
pub trait BlobStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn upload(
    &self,
    owner: Uuid,
    photo: PhotoUpload,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + '_;

  fn delete(&self, url: String) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

/// Validate, upload, then point the person at the new URL. A previous photo
/// is removed after the record has been updated.
pub async fn set_photo<S, B>(
  store: &S,
  blobs: &B,
  person_id: Uuid,
  photo: PhotoUpload,
) -> Result<String>
where
  S: PersonStore,
  B: BlobStore,
{
  photo.validate()?;
  let previous = store
    .get_person(person_id)
    .await
    .map_err(Error::store)?
    .ok_or(Error::PersonNotFound(person_id))?
    .photo_url;

  let url = blobs.upload(person_id, photo).await.map_err(Error::store)?;
  let patch = PersonPatch { photo_url: Some(Some(url.clone())), ..PersonPatch::default() };
  if !store.update_person(person_id, patch).await.map_err(Error::store)? {
    return Err(Error::PersonNotFound(person_id));
  }

  if let Some(old) = previous.filter(|old| *old != url) {
    blobs.delete(old).await.map_err(Error::store)?;
  }
  debug!(person_id = %person_id, url = %url, "photo set");
  Ok(url)
}

/// Delete the blob, then clear `photo_url`. Returns `false` if there was no
/// photo.
pub async fn remove_photo<S, B>(store: &S, blobs: &B, person_id: Uuid) -> Result<bool>
where
  S: PersonStore,
  B: BlobStore,
{
  let person = store
    .get_person(person_id)
    .await
    .map_err(Error::store)?
    .ok_or(Error::PersonNotFound(person_id))?;
  let Some(url) = person.photo_url else {
    return Ok(false);
  };
  blobs.delete(url).await.map_err(Error::store)?;
  let patch = PersonPatch { photo_url: Some(None), ..PersonPatch::default() };
  store.update_person(person_id, patch).await.map_err(Error::store)?;
  Ok(true)
}

#[cfg(test)]
mod tests {
  use std::{
    collections::HashMap,
    convert::Infallible,
    sync::Mutex,
  };

  use super::*;
  use crate::{
    memory::MemoryStore,
    person::{Gender, NewPerson},
  };

  #[derive(Default)]
  struct Blobs {
    files: Mutex<HashMap<String, usize>>,
  }

  impl BlobStore for Blobs {
    type Error = Infallible;

    async fn upload(&self, owner: Uuid, photo: PhotoUpload) -> Result<String, Infallible> {
      let mut files = self.files.lock().unwrap();
      let url = format!("/photos/{owner}-{}.{}", files.len(), photo.extension());
      files.insert(url.clone(), photo.bytes.len());
      Ok(url)
    }

    async fn delete(&self, url: String) -> Result<(), Infallible> {
      self.files.lock().unwrap().remove(&url);
      Ok(())
    }
  }

  #[test]
  fn validation_rules() {
    assert!(PhotoUpload::new("image/png", vec![1]).validate().is_ok());
    assert!(PhotoUpload::new("text/plain", vec![1]).validate().is_err());
    assert!(PhotoUpload::new("image/png", vec![]).validate().is_err());
    let big = PhotoUpload::new("image/jpeg", vec![0; MAX_PHOTO_BYTES + 1]);
    assert_eq!(big.validate().unwrap_err().field, Field::Photo);
    assert!(PhotoUpload::new("image/jpeg", vec![0; MAX_PHOTO_BYTES]).validate().is_ok());
    assert_eq!(PhotoUpload::new("image/svg+xml", vec![1]).extension(), "bin");
    assert_eq!(PhotoUpload::new("image/x-png", vec![1]).extension(), "png");
  }

  #[tokio::test]
  async fn replacing_a_photo_removes_the_old_blob() {
    let store = MemoryStore::new();
    let blobs = Blobs::default();
    let p = store
      .create_person(NewPerson::new("Ram", Gender::Male, "Yadav", 1))
      .await
      .unwrap();

    let first = set_photo(&store, &blobs, p.id, PhotoUpload::new("image/png", vec![1, 2]))
      .await
      .unwrap();
    let second = set_photo(&store, &blobs, p.id, PhotoUpload::new("image/jpeg", vec![3]))
      .await
      .unwrap();
    assert_ne!(first, second);
    assert_eq!(blobs.files.lock().unwrap().len(), 1);
    assert_eq!(store.graph().get(p.id).unwrap().photo_url.as_ref(), Some(&second));

    assert!(remove_photo(&store, &blobs, p.id).await.unwrap());
    assert!(blobs.files.lock().unwrap().is_empty());
    assert!(store.graph().get(p.id).unwrap().photo_url.is_none());
    assert!(!remove_photo(&store, &blobs, p.id).await.unwrap());
  }

  #[tokio::test]
  async fn invalid_upload_writes_nothing() {
    let store = MemoryStore::new();
    let blobs = Blobs::default();
    let p = store
      .create_person(NewPerson::new("Ram", Gender::Male, "Yadav", 1))
      .await
      .unwrap();
    let err = set_photo(&store, &blobs, p.id, PhotoUpload::new("application/pdf", vec![1]))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(blobs.files.lock().unwrap().is_empty());
  }
}
