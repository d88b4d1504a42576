//! Filesystem photo storage.
//!
//! Files are named by a SHA-256 digest of the owner id and the image bytes,
//! so re-uploading the same image for the same person is a no-op. They are
//! served back under `/photos/` by the router.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use uuid::Uuid;
use vansh_core::photo::{BlobStore, PhotoUpload};

use crate::error::Error;

#[derive(Debug, Clone)]
pub struct FsBlobStore {
  dir:      PathBuf,
  base_url: String,
}

impl FsBlobStore {
  /// Store files in `dir`, reachable at `base_url` (e.g. `/photos`).
  pub fn new(dir: impl Into<PathBuf>, base_url: &str) -> Self {
    Self { dir: dir.into(), base_url: base_url.trim_end_matches('/').to_owned() }
  }

  pub fn dir(&self) -> &Path { &self.dir }

  fn file_name(owner: Uuid, photo: &PhotoUpload) -> String {
    let digest = Sha256::new()
      .chain_update(owner.as_bytes())
      .chain_update(&photo.bytes)
      .finalize();
    format!("{}.{}", hex::encode(digest), photo.extension())
  }

  /// The on-disk path for a URL this store issued, or `None` for anything
  /// else.
  fn path_for(&self, url: &str) -> Option<PathBuf> {
    let name = url.strip_prefix(&self.base_url)?.strip_prefix('/')?;
    let valid = !name.is_empty()
      && !name.starts_with('.')
      && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '.');
    valid.then(|| self.dir.join(name))
  }
}

impl BlobStore for FsBlobStore {
  type Error = Error;

  async fn upload(&self, owner: Uuid, photo: PhotoUpload) -> Result<String, Error> {
    let name = Self::file_name(owner, &photo);
    tokio::fs::create_dir_all(&self.dir).await?;
    tokio::fs::write(self.dir.join(&name), &photo.bytes).await?;
    debug!(owner = %owner, file = %name, bytes = photo.bytes.len(), "photo stored");
    Ok(format!("{}/{name}", self.base_url))
  }

  async fn delete(&self, url: String) -> Result<(), Error> {
    let Some(path) = self.path_for(&url) else {
      warn!(url = %url, "not a local photo url, leaving it alone");
      return Ok(());
    };
    match tokio::fs::remove_file(&path).await {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e.into()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn temp_store() -> FsBlobStore {
    FsBlobStore::new(std::env::temp_dir().join(format!("vansh-photos-{}", Uuid::new_v4())), "/photos/")
  }

  #[tokio::test]
  async fn upload_then_delete() {
    let store = temp_store();
    let owner = Uuid::new_v4();
    let url = store
      .upload(owner, PhotoUpload::new("image/png", vec![1, 2, 3]))
      .await
      .unwrap();
    assert!(url.starts_with("/photos/"));
    assert!(url.ends_with(".png"));

    let path = store.path_for(&url).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), [1, 2, 3]);

    store.delete(url.clone()).await.unwrap();
    assert!(!path.exists());
    // deleting twice is fine
    store.delete(url).await.unwrap();
    std::fs::remove_dir_all(store.dir()).ok();
  }

  #[test]
  fn names_depend_on_owner_and_content() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let png = PhotoUpload::new("image/png", vec![9; 16]);
    assert_eq!(FsBlobStore::file_name(a, &png), FsBlobStore::file_name(a, &png));
    assert_ne!(FsBlobStore::file_name(a, &png), FsBlobStore::file_name(b, &png));
  }

  #[test]
  fn foreign_urls_are_ignored() {
    let store = temp_store();
    assert!(store.path_for("https://example.com/a.png").is_none());
    assert!(store.path_for("/photos/../etc/passwd").is_none());
    assert!(store.path_for("/photos/").is_none());
    assert!(store.path_for("/photos/abc123.png").is_some());
  }
}
