//! Clan names: a configured seed list merged with names added at runtime.
//!
//! Clans are referenced by name from person records. Names are normalised
//! with [`normalize_name`] and compared ignoring case everywhere.

use crate::{
  Result,
  error::{Field, ValidationError},
  person::normalize_name,
};

/// Normalise a clan name typed by a user.
pub fn normalize_clan(raw: &str) -> Result<String> {
  let name = normalize_name(raw);
  if name.is_empty() {
    return Err(ValidationError::new(Field::ClanName, "clan name is required").into());
  }
  Ok(name)
}

/// Case-insensitive equality for clan names.
pub fn same_clan(a: &str, b: &str) -> bool { a.to_lowercase() == b.to_lowercase() }

#[derive(Debug, Clone, Default)]
pub struct ClanRegistry {
  seed: Vec<String>,
}

impl ClanRegistry {
  pub fn new<I, S>(seed: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let mut registry = Self::default();
    registry.seed = registry.merge(
      seed
        .into_iter()
        .map(|s| normalize_name(s.as_ref()))
        .filter(|s| !s.is_empty()),
    );
    registry
  }

  pub fn seed(&self) -> &[String] { &self.seed }

  pub fn is_seed(&self, name: &str) -> bool { self.seed.iter().any(|s| same_clan(s, name)) }

  /// Seed names plus `stored`, unique ignoring case, sorted ignoring case.
  /// On a clash the seed spelling wins, then the first stored spelling.
  pub fn merge(&self, stored: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(self.seed.len());
    for name in self.seed.iter().cloned().chain(stored) {
      if !out.iter().any(|n| same_clan(n, &name)) {
        out.push(name);
      }
    }
    out.sort_by_key(|n| n.to_lowercase());
    out
  }

  /// Look `name` up in a merged list, returning the canonical spelling.
  pub fn find<'a>(names: &'a [String], name: &str) -> Option<&'a str> {
    names.iter().find(|n| same_clan(n, name)).map(String::as_str)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn merge_dedups_ignoring_case_and_sorts() {
    let reg = ClanRegistry::new(["yadav", "Gupta", " "]);
    assert_eq!(reg.seed(), ["Gupta", "Yadav"]);

    let merged = reg.merge(["YADAV".to_owned(), "Besra".to_owned(), "besra".to_owned()]);
    assert_eq!(merged, ["Besra", "Gupta", "Yadav"]);
    assert_eq!(ClanRegistry::find(&merged, "gupta"), Some("Gupta"));
    assert!(reg.is_seed("YADAV"));
    assert!(!reg.is_seed("Besra"));
  }

  #[test]
  fn blank_clan_is_rejected() {
    assert!(normalize_clan("   ").is_err());
    assert_eq!(normalize_clan(" ghonsi ").unwrap(), "Ghonsi");
  }
}
