//! Candidate queries for the link steps.
//!
//! Every list the wizard offers for linking is filtered here, so an
//! ineligible record (a child already fathered elsewhere, a non-root chosen
//! as "head") is never offered. The wizard re-checks the same predicates
//! before writing and reports [`crate::Error::LinkConflict`] if a stale
//! choice slips through.

use crate::{clan::same_clan, graph::Graph, person::Person};

/// Minimum name length before a child entry is matched against existing
/// records.
pub const MIN_LINK_QUERY: usize = 2;

fn name_contains(person: &Person, query: &str) -> bool {
  let query = query.trim().to_lowercase();
  query.is_empty() || person.name.to_lowercase().contains(&query)
}

/// A man born into `clan`; may be chosen as a father.
pub fn is_father_candidate(person: &Person, clan: &str) -> bool {
  person.is_male() && same_clan(&person.birth_clan, clan)
}

/// A current root of `clan`; may receive a new father above him.
pub fn is_root_candidate(person: &Person, clan: &str) -> bool {
  is_father_candidate(person, clan) && person.generation == 1
}

/// A record born into `clan` with no father yet; may be attached as a child.
pub fn is_child_candidate(person: &Person, clan: &str) -> bool {
  same_clan(&person.birth_clan, clan) && person.father_id.is_none()
}

/// Men of `clan` whose name contains `query`, ordered by generation then name.
pub fn father_candidates<'g>(graph: &'g Graph, clan: &str, query: &str) -> Vec<&'g Person> {
  let mut found: Vec<_> = graph
    .clan_members(clan)
    .filter(|p| is_father_candidate(p, clan) && name_contains(p, query))
    .collect();
  found.sort_by(|a, b| a.generation.cmp(&b.generation).then_with(|| a.name.cmp(&b.name)));
  found
}

/// Existing people a new man may be placed under in ancestor mode.
pub fn ancestor_candidates<'g>(graph: &'g Graph, clan: &str, query: &str) -> Vec<&'g Person> {
  father_candidates(graph, clan, query)
}

/// Current roots of `clan`, for descendant mode.
pub fn root_candidates<'g>(graph: &'g Graph, clan: &str, query: &str) -> Vec<&'g Person> {
  let mut found: Vec<_> = graph
    .heads_of(clan)
    .filter(|p| name_contains(p, query))
    .collect();
  found.sort_by_key(|p| (p.created_at, p.id));
  found
}

/// The existing unfathered record a child entry named `name` should link to.
pub fn child_link_candidate<'g>(graph: &'g Graph, clan: &str, name: &str) -> Option<&'g Person> {
  let name = name.trim();
  if name.chars().count() < MIN_LINK_QUERY {
    return None;
  }
  let name = name.to_lowercase();
  graph
    .clan_members(clan)
    .find(|p| is_child_candidate(p, clan) && p.name.to_lowercase() == name)
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use uuid::Uuid;

  use super::*;
  use crate::person::{Gender, NewPerson};

  fn add(people: &mut Vec<Person>, input: NewPerson) -> Person {
    let p = Person::from_new(Uuid::new_v4(), Utc::now(), input);
    people.push(p.clone());
    p
  }

  #[test]
  fn father_candidates_filter_by_gender_clan_and_query() {
    let mut people = Vec::new();
    let ram = add(&mut people, NewPerson::new("Ram", Gender::Male, "Yadav", 1));
    add(&mut people, NewPerson::new("Rama", Gender::Female, "Yadav", 2));
    add(&mut people, NewPerson::new("Ramesh", Gender::Male, "Gupta", 1));
    let son = add(&mut people, NewPerson {
      father_id: Some(ram.id),
      ..NewPerson::new("Raman", Gender::Male, "Yadav", 2)
    });
    let graph = Graph::new(people);

    let ids: Vec<_> = father_candidates(&graph, "Yadav", "RAM")
      .into_iter()
      .map(|p| p.id)
      .collect();
    assert_eq!(ids, vec![ram.id, son.id]);

    let roots: Vec<_> = root_candidates(&graph, "Yadav", "")
      .into_iter()
      .map(|p| p.id)
      .collect();
    assert_eq!(roots, vec![ram.id]);
  }

  #[test]
  fn child_link_requires_unfathered_same_clan_exact_name() {
    let mut people = Vec::new();
    let ram = add(&mut people, NewPerson::new("Ram", Gender::Male, "Yadav", 1));
    let loose = add(&mut people, NewPerson::new("Luv", Gender::Male, "Yadav", 1));
    add(&mut people, NewPerson {
      father_id: Some(ram.id),
      ..NewPerson::new("Kush", Gender::Male, "Yadav", 2)
    });
    add(&mut people, NewPerson::new("Bharat", Gender::Male, "Gupta", 1));
    let graph = Graph::new(people);

    assert_eq!(child_link_candidate(&graph, "Yadav", " luv ").map(|p| p.id), Some(loose.id));
    assert!(child_link_candidate(&graph, "Yadav", "Kush").is_none());
    assert!(child_link_candidate(&graph, "Yadav", "Bharat").is_none());
    assert!(child_link_candidate(&graph, "Yadav", "L").is_none());
  }
}
