//! The Tree Builder: a pure derivation of a clan's father-line display tree.

use std::collections::HashSet;

use serde::Serialize;
use uuid::Uuid;

use crate::{graph::Graph, person::Person};

/// How a node relates to the clan it is displayed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Head,
  Son,
  Daughter,
  Wife,
}

/// The single embedded partner of a display node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Partner {
  pub person:   Person,
  pub role:     Role,
  pub clan_tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayNode {
  pub person:   Person,
  pub role:     Role,
  pub clan_tag: String,
  pub partner:  Option<Partner>,
  pub children: Vec<DisplayNode>,
}

impl DisplayNode {
  /// Total number of people shown in this subtree, partners included.
  pub fn count(&self) -> usize {
    1 + usize::from(self.partner.is_some())
      + self.children.iter().map(Self::count).sum::<usize>()
  }

  /// Depth-first search for the node rendering `id`.
  pub fn find(&self, id: Uuid) -> Option<&DisplayNode> {
    if self.person.id == id {
      return Some(self);
    }
    self.children.iter().find_map(|c| c.find(id))
  }
}

/// Derive the display tree for `clan`, or `None` when the clan has no head.
pub fn build_tree(graph: &Graph, clan: &str) -> Option<DisplayNode> {
  let head = graph.head_of(clan)?;
  let mut visited = HashSet::new();
  Some(build_node(graph, clan, head, Role::Head, &mut visited))
}

fn build_node(
  graph: &Graph,
  clan: &str,
  person: &Person,
  role: Role,
  visited: &mut HashSet<Uuid>,
) -> DisplayNode {
  visited.insert(person.id);

  let daughter = person.is_daughter_of(clan);
  let clan_tag = if daughter {
    person.birth_clan.clone()
  } else {
    person.current_clan.clone()
  };

  let partner = if daughter { None } else { partner_of(graph, person) };

  let children = graph
    .children_of(person.id)
    .filter(|c| !visited.contains(&c.id))
    .collect::<Vec<_>>()
    .into_iter()
    .map(|child| {
      let role = if child.is_male() { Role::Son } else { Role::Daughter };
      build_node(graph, clan, child, role, visited)
    })
    .collect();

  DisplayNode { person: person.clone(), role, clan_tag, partner, children }
}

/// Mother of the first child with a resolvable mother, else the recorded
/// spouse. A partner is tagged with the clan she was born into.
fn partner_of(graph: &Graph, person: &Person) -> Option<Partner> {
  let wife = graph
    .mother_of_children(person.id)
    .or_else(|| graph.resolve(person.spouse_id))?;
  Some(Partner {
    person:   wife.clone(),
    role:     Role::Wife,
    clan_tag: wife.birth_clan.clone(),
  })
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, Utc};

  use super::*;
  use crate::person::{Gender, NewPerson};

  struct Fixture {
    people: Vec<Person>,
  }

  impl Fixture {
    fn new() -> Self { Self { people: Vec::new() } }

    fn add(&mut self, input: NewPerson) -> Person {
      let at = Utc::now() + Duration::seconds(self.people.len() as i64);
      let p = Person::from_new(Uuid::new_v4(), at, input);
      self.people.push(p.clone());
      p
    }

    fn graph(&self) -> Graph { Graph::new(self.people.iter().cloned()) }
  }

  /// Ram (Yadav) married to Sita (born Gupta), one son Lakshman.
  fn ram_family() -> (Fixture, Person, Person, Person) {
    let mut f = Fixture::new();
    let ram = f.add(NewPerson::new("Ram", Gender::Male, "Yadav", 1));
    let sita = f.add(NewPerson {
      birth_clan: "Gupta".into(),
      spouse_id: Some(ram.id),
      ..NewPerson::new("Sita", Gender::Female, "Yadav", 1)
    });
    let lakshman = f.add(NewPerson {
      father_id: Some(ram.id),
      mother_id: Some(sita.id),
      ..NewPerson::new("Lakshman", Gender::Male, "Yadav", 2)
    });
    (f, ram, sita, lakshman)
  }

  #[test]
  fn head_with_partner_and_child() {
    let (f, ram, sita, lakshman) = ram_family();
    let tree = build_tree(&f.graph(), "Yadav").unwrap();

    assert_eq!(tree.person.id, ram.id);
    assert_eq!(tree.role, Role::Head);
    assert_eq!(tree.partner.as_ref().map(|p| p.person.id), Some(sita.id));
    assert_eq!(tree.children.len(), 1);
    assert_eq!(tree.children[0].person.id, lakshman.id);
    assert_eq!(tree.children[0].person.generation, 2);
    assert_eq!(tree.children[0].role, Role::Son);
    assert_eq!(tree.count(), 3);
  }

  #[test]
  fn derivation_is_idempotent() {
    let (f, ..) = ram_family();
    let graph = f.graph();
    assert_eq!(build_tree(&graph, "Yadav"), build_tree(&graph, "Yadav"));
  }

  #[test]
  fn empty_clan_has_no_tree() {
    let (f, ..) = ram_family();
    assert!(build_tree(&f.graph(), "Gupta").is_none());
    assert!(build_tree(&Graph::default(), "Yadav").is_none());
  }

  #[test]
  fn spouse_is_fallback_partner() {
    let mut f = Fixture::new();
    let ram = f.add(NewPerson::new("Ram", Gender::Male, "Yadav", 1));
    let sita = f.add(NewPerson {
      birth_clan: "Gupta".into(),
      ..NewPerson::new("Sita", Gender::Female, "Yadav", 1)
    });
    f.people[0].spouse_id = Some(sita.id);

    let tree = build_tree(&f.graph(), "Yadav").unwrap();
    assert_eq!(tree.person.id, ram.id);
    let partner = tree.partner.unwrap();
    assert_eq!(partner.person.id, sita.id);
    assert_eq!(partner.role, Role::Wife);
    assert_eq!(partner.clan_tag, "Gupta");
  }

  #[test]
  fn lineage_daughters_never_get_a_partner() {
    let mut f = Fixture::new();
    let ram = f.add(NewPerson::new("Ram", Gender::Male, "Yadav", 1));
    let husband = f.add(NewPerson::new("Mohan", Gender::Male, "Gupta", 1));
    let daughter = f.add(NewPerson {
      father_id: Some(ram.id),
      spouse_id: Some(husband.id),
      ..NewPerson::new("Radha", Gender::Female, "Yadav", 2)
    });
    // a grandchild fathered by the husband, with the daughter as mother
    f.add(NewPerson {
      father_id: Some(husband.id),
      mother_id: Some(daughter.id),
      ..NewPerson::new("Kishan", Gender::Male, "Gupta", 2)
    });

    let tree = build_tree(&f.graph(), "Yadav").unwrap();
    let node = tree.find(daughter.id).unwrap();
    assert_eq!(node.role, Role::Daughter);
    assert!(node.partner.is_none());
    assert!(node.children.is_empty());
    assert_eq!(node.clan_tag, "Yadav");
  }

  #[test]
  fn daughters_are_tagged_by_birth_clan() {
    let mut f = Fixture::new();
    let ram = f.add(NewPerson::new("Ram", Gender::Male, "Yadav", 1));
    let daughter = f.add(NewPerson {
      father_id: Some(ram.id),
      current_clan: "Gupta".into(),
      ..NewPerson::new("Radha", Gender::Female, "Yadav", 2)
    });
    let tree = build_tree(&f.graph(), "Yadav").unwrap();
    assert_eq!(tree.find(daughter.id).unwrap().clan_tag, "Yadav");
  }

  #[test]
  fn dangling_mother_falls_back_to_spouse_or_nothing() {
    let (mut f, ram, sita, _) = ram_family();
    f.people.retain(|p| p.id != sita.id);
    let tree = build_tree(&f.graph(), "Yadav").unwrap();
    assert_eq!(tree.person.id, ram.id);
    assert!(tree.partner.is_none());
    assert_eq!(tree.children.len(), 1);
  }

  #[test]
  fn cyclic_father_links_do_not_recurse_forever() {
    let (mut f, ram, _, lakshman) = ram_family();
    // corrupt: the head's father is his own son
    f.people[0].father_id = Some(lakshman.id);
    let tree = build_tree(&f.graph(), "Yadav").unwrap();
    assert_eq!(tree.person.id, ram.id);
    assert!(tree.find(lakshman.id).unwrap().children.is_empty());
  }
}
