//! Plain-text rendering of a clan tree.

use std::fmt::Write as _;

use vansh_core::tree::DisplayNode;

/// Render `root` as an indented tree, one person per line.
///
/// A wife is shown next to her husband with her birth clan in brackets; a
/// member whose clan tag differs from `clan` carries the tag as well.
pub fn render_tree(root: &DisplayNode, clan: &str) -> String {
  let mut out = String::new();
  out.push_str(&label(root, clan));
  out.push('\n');
  render_children(&mut out, root, clan, "");
  out
}

fn render_children(out: &mut String, node: &DisplayNode, clan: &str, prefix: &str) {
  let count = node.children.len();
  for (i, child) in node.children.iter().enumerate() {
    let last = i + 1 == count;
    let (branch, indent) = if last { ("└── ", "    ") } else { ("├── ", "│   ") };
    let _ = writeln!(out, "{prefix}{branch}{}", label(child, clan));
    render_children(out, child, clan, &format!("{prefix}{indent}"));
  }
}

fn label(node: &DisplayNode, clan: &str) -> String {
  let mut s = node.person.name.clone();
  if !node.clan_tag.eq_ignore_ascii_case(clan) {
    let _ = write!(s, " [{}]", node.clan_tag);
  }
  if let Some(partner) = &node.partner {
    let _ = write!(s, " ⚭ {} [{}]", partner.person.name, partner.clan_tag);
  }
  s
}

#[cfg(test)]
mod tests {
  use vansh_core::{
    memory::MemoryStore,
    person::{Gender, NewPerson},
    store::PersonStore,
    tree::build_tree,
  };

  use super::*;

  async fn add(store: &MemoryStore, input: NewPerson) -> uuid::Uuid {
    store.create_person(input).await.unwrap().id
  }

  #[tokio::test]
  async fn renders_partners_and_branches() {
    let store = MemoryStore::new();
    let ram = add(&store, NewPerson::new("Ram", Gender::Male, "Yadav", 1)).await;
    let sita = add(&store, NewPerson {
      birth_clan: "Gupta".into(),
      spouse_id: Some(ram),
      ..NewPerson::new("Sita", Gender::Female, "Yadav", 1)
    })
    .await;
    let luv = add(&store, NewPerson {
      father_id: Some(ram),
      mother_id: Some(sita),
      ..NewPerson::new("Luv", Gender::Male, "Yadav", 2)
    })
    .await;
    add(&store, NewPerson {
      father_id: Some(ram),
      mother_id: Some(sita),
      ..NewPerson::new("Kush", Gender::Male, "Yadav", 2)
    })
    .await;
    add(&store, NewPerson {
      father_id: Some(luv),
      ..NewPerson::new("Atithi", Gender::Male, "Yadav", 3)
    })
    .await;

    let tree = build_tree(&store.graph(), "Yadav").unwrap();
    let text = render_tree(&tree, "Yadav");
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], "Ram ⚭ Sita [Gupta]");
    assert_eq!(lines.len(), 4);
    assert!(lines.contains(&"│   └── Atithi") || lines.contains(&"    └── Atithi"));
    assert!(lines.iter().any(|l| l.ends_with("Kush")));
    assert!(lines.last().unwrap().starts_with("└── ") || lines.last().unwrap().starts_with("    └── "));
  }

  #[tokio::test]
  async fn daughters_carry_no_partner() {
    let store = MemoryStore::new();
    let ram = add(&store, NewPerson::new("Ram", Gender::Male, "Yadav", 1)).await;
    add(&store, NewPerson {
      father_id: Some(ram),
      ..NewPerson::new("Shanta", Gender::Female, "Yadav", 2)
    })
    .await;

    let tree = build_tree(&store.graph(), "Yadav").unwrap();
    assert_eq!(render_tree(&tree, "yadav"), "Ram\n└── Shanta\n");
  }
}
