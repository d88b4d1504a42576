//! The Lineage Mutation Engine: a step-wise wizard for structural edits.
//!
//! ```text
//!  FindHead ──select──▶ AddChildren (father has children with a known mother)
//!     │      ──select──▶ AddMother
//!     │      ──create──▶ AddMother (no head yet) | LinkFather (head exists)
//!     └─change_head──▶ LinkFather ──ancestor / make_father_of / skip──▶ AddMother
//!  AddMother ──set_mother──▶ AddChildren ──save──▶ Success ──continue──▶ AddMother
//!  any ──reset──▶ FindHead
//! ```
//!
//! Reads come from a [`Graph`] snapshot; writes go to a [`PersonStore`] and
//! come back through the next snapshot. A failed write leaves the wizard on
//! its current step with enough memoised progress that calling the same
//! method again resumes where it stopped instead of duplicating records.

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
  Error, Result,
  candidates,
  clan::same_clan,
  error::{Field, ValidationError},
  graph::Graph,
  person::{Gender, NewPerson, Person, PersonPatch, normalize_name},
  session::Session,
  store::PersonStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "kebab-case")]
pub enum Step {
  FindHead,
  LinkFather,
  AddMother,
  AddChildren,
  Success,
}

/// How a new man relates to the existing tree in the `LinkFather` step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMode {
  /// The new man is a son of an existing person.
  #[default]
  Ancestor,
  /// The new man becomes the father of an existing root.
  Descendant,
}

/// One row of the `AddChildren` list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildEntry {
  pub name:     String,
  pub gender:   Option<Gender>,
  /// Existing record this entry will be attached instead of created.
  pub existing: Option<Person>,
  /// The record as written, once this entry has been saved.
  pub saved:    Option<Person>,
}

impl ChildEntry {
  fn is_named(&self) -> bool { !self.name.trim().is_empty() }
}

/// In-flight "make father of" edit; survives a failed write so a retry
/// neither creates a second father nor double-increments a generation.
#[derive(Debug, Clone)]
struct Reparent {
  root:       Uuid,
  new_father: Option<Person>,
  /// `(id, generation)` targets: the root first, then its descendants.
  targets:    Vec<(Uuid, u32)>,
  done:       usize,
}

#[derive(Debug, Clone)]
pub struct LineageWizard {
  clan:                String,
  step:                Step,
  link_mode:           LinkMode,
  pending_father_name: String,
  head_to_change:      Option<Uuid>,
  reparent:            Option<Reparent>,
  father:              Option<Person>,
  mother:              Option<Person>,
  mother_is_new:       bool,
  spouse_link_pending: bool,
  mother_name:         String,
  maiden_clan:         Option<String>,
  existing_children:   Vec<Person>,
  entries:             Vec<ChildEntry>,
  added:               Vec<Person>,
}

impl LineageWizard {
  pub fn new(clan: impl Into<String>) -> Self {
    Self {
      clan:                clan.into(),
      step:                Step::FindHead,
      link_mode:           LinkMode::Ancestor,
      pending_father_name: String::new(),
      head_to_change:      None,
      reparent:            None,
      father:              None,
      mother:              None,
      mother_is_new:       false,
      spouse_link_pending: false,
      mother_name:         String::new(),
      maiden_clan:         None,
      existing_children:   Vec::new(),
      entries:             Vec::new(),
      added:               Vec::new(),
    }
  }

  /// Start a wizard for the session's selected clan.
  pub fn from_session(session: &Session) -> Result<Self> { Ok(Self::new(session.clan()?)) }

  // ── Accessors ─────────────────────────────────────────────────────────

  pub fn clan(&self) -> &str { &self.clan }

  pub fn step(&self) -> Step { self.step }

  pub fn link_mode(&self) -> LinkMode { self.link_mode }

  pub fn pending_father_name(&self) -> &str { &self.pending_father_name }

  /// The root preselected by [`Self::change_head`].
  pub fn head_to_change(&self) -> Option<Uuid> { self.head_to_change }

  pub fn father(&self) -> Option<&Person> { self.father.as_ref() }

  /// The wife of [`Self::father`], when one was resolved or has been saved.
  pub fn mother(&self) -> Option<&Person> { self.mother.as_ref() }

  /// Whether the mother was created by this wizard rather than found.
  pub fn mother_is_new(&self) -> bool { self.mother_is_new }

  pub fn mother_name(&self) -> &str { &self.mother_name }

  pub fn maiden_clan(&self) -> Option<&str> { self.maiden_clan.as_deref() }

  /// Children the chosen father already had when the wizard reached him.
  pub fn existing_children(&self) -> &[Person] { &self.existing_children }

  pub fn entries(&self) -> &[ChildEntry] { &self.entries }

  /// Children written by the last successful [`Self::save`].
  pub fn added(&self) -> &[Person] { &self.added }

  fn expect_step(&self, step: Step, action: &'static str) -> Result<()> {
    if self.step == step {
      Ok(())
    } else {
      Err(Error::WrongStep { action, step: self.step })
    }
  }

  fn goto(&mut self, step: Step) {
    debug!(clan = %self.clan, from = %self.step, to = %step, "wizard transition");
    self.step = step;
  }

  /// Enter `AddMother` with `father` as the new focus.
  fn focus_father(&mut self, father: Person, existing_children: Vec<Person>) {
    self.father = Some(father);
    self.mother = None;
    self.mother_is_new = false;
    self.spouse_link_pending = false;
    self.mother_name.clear();
    self.maiden_clan = None;
    self.existing_children = existing_children;
    self.entries = vec![ChildEntry::default()];
    self.goto(Step::AddMother);
  }

  fn new_man(&self, name: &str, generation: u32) -> NewPerson {
    NewPerson::new(name, Gender::Male, &self.clan, generation)
  }

  // ── FindHead ──────────────────────────────────────────────────────────

  /// Continue with an existing man as the father.
  pub fn select_father(&mut self, graph: &Graph, id: Uuid) -> Result<()> {
    self.expect_step(Step::FindHead, "select a father")?;
    let father = graph.get(id).ok_or(Error::PersonNotFound(id))?;
    if !father.is_male() {
      return Err(Error::LinkConflict(format!("{} cannot be chosen as a father", father.name)));
    }

    let kids: Vec<Person> = graph.children_of(id).cloned().collect();
    match graph.mother_of_children(id).cloned() {
      Some(mom) if !kids.is_empty() => {
        self.father = Some(father.clone());
        self.mother_name = mom.name.clone();
        self.maiden_clan = Some(mom.birth_clan.clone());
        self.mother = Some(mom);
        self.mother_is_new = false;
        self.spouse_link_pending = false;
        self.existing_children = kids;
        self.entries = vec![ChildEntry::default()];
        self.goto(Step::AddChildren);
      }
      _ => self.focus_father(father.clone(), Vec::new()),
    }
    Ok(())
  }

  /// Introduce a new man by name. Becomes the clan head if the clan has
  /// none, otherwise moves to `LinkFather` to place him.
  pub async fn create_father<S: PersonStore>(
    &mut self,
    store: &S,
    graph: &Graph,
    name: &str,
  ) -> Result<()> {
    self.expect_step(Step::FindHead, "create a father")?;
    let name = required(name, Field::FatherName)?;

    if let Some(head) = graph.head_of(&self.clan) {
      self.clan = head.birth_clan.clone();
      self.pending_father_name = name;
      self.head_to_change = None;
      self.link_mode = LinkMode::Ancestor;
      self.goto(Step::LinkFather);
      return Ok(());
    }

    let head = store
      .create_person(self.new_man(&name, 1))
      .await
      .map_err(Error::store)?;
    info!(clan = %self.clan, person_id = %head.id, "created clan head");
    self.focus_father(head, Vec::new());
    Ok(())
  }

  /// Start inserting a new father above the current head.
  pub fn change_head(&mut self, graph: &Graph) -> Result<()> {
    self.expect_step(Step::FindHead, "change the head")?;
    let head = graph
      .head_of(&self.clan)
      .ok_or_else(|| Error::NoHead(self.clan.clone()))?;
    self.clan = head.birth_clan.clone();
    self.head_to_change = Some(head.id);
    self.pending_father_name.clear();
    self.link_mode = LinkMode::Descendant;
    self.goto(Step::LinkFather);
    Ok(())
  }

  // ── LinkFather ────────────────────────────────────────────────────────

  pub fn set_link_mode(&mut self, mode: LinkMode) { self.link_mode = mode; }

  pub fn set_pending_father_name(&mut self, name: &str) {
    self.pending_father_name = normalize_name(name);
  }

  /// Leave `LinkFather` without writing anything.
  pub fn back(&mut self) -> Result<()> {
    self.expect_step(Step::LinkFather, "go back")?;
    self.head_to_change = None;
    self.reparent = None;
    self.goto(Step::FindHead);
    Ok(())
  }

  /// Create the pending man as a son of `ancestor_id`.
  pub async fn link_to_ancestor<S: PersonStore>(
    &mut self,
    store: &S,
    graph: &Graph,
    ancestor_id: Uuid,
  ) -> Result<()> {
    self.expect_step(Step::LinkFather, "link to an ancestor")?;
    let name = required(&self.pending_father_name, Field::FatherName)?;
    let ancestor = graph.get(ancestor_id).ok_or(Error::PersonNotFound(ancestor_id))?;
    if !candidates::is_father_candidate(ancestor, &self.clan) {
      return Err(Error::LinkConflict(format!(
        "{} is not a man of the {} clan",
        ancestor.name, self.clan
      )));
    }

    let input = NewPerson {
      father_id: Some(ancestor.id),
      ..self.new_man(&name, ancestor.generation + 1)
    };
    let created = store.create_person(input).await.map_err(Error::store)?;
    debug!(person_id = %created.id, father_id = %ancestor.id, "linked under ancestor");
    self.focus_father(created, Vec::new());
    Ok(())
  }

  /// Create the pending man at generation 1 and make him the father of the
  /// root `root_id`, pushing the root and every descendant down one
  /// generation.
  pub async fn make_father_of<S: PersonStore>(
    &mut self,
    store: &S,
    graph: &Graph,
    root_id: Uuid,
  ) -> Result<()> {
    self.expect_step(Step::LinkFather, "insert a new father")?;
    let name = required(&self.pending_father_name, Field::FatherName)?;

    let plan_matches = self.reparent.as_ref().is_some_and(|r| r.root == root_id);
    if !plan_matches {
      let root = graph.get(root_id).ok_or(Error::PersonNotFound(root_id))?;
      if !candidates::is_root_candidate(root, &self.clan) {
        return Err(Error::LinkConflict(format!(
          "{} is not a root of the {} clan",
          root.name, self.clan
        )));
      }
      let targets = std::iter::once(root)
        .chain(graph.descendants_of(root_id))
        .map(|p| (p.id, p.generation + 1))
        .collect();
      let new_father = self.reparent.take().and_then(|r| r.new_father);
      self.reparent = Some(Reparent { root: root_id, new_father, targets, done: 0 });
    }
    let Some(plan) = self.reparent.as_mut() else {
      return Ok(());
    };

    let father = match &plan.new_father {
      Some(f) => f.clone(),
      None => {
        let created = store
          .create_person(NewPerson::new(&name, Gender::Male, &self.clan, 1))
          .await
          .map_err(Error::store)?;
        plan.new_father = Some(created.clone());
        created
      }
    };

    while plan.done < plan.targets.len() {
      let (id, generation) = plan.targets[plan.done];
      let patch = if plan.done == 0 {
        PersonPatch { father_id: Some(Some(father.id)), ..PersonPatch::generation(generation) }
      } else {
        PersonPatch::generation(generation)
      };
      let found = store.update_person(id, patch).await.map_err(Error::store)?;
      if !found {
        debug!(person_id = %id, "skipping renumber of deleted person");
      }
      plan.done += 1;
    }

    let descendants = plan.targets.len() - 1;
    let (root_id, root_generation) = plan.targets[0];
    info!(
      clan = %self.clan,
      new_head = %father.id,
      root = %root_id,
      descendants,
      "inserted new father above root"
    );

    let root = graph.get(root_id).cloned().map(|mut p| {
      p.father_id = Some(father.id);
      p.generation = root_generation;
      p
    });
    self.reparent = None;
    self.head_to_change = None;
    self.focus_father(father, root.into_iter().collect());
    Ok(())
  }

  /// Create the pending man as a detached generation-1 root.
  pub async fn skip_link<S: PersonStore>(&mut self, store: &S) -> Result<()> {
    self.expect_step(Step::LinkFather, "skip linking")?;
    let name = required(&self.pending_father_name, Field::FatherName)?;
    let created = store
      .create_person(self.new_man(&name, 1))
      .await
      .map_err(Error::store)?;
    debug!(person_id = %created.id, "created detached root");
    self.focus_father(created, Vec::new());
    Ok(())
  }

  // ── AddMother ─────────────────────────────────────────────────────────

  /// Record the wife's name and maiden clan. Nothing is written until
  /// [`Self::save`].
  pub fn set_mother(&mut self, name: &str, maiden_clan: &str) -> Result<()> {
    self.expect_step(Step::AddMother, "add a mother")?;
    let name = required(name, Field::MotherName)?;
    let maiden = required(maiden_clan, Field::MaidenClan)?;
    if same_clan(&maiden, &self.clan) {
      debug!(clan = %self.clan, "mother's maiden clan equals the husband's clan");
    }
    self.mother_name = name;
    self.maiden_clan = Some(maiden);
    if self.entries.is_empty() {
      self.entries.push(ChildEntry::default());
    }
    self.goto(Step::AddChildren);
    Ok(())
  }

  // ── AddChildren ───────────────────────────────────────────────────────

  fn entry_mut(&mut self, index: usize) -> Result<&mut ChildEntry> {
    self.expect_step(Step::AddChildren, "edit children")?;
    let entry = self
      .entries
      .get_mut(index)
      .ok_or_else(|| ValidationError::new(Field::ChildName(index), "no such child entry"))?;
    if entry.saved.is_some() {
      return Err(
        ValidationError::new(Field::ChildName(index), "this child has already been saved").into(),
      );
    }
    Ok(entry)
  }

  pub fn push_child(&mut self) -> Result<usize> {
    self.expect_step(Step::AddChildren, "add a child")?;
    self.entries.push(ChildEntry::default());
    Ok(self.entries.len() - 1)
  }

  pub fn set_child_name(&mut self, index: usize, name: &str) -> Result<()> {
    let entry = self.entry_mut(index)?;
    entry.name = normalize_name(name);
    entry.existing = None;
    Ok(())
  }

  pub fn set_child_gender(&mut self, index: usize, gender: Gender) -> Result<()> {
    self.entry_mut(index)?.gender = Some(gender);
    Ok(())
  }

  pub fn remove_child(&mut self, index: usize) -> Result<()> {
    self.entry_mut(index)?;
    self.entries.remove(index);
    Ok(())
  }

  /// The existing record the entry at `index` could link to instead of
  /// creating a duplicate.
  pub fn suggest_link<'g>(&self, graph: &'g Graph, index: usize) -> Option<&'g Person> {
    let entry = self.entries.get(index)?;
    if entry.existing.is_some() || entry.saved.is_some() {
      return None;
    }
    candidates::child_link_candidate(graph, &self.clan, &entry.name)
  }

  /// Attach the entry at `index` to an existing unfathered record.
  pub fn link_child(&mut self, graph: &Graph, index: usize, person_id: Uuid) -> Result<()> {
    let clan = self.clan.clone();
    let person = graph.get(person_id).ok_or(Error::PersonNotFound(person_id))?;
    if !candidates::is_child_candidate(person, &clan) {
      return Err(Error::LinkConflict(format!(
        "{} already has a father or belongs to another clan",
        person.name
      )));
    }
    let entry = self.entry_mut(index)?;
    entry.name = person.name.clone();
    entry.gender = Some(person.gender);
    entry.existing = Some(person.clone());
    Ok(())
  }

  pub fn unlink_child(&mut self, index: usize) -> Result<()> {
    self.entry_mut(index)?.existing = None;
    Ok(())
  }

  fn validate_entries(&self) -> Result<()> {
    for (i, entry) in self.entries.iter().enumerate() {
      if entry.is_named() && entry.gender.is_none() {
        return Err(
          ValidationError::new(
            Field::ChildGender(i),
            format!("select a gender for {}", entry.name),
          )
          .into(),
        );
      }
    }
    Ok(())
  }

  /// Write the mother (if new) and every named child entry.
  ///
  /// Writes are issued one at a time, each awaited before the next. On
  /// failure the step stays `AddChildren`; already written records are kept
  /// and skipped when `save` is called again.
  pub async fn save<S: PersonStore>(&mut self, store: &S) -> Result<()> {
    self.expect_step(Step::AddChildren, "save")?;
    self.validate_entries()?;
    let Some(father) = self.father.clone() else {
      return Err(Error::WrongStep { action: "save without a father", step: self.step });
    };

    if self.mother.is_none() {
      let name = required(&self.mother_name, Field::MotherName)?;
      let maiden = self
        .maiden_clan
        .clone()
        .ok_or_else(|| ValidationError::new(Field::MaidenClan, "maiden clan is required"))?;
      let input = NewPerson {
        birth_clan: maiden,
        spouse_id: Some(father.id),
        ..NewPerson::new(&name, Gender::Female, &self.clan, father.generation)
      };
      let mom = store.create_person(input).await.map_err(Error::store)?;
      debug!(person_id = %mom.id, husband = %father.id, "created mother");
      self.mother = Some(mom);
      self.mother_is_new = true;
      self.spouse_link_pending = true;
    }
    let mother_id = self.mother.as_ref().map(|m| m.id);

    if self.spouse_link_pending {
      let patch = PersonPatch { spouse_id: Some(mother_id), ..PersonPatch::default() };
      store.update_person(father.id, patch).await.map_err(Error::store)?;
      self.spouse_link_pending = false;
      if let Some(f) = self.father.as_mut() {
        f.spouse_id = mother_id;
      }
    }

    let generation = father.generation + 1;
    for entry in self.entries.iter_mut().filter(|e| e.is_named() && e.saved.is_none()) {
      let written = match &entry.existing {
        Some(existing) => {
          let patch = PersonPatch {
            father_id: Some(Some(father.id)),
            mother_id: Some(mother_id),
            ..PersonPatch::generation(generation)
          };
          store
            .update_person(existing.id, patch.clone())
            .await
            .map_err(Error::store)?;
          let mut updated = existing.clone();
          patch.apply(&mut updated);
          updated
        }
        None => {
          let Some(gender) = entry.gender else { continue };
          let input = NewPerson {
            father_id: Some(father.id),
            mother_id,
            ..NewPerson::new(&entry.name, gender, &self.clan, generation)
          };
          store.create_person(input).await.map_err(Error::store)?
        }
      };
      debug!(person_id = %written.id, father_id = %father.id, "saved child");
      entry.saved = Some(written);
    }

    self.added = self.entries.iter().filter_map(|e| e.saved.clone()).collect();
    info!(clan = %self.clan, father = %father.id, children = self.added.len(), "lineage saved");
    self.goto(Step::Success);
    Ok(())
  }

  // ── Success ───────────────────────────────────────────────────────────

  /// Whether [`Self::continue_as_child`] would accept `child`.
  pub fn can_continue_as(&self, graph: &Graph, child: &Person) -> bool {
    self.step == Step::Success
      && child.is_male()
      && self.added.iter().any(|p| p.id == child.id)
      && !graph.has_children(child.id)
  }

  /// Re-enter at `AddMother` with one of the just-added sons as father.
  pub fn continue_as_child(&mut self, graph: &Graph, child_id: Uuid) -> Result<()> {
    self.expect_step(Step::Success, "continue as child")?;
    let child = self
      .added
      .iter()
      .find(|p| p.id == child_id)
      .cloned()
      .ok_or(Error::PersonNotFound(child_id))?;
    if !self.can_continue_as(graph, &child) {
      return Err(Error::LinkConflict(format!(
        "{} cannot continue the line here",
        child.name
      )));
    }
    self.added.clear();
    self.focus_father(child, Vec::new());
    Ok(())
  }

  /// Back to `FindHead`, discarding everything not yet written.
  pub fn reset(&mut self) {
    let clan = std::mem::take(&mut self.clan);
    *self = Self::new(clan);
    debug!(clan = %self.clan, "wizard reset");
  }
}

fn required(raw: &str, field: Field) -> Result<String> {
  let value = normalize_name(raw);
  if value.is_empty() {
    return Err(ValidationError::new(field, format!("{field} is required")).into());
  }
  Ok(value)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{memory::MemoryStore, tree::build_tree};

  async fn graph(store: &MemoryStore) -> Graph { store.graph() }

  fn find<'g>(graph: &'g Graph, name: &str) -> &'g Person {
    graph.people().iter().find(|p| p.name == name).unwrap()
  }

  /// Ram as head, Sita as wife (born Gupta), Lakshman as son.
  async fn ram_family(store: &MemoryStore) -> LineageWizard {
    let mut w = LineageWizard::new("Yadav");
    w.create_father(store, &graph(store).await, "ram").await.unwrap();
    w.set_mother("sita", "Gupta").unwrap();
    w.set_child_name(0, "lakshman").unwrap();
    w.set_child_gender(0, Gender::Male).unwrap();
    w.save(store).await.unwrap();
    w
  }

  fn assert_generation_invariant(graph: &Graph) {
    for p in graph.people() {
      if let Some(father) = graph.resolve(p.father_id) {
        assert_eq!(p.generation, father.generation + 1, "{}", p.name);
      }
    }
  }

  #[tokio::test]
  async fn creates_head_wife_and_child() {
    let store = MemoryStore::new();
    let w = ram_family(&store).await;
    assert_eq!(w.step(), Step::Success);

    let g = graph(&store).await;
    let ram = find(&g, "Ram");
    let sita = find(&g, "Sita");
    let lakshman = find(&g, "Lakshman");

    assert_eq!(ram.generation, 1);
    assert_eq!(ram.spouse_id, Some(sita.id));
    assert_eq!(sita.spouse_id, Some(ram.id));
    assert_eq!(sita.birth_clan, "Gupta");
    assert_eq!(sita.current_clan, "Yadav");
    assert_eq!(sita.generation, 1);
    assert_eq!(lakshman.father_id, Some(ram.id));
    assert_eq!(lakshman.mother_id, Some(sita.id));

    let tree = build_tree(&g, "Yadav").unwrap();
    assert_eq!(tree.person.name, "Ram");
    assert_eq!(tree.partner.as_ref().unwrap().person.name, "Sita");
    assert_eq!(tree.children.len(), 1);
    assert_eq!(tree.children[0].person.name, "Lakshman");
    assert_eq!(tree.children[0].person.generation, 2);
  }

  #[tokio::test]
  async fn existing_head_routes_to_link_father() {
    let store = MemoryStore::new();
    ram_family(&store).await;

    let mut w = LineageWizard::new("Yadav");
    w.create_father(&store, &graph(&store).await, "Dashrath").await.unwrap();
    assert_eq!(w.step(), Step::LinkFather);
    assert_eq!(w.pending_father_name(), "Dashrath");
    assert_eq!(store.len(), 3);
  }

  #[tokio::test]
  async fn change_head_cascades_generations() {
    let store = MemoryStore::new();
    ram_family(&store).await;
    let before = graph(&store).await;
    let ram_id = find(&before, "Ram").id;
    let sita_gen = find(&before, "Sita").generation;

    let mut w = LineageWizard::new("Yadav");
    w.change_head(&before).unwrap();
    assert_eq!(w.head_to_change(), Some(ram_id));
    w.set_pending_father_name("dashrath");
    w.make_father_of(&store, &before, ram_id).await.unwrap();
    assert_eq!(w.step(), Step::AddMother);
    assert_eq!(w.existing_children().len(), 1);

    let g = graph(&store).await;
    let dashrath = find(&g, "Dashrath");
    let ram = find(&g, "Ram");
    assert_eq!(dashrath.generation, 1);
    assert_eq!(ram.father_id, Some(dashrath.id));
    assert_eq!(ram.generation, 2);
    assert_eq!(find(&g, "Lakshman").generation, 3);
    // wives are not father-line descendants
    assert_eq!(find(&g, "Sita").generation, sita_gen);

    assert_eq!(g.heads_of("Yadav").count(), 1);
    assert_generation_invariant(&g);
    assert_eq!(build_tree(&g, "Yadav").unwrap().person.id, dashrath.id);
  }

  #[tokio::test]
  async fn cascade_touches_exactly_the_descendants() {
    let store = MemoryStore::new();
    let mut w = ram_family(&store).await;
    let g = graph(&store).await;
    let lakshman = find(&g, "Lakshman").id;
    w.continue_as_child(&g, lakshman).unwrap();
    w.set_mother("Urmila", "Janak").unwrap();
    w.set_child_name(0, "Angad").unwrap();
    w.set_child_gender(0, Gender::Male).unwrap();
    w.push_child().unwrap();
    w.set_child_name(1, "Chandraketu").unwrap();
    w.set_child_gender(1, Gender::Male).unwrap();
    w.save(&store).await.unwrap();

    let before = graph(&store).await;
    let ram = find(&before, "Ram").id;
    let gens: Vec<(Uuid, u32)> = before.people().iter().map(|p| (p.id, p.generation)).collect();
    let descendants: Vec<Uuid> = before.descendants_of(ram).map(|p| p.id).collect();
    assert_eq!(descendants.len(), 3);

    let mut w = LineageWizard::new("Yadav");
    w.change_head(&before).unwrap();
    w.set_pending_father_name("Dashrath");
    store.clear_log();
    w.make_father_of(&store, &before, ram).await.unwrap();

    let after = graph(&store).await;
    for (id, gen_before) in gens {
      let now = after.get(id).unwrap().generation;
      if descendants.contains(&id) || id == ram {
        assert_eq!(now, gen_before + 1);
      } else {
        assert_eq!(now, gen_before);
      }
    }
    // one create, one root update, one update per descendant
    assert_eq!(store.log().len(), 1 + 1 + descendants.len());
    assert_generation_invariant(&after);
  }

  #[tokio::test]
  async fn failed_cascade_resumes_without_double_increment() {
    let store = MemoryStore::new();
    ram_family(&store).await;
    let before = graph(&store).await;
    let ram = find(&before, "Ram").id;

    let mut w = LineageWizard::new("Yadav");
    w.change_head(&before).unwrap();
    w.set_pending_father_name("Dashrath");

    // the create succeeds, the root update fails
    store.fail_after(1, 1);
    let err = w.make_father_of(&store, &before, ram).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(w.step(), Step::LinkFather);

    w.make_father_of(&store, &before, ram).await.unwrap();
    let g = graph(&store).await;
    assert_eq!(g.people().iter().filter(|p| p.name == "Dashrath").count(), 1);
    assert_eq!(find(&g, "Ram").generation, 2);
    assert_eq!(find(&g, "Lakshman").generation, 3);
  }

  #[tokio::test]
  async fn link_to_ancestor_places_new_man_below() {
    let store = MemoryStore::new();
    ram_family(&store).await;
    let g = graph(&store).await;
    let lakshman = find(&g, "Lakshman").id;

    let mut w = LineageWizard::new("Yadav");
    w.create_father(&store, &g, "Angad").await.unwrap();
    w.link_to_ancestor(&store, &g, lakshman).await.unwrap();
    assert_eq!(w.step(), Step::AddMother);

    let g = graph(&store).await;
    let angad = find(&g, "Angad");
    assert_eq!(angad.father_id, Some(lakshman));
    assert_eq!(angad.generation, 3);
  }

  #[tokio::test]
  async fn clan_spelling_does_not_create_a_second_head() {
    let store = MemoryStore::new();
    ram_family(&store).await;
    let g = graph(&store).await;
    let lakshman = find(&g, "Lakshman").id;

    let mut w = LineageWizard::new("YADAV");
    w.create_father(&store, &g, "Mohan").await.unwrap();
    assert_eq!(w.step(), Step::LinkFather);
    assert_eq!(w.clan(), "Yadav");
    w.link_to_ancestor(&store, &g, lakshman).await.unwrap();

    let g = graph(&store).await;
    assert_eq!(g.heads_of("yadav").count(), 1);
    let mohan = find(&g, "Mohan");
    assert_eq!(mohan.birth_clan, "Yadav");
    assert_eq!(mohan.generation, 3);
    assert_eq!(build_tree(&g, "YADAV").unwrap().person.name, "Ram");
  }

  #[tokio::test]
  async fn ancestor_must_be_a_man_of_the_clan() {
    let store = MemoryStore::new();
    ram_family(&store).await;
    let g = graph(&store).await;
    let sita = find(&g, "Sita").id;

    let mut w = LineageWizard::new("Yadav");
    w.create_father(&store, &g, "Angad").await.unwrap();
    let err = w.link_to_ancestor(&store, &g, sita).await.unwrap_err();
    assert!(matches!(err, Error::LinkConflict(_)));
    assert_eq!(w.step(), Step::LinkFather);
  }

  #[tokio::test]
  async fn skip_creates_detached_root() {
    let store = MemoryStore::new();
    ram_family(&store).await;
    let g = graph(&store).await;

    let mut w = LineageWizard::new("Yadav");
    w.create_father(&store, &g, "Bharat").await.unwrap();
    w.skip_link(&store).await.unwrap();

    let g = graph(&store).await;
    let bharat = find(&g, "Bharat");
    assert_eq!(bharat.generation, 1);
    assert!(bharat.father_id.is_none());
    // the older head still roots the tree
    assert_eq!(build_tree(&g, "Yadav").unwrap().person.name, "Ram");
  }

  #[tokio::test]
  async fn selecting_a_father_with_children_prefills_mother() {
    let store = MemoryStore::new();
    ram_family(&store).await;
    let g = graph(&store).await;
    let ram = find(&g, "Ram").id;

    let mut w = LineageWizard::new("Yadav");
    w.select_father(&g, ram).unwrap();
    assert_eq!(w.step(), Step::AddChildren);
    assert_eq!(w.mother().map(|m| m.name.as_str()), Some("Sita"));
    assert_eq!(w.maiden_clan(), Some("Gupta"));
    assert_eq!(w.existing_children().len(), 1);

    w.set_child_name(0, "Shatrughna").unwrap();
    w.set_child_gender(0, Gender::Male).unwrap();
    w.save(&store).await.unwrap();

    let g = graph(&store).await;
    // no second Sita
    assert_eq!(g.people().iter().filter(|p| p.name == "Sita").count(), 1);
    let s = find(&g, "Shatrughna");
    assert_eq!(s.mother_id, Some(find(&g, "Sita").id));
  }

  #[tokio::test]
  async fn selecting_a_childless_father_asks_for_mother() {
    let store = MemoryStore::new();
    ram_family(&store).await;
    let g = graph(&store).await;
    let lakshman = find(&g, "Lakshman").id;

    let mut w = LineageWizard::new("Yadav");
    w.select_father(&g, lakshman).unwrap();
    assert_eq!(w.step(), Step::AddMother);
    assert!(w.mother().is_none());
  }

  #[tokio::test]
  async fn missing_gender_blocks_save_with_entry_index() {
    let store = MemoryStore::new();
    let mut w = LineageWizard::new("Yadav");
    w.create_father(&store, &graph(&store).await, "Ram").await.unwrap();
    w.set_mother("Sita", "Gupta").unwrap();
    w.set_child_name(0, "Luv").unwrap();
    w.set_child_gender(0, Gender::Male).unwrap();
    w.push_child().unwrap();
    w.set_child_name(1, "Kush").unwrap();

    let writes = store.log().len();
    let err = w.save(&store).await.unwrap_err();
    match err {
      Error::Validation(v) => assert_eq!(v.field, Field::ChildGender(1)),
      other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(store.log().len(), writes);
    assert_eq!(w.step(), Step::AddChildren);
  }

  #[tokio::test]
  async fn blank_entries_are_ignored() {
    let store = MemoryStore::new();
    let mut w = LineageWizard::new("Yadav");
    w.create_father(&store, &graph(&store).await, "Ram").await.unwrap();
    w.set_mother("Sita", "Gupta").unwrap();
    w.push_child().unwrap();
    w.save(&store).await.unwrap();
    assert!(w.added().is_empty());
    assert_eq!(store.len(), 2);
  }

  #[tokio::test]
  async fn failed_save_resumes_without_duplicates() {
    let store = MemoryStore::new();
    let mut w = LineageWizard::new("Yadav");
    w.create_father(&store, &graph(&store).await, "Ram").await.unwrap();
    w.set_mother("Sita", "Gupta").unwrap();
    w.set_child_name(0, "Luv").unwrap();
    w.set_child_gender(0, Gender::Male).unwrap();
    w.push_child().unwrap();
    w.set_child_name(1, "Kush").unwrap();
    w.set_child_gender(1, Gender::Male).unwrap();

    // mother, spouse link and Luv succeed; Kush fails
    store.fail_after(3, 1);
    assert!(w.save(&store).await.unwrap_err().is_retryable());
    assert_eq!(w.step(), Step::AddChildren);
    assert!(w.entries()[0].saved.is_some());

    w.save(&store).await.unwrap();
    let g = graph(&store).await;
    assert_eq!(g.len(), 4);
    assert_eq!(g.people().iter().filter(|p| p.name == "Sita").count(), 1);
    assert_eq!(w.added().len(), 2);
  }

  #[tokio::test]
  async fn linking_an_existing_child_updates_instead_of_creating() {
    let store = MemoryStore::new();
    ram_family(&store).await;
    let mut w = LineageWizard::new("Yadav");
    w.create_father(&store, &graph(&store).await, "Bharat").await.unwrap();
    w.skip_link(&store).await.unwrap();
    w.reset();

    let g = graph(&store).await;
    let ram = find(&g, "Ram").id;
    let bharat = find(&g, "Bharat").id;
    w.select_father(&g, ram).unwrap();
    w.set_child_name(0, "bharat").unwrap();
    let suggestion = w.suggest_link(&g, 0).map(|p| p.id);
    assert_eq!(suggestion, Some(bharat));
    w.link_child(&g, 0, bharat).unwrap();
    let before = store.len();
    w.save(&store).await.unwrap();
    assert_eq!(store.len(), before);

    let g = graph(&store).await;
    let b = find(&g, "Bharat");
    assert_eq!(b.father_id, Some(ram));
    assert_eq!(b.generation, 2);
    assert_eq!(g.heads_of("Yadav").count(), 1);
  }

  #[tokio::test]
  async fn fathered_people_cannot_be_linked() {
    let store = MemoryStore::new();
    ram_family(&store).await;
    let g = graph(&store).await;
    let lakshman = find(&g, "Lakshman").id;

    let mut w = LineageWizard::new("Yadav");
    w.select_father(&g, find(&g, "Ram").id).unwrap();
    w.set_child_name(0, "Lakshman").unwrap();
    assert!(w.suggest_link(&g, 0).is_none());
    assert!(matches!(w.link_child(&g, 0, lakshman), Err(Error::LinkConflict(_))));
  }

  #[tokio::test]
  async fn continue_as_child_requires_a_childless_son() {
    let store = MemoryStore::new();
    let mut w = LineageWizard::new("Yadav");
    w.create_father(&store, &graph(&store).await, "Ram").await.unwrap();
    w.set_mother("Sita", "Gupta").unwrap();
    w.set_child_name(0, "Lakshman").unwrap();
    w.set_child_gender(0, Gender::Male).unwrap();
    w.push_child().unwrap();
    w.set_child_name(1, "Shanta").unwrap();
    w.set_child_gender(1, Gender::Female).unwrap();
    w.save(&store).await.unwrap();

    let g = graph(&store).await;
    let shanta = find(&g, "Shanta").id;
    let lakshman = find(&g, "Lakshman").id;
    assert!(matches!(w.continue_as_child(&g, shanta), Err(Error::LinkConflict(_))));

    w.continue_as_child(&g, lakshman).unwrap();
    assert_eq!(w.step(), Step::AddMother);
    assert_eq!(w.father().map(|f| f.id), Some(lakshman));
    assert_eq!(w.clan(), "Yadav");
  }

  #[tokio::test]
  async fn store_failure_keeps_the_step() {
    let store = MemoryStore::new();
    let mut w = LineageWizard::new("Yadav");
    store.fail_next(1);
    let err = w.create_father(&store, &graph(&store).await, "Ram").await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(w.step(), Step::FindHead);
    assert!(store.is_empty());

    w.create_father(&store, &graph(&store).await, "Ram").await.unwrap();
    assert_eq!(w.step(), Step::AddMother);
  }

  #[tokio::test]
  async fn reset_discards_uncommitted_entries() {
    let store = MemoryStore::new();
    let mut w = LineageWizard::new("Yadav");
    w.create_father(&store, &graph(&store).await, "Ram").await.unwrap();
    w.set_mother("Sita", "Gupta").unwrap();
    w.set_child_name(0, "Luv").unwrap();
    w.reset();

    assert_eq!(w.step(), Step::FindHead);
    assert!(w.entries().is_empty());
    assert!(w.father().is_none());
    assert_eq!(w.clan(), "Yadav");
    assert_eq!(store.len(), 1);
  }

  #[tokio::test]
  async fn actions_out_of_step_are_rejected() {
    let store = MemoryStore::new();
    let mut w = LineageWizard::new("Yadav");
    let err = w.set_mother("Sita", "Gupta").unwrap_err();
    assert!(matches!(err, Error::WrongStep { step: Step::FindHead, .. }));
    assert!(w.save(&store).await.is_err());
  }

  #[test]
  fn wizard_needs_a_selected_clan() {
    assert!(matches!(
      LineageWizard::from_session(&Session::anonymous()),
      Err(Error::NoClanSelected)
    ));
    let w = LineageWizard::from_session(&Session::anonymous().with_clan("Yadav")).unwrap();
    assert_eq!(w.clan(), "Yadav");
  }
}
