//! The Graph Model: an arena of person records plus derived indices.
//!
//! A [`Graph`] is a read cache over the store. It is rebuilt wholesale from
//! every snapshot and never mutated piecemeal, so it cannot drift from the
//! authoritative records.

use std::{
  collections::{HashMap, HashSet},
  sync::Arc,
};

use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use crate::{
  person::{Gender, Person},
  store::Subscription,
};

#[derive(Debug, Clone, Default)]
pub struct Graph {
  people:    Vec<Person>,
  by_id:     HashMap<Uuid, usize>,
  by_father: HashMap<Uuid, Vec<usize>>,
  by_clan:   HashMap<String, Vec<usize>>,
}

impl Graph {
  pub fn new(records: impl IntoIterator<Item = Person>) -> Self {
    let mut graph = Self::default();
    graph.upsert_all(records);
    graph
  }

  /// Replace the full record set and rebuild every index.
  pub fn upsert_all(&mut self, records: impl IntoIterator<Item = Person>) {
    self.people = records.into_iter().collect();
    self.by_id.clear();
    self.by_father.clear();
    self.by_clan.clear();

    for (idx, p) in self.people.iter().enumerate() {
      self.by_id.insert(p.id, idx);
      if let Some(father) = p.father_id {
        self.by_father.entry(father).or_default().push(idx);
      }
      self.by_clan.entry(clan_key(&p.birth_clan)).or_default().push(idx);
    }
  }

  pub fn len(&self) -> usize { self.people.len() }

  pub fn is_empty(&self) -> bool { self.people.is_empty() }

  /// Every record, in snapshot order.
  pub fn people(&self) -> &[Person] { &self.people }

  pub fn get(&self, id: Uuid) -> Option<&Person> {
    self.by_id.get(&id).map(|&idx| &self.people[idx])
  }

  /// Follow an optional reference. A dangling id resolves to `None`; it can
  /// appear briefly between a delete and the next snapshot.
  pub fn resolve(&self, id: Option<Uuid>) -> Option<&Person> {
    let id = id?;
    let found = self.get(id);
    if found.is_none() {
      debug!(person_id = %id, "dangling reference treated as absent");
    }
    found
  }

  /// Records whose `father_id` is `id`, in snapshot order.
  pub fn children_of(&self, id: Uuid) -> impl Iterator<Item = &Person> + '_ {
    self
      .by_father
      .get(&id)
      .into_iter()
      .flatten()
      .map(|&idx| &self.people[idx])
  }

  pub fn has_children(&self, id: Uuid) -> bool { self.by_father.contains_key(&id) }

  /// Transitive closure of [`Self::children_of`], depth-first, excluding `id`.
  pub fn descendants_of(&self, id: Uuid) -> Descendants<'_> {
    let mut it = Descendants { graph: self, stack: Vec::new(), seen: HashSet::new() };
    it.seen.insert(id);
    it.push_children(id);
    it
  }

  /// Everyone born into `clan`, ignoring case.
  pub fn clan_members<'a>(&'a self, clan: &str) -> impl Iterator<Item = &'a Person> + 'a {
    self
      .by_clan
      .get(&clan_key(clan))
      .into_iter()
      .flatten()
      .map(|&idx| &self.people[idx])
  }

  /// All generation-1 men born into `clan`.
  pub fn heads_of<'a>(&'a self, clan: &str) -> impl Iterator<Item = &'a Person> + 'a {
    self
      .clan_members(clan)
      .filter(|p| p.generation == 1 && p.gender == Gender::Male)
  }

  /// The clan head. When detached roots exist, the earliest created wins.
  pub fn head_of(&self, clan: &str) -> Option<&Person> {
    self.heads_of(clan).min_by_key(|p| (p.created_at, p.id))
  }

  /// The wife of `id` as recorded on his children: the mother of the first
  /// child whose mother resolves.
  pub fn mother_of_children(&self, id: Uuid) -> Option<&Person> {
    self.children_of(id).find_map(|c| self.resolve(c.mother_id))
  }

  /// Records holding a father, mother or spouse reference to `id`.
  pub fn referrers_of(&self, id: Uuid) -> impl Iterator<Item = &Person> + '_ {
    self.people.iter().filter(move |p| p.id != id && p.references(id))
  }
}

fn clan_key(clan: &str) -> String { clan.to_lowercase() }

// ─── Descendants ─────────────────────────────────────────────────────────────

/// Lazy depth-first walk over a father line. See [`Graph::descendants_of`].
pub struct Descendants<'g> {
  graph: &'g Graph,
  stack: Vec<usize>,
  // corrupt cyclic data must not loop forever
  seen:  HashSet<Uuid>,
}

impl Descendants<'_> {
  fn push_children(&mut self, id: Uuid) {
    if let Some(kids) = self.graph.by_father.get(&id) {
      self.stack.extend(kids.iter().rev());
    }
  }
}

impl<'g> Iterator for Descendants<'g> {
  type Item = &'g Person;

  fn next(&mut self) -> Option<Self::Item> {
    while let Some(idx) = self.stack.pop() {
      let person = &self.graph.people[idx];
      if self.seen.insert(person.id) {
        self.push_children(person.id);
        return Some(person);
      }
    }
    None
  }
}

// ─── GraphHandle ─────────────────────────────────────────────────────────────

/// Shared, always-complete view of the latest graph.
///
/// [`GraphHandle::follow`] rebuilds a [`Graph`] from every snapshot on a
/// background task; readers clone the current `Arc` and never observe a
/// half-built index.
#[derive(Debug, Clone)]
pub struct GraphHandle {
  rx: watch::Receiver<Arc<Graph>>,
}

impl GraphHandle {
  /// Track `subscription`. Must be called inside a tokio runtime.
  pub fn follow(mut subscription: Subscription) -> Self {
    let initial = Graph::new(subscription.current().iter().cloned());
    let (tx, rx) = watch::channel(Arc::new(initial));

    tokio::spawn(async move {
      while let Some(snapshot) = subscription.next().await {
        let graph = Graph::new(snapshot.iter().cloned());
        debug!(people = graph.len(), "graph rebuilt from snapshot");
        if tx.send(Arc::new(graph)).is_err() {
          break;
        }
      }
    });

    Self { rx }
  }

  /// A handle over a graph that never changes.
  pub fn fixed(graph: Graph) -> Self {
    let (_tx, rx) = watch::channel(Arc::new(graph));
    Self { rx }
  }

  pub fn current(&self) -> Arc<Graph> { self.rx.borrow().clone() }

  /// Wait until a newer graph is published. Returns `false` once the feed
  /// has ended.
  pub async fn changed(&mut self) -> bool { self.rx.changed().await.is_ok() }
}
