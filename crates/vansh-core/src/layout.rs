//! Force-directed layout of every person, clustered by clan.
//!
//! The simulation only reads person records. Callers feed it snapshots with
//! [`ForceLayout::sync`] and advance it with [`ForceLayout::tick`] once per
//! frame, forever; there is no convergence test.

use std::{
  collections::{HashMap, HashSet},
  f64::consts::TAU,
  ops::{Add, AddAssign, Mul, Sub},
};

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use tracing::trace;
use uuid::Uuid;

use crate::person::Person;

/// Tuning constants for the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
  /// Pull toward the clan anchor, per unit of distance.
  pub clan_pull:           f64,
  /// Nodes closer than this push each other apart.
  pub min_separation:      f64,
  /// Scale of the overlap push.
  pub repulsion:           f64,
  /// Pull toward the father, per unit of distance.
  pub father_spring:       f64,
  /// Pull toward the mother, per unit of distance. Weaker than the father's.
  pub mother_spring:       f64,
  /// Velocity multiplier applied every tick.
  pub damping:             f64,
  /// Side of the square around the father in which a new node is placed.
  pub seed_jitter:         f64,
  /// Anchor circle radius as a fraction of the smaller canvas side.
  pub anchor_radius_ratio: f64,
}

impl Default for LayoutConfig {
  fn default() -> Self {
    Self {
      clan_pull:           0.005,
      min_separation:      30.0,
      repulsion:           0.5,
      father_spring:       0.05,
      mother_spring:       0.02,
      damping:             0.9,
      seed_jitter:         50.0,
      anchor_radius_ratio: 0.35,
    }
  }
}

// ─── Vec2 ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
  pub x: f64,
  pub y: f64,
}

impl Vec2 {
  pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

  pub fn new(x: f64, y: f64) -> Self { Self { x, y } }

  pub fn from_angle(theta: f64) -> Self { Self::new(theta.cos(), theta.sin()) }

  pub fn length(self) -> f64 { self.x.hypot(self.y) }
}

impl Add for Vec2 {
  type Output = Self;

  fn add(self, rhs: Self) -> Self { Self::new(self.x + rhs.x, self.y + rhs.y) }
}

impl AddAssign for Vec2 {
  fn add_assign(&mut self, rhs: Self) {
    self.x += rhs.x;
    self.y += rhs.y;
  }
}

impl Sub for Vec2 {
  type Output = Self;

  fn sub(self, rhs: Self) -> Self { Self::new(self.x - rhs.x, self.y - rhs.y) }
}

impl Mul<f64> for Vec2 {
  type Output = Self;

  fn mul(self, k: f64) -> Self { Self::new(self.x * k, self.y * k) }
}

// ─── Nodes ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct SimNode {
  pub id:         Uuid,
  pub name:       String,
  pub clan:       String,
  pub generation: u32,
  pub father_id:  Option<Uuid>,
  pub mother_id:  Option<Uuid>,
  pub pos:        Vec2,
  pub vel:        Vec2,
  /// Drawing radius; larger for older generations.
  pub radius:     f64,
}

fn radius_for(generation: u32) -> f64 {
  match generation {
    0 | 1 => 8.0,
    2 => 6.0,
    _ => 4.0,
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
  Father,
  Mother,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
  pub from: Vec2,
  pub to:   Vec2,
  pub kind: EdgeKind,
}

// ─── Simulation ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ForceLayout<R = StdRng> {
  config:  LayoutConfig,
  width:   f64,
  height:  f64,
  clans:   Vec<String>,
  anchors: HashMap<String, Vec2>,
  nodes:   Vec<SimNode>,
  index:   HashMap<Uuid, usize>,
  rng:     R,
}

impl ForceLayout<StdRng> {
  pub fn new(config: LayoutConfig, width: f64, height: f64) -> Self {
    Self::with_rng(config, width, height, StdRng::from_entropy())
  }
}

impl<R: Rng> ForceLayout<R> {
  pub fn with_rng(config: LayoutConfig, width: f64, height: f64, rng: R) -> Self {
    Self {
      config,
      width,
      height,
      clans: Vec::new(),
      anchors: HashMap::new(),
      nodes: Vec::new(),
      index: HashMap::new(),
      rng,
    }
  }

  pub fn config(&self) -> &LayoutConfig { &self.config }

  pub fn nodes(&self) -> &[SimNode] { &self.nodes }

  pub fn node(&self, id: Uuid) -> Option<&SimNode> { self.index.get(&id).map(|&i| &self.nodes[i]) }

  /// Clan anchors, in the order the clans were given.
  pub fn anchors(&self) -> impl Iterator<Item = (&str, Vec2)> + '_ {
    self
      .clans
      .iter()
      .filter_map(|c| self.anchors.get(c).map(|&p| (c.as_str(), p)))
  }

  fn center(&self) -> Vec2 { Vec2::new(self.width / 2.0, self.height / 2.0) }

  /// Place one anchor per clan, evenly spaced on a circle around the
  /// canvas centre.
  pub fn set_clans(&mut self, clans: &[String]) {
    self.clans = clans.to_vec();
    self.place_anchors();
  }

  pub fn resize(&mut self, width: f64, height: f64) {
    self.width = width;
    self.height = height;
    self.place_anchors();
  }

  fn place_anchors(&mut self) {
    let center = self.center();
    let radius = self.width.min(self.height) * self.config.anchor_radius_ratio;
    let n = self.clans.len().max(1) as f64;
    self.anchors = self
      .clans
      .iter()
      .enumerate()
      .map(|(i, clan)| {
        let at = center + Vec2::from_angle(i as f64 / n * TAU) * radius;
        (clan.clone(), at)
      })
      .collect();
  }

  /// Bring the node set in line with `people`. Existing nodes keep their
  /// position and velocity; new nodes are seeded near their father when he
  /// is already placed. Returns how many nodes were added.
  pub fn sync(&mut self, people: &[Person]) -> usize {
    let live: HashSet<Uuid> = people.iter().map(|p| p.id).collect();
    self.nodes.retain(|n| live.contains(&n.id));
    self.reindex();

    for p in people {
      if let Some(&i) = self.index.get(&p.id) {
        let node = &mut self.nodes[i];
        node.name.clone_from(&p.name);
        node.clan.clone_from(&p.birth_clan);
        node.generation = p.generation;
        node.father_id = p.father_id;
        node.mother_id = p.mother_id;
        node.radius = radius_for(p.generation);
      }
    }

    // fathers before sons so a son can be seeded next to a father who is new
    // in the same snapshot
    let mut fresh: Vec<&Person> = people.iter().filter(|p| !self.index.contains_key(&p.id)).collect();
    fresh.sort_by_key(|p| p.generation);

    let added = fresh.len();
    for p in fresh {
      let pos = self.seed_position(p.father_id);
      self.index.insert(p.id, self.nodes.len());
      self.nodes.push(SimNode {
        id:         p.id,
        name:       p.name.clone(),
        clan:       p.birth_clan.clone(),
        generation: p.generation,
        father_id:  p.father_id,
        mother_id:  p.mother_id,
        pos,
        vel:        Vec2::ZERO,
        radius:     radius_for(p.generation),
      });
    }
    if added > 0 {
      trace!(added, total = self.nodes.len(), "layout nodes added");
    }
    added
  }

  fn reindex(&mut self) {
    self.index = self.nodes.iter().enumerate().map(|(i, n)| (n.id, i)).collect();
  }

  fn seed_position(&mut self, father: Option<Uuid>) -> Vec2 {
    let near = father.and_then(|f| self.index.get(&f)).map(|&i| self.nodes[i].pos);
    match near {
      Some(at) => {
        // negative or NaN jitter would make an empty range
        let half = (self.config.seed_jitter / 2.0).abs();
        let half = if half.is_finite() { half } else { 0.0 };
        let dx = self.rng.gen_range(-half..=half);
        let dy = self.rng.gen_range(-half..=half);
        at + Vec2::new(dx, dy)
      }
      None => Vec2::new(
        self.rng.gen_range(0.0..=self.width.max(1.0)),
        self.rng.gen_range(0.0..=self.height.max(1.0)),
      ),
    }
  }

  fn anchor_of(&self, clan: &str) -> Vec2 {
    self.anchors.get(clan).copied().unwrap_or_else(|| self.center())
  }

  /// Advance one frame. Nodes are updated in order, each seeing the already
  /// moved positions of the nodes before it.
  pub fn tick(&mut self) {
    let cfg = self.config;
    for i in 0..self.nodes.len() {
      let pos = self.nodes[i].pos;
      let mut force = (self.anchor_of(&self.nodes[i].clan) - pos) * cfg.clan_pull;

      for (j, other) in self.nodes.iter().enumerate() {
        if i == j {
          continue;
        }
        let delta = pos - other.pos;
        let dist = delta.length();
        if dist >= cfg.min_separation {
          continue;
        }
        if dist > f64::EPSILON {
          force += delta * ((cfg.min_separation - dist) / dist * cfg.repulsion);
        } else {
          // coincident: split along a direction fixed by the lower index
          let sign = if i < j { 1.0 } else { -1.0 };
          let dir = Vec2::from_angle(i.min(j) as f64 * 2.399_963);
          force += dir * (sign * cfg.min_separation * cfg.repulsion);
        }
      }

      let spring = |id: Option<Uuid>, k: f64| {
        id.and_then(|id| self.index.get(&id))
          .map(|&p| (self.nodes[p].pos - pos) * k)
          .unwrap_or(Vec2::ZERO)
      };
      force += spring(self.nodes[i].father_id, cfg.father_spring);
      force += spring(self.nodes[i].mother_id, cfg.mother_spring);

      let node = &mut self.nodes[i];
      node.vel = (node.vel + force) * cfg.damping;
      node.pos += node.vel;
    }
  }

  /// Father and mother edges between placed nodes.
  pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
    self.nodes.iter().flat_map(move |n| {
      let link = move |id: Option<Uuid>, kind| {
        id.and_then(|id| self.node(id)).map(|to| Edge { from: n.pos, to: to.pos, kind })
      };
      link(n.father_id, EdgeKind::Father)
        .into_iter()
        .chain(link(n.mother_id, EdgeKind::Mother))
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;
  use crate::person::{Gender, NewPerson};

  fn person(name: &str, clan: &str, generation: u32, father: Option<Uuid>) -> Person {
    Person::from_new(
      Uuid::new_v4(),
      Utc::now(),
      NewPerson { father_id: father, ..NewPerson::new(name, Gender::Male, clan, generation) },
    )
  }

  fn layout() -> ForceLayout<StdRng> {
    let mut l = ForceLayout::with_rng(LayoutConfig::default(), 800.0, 600.0, StdRng::seed_from_u64(7));
    l.set_clans(&["Yadav".to_owned(), "Gupta".to_owned()]);
    l
  }

  #[test]
  fn anchors_sit_on_a_circle() {
    let l = layout();
    let anchors: Vec<_> = l.anchors().collect();
    assert_eq!(anchors.len(), 2);
    for (_, at) in anchors {
      let r = (at - Vec2::new(400.0, 300.0)).length();
      assert!((r - 600.0 * 0.35).abs() < 1e-9);
    }
  }

  #[test]
  fn new_nodes_are_seeded_near_their_father() {
    let mut l = layout();
    let ram = person("Ram", "Yadav", 1, None);
    let luv = person("Luv", "Yadav", 2, Some(ram.id));
    assert_eq!(l.sync(&[luv.clone(), ram.clone()]), 2);

    let d = l.node(luv.id).unwrap().pos - l.node(ram.id).unwrap().pos;
    assert!(d.x.abs() <= 25.0 && d.y.abs() <= 25.0);
  }

  #[test]
  fn sync_is_incremental() {
    let mut l = layout();
    let ram = person("Ram", "Yadav", 1, None);
    let mohan = person("Mohan", "Gupta", 1, None);
    l.sync(&[ram.clone(), mohan.clone()]);
    for _ in 0..10 {
      l.tick();
    }
    let before = l.node(ram.id).unwrap().clone();

    let luv = person("Luv", "Yadav", 2, Some(ram.id));
    assert_eq!(l.sync(&[ram.clone(), luv.clone()]), 1);
    assert_eq!(l.node(ram.id).unwrap().pos, before.pos);
    assert_eq!(l.node(ram.id).unwrap().vel, before.vel);
    assert!(l.node(mohan.id).is_none());
    assert_eq!(l.nodes().len(), 2);
  }

  #[test]
  fn lone_node_settles_at_its_anchor() {
    let mut l = layout();
    let ram = person("Ram", "Yadav", 1, None);
    l.sync(&[ram.clone()]);
    for _ in 0..5000 {
      l.tick();
    }
    let anchor = l.anchors().find(|(c, _)| *c == "Yadav").unwrap().1;
    assert!((l.node(ram.id).unwrap().pos - anchor).length() < 1.0);
  }

  #[test]
  fn coincident_nodes_separate() {
    let mut l = layout();
    let a = person("A", "Yadav", 1, None);
    let b = person("B", "Yadav", 1, None);
    l.sync(&[a.clone(), b.clone()]);
    for n in &mut l.nodes {
      n.pos = Vec2::new(100.0, 100.0);
    }
    l.tick();
    let gap = (l.node(a.id).unwrap().pos - l.node(b.id).unwrap().pos).length();
    assert!(gap > 1.0);
  }

  #[test]
  fn edges_follow_parent_links() {
    let mut l = layout();
    let ram = person("Ram", "Yadav", 1, None);
    let luv = person("Luv", "Yadav", 2, Some(ram.id));
    l.sync(&[ram, luv]);
    let edges: Vec<_> = l.edges().collect();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].kind, EdgeKind::Father);
  }

  #[test]
  fn odd_jitter_still_seeds_near_the_father() {
    let cfg: LayoutConfig = serde_json::from_str(r#"{"seed_jitter":-40.0}"#).unwrap();
    let mut l = ForceLayout::with_rng(cfg, 800.0, 600.0, StdRng::seed_from_u64(7));
    let ram = person("Ram", "Yadav", 1, None);
    let luv = person("Luv", "Yadav", 2, Some(ram.id));
    assert_eq!(l.sync(&[ram.clone(), luv.clone()]), 2);
    let d = l.node(luv.id).unwrap().pos - l.node(ram.id).unwrap().pos;
    assert!(d.x.abs() <= 20.0 && d.y.abs() <= 20.0);

    l.config.seed_jitter = f64::NAN;
    let kush = person("Kush", "Yadav", 2, Some(ram.id));
    assert_eq!(l.sync(&[ram.clone(), luv, kush.clone()]), 1);
    assert_eq!(l.node(kush.id).unwrap().pos, l.node(ram.id).unwrap().pos);
  }

  #[test]
  fn config_fills_missing_fields() {
    let cfg: LayoutConfig = serde_json::from_str(r#"{"damping":0.8}"#).unwrap();
    assert_eq!(cfg.damping, 0.8);
    assert_eq!(cfg.min_separation, 30.0);
  }
}
