//! State and key handling for the clan map.

use std::{collections::HashSet, sync::Arc};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use fuzzy_matcher::{FuzzyMatcher, skim::SkimMatcherV2};
use uuid::Uuid;
use vansh_core::{
  layout::{ForceLayout, LayoutConfig},
  store::{Snapshot, Subscription},
};

/// Canvas units per terminal cell, roughly a pixel grid.
pub const CELL_WIDTH: f64 = 8.0;
pub const CELL_HEIGHT: f64 = 16.0;

// ─── App ──────────────────────────────────────────────────────────────────────

pub struct App {
  pub layout:        ForceLayout,
  /// Seed and stored clans plus any clan seen in a snapshot.
  pub clans:         Vec<String>,
  /// Current fuzzy-filter string (only active when `filter_active`).
  pub filter:        String,
  pub filter_active: bool,
  pub paused:        bool,
  pub status_msg:    String,
  subscription:      Subscription,
  seen:              Option<Snapshot>,
}

impl App {
  pub fn new(subscription: Subscription, clans: Vec<String>, cols: u16, rows: u16) -> Self {
    let layout = ForceLayout::new(
      LayoutConfig::default(),
      f64::from(cols) * CELL_WIDTH,
      f64::from(rows) * CELL_HEIGHT,
    );
    let mut app = Self {
      layout,
      clans,
      filter: String::new(),
      filter_active: false,
      paused: false,
      status_msg: String::new(),
      subscription,
      seen: None,
    };
    app.sync();
    app
  }

  /// Feed the latest snapshot to the layout if it changed since last frame.
  pub fn sync(&mut self) {
    let current = self.subscription.current();
    if self.seen.as_ref().is_some_and(|seen| Arc::ptr_eq(seen, &current)) {
      return;
    }

    let mut clans = self.clans.clone();
    for p in current.iter() {
      if !clans.contains(&p.birth_clan) {
        clans.push(p.birth_clan.clone());
      }
    }
    clans.sort();
    if clans != self.clans || self.seen.is_none() {
      self.layout.set_clans(&clans);
      self.clans = clans;
    }

    let added = self.layout.sync(&current);
    if self.seen.is_some() && added > 0 {
      self.status_msg = format!("{added} new");
    }
    self.seen = Some(current);
  }

  /// Advance one frame.
  pub fn tick(&mut self) {
    self.sync();
    if !self.paused {
      self.layout.tick();
    }
  }

  pub fn resize(&mut self, cols: u16, rows: u16) {
    self
      .layout
      .resize(f64::from(cols) * CELL_WIDTH, f64::from(rows) * CELL_HEIGHT);
  }

  /// Nodes whose name matches the filter; empty when no filter is set.
  pub fn highlighted(&self) -> HashSet<Uuid> {
    if self.filter.is_empty() {
      return HashSet::new();
    }
    let matcher = SkimMatcherV2::default();
    self
      .layout
      .nodes()
      .iter()
      .filter(|n| matcher.fuzzy_match(&n.name, &self.filter).is_some())
      .map(|n| n.id)
      .collect()
  }

  // ── Key handling ──────────────────────────────────────────────────────────

  /// Process a key event. Returns `true` to continue, `false` to quit.
  pub fn handle_key(&mut self, key: KeyEvent) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
      return false;
    }

    if self.filter_active {
      match key.code {
        KeyCode::Esc => {
          self.filter_active = false;
          self.filter.clear();
        }
        KeyCode::Enter => self.filter_active = false,
        KeyCode::Backspace => {
          self.filter.pop();
        }
        KeyCode::Char(c) => self.filter.push(c),
        _ => {}
      }
      return true;
    }

    match key.code {
      KeyCode::Char('q') | KeyCode::Esc => return false,
      KeyCode::Char(' ') => self.paused = !self.paused,
      KeyCode::Char('/') => {
        self.filter_active = true;
        self.filter.clear();
      }
      _ => {}
    }
    true
  }
}
