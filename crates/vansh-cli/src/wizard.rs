//! Line-based driver for the lineage wizard.
//!
//! Each step prints what it knows, reads one answer, and feeds it to
//! [`LineageWizard`]. Typing `reset` at any prompt returns to the head
//! search; `quit` (or end of input) leaves. A failed operation is reported
//! and the same step is asked again.

use std::io::{BufRead, Write};

use anyhow::Result;
use vansh_core::{
  candidates,
  graph::Graph,
  person::{Gender, Person},
  store::PersonStore,
  wizard::{LineageWizard, LinkMode, Step},
};

/// What one answer asks the loop to do next.
enum Flow {
  Continue,
  Done,
}

/// Interactive wizard over any store, reading answers from `input`.
pub struct WizardShell<'s, S, R, W> {
  store:  &'s S,
  wizard: LineageWizard,
  input:  R,
  out:    W,
  /// Records written across every family completed in this run.
  added:  usize,
}

impl<'s, S, R, W> WizardShell<'s, S, R, W>
where
  S: PersonStore,
  R: BufRead,
  W: Write,
{
  pub fn new(store: &'s S, clan: &str, input: R, out: W) -> Self {
    Self { store, wizard: LineageWizard::new(clan), input, out, added: 0 }
  }

  /// The graph as of the store's latest snapshot.
  fn graph(&self) -> Graph { Graph::new(self.store.subscribe().current().iter().cloned()) }

  /// Read one trimmed line. `None` on end of input or `quit`.
  fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
    write!(self.out, "{prompt}: ")?;
    self.out.flush()?;
    let mut line = String::new();
    if self.input.read_line(&mut line)? == 0 {
      writeln!(self.out)?;
      return Ok(None);
    }
    let answer = line.trim().to_string();
    if answer.eq_ignore_ascii_case("quit") {
      return Ok(None);
    }
    Ok(Some(answer))
  }

  fn list(&mut self, people: &[&Person]) -> Result<()> {
    for (i, p) in people.iter().enumerate() {
      writeln!(self.out, "  {}) {} (generation {})", i + 1, p.name, p.generation)?;
    }
    Ok(())
  }

  /// Run until the user finishes or quits. Returns how many children were
  /// saved.
  pub async fn run(mut self) -> Result<usize> {
    writeln!(self.out, "Adding to the {} clan. Type `reset` to start over, `quit` to leave.", self.wizard.clan())?;
    loop {
      let step = self.wizard.step();
      let prompt = match step {
        Step::FindHead => "Father's name (blank to finish)",
        Step::LinkFather => "Choice",
        Step::AddMother => "Mother's name",
        Step::AddChildren => "Child's name (blank to save)",
        Step::Success => "Choice (blank to finish)",
      };
      self.describe(step)?;
      let Some(answer) = self.ask(prompt)? else { break };
      if answer.eq_ignore_ascii_case("reset") {
        self.wizard.reset();
        continue;
      }
      let outcome = match step {
        Step::FindHead => self.find_head(&answer).await,
        Step::LinkFather => self.link_father(&answer).await,
        Step::AddMother => self.add_mother(&answer),
        Step::AddChildren => self.add_children(&answer).await,
        Step::Success => self.success(&answer),
      };
      match outcome {
        Ok(Flow::Continue) => {}
        Ok(Flow::Done) => break,
        Err(e) => writeln!(self.out, "error: {e}")?,
      }
    }
    Ok(self.added)
  }

  /// Context printed before each prompt.
  fn describe(&mut self, step: Step) -> Result<()> {
    let graph = self.graph();
    match step {
      Step::FindHead => {
        if let Some(head) = graph.head_of(self.wizard.clan()) {
          writeln!(self.out, "Head: {}. Type `head` to add a father above him.", head.name)?;
        }
      }
      Step::LinkFather => {
        let pending = self.wizard.pending_father_name().to_string();
        let people = match self.wizard.link_mode() {
          LinkMode::Ancestor => {
            writeln!(self.out, "Whose son is {pending}?")?;
            candidates::ancestor_candidates(&graph, self.wizard.clan(), "")
          }
          LinkMode::Descendant => {
            writeln!(self.out, "Whose father is {pending}?")?;
            candidates::root_candidates(&graph, self.wizard.clan(), "")
          }
        };
        self.list(&people)?;
        writeln!(self.out, "  m) switch mode  s) skip linking  b) back")?;
      }
      Step::AddMother => {
        if let Some(father) = self.wizard.father() {
          writeln!(self.out, "Wife of {}.", father.name)?;
        }
      }
      Step::AddChildren => {
        let father = self.wizard.father().map(|f| f.name.clone()).unwrap_or_default();
        writeln!(self.out, "Children of {father} and {}:", self.wizard.mother_name())?;
        for child in self.wizard.existing_children() {
          writeln!(self.out, "  = {}", child.name)?;
        }
        for entry in self.wizard.entries().iter().filter(|e| !e.name.is_empty()) {
          let gender = entry.gender.map(|g| g.to_string()).unwrap_or_else(|| "?".into());
          let linked = if entry.existing.is_some() { ", existing" } else { "" };
          writeln!(self.out, "  + {} ({gender}{linked})", entry.name)?;
        }
      }
      Step::Success => {
        writeln!(self.out, "Saved.")?;
        let sons: Vec<Person> = self
          .wizard
          .added()
          .iter()
          .filter(|p| self.wizard.can_continue_as(&graph, p))
          .cloned()
          .collect();
        for (i, son) in sons.iter().enumerate() {
          writeln!(self.out, "  {}) continue with {}'s family", i + 1, son.name)?;
        }
        writeln!(self.out, "  a) add another family")?;
      }
    }
    Ok(())
  }

  // ── Steps ───────────────────────────────────────────────────────────────────

  async fn find_head(&mut self, answer: &str) -> Result<Flow> {
    if answer.is_empty() {
      return Ok(Flow::Done);
    }
    let graph = self.graph();
    if answer.eq_ignore_ascii_case("head") {
      self.wizard.change_head(&graph)?;
      let Some(name) = self.ask("New father's name")? else { return Ok(Flow::Done) };
      self.wizard.set_pending_father_name(&name);
      return Ok(Flow::Continue);
    }

    let matches = candidates::father_candidates(&graph, self.wizard.clan(), answer);
    if matches.is_empty() {
      self.wizard.create_father(self.store, &graph, answer).await?;
      return Ok(Flow::Continue);
    }
    self.list(&matches)?;
    writeln!(self.out, "  n) add {answer} as a new man")?;
    let ids: Vec<_> = matches.iter().map(|p| p.id).collect();
    let Some(choice) = self.ask("Choice")? else { return Ok(Flow::Done) };
    if choice.eq_ignore_ascii_case("n") {
      self.wizard.create_father(self.store, &graph, answer).await?;
    } else if let Some(id) = pick(&ids, &choice) {
      self.wizard.select_father(&graph, id)?;
    } else {
      writeln!(self.out, "no such choice")?;
    }
    Ok(Flow::Continue)
  }

  async fn link_father(&mut self, answer: &str) -> Result<Flow> {
    let graph = self.graph();
    match answer.to_ascii_lowercase().as_str() {
      "b" => self.wizard.back()?,
      "s" => self.wizard.skip_link(self.store).await?,
      "m" => {
        let mode = match self.wizard.link_mode() {
          LinkMode::Ancestor => LinkMode::Descendant,
          LinkMode::Descendant => LinkMode::Ancestor,
        };
        self.wizard.set_link_mode(mode);
      }
      _ => {
        let clan = self.wizard.clan().to_string();
        let people = match self.wizard.link_mode() {
          LinkMode::Ancestor => candidates::ancestor_candidates(&graph, &clan, ""),
          LinkMode::Descendant => candidates::root_candidates(&graph, &clan, ""),
        };
        let ids: Vec<_> = people.iter().map(|p| p.id).collect();
        let Some(id) = pick(&ids, answer) else {
          writeln!(self.out, "no such choice")?;
          return Ok(Flow::Continue);
        };
        match self.wizard.link_mode() {
          LinkMode::Ancestor => self.wizard.link_to_ancestor(self.store, &graph, id).await?,
          LinkMode::Descendant => self.wizard.make_father_of(self.store, &graph, id).await?,
        }
      }
    }
    Ok(Flow::Continue)
  }

  fn add_mother(&mut self, name: &str) -> Result<Flow> {
    let Some(maiden) = self.ask("Her maiden clan")? else { return Ok(Flow::Done) };
    self.wizard.set_mother(name, &maiden)?;
    Ok(Flow::Continue)
  }

  async fn add_children(&mut self, name: &str) -> Result<Flow> {
    if name.is_empty() {
      self.wizard.save(self.store).await?;
      self.added += self.wizard.added().len();
      return Ok(Flow::Continue);
    }

    let index = match self.wizard.entries().iter().position(|e| e.name.is_empty() && e.saved.is_none()) {
      Some(i) => i,
      None => self.wizard.push_child()?,
    };
    self.wizard.set_child_name(index, name)?;

    let graph = self.graph();
    if let Some(existing) = self.wizard.suggest_link(&graph, index).cloned() {
      let question = format!("{} is already recorded without a father. Use that record? [y/N]", existing.name);
      let Some(yes) = self.ask(&question)? else { return Ok(Flow::Done) };
      if yes.eq_ignore_ascii_case("y") {
        self.wizard.link_child(&graph, index, existing.id)?;
        return Ok(Flow::Continue);
      }
    }

    loop {
      let Some(g) = self.ask("Son or daughter? [s/d]")? else { return Ok(Flow::Done) };
      let gender = match g.to_ascii_lowercase().as_str() {
        "s" | "m" | "son" | "male" => Gender::Male,
        "d" | "f" | "daughter" | "female" => Gender::Female,
        _ => continue,
      };
      self.wizard.set_child_gender(index, gender)?;
      return Ok(Flow::Continue);
    }
  }

  fn success(&mut self, answer: &str) -> Result<Flow> {
    if answer.is_empty() {
      return Ok(Flow::Done);
    }
    if answer.eq_ignore_ascii_case("a") {
      self.wizard.reset();
      return Ok(Flow::Continue);
    }
    let graph = self.graph();
    let sons: Vec<_> = self
      .wizard
      .added()
      .iter()
      .filter(|p| self.wizard.can_continue_as(&graph, p))
      .map(|p| p.id)
      .collect();
    match pick(&sons, answer) {
      Some(id) => self.wizard.continue_as_child(&graph, id)?,
      None => writeln!(self.out, "no such choice")?,
    }
    Ok(Flow::Continue)
  }
}

/// The item a 1-based menu answer refers to.
fn pick<T: Copy>(items: &[T], answer: &str) -> Option<T> {
  let n: usize = answer.trim().parse().ok()?;
  items.get(n.checked_sub(1)?).copied()
}

#[cfg(test)]
mod tests {
  use std::io::Cursor;

  use vansh_core::{memory::MemoryStore, tree::build_tree};

  use super::*;

  async fn run(store: &MemoryStore, script: &str) -> (usize, String) {
    let mut out = Vec::new();
    let added = WizardShell::new(store, "Yadav", Cursor::new(script.to_string()), &mut out)
      .run()
      .await
      .unwrap();
    (added, String::from_utf8(out).unwrap())
  }

  #[tokio::test]
  async fn first_family_becomes_the_clan_tree() {
    let store = MemoryStore::new();
    let script = "Ram\nSita\nGupta\nluv\ns\nKush\ns\n\n\n";
    let (added, _) = run(&store, script).await;

    assert_eq!(added, 2);
    assert_eq!(store.len(), 4);
    let tree = build_tree(&store.graph(), "Yadav").unwrap();
    assert_eq!(tree.person.name, "Ram");
    assert_eq!(tree.partner.as_ref().unwrap().clan_tag, "Gupta");
    let names: Vec<_> = tree.children.iter().map(|c| c.person.name.as_str()).collect();
    assert!(names.contains(&"Luv"));
    assert!(names.contains(&"Kush"));
  }

  #[tokio::test]
  async fn continue_with_a_son() {
    let store = MemoryStore::new();
    let script = "Ram\nSita\nGupta\nLuv\ns\n\n1\nUrmila\nJanak\nAtithi\ns\n\n\n";
    let (added, _) = run(&store, script).await;

    assert_eq!(added, 2);
    let graph = store.graph();
    let atithi = graph.people().iter().find(|p| p.name == "Atithi").unwrap();
    assert_eq!(atithi.generation, 3);
    let luv = graph.get(atithi.father_id.unwrap()).unwrap();
    assert_eq!(luv.name, "Luv");
  }

  #[tokio::test]
  async fn reset_returns_to_the_head_search() {
    let store = MemoryStore::new();
    let (added, out) = run(&store, "Ram\nreset\n\n").await;

    assert_eq!(added, 0);
    // the head was written before the reset and stays
    assert_eq!(store.len(), 1);
    assert_eq!(out.matches("Father's name").count(), 2);
  }

  #[tokio::test]
  async fn failed_write_is_reported_and_retried() {
    let store = MemoryStore::new();
    store.fail_next(1);
    let (_, out) = run(&store, "Ram\nRam\n").await;

    assert!(out.contains("error: "));
    assert_eq!(store.len(), 1);
  }

  #[tokio::test]
  async fn second_man_is_linked_under_an_ancestor() {
    let store = MemoryStore::new();
    run(&store, "Ram\nquit\n").await;
    let (_, out) = run(&store, "Bharat\n1\nquit\n").await;

    assert!(out.contains("Whose son is Bharat?"));
    let graph = store.graph();
    let bharat = graph.people().iter().find(|p| p.name == "Bharat").unwrap();
    assert_eq!(graph.get(bharat.father_id.unwrap()).unwrap().name, "Ram");
    assert_eq!(bharat.generation, 2);
  }

  #[test]
  fn menu_answers_are_one_based() {
    assert_eq!(pick(&[10, 20], "1"), Some(10));
    assert_eq!(pick(&[10, 20], "2"), Some(20));
    assert_eq!(pick(&[10, 20], "0"), None);
    assert_eq!(pick(&[10, 20], "x"), None);
  }
}
