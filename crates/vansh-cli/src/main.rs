//! `vansh`: command-line client for a vansh server.
//!
//! # Usage
//!
//! ```
//! vansh --url http://localhost:5240 --user ram --password secret --clan Yadav tree
//! vansh --config ~/.config/vansh/config.toml add
//! ```

mod app;
mod client;
mod render;
mod ui;
mod wizard;

use std::{
  io::{self, BufRead, Write},
  path::PathBuf,
  time::Duration,
};

use anyhow::{Context, Result};
use app::App;
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use crossterm::{
  event::{self, Event},
  execute,
  terminal::{self, EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use fuzzy_matcher::{FuzzyMatcher, skim::SkimMatcherV2};
use ratatui::{Terminal, backend::CrosstermBackend};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use vansh_core::{
  clan::ClanRegistry,
  graph::Graph,
  identity::IdentityProvider,
  ops,
  person::age_on,
  session::{Confirmation, Session},
  store::PersonStore,
  tree::build_tree,
};
use wizard::WizardShell;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "vansh", about = "Command-line client for the Vansh family tree")]
struct Args {
  /// Path to a TOML config file (url, username, password, clan).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the vansh server (default: http://localhost:5240).
  #[arg(long, env = "VANSH_URL")]
  url: Option<String>,

  /// API username.
  #[arg(long, env = "VANSH_USER")]
  user: Option<String>,

  /// API password (plaintext).
  #[arg(long, env = "VANSH_PASSWORD")]
  password: Option<String>,

  /// Clan to work in.
  #[arg(long, env = "VANSH_CLAN")]
  clan: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Print a clan's tree.
  Tree {
    #[arg(long)]
    clan: Option<String>,
  },
  /// List, add or remove clans.
  Clans {
    #[command(subcommand)]
    action: ClansAction,
  },
  /// Add a family interactively.
  Add,
  /// Delete one person and clear every reference to them (admin).
  Delete {
    id:  Uuid,
    /// Skip the confirmation prompt.
    #[arg(long)]
    yes: bool,
  },
  /// Delete every person (admin).
  Reset {
    #[arg(long)]
    yes: bool,
  },
  /// Fuzzy search by name.
  Search { query: String },
  /// Animated map of every clan.
  Map,
  /// Show who the server thinks you are.
  Me,
}

#[derive(Subcommand, Debug)]
enum ClansAction {
  List,
  Add { name: String },
  /// Remove a clan (admin). Seed clans stay.
  Remove {
    name: String,
    #[arg(long)]
    yes:  bool,
  },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:      String,
  #[serde(default)]
  username: String,
  #[serde(default)]
  password: String,
  #[serde(default)]
  clan:     String,
}

fn non_empty(s: &str) -> Option<String> { (!s.is_empty()).then(|| s.to_string()) }

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let api_config = ApiConfig {
    base_url: args
      .url
      .or_else(|| non_empty(&file_cfg.url))
      .unwrap_or_else(|| "http://localhost:5240".to_string()),
    username: args.user.or_else(|| non_empty(&file_cfg.username)).unwrap_or_default(),
    password: args.password.or_else(|| non_empty(&file_cfg.password)).unwrap_or_default(),
    clan:     args.clan.or_else(|| non_empty(&file_cfg.clan)),
  };

  let client = ApiClient::connect(api_config)
    .await
    .context("connecting to the vansh server")?;

  match args.command {
    Command::Tree { clan } => print_tree(&client, clan).await,
    Command::Clans { action } => clans(&client, action).await,
    Command::Add => add(&client).await,
    Command::Delete { id, yes } => delete(&client, id, yes).await,
    Command::Reset { yes } => reset(&client, yes).await,
    Command::Search { query } => search(&client, &query),
    Command::Map => map(&client).await,
    Command::Me => me(&client).await,
  }
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// The configured clan, or `override_clan` when given, in the spelling the
/// server already knows.
async fn selected_clan(client: &ApiClient, override_clan: Option<String>) -> Result<Option<String>> {
  match override_clan.or_else(|| client.config().clan.clone()) {
    Some(raw) => Ok(Some(ops::resolve_clan(client, &ClanRegistry::default(), &raw).await?)),
    None => Ok(None),
  }
}

/// Verify credentials with the server and build the caller's session.
async fn sign_in(client: &ApiClient) -> Result<Session> {
  let identity = client
    .sign_in()
    .await
    .context("sign-in failed (check --user and --password)")?;
  let mut session = Session::signed_in(identity, client.is_admin());
  if let Some(clan) = selected_clan(client, None).await? {
    session.select_clan(clan);
  }
  Ok(session)
}

fn snapshot_graph(client: &ApiClient) -> Graph { Graph::new(client.subscribe().current().iter().cloned()) }

/// Ask a yes/no question on stdin; anything but `y`/`yes` is no.
fn confirm(question: &str) -> Result<bool> {
  print!("{question} [y/N] ");
  io::stdout().flush()?;
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  let answer = line.trim();
  Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
}

// ─── Commands ─────────────────────────────────────────────────────────────────

async fn print_tree(client: &ApiClient, clan: Option<String>) -> Result<()> {
  let clan = selected_clan(client, clan)
    .await?
    .context("pass --clan or set `clan` in the config")?;
  let clan = clan.as_str();
  match build_tree(&snapshot_graph(client), clan) {
    Some(root) => {
      print!("{}", render::render_tree(&root, clan));
      println!("({} people)", root.count());
    }
    None => println!("The {clan} clan has no head yet. Start one with `vansh add`."),
  }
  Ok(())
}

async fn clans(client: &ApiClient, action: ClansAction) -> Result<()> {
  match action {
    ClansAction::List => {
      for clan in client.list_clans().await? {
        println!("{clan}");
      }
    }
    ClansAction::Add { name } => {
      sign_in(client).await?;
      let outcome = client.create_clan(&name).await?;
      if outcome.created {
        println!("Added {}.", outcome.name);
      } else {
        println!("{} already exists.", outcome.name);
      }
    }
    ClansAction::Remove { name, yes } => {
      let session = sign_in(client).await?;
      session.require_admin("delete clans")?;
      if !yes && !confirm(&format!("Remove the clan {name}? People keep their clan names."))? {
        println!("Nothing removed.");
        return Ok(());
      }
      if client.remove_clan(name.clone()).await? {
        println!("Removed {name}.");
      } else {
        println!("{name} was not removed (unknown or a seed clan).");
      }
    }
  }
  Ok(())
}

async fn add(client: &ApiClient) -> Result<()> {
  let session = sign_in(client).await?;
  let clan = session.clan().context("pass --clan or set `clan` in the config")?;
  let stdin = io::stdin();
  let added = WizardShell::new(client, clan, stdin.lock(), io::stdout())
    .run()
    .await?;
  println!("{added} children added.");
  Ok(())
}

async fn delete(client: &ApiClient, id: Uuid, yes: bool) -> Result<()> {
  let session = sign_in(client).await?;
  session.require_admin("delete people")?;
  let plan = client.delete_plan(id).await?;

  println!("Deleting {} (generation {}).", plan.person.name, plan.person.generation);
  if !plan.referrers.is_empty() {
    println!("These records refer to them and will be unlinked:");
    for p in &plan.referrers {
      println!("  {} ({})", p.name, p.id);
    }
  }
  if !yes && !confirm("Delete?")? {
    println!("Nothing deleted.");
    return Ok(());
  }
  let cleared = client.delete_confirmed(id).await?;
  println!("Deleted {}; {cleared} references cleared.", plan.person.name);
  Ok(())
}

async fn reset(client: &ApiClient, yes: bool) -> Result<()> {
  let session = sign_in(client).await?;
  session.require_admin("reset all data")?;
  let count = client.subscribe().current().len();
  if !yes && !confirm(&format!("Delete all {count} people? This cannot be undone."))? {
    println!("Nothing deleted.");
    return Ok(());
  }
  let removed = ops::reset_all(client, &session, Confirmation::granted()).await?;
  println!("{removed} people deleted.");
  Ok(())
}

fn search(client: &ApiClient, query: &str) -> Result<()> {
  let matcher = SkimMatcherV2::default();
  let snapshot = client.subscribe().current();
  let mut hits: Vec<_> = snapshot
    .iter()
    .filter_map(|p| matcher.fuzzy_match(&p.name, query).map(|score| (score, p)))
    .collect();
  hits.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.name.cmp(&b.1.name)));

  if hits.is_empty() {
    println!("No one matches {query:?}.");
  }
  let today = chrono::Local::now().date_naive();
  for (_, p) in hits.iter().take(20) {
    let age = p
      .dob
      .and_then(|dob| age_on(dob, today))
      .map(|a| format!(", {a}y"))
      .unwrap_or_default();
    println!(
      "{:<24} {:<12} gen {}{age}  {}",
      p.name, p.birth_clan, p.generation, p.id
    );
  }
  Ok(())
}

async fn me(client: &ApiClient) -> Result<()> {
  let session = sign_in(client).await?;
  let identity = session.identity()?;
  println!("{} ({})", identity.display_name, identity.uid);
  if session.admin {
    println!("admin");
  }
  match client.get_profile(identity.uid.clone()).await? {
    Some(profile) => {
      println!("clan: {}", profile.clan);
      let graph = snapshot_graph(client);
      if let Some(person) = graph.resolve(profile.linked_person_id) {
        println!("linked to {} (generation {})", person.name, person.generation);
      }
    }
    None => println!("no profile yet"),
  }
  Ok(())
}

// ─── Map ──────────────────────────────────────────────────────────────────────

const FRAME: Duration = Duration::from_millis(33);
const POLL_EVERY: Duration = Duration::from_secs(2);

async fn map(client: &ApiClient) -> Result<()> {
  let clans = client.list_clans().await?;
  let (cols, rows) = terminal::size().context("reading terminal size")?;
  let (w, h) = ui::canvas_size(cols, rows);
  let mut app = App::new(client.subscribe(), clans, w, h);
  let poller = client.spawn_poller(POLL_EVERY);

  enable_raw_mode().context("enabling raw mode")?;
  let mut stdout = io::stdout();
  execute!(stdout, EnterAlternateScreen).context("entering alternate screen")?;
  let backend = CrosstermBackend::new(stdout);
  let mut terminal = Terminal::new(backend).context("creating terminal")?;

  let run_result = run_event_loop(&mut terminal, &mut app);

  // Restore terminal regardless of result.
  disable_raw_mode().ok();
  execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
  terminal.show_cursor().ok();
  poller.abort();

  run_result
}

fn run_event_loop(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
  loop {
    terminal.draw(|f| ui::draw(f, app)).context("drawing frame")?;

    // Poll for an event, yielding control to tokio while waiting.
    let maybe_event = tokio::task::block_in_place(|| {
      if event::poll(FRAME)? {
        Ok::<_, io::Error>(Some(event::read()?))
      } else {
        Ok(None)
      }
    })?;

    match maybe_event {
      Some(Event::Key(key)) => {
        if !app.handle_key(key) {
          break;
        }
      }
      Some(Event::Resize(cols, rows)) => {
        let (w, h) = ui::canvas_size(cols, rows);
        app.resize(w, h);
      }
      _ => {}
    }
    app.tick();
  }
  Ok(())
}
