//! Async HTTP client for the vansh JSON API.
//!
//! [`ApiClient`] is itself a [`PersonStore`], so the core lineage wizard and
//! admin operations run unchanged against a remote server. Every successful
//! write refreshes the local snapshot before returning.

use std::{
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  time::Duration,
};

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, warn};
use uuid::Uuid;
use vansh_core::{
  identity::{AuthError, Identity, IdentityProvider},
  ops::DeletePlan,
  person::{NewPerson, Person, PersonPatch},
  profile::UserProfile,
  session::Session,
  store::{PersonStore, Snapshot, Subscription},
};

/// Header carrying the selected clan; mirrors the server's.
const CLAN_HEADER: &str = "x-vansh-clan";

// ─── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ClientError {
  #[error("invalid server url {0:?}")]
  BadUrl(String),

  #[error("request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("{method} {path} → {status}: {message}")]
  Status {
    method:  Method,
    path:    String,
    status:  StatusCode,
    message: String,
  },
}

impl ClientError {
  pub fn status(&self) -> Option<StatusCode> {
    match self {
      Self::Status { status, .. } => Some(*status),
      Self::Http(e) => e.status(),
      Self::BadUrl(_) => None,
    }
  }

  fn is_not_found(&self) -> bool { self.status() == Some(StatusCode::NOT_FOUND) }
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// Body of an API error response.
#[derive(Deserialize)]
struct ErrorBody {
  error: String,
}

// ─── Config ───────────────────────────────────────────────────────────────────

/// Connection settings for the vansh API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub username: String,
  pub password: String,
  /// Sent with every request as the session's selected clan.
  pub clan:     Option<String>,
}

// ─── Client ───────────────────────────────────────────────────────────────────

/// Cheap to clone; clones share the HTTP pool and the snapshot feed.
#[derive(Clone)]
pub struct ApiClient {
  client:   Client,
  base:     Url,
  config:   Arc<ApiConfig>,
  snapshot: Arc<watch::Sender<Snapshot>>,
  identity: Arc<watch::Sender<Option<Identity>>>,
  admin:    Arc<AtomicBool>,
}

#[derive(Debug, Serialize)]
struct NameBody<'a> {
  name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LinkBody {
  person_id: Uuid,
}

/// Result of `POST /clans`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClanOutcome {
  pub name:    String,
  pub created: bool,
}

#[derive(Deserialize)]
struct DeleteOutcome {
  cleared: usize,
}

#[derive(Deserialize)]
struct ResetOutcome {
  removed: usize,
}

#[derive(Deserialize)]
struct RemoveOutcome {
  removed: bool,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
    let base = Url::parse(&config.base_url)
      .ok()
      .filter(|u| !u.cannot_be_a_base())
      .ok_or_else(|| ClientError::BadUrl(config.base_url.clone()))?;
    let (snapshot, _) = watch::channel(Snapshot::from(Vec::new()));
    let (identity, _) = watch::channel(None);
    Ok(Self {
      client,
      base,
      config: Arc::new(config),
      snapshot: Arc::new(snapshot),
      identity: Arc::new(identity),
      admin: Arc::default(),
    })
  }

  /// Build the client and load the first snapshot.
  pub async fn connect(config: ApiConfig) -> Result<Self> {
    let client = Self::new(config)?;
    client.refresh().await?;
    Ok(client)
  }

  pub fn config(&self) -> &ApiConfig { &self.config }

  fn url(&self, segments: &[&str]) -> Url {
    let mut url = self.base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
      path.pop_if_empty().push("api").extend(segments);
    }
    url
  }

  fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
    let mut req = self.client.request(method, self.url(segments));
    if !self.config.username.is_empty() {
      req = req.basic_auth(&self.config.username, Some(&self.config.password));
    }
    if let Some(clan) = &self.config.clan {
      req = req.header(CLAN_HEADER, clan);
    }
    req
  }

  /// Send `req` and turn any non-2xx status into [`ClientError::Status`].
  async fn send(&self, method: Method, segments: &[&str], req: RequestBuilder) -> Result<Response> {
    let resp = req.send().await?;
    let status = resp.status();
    if status.is_success() {
      return Ok(resp);
    }
    let message = match resp.json::<ErrorBody>().await {
      Ok(body) => body.error,
      Err(_) => status.canonical_reason().unwrap_or("error").to_string(),
    };
    Err(ClientError::Status {
      method,
      path: format!("/{}", segments.join("/")),
      status,
      message,
    })
  }

  async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
    let req = self.request(Method::GET, segments);
    Ok(self.send(Method::GET, segments, req).await?.json().await?)
  }

  // ── Snapshot feed ───────────────────────────────────────────────────────────

  /// `GET /api/people`, published to subscribers when it differs from the
  /// last snapshot.
  pub async fn refresh(&self) -> Result<()> {
    let people: Vec<Person> = self.get_json(&["people"]).await?;
    self.snapshot.send_if_modified(|current| {
      if current[..] == people[..] {
        return false;
      }
      *current = Snapshot::from(people);
      true
    });
    Ok(())
  }

  /// Refresh after a write. A failed read keeps the previous snapshot.
  async fn publish(&self) {
    if let Err(e) = self.refresh().await {
      warn!(error = %e, "snapshot refresh failed, keeping the last one");
    }
  }

  /// Poll the server every `every` until no subscriber is left.
  pub fn spawn_poller(&self, every: Duration) -> JoinHandle<()> {
    let client = self.clone();
    tokio::spawn(async move {
      let mut ticker = tokio::time::interval(every);
      ticker.tick().await;
      loop {
        ticker.tick().await;
        if client.snapshot.is_closed() {
          debug!("no subscribers left, poller stopping");
          break;
        }
        client.publish().await;
      }
    })
  }

  // ── Session ─────────────────────────────────────────────────────────────────

  /// `GET /api/me`: the session the server resolves for our credentials.
  pub async fn session(&self) -> Result<Session> {
    let session: Session = self.get_json(&["me"]).await?;
    self.identity.send_replace(session.identity.clone());
    self.admin.store(session.admin, Ordering::Relaxed);
    Ok(session)
  }

  /// Whether the last `GET /api/me` granted the admin capability.
  pub fn is_admin(&self) -> bool { self.admin.load(Ordering::Relaxed) }

  // ── People ──────────────────────────────────────────────────────────────────

  /// `GET /api/people/{id}/delete-plan`
  pub async fn delete_plan(&self, id: Uuid) -> Result<DeletePlan> {
    let id = id.to_string();
    self.get_json(&["people", id.as_str(), "delete-plan"]).await
  }

  /// `DELETE /api/people/{id}?confirm=true`. The server clears every
  /// reference to the person; returns how many records it touched.
  pub async fn delete_confirmed(&self, id: Uuid) -> Result<usize> {
    let id = id.to_string();
    let segments = ["people", id.as_str()];
    let req = self.request(Method::DELETE, &segments).query(&[("confirm", "true")]);
    let outcome: DeleteOutcome = self.send(Method::DELETE, &segments, req).await?.json().await?;
    self.publish().await;
    Ok(outcome.cleared)
  }

  // ── Clans ───────────────────────────────────────────────────────────────────

  /// `POST /api/clans`
  pub async fn create_clan(&self, name: &str) -> Result<ClanOutcome> {
    let req = self.request(Method::POST, &["clans"]).json(&NameBody { name });
    Ok(self.send(Method::POST, &["clans"], req).await?.json().await?)
  }

  // ── Profiles ────────────────────────────────────────────────────────────────

  /// `POST /api/profile/link`
  pub async fn link_profile(&self, person_id: Uuid) -> Result<UserProfile> {
    let req = self
      .request(Method::POST, &["profile", "link"])
      .json(&LinkBody { person_id });
    let profile = self
      .send(Method::POST, &["profile", "link"], req)
      .await?
      .json()
      .await?;
    self.publish().await;
    Ok(profile)
  }
}

// ─── PersonStore ──────────────────────────────────────────────────────────────

impl PersonStore for ApiClient {
  type Error = ClientError;

  async fn list_people(&self) -> Result<Vec<Person>> { self.get_json(&["people"]).await }

  async fn get_person(&self, id: Uuid) -> Result<Option<Person>> {
    let id = id.to_string();
    match self.get_json(&["people", id.as_str()]).await {
      Ok(person) => Ok(Some(person)),
      Err(e) if e.is_not_found() => Ok(None),
      Err(e) => Err(e),
    }
  }

  async fn create_person(&self, input: NewPerson) -> Result<Person> {
    let req = self.request(Method::POST, &["people"]).json(&input);
    let person: Person = self.send(Method::POST, &["people"], req).await?.json().await?;
    debug!(person_id = %person.id, "created person");
    self.publish().await;
    Ok(person)
  }

  async fn update_person(&self, id: Uuid, patch: PersonPatch) -> Result<bool> {
    let id = id.to_string();
    let segments = ["people", id.as_str()];
    let req = self.request(Method::PATCH, &segments).json(&patch);
    match self.send(Method::PATCH, &segments, req).await {
      Ok(_) => {
        debug!(person_id = %id, "updated person");
        self.publish().await;
        Ok(true)
      }
      Err(e) if e.is_not_found() => Ok(false),
      Err(e) => Err(e),
    }
  }

  async fn delete_person(&self, id: Uuid) -> Result<bool> {
    match self.delete_confirmed(id).await {
      Ok(_) => Ok(true),
      Err(e) if e.is_not_found() => Ok(false),
      Err(e) => Err(e),
    }
  }

  async fn delete_all(&self) -> Result<usize> {
    let req = self
      .request(Method::POST, &["reset"])
      .query(&[("confirm", "true")]);
    let outcome: ResetOutcome = self.send(Method::POST, &["reset"], req).await?.json().await?;
    self.publish().await;
    Ok(outcome.removed)
  }

  async fn list_clans(&self) -> Result<Vec<String>> { self.get_json(&["clans"]).await }

  async fn add_clan(&self, name: String) -> Result<bool> {
    Ok(self.create_clan(&name).await?.created)
  }

  async fn remove_clan(&self, name: String) -> Result<bool> {
    let segments = ["clans", name.as_str()];
    let req = self
      .request(Method::DELETE, &segments)
      .query(&[("confirm", "true")]);
    let outcome: RemoveOutcome = self.send(Method::DELETE, &segments, req).await?.json().await?;
    Ok(outcome.removed)
  }

  /// The server only exposes the caller's own profile; any other uid reads
  /// as absent.
  async fn get_profile(&self, uid: String) -> Result<Option<UserProfile>> {
    let profile: Option<UserProfile> = self.get_json(&["profile"]).await?;
    Ok(profile.filter(|p| p.uid == uid))
  }

  /// Registers the caller's profile, then links it when a person is set.
  async fn put_profile(&self, profile: UserProfile) -> Result<()> {
    #[derive(Serialize)]
    struct RegisterBody<'a> {
      name: &'a str,
      clan: &'a str,
    }
    let body = RegisterBody { name: &profile.display_name, clan: &profile.clan };
    let req = self.request(Method::PUT, &["profile"]).json(&body);
    self.send(Method::PUT, &["profile"], req).await?;
    if let Some(person_id) = profile.linked_person_id {
      self.link_profile(person_id).await?;
    }
    Ok(())
  }

  fn subscribe(&self) -> Subscription { Subscription::new(self.snapshot.subscribe()) }
}

// ─── IdentityProvider ─────────────────────────────────────────────────────────

impl IdentityProvider for ApiClient {
  /// Verifies the configured credentials with `GET /api/me`.
  async fn sign_in(&self) -> Result<Identity, AuthError> {
    if self.config.username.is_empty() {
      return Err(AuthError::InvalidCredentials);
    }
    match self.session().await {
      Ok(Session { identity: Some(identity), .. }) => Ok(identity),
      Ok(_) => Err(AuthError::InvalidCredentials),
      Err(e) if e.status() == Some(StatusCode::UNAUTHORIZED) => Err(AuthError::InvalidCredentials),
      Err(e) => Err(AuthError::Unavailable(e.to_string())),
    }
  }

  async fn sign_out(&self) {
    self.identity.send_replace(None);
    self.admin.store(false, Ordering::Relaxed);
  }

  fn current_identity(&self) -> watch::Receiver<Option<Identity>> { self.identity.subscribe() }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn client(base_url: &str) -> ApiClient {
    ApiClient::new(ApiConfig {
      base_url: base_url.to_string(),
      username: String::new(),
      password: String::new(),
      clan:     None,
    })
    .unwrap()
  }

  #[test]
  fn urls_are_built_under_api() {
    let c = client("http://localhost:5240");
    assert_eq!(c.url(&["people"]).as_str(), "http://localhost:5240/api/people");

    let c = client("https://example.org/vansh/");
    assert_eq!(
      c.url(&["clans", "Bhardwaj Gotra"]).as_str(),
      "https://example.org/vansh/api/clans/Bhardwaj%20Gotra"
    );
  }

  #[test]
  fn bad_base_url_is_rejected() {
    let err = ApiClient::new(ApiConfig {
      base_url: "not a url".to_string(),
      username: String::new(),
      password: String::new(),
      clan:     None,
    })
    .err()
    .unwrap();
    assert!(matches!(err, ClientError::BadUrl(_)));
  }

  #[tokio::test]
  async fn sign_in_without_credentials_fails_locally() {
    let c = client("http://localhost:5240");
    assert_eq!(c.sign_in().await, Err(AuthError::InvalidCredentials));
    assert!(c.current_identity().borrow().is_none());
  }

  #[test]
  fn subscription_starts_empty() {
    let c = client("http://localhost:5240");
    assert!(c.subscribe().current().is_empty());
  }
}
