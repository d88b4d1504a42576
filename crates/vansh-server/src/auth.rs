//! HTTP Basic-auth session extractor and middleware.
//!
//! A request without credentials gets an anonymous [`Session`]; bad
//! credentials are rejected with 401. The optional `X-Vansh-Clan` header
//! selects the session's clan.

use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::{FromRequestParts, Request, State},
  http::{HeaderMap, request::Parts},
  middleware::Next,
  response::{IntoResponse, Response},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use serde::Deserialize;
use tracing::debug;
use vansh_core::{identity::Identity, person::normalize_name, session::Session};

use crate::error::Error;

/// Header carrying the caller's selected clan.
pub const CLAN_HEADER: &str = "x-vansh-clan";

/// One account allowed to sign in, as written in `config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
  #[serde(default)]
  pub display_name:  Option<String>,
  #[serde(default)]
  pub email:         Option<String>,
  /// Grants the admin capability.
  #[serde(default)]
  pub admin:         bool,
}

/// Credentials accepted as valid for this server instance.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
  pub users: Vec<UserConfig>,
}

impl AuthConfig {
  pub fn new(users: Vec<UserConfig>) -> Self { Self { users } }

  fn find(&self, username: &str) -> Option<&UserConfig> {
    self.users.iter().find(|u| u.username == username)
  }
}

/// The caller's session, resolved from request headers.
pub struct CurrentSession(pub Session);

/// Resolve a session directly from headers.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<Session, Error> {
  let mut session = match headers.get(axum::http::header::AUTHORIZATION) {
    None => Session::anonymous(),
    Some(value) => {
      let header_val = value.to_str().map_err(|_| Error::Unauthorized)?;
      let encoded = header_val
        .strip_prefix("Basic ")
        .ok_or(Error::Unauthorized)?;

      let decoded = B64.decode(encoded).map_err(|_| Error::Unauthorized)?;
      let creds   = std::str::from_utf8(&decoded).map_err(|_| Error::Unauthorized)?;

      let (username, password) = creds.split_once(':').ok_or(Error::Unauthorized)?;
      let user = config.find(username).ok_or(Error::Unauthorized)?;

      let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| Error::Unauthorized)?;

      Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| Error::Unauthorized)?;

      let identity = Identity {
        uid:          user.username.clone(),
        display_name: user.display_name.clone().unwrap_or_else(|| user.username.clone()),
        email:        user.email.clone(),
        photo_url:    None,
      };
      Session::signed_in(identity, user.admin)
    }
  };

  if let Some(clan) = headers
    .get(CLAN_HEADER)
    .and_then(|v| v.to_str().ok())
    .map(normalize_name)
    .filter(|c| !c.is_empty())
  {
    session.select_clan(clan);
  }
  Ok(session)
}

impl FromRequestParts<Arc<AuthConfig>> for CurrentSession {
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &Arc<AuthConfig>,
  ) -> Result<Self, Self::Rejection> {
    Ok(CurrentSession(verify_auth(&parts.headers, state)?))
  }
}

/// Middleware inserting the resolved [`Session`] as a request extension.
pub async fn session_layer(
  State(auth): State<Arc<AuthConfig>>,
  req: Request,
  next: Next,
) -> Response {
  let (mut parts, body) = req.into_parts();
  match CurrentSession::from_request_parts(&mut parts, &auth).await {
    Ok(CurrentSession(session)) => {
      debug!(
        uid = session.identity.as_ref().map(|i| i.uid.as_str()).unwrap_or("-"),
        admin = session.admin,
        "request session"
      );
      parts.extensions.insert(session);
      next.run(Request::from_parts(parts, body)).await
    }
    Err(e) => e.into_response(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::http::{Request, header};

  fn make_state(password: &str) -> Arc<AuthConfig> {
    use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
    use rand_core::OsRng;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();

    Arc::new(AuthConfig::new(vec![
      UserConfig {
        username:      "ram".to_string(),
        password_hash: hash.clone(),
        display_name:  Some("Ram".to_string()),
        email:         None,
        admin:         false,
      },
      UserConfig {
        username:      "admin".to_string(),
        password_hash: hash,
        display_name:  None,
        email:         None,
        admin:         true,
      },
    ]))
  }

  async fn extract(req: Request<axum::body::Body>, state: &Arc<AuthConfig>) -> Result<Session, Error> {
    let (mut parts, _) = req.into_parts();
    CurrentSession::from_request_parts(&mut parts, state).await.map(|s| s.0)
  }

  fn basic(user: &str, pass: &str) -> String {
    let encoded = B64.encode(format!("{user}:{pass}"));
    format!("Basic {encoded}")
  }

  #[tokio::test]
  async fn correct_credentials() {
    let state = make_state("secret");
    let req = Request::builder()
      .header(header::AUTHORIZATION, basic("ram", "secret"))
      .body(axum::body::Body::empty()).unwrap();
    let session = extract(req, &state).await.unwrap();
    let identity = session.identity.unwrap();
    assert_eq!(identity.uid, "ram");
    assert_eq!(identity.display_name, "Ram");
    assert!(!session.admin);
  }

  #[tokio::test]
  async fn admin_flag_comes_from_config() {
    let state = make_state("secret");
    let req = Request::builder()
      .header(header::AUTHORIZATION, basic("admin", "secret"))
      .header(CLAN_HEADER, "Yadav")
      .body(axum::body::Body::empty()).unwrap();
    let session = extract(req, &state).await.unwrap();
    assert!(session.admin);
    assert_eq!(session.clan.as_deref(), Some("Yadav"));
    assert_eq!(session.identity.unwrap().display_name, "admin");
  }

  #[tokio::test]
  async fn clan_header_is_normalised() {
    let state = make_state("secret");
    let req = Request::builder()
      .header(CLAN_HEADER, "  yadav ")
      .body(axum::body::Body::empty()).unwrap();
    let session = extract(req, &state).await.unwrap();
    assert_eq!(session.clan.as_deref(), Some("Yadav"));

    let req = Request::builder()
      .header(CLAN_HEADER, "   ")
      .body(axum::body::Body::empty()).unwrap();
    assert!(extract(req, &state).await.unwrap().clan.is_none());
  }

  #[tokio::test]
  async fn wrong_password() {
    let state = make_state("secret");
    let req = Request::builder()
      .header(header::AUTHORIZATION, basic("ram", "wrong"))
      .body(axum::body::Body::empty()).unwrap();
    assert!(matches!(extract(req, &state).await, Err(Error::Unauthorized)));
  }

  #[tokio::test]
  async fn unknown_user() {
    let state = make_state("secret");
    let req = Request::builder()
      .header(header::AUTHORIZATION, basic("ravan", "secret"))
      .body(axum::body::Body::empty()).unwrap();
    assert!(matches!(extract(req, &state).await, Err(Error::Unauthorized)));
  }

  #[tokio::test]
  async fn missing_header_is_anonymous() {
    let state = make_state("secret");
    let req = Request::builder().body(axum::body::Body::empty()).unwrap();
    let session = extract(req, &state).await.unwrap();
    assert!(session.identity.is_none());
    assert!(!session.admin);
  }

  #[tokio::test]
  async fn invalid_base64() {
    let state = make_state("secret");
    let req = Request::builder()
      .header(header::AUTHORIZATION, "Basic !!!not-base64!!!")
      .body(axum::body::Body::empty()).unwrap();
    assert!(matches!(extract(req, &state).await, Err(Error::Unauthorized)));
  }
}
