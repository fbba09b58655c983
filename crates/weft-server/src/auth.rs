//! HTTP Basic authentication for the matrix API.
//!
//! Every key in the server config names a tenant. Authenticating with a key
//! resolves to a [`Caller`] carrying that tenant's org id and an optional
//! actor label, which the middleware stashes in request extensions for the
//! API handlers.

use std::{collections::HashMap, sync::Arc};

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::{Request, State},
  http::HeaderMap,
  middleware::Next,
  response::{IntoResponse, Response},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use weft_api::Caller;
use weft_core::id::OrgId;

use crate::error::Error;

/// Credential table for this server instance, keyed by Basic-auth username.
#[derive(Clone)]
pub struct AuthConfig {
  pub keys: HashMap<String, KeyEntry>,
}

/// One accepted key and the tenant it acts for.
#[derive(Clone)]
pub struct KeyEntry {
  pub org_id:        OrgId,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$...`
  pub password_hash: String,
  /// Recorded as `created_by` on mappings created with this key.
  pub actor:         Option<String>,
}

/// Verify the Authorization header against the key table and resolve the
/// caller it maps to. Every failure collapses to [`Error::Unauthorized`].
pub fn verify_auth(
  headers: &HeaderMap,
  config: &AuthConfig,
) -> Result<Caller, Error> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthorized)?;

  let encoded =
    header_val.strip_prefix("Basic ").ok_or(Error::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| Error::Unauthorized)?;
  let credentials =
    std::str::from_utf8(&decoded).map_err(|_| Error::Unauthorized)?;

  let (username, password) =
    credentials.split_once(':').ok_or(Error::Unauthorized)?;

  let entry = config.keys.get(username).ok_or(Error::Unauthorized)?;

  let parsed_hash =
    PasswordHash::new(&entry.password_hash).map_err(|_| Error::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| Error::Unauthorized)?;

  Ok(Caller {
    org_id: entry.org_id.clone(),
    actor:  entry.actor.clone(),
  })
}

/// Middleware that authenticates the request and injects the resolved
/// [`Caller`] before handing off to the API routes.
pub async fn require_auth(
  State(auth): State<Arc<AuthConfig>>,
  mut request: Request,
  next: Next,
) -> Response {
  match verify_auth(request.headers(), &auth) {
    Ok(caller) => {
      request.extensions_mut().insert(caller);
      next.run(request).await
    }
    Err(e) => e.into_response(),
  }
}

#[cfg(test)]
mod tests {
  use argon2::{PasswordHasher, password_hash::SaltString};
  use axum::http::header;
  use rand_core::OsRng;

  use super::*;

  fn config_with_key(username: &str, password: &str) -> AuthConfig {
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();

    let mut keys = HashMap::new();
    keys.insert(username.to_string(), KeyEntry {
      org_id: OrgId::new("org-1"),
      password_hash,
      actor: Some("ops@example.com".to_string()),
    });
    AuthConfig { keys }
  }

  fn basic(user: &str, pass: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
      header::AUTHORIZATION,
      format!("Basic {}", B64.encode(format!("{user}:{pass}")))
        .parse()
        .unwrap(),
    );
    headers
  }

  #[test]
  fn correct_key_resolves_the_caller() {
    let config = config_with_key("ada", "secret");
    let caller = verify_auth(&basic("ada", "secret"), &config).unwrap();
    assert_eq!(caller.org_id, OrgId::new("org-1"));
    assert_eq!(caller.actor.as_deref(), Some("ops@example.com"));
  }

  #[test]
  fn wrong_password_is_rejected() {
    let config = config_with_key("ada", "secret");
    assert!(verify_auth(&basic("ada", "nope"), &config).is_err());
  }

  #[test]
  fn unknown_username_is_rejected() {
    let config = config_with_key("ada", "secret");
    assert!(verify_auth(&basic("brio", "secret"), &config).is_err());
  }

  #[test]
  fn missing_header_is_rejected() {
    let config = config_with_key("ada", "secret");
    assert!(verify_auth(&HeaderMap::new(), &config).is_err());
  }

  #[test]
  fn invalid_base64_is_rejected() {
    let config = config_with_key("ada", "secret");
    let mut headers = HeaderMap::new();
    headers.insert(
      header::AUTHORIZATION,
      "Basic not!base64".parse().unwrap(),
    );
    assert!(verify_auth(&headers, &config).is_err());
  }
}
