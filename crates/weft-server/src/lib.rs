//! Weft matrix server.
//!
//! Binds the JSON API from [`weft-api`] to the SQLite stores, wraps it in
//! HTTP Basic authentication with per-key tenant bindings, and serves the
//! result with request tracing.
//!
//! The binary in `main.rs` reads a TOML config, opens the stores, and hands
//! an [`AppState`] to [`router`]. Tests drive the same router directly with
//! `tower::ServiceExt::oneshot`, so everything above the TCP listener is
//! covered in-process.

pub mod auth;
pub mod error;
pub mod seed;

pub use error::Error;

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use axum::{Router, middleware};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use weft_core::id::OrgId;
use weft_service::MatrixService;
use weft_store_sqlite::{SoulDocStore, SqliteMatrixStore};

use crate::auth::{AuthConfig, KeyEntry};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and the
/// `WEFT_*` environment.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:              String,
  pub port:              u16,
  /// SQLite file holding mappings and the integration catalog.
  pub matrix_store_path: PathBuf,
  /// SQLite file holding soul documents.
  pub soul_store_path:   PathBuf,
  /// Souls fetched per matrix view.
  #[serde(default = "default_soul_limit")]
  pub soul_limit:        usize,
  /// Basic-auth keys: username → tenant binding.
  pub keys:              HashMap<String, KeyConfig>,
}

fn default_soul_limit() -> usize { weft_service::DEFAULT_SOUL_LIMIT }

/// One `[keys.<username>]` block.
#[derive(Deserialize, Clone)]
pub struct KeyConfig {
  pub org_id:        String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$...`
  pub password_hash: String,
  /// Recorded as `created_by` on mappings created with this key.
  pub actor:         Option<String>,
}

impl ServerConfig {
  /// Build the auth table from the key blocks.
  pub fn auth_config(&self) -> AuthConfig {
    AuthConfig {
      keys: self
        .keys
        .iter()
        .map(|(username, key)| {
          (username.clone(), KeyEntry {
            org_id:        OrgId::new(key.org_id.clone()),
            password_hash: key.password_hash.clone(),
            actor:         key.actor.clone(),
          })
        })
        .collect(),
    }
  }
}

// ─── Application state ───────────────────────────────────────────────────────

/// The concrete service this server runs: mappings and the integration
/// catalog in one SQLite store, soul documents in another.
pub type Service =
  MatrixService<SqliteMatrixStore, SoulDocStore, SqliteMatrixStore>;

/// Shared state for the router.
#[derive(Clone)]
pub struct AppState {
  pub service: Arc<Service>,
  pub auth:    Arc<AuthConfig>,
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the server router: the matrix API nested under `/api`, gated by
/// Basic auth, with request tracing outermost.
pub fn router(state: AppState) -> Router {
  Router::new()
    .nest("/api", weft_api::api_router(state.service.clone()))
    .layer(middleware::from_fn_with_state(
      state.auth.clone(),
      auth::require_auth,
    ))
    .layer(TraceLayer::new_for_http())
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use rand_core::OsRng;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use weft_core::{
    id::{IntegrationId, SoulId},
    integration::IntegrationDetails,
    soul::Soul,
  };

  use super::*;

  /// Two tenants: key `ada` → org-1 (with an actor label), key `bob` →
  /// org-2. org-1 carries two souls and two integrations, org-2 one of
  /// each. No mappings exist yet.
  async fn make_state() -> AppState {
    let matrix = SqliteMatrixStore::open_in_memory().await.unwrap();
    let souls = SoulDocStore::open_in_memory().await.unwrap();

    let org1 = OrgId::new("org-1");
    let org2 = OrgId::new("org-2");

    for (org, id, name) in [
      (&org1, "soul-a", "Ada"),
      (&org1, "soul-b", "Brio"),
      (&org2, "soul-x", "Xan"),
    ] {
      souls
        .put_soul(org, &Soul {
          soul_id:      SoulId::new(id),
          display_name: name.to_string(),
          email:        None,
        })
        .await
        .unwrap();
    }

    for (org, id, name, provider) in [
      (&org1, "int-x", "Chirper Main", "chirper"),
      (&org1, "int-y", "Album Backup", "album"),
      (&org2, "int-z", "Lensfeed", "lensfeed"),
    ] {
      matrix
        .put_integration(org, &IntegrationDetails {
          integration_id: IntegrationId::new(id),
          name:           name.to_string(),
          picture:        None,
          provider:       provider.to_string(),
          disabled:       false,
        })
        .await
        .unwrap();
    }

    let service = MatrixService::new(matrix.clone(), souls, matrix);

    let hash = |password: &str| {
      let salt = SaltString::generate(&mut OsRng);
      Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .unwrap()
        .to_string()
    };

    let mut keys = HashMap::new();
    keys.insert("ada".to_string(), KeyEntry {
      org_id:        org1,
      password_hash: hash("secret"),
      actor:         Some("ada@example.com".to_string()),
    });
    keys.insert("bob".to_string(), KeyEntry {
      org_id:        org2,
      password_hash: hash("hunter2"),
      actor:         None,
    });

    AppState {
      service: Arc::new(service),
      auth:    Arc::new(AuthConfig { keys }),
    }
  }

  fn auth_header(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  /// Fire one request at a fresh router over `state` and decode the JSON
  /// body (204s and empty bodies come back as `Value::Null`).
  async fn send(
    state: AppState,
    method: &str,
    uri: &str,
    auth: Option<&str>,
    body: Option<Value>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
      builder = builder.header(header::AUTHORIZATION, auth);
    }
    let request = match body {
      Some(v) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(v.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };

    let response = router(state).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
      .await
      .unwrap();
    let value = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
  }

  #[tokio::test]
  async fn unauthenticated_requests_get_a_challenge() {
    let state = make_state().await;

    let request = Request::builder()
      .method("GET")
      .uri("/api/matrix")
      .body(Body::empty())
      .unwrap();
    let response = router(state.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));

    let (status, _) = send(
      state,
      "GET",
      "/api/matrix",
      Some(&auth_header("ada", "wrong")),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn matrix_view_for_a_fresh_tenant() {
    let state = make_state().await;
    let auth = auth_header("ada", "secret");

    let (status, view) =
      send(state, "GET", "/api/matrix", Some(&auth), None).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(view["souls"].as_array().unwrap().len(), 2);
    assert_eq!(view["souls"][0]["integrationIds"], json!([]));
    // Integrations are catalog-ordered by name.
    assert_eq!(view["integrations"][0]["name"], "Album Backup");
    assert_eq!(view["mappings"], json!([]));
    assert_eq!(view["summary"]["totalSouls"], 2);
    assert_eq!(view["summary"]["totalIntegrations"], 2);
    assert_eq!(view["summary"]["totalMappings"], 0);
  }

  #[tokio::test]
  async fn mapping_lifecycle_over_http() {
    let state = make_state().await;
    let auth = auth_header("ada", "secret");

    let (status, first) = send(
      state.clone(),
      "POST",
      "/api/matrix/mappings",
      Some(&auth),
      Some(json!({ "soulId": "soul-a", "integrationId": "int-x" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["isPrimary"], false);
    assert_eq!(first["createdBy"], "ada@example.com");
    assert_eq!(first["integration"]["name"], "Chirper Main");

    // Same pair again is a conflict.
    let (status, body) = send(
      state.clone(),
      "POST",
      "/api/matrix/mappings",
      Some(&auth),
      Some(json!({ "soulId": "soul-a", "integrationId": "int-x" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already exists"));

    // A second channel created straight to primary.
    let (status, second) = send(
      state.clone(),
      "POST",
      "/api/matrix/mappings",
      Some(&auth),
      Some(json!({
        "soulId":        "soul-a",
        "integrationId": "int-y",
        "isPrimary":     true,
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(second["isPrimary"], true);

    // Promoting the first hands the flag over.
    let first_id = first["mappingId"].as_str().unwrap();
    let (status, promoted) = send(
      state.clone(),
      "POST",
      &format!("/api/matrix/mappings/{first_id}/primary"),
      Some(&auth),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(promoted["isPrimary"], true);

    let (_, primaries) = send(
      state.clone(),
      "GET",
      "/api/matrix?isPrimary=true",
      Some(&auth),
      None,
    )
    .await;
    assert_eq!(primaries["mappings"].as_array().unwrap().len(), 1);
    assert_eq!(primaries["mappings"][0]["integrationId"], "int-x");

    // Toggle tears the pair down, then recreates it as a plain channel.
    let (status, outcome) = send(
      state.clone(),
      "POST",
      "/api/matrix/mappings/toggle",
      Some(&auth),
      Some(json!({ "soulId": "soul-a", "integrationId": "int-x" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["action"], "deleted");

    let (_, outcome) = send(
      state.clone(),
      "POST",
      "/api/matrix/mappings/toggle",
      Some(&auth),
      Some(json!({ "soulId": "soul-a", "integrationId": "int-x" })),
    )
    .await;
    assert_eq!(outcome["action"], "created");
    assert_eq!(outcome["mapping"]["isPrimary"], false);

    // Deleting the primary left the soul with none.
    let (_, primaries) = send(
      state,
      "GET",
      "/api/matrix?isPrimary=true",
      Some(&auth),
      None,
    )
    .await;
    assert_eq!(primaries["summary"]["totalMappings"], 0);
  }

  #[tokio::test]
  async fn lookup_and_patch_round_trip() {
    let state = make_state().await;
    let auth = auth_header("ada", "secret");

    let (_, created) = send(
      state.clone(),
      "POST",
      "/api/matrix/mappings",
      Some(&auth),
      Some(json!({ "soulId": "soul-a", "integrationId": "int-x" })),
    )
    .await;
    let id = created["mappingId"].as_str().unwrap();

    let (status, fetched) = send(
      state.clone(),
      "GET",
      &format!("/api/matrix/mappings/{id}"),
      Some(&auth),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["soulId"], "soul-a");

    let (status, patched) = send(
      state.clone(),
      "PATCH",
      &format!("/api/matrix/mappings/{id}"),
      Some(&auth),
      Some(json!({ "priority": 9, "notes": "fallback channel" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["priority"], 9);
    assert_eq!(patched["notes"], "fallback channel");
    assert_eq!(patched["integration"]["provider"], "chirper");

    let missing = uuid::Uuid::new_v4();
    let (status, _) = send(
      state.clone(),
      "PATCH",
      &format!("/api/matrix/mappings/{missing}"),
      Some(&auth),
      Some(json!({ "priority": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
      state,
      "GET",
      &format!("/api/matrix/mappings/{missing}"),
      Some(&auth),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn delete_returns_no_content_once() {
    let state = make_state().await;
    let auth = auth_header("ada", "secret");

    let (_, created) = send(
      state.clone(),
      "POST",
      "/api/matrix/mappings",
      Some(&auth),
      Some(json!({ "soulId": "soul-a", "integrationId": "int-x" })),
    )
    .await;
    let id = created["mappingId"].as_str().unwrap();

    let (status, body) = send(
      state.clone(),
      "DELETE",
      &format!("/api/matrix/mappings/{id}"),
      Some(&auth),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, _) = send(
      state,
      "DELETE",
      &format!("/api/matrix/mappings/{id}"),
      Some(&auth),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn create_validates_and_resolves_identities() {
    let state = make_state().await;
    let auth = auth_header("ada", "secret");

    let (status, body) = send(
      state.clone(),
      "POST",
      "/api/matrix/mappings",
      Some(&auth),
      Some(json!({ "soulId": "soul-z", "integrationId": "int-x" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("soul-z"));

    let (status, _) = send(
      state.clone(),
      "POST",
      "/api/matrix/mappings",
      Some(&auth),
      Some(json!({ "soulId": "soul-a", "integrationId": "int-zz" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
      state.clone(),
      "POST",
      "/api/matrix/mappings",
      Some(&auth),
      Some(json!({
        "soulId":        "soul-a",
        "integrationId": "int-x",
        "priority":      101,
      })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("priority"));

    let (status, _) = send(
      state,
      "POST",
      "/api/matrix/mappings",
      Some(&auth),
      Some(json!({
        "soulId":        "soul-a",
        "integrationId": "int-x",
        "notes":         "x".repeat(501),
      })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn matrix_limit_is_bounded() {
    let state = make_state().await;
    let auth = auth_header("ada", "secret");

    let (status, _) =
      send(state.clone(), "GET", "/api/matrix?limit=0", Some(&auth), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
      state.clone(),
      "GET",
      "/api/matrix?limit=101",
      Some(&auth),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) =
      send(state, "GET", "/api/matrix?limit=100", Some(&auth), None).await;
    assert_eq!(status, StatusCode::OK);
  }

  #[tokio::test]
  async fn bulk_reports_each_item() {
    let state = make_state().await;
    let auth = auth_header("ada", "secret");

    // The second item duplicates the first inside the same batch.
    let (status, report) = send(
      state.clone(),
      "POST",
      "/api/matrix/mappings/bulk",
      Some(&auth),
      Some(json!({
        "operation": "create",
        "mappings": [
          { "soulId": "soul-b", "integrationId": "int-x" },
          { "soulId": "soul-b", "integrationId": "int-x" },
        ],
      })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["succeeded"], 1);
    assert_eq!(report["failed"], 1);
    assert_eq!(report["createdIds"].as_array().unwrap().len(), 1);
    assert!(
      report["errors"][0]["error"]
        .as_str()
        .unwrap()
        .contains("already exists")
    );

    // Delete the pair that exists and one that never did.
    let (status, report) = send(
      state,
      "POST",
      "/api/matrix/mappings/bulk",
      Some(&auth),
      Some(json!({
        "operation": "delete",
        "mappings": [
          { "soulId": "soul-b", "integrationId": "int-x" },
          { "soulId": "soul-b", "integrationId": "int-y" },
        ],
      })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["succeeded"], 1);
    assert_eq!(report["failed"], 1);
    assert!(report.get("createdIds").is_none());
  }

  #[tokio::test]
  async fn bulk_item_count_is_bounded() {
    let state = make_state().await;
    let auth = auth_header("ada", "secret");

    let (status, _) = send(
      state.clone(),
      "POST",
      "/api/matrix/mappings/bulk",
      Some(&auth),
      Some(json!({ "operation": "create", "mappings": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let oversized: Vec<Value> = (0..101)
      .map(|i| json!({ "soulId": format!("soul-{i}"), "integrationId": "int-x" }))
      .collect();
    let (status, _) = send(
      state,
      "POST",
      "/api/matrix/mappings/bulk",
      Some(&auth),
      Some(json!({ "operation": "create", "mappings": oversized })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn tenants_do_not_see_each_other() {
    let state = make_state().await;
    let ada = auth_header("ada", "secret");
    let bob = auth_header("bob", "hunter2");

    let (_, created) = send(
      state.clone(),
      "POST",
      "/api/matrix/mappings",
      Some(&ada),
      Some(json!({ "soulId": "soul-a", "integrationId": "int-x" })),
    )
    .await;
    let id = created["mappingId"].as_str().unwrap();

    let (status, _) = send(
      state.clone(),
      "GET",
      &format!("/api/matrix/mappings/{id}"),
      Some(&bob),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // org-1's identities do not resolve under org-2.
    let (status, _) = send(
      state.clone(),
      "POST",
      "/api/matrix/mappings/toggle",
      Some(&bob),
      Some(json!({ "soulId": "soul-a", "integrationId": "int-x" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, view) = send(state, "GET", "/api/matrix", Some(&bob), None).await;
    assert_eq!(view["summary"]["totalSouls"], 1);
    assert_eq!(view["summary"]["totalIntegrations"], 1);
    assert_eq!(view["summary"]["totalMappings"], 0);
  }

  #[tokio::test]
  async fn actor_comes_from_the_key_not_the_body() {
    let state = make_state().await;
    let bob = auth_header("bob", "hunter2");

    // `createdBy` in the body is not a field the API accepts; the key's
    // actor (none, for bob) wins.
    let (status, created) = send(
      state,
      "POST",
      "/api/matrix/mappings",
      Some(&bob),
      Some(json!({
        "soulId":        "soul-x",
        "integrationId": "int-z",
        "createdBy":     "mallory@example.com",
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(created["createdBy"].is_null());
  }

  #[tokio::test]
  async fn per_side_lists_follow_the_anchor() {
    let state = make_state().await;
    let auth = auth_header("ada", "secret");

    for integration in ["int-x", "int-y"] {
      let (status, _) = send(
        state.clone(),
        "POST",
        "/api/matrix/mappings",
        Some(&auth),
        Some(json!({ "soulId": "soul-a", "integrationId": integration })),
      )
      .await;
      assert_eq!(status, StatusCode::CREATED);
    }

    let (status, list) = send(
      state.clone(),
      "GET",
      "/api/matrix/souls/soul-a/integrations",
      Some(&auth),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["count"], 2);

    let (status, list) = send(
      state.clone(),
      "GET",
      "/api/matrix/integrations/int-x/souls",
      Some(&auth),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["count"], 1);
    assert_eq!(list["mappings"][0]["soulId"], "soul-a");

    let (status, _) = send(
      state,
      "GET",
      "/api/matrix/souls/soul-z/integrations",
      Some(&auth),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }
}
