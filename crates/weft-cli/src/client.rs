//! Async HTTP client wrapping the weft matrix API.

use std::{collections::HashMap, time::Duration};

use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde::de::DeserializeOwned;
use uuid::Uuid;
use weft_core::{
  id::{IntegrationId, SoulId},
  matrix::{
    BulkItem, BulkOperation, BulkReport, BulkRequest, MappingDetail,
    MatrixView, ToggleOutcome,
  },
};

/// Mappings fetched per page when assembling the full matrix.
const PAGE_SIZE: usize = 100;

/// Connection settings for the weft API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub username: String,
  pub password: String,
}

/// Async HTTP client for the weft JSON REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    if self.config.username.is_empty() {
      req
    } else {
      req.basic_auth(&self.config.username, Some(&self.config.password))
    }
  }

  /// Check the status and decode the body, surfacing the server's `error`
  /// message when there is one.
  async fn decode<T: DeserializeOwned>(
    resp: reqwest::Response,
    what: &str,
  ) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
      let message = resp
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|v| v["error"].as_str().map(str::to_string));
      return Err(match message {
        Some(m) => anyhow!("{what} → {status}: {m}"),
        None => anyhow!("{what} → {status}"),
      });
    }
    resp
      .json()
      .await
      .with_context(|| format!("deserialising {what} response"))
  }

  // ── Matrix ────────────────────────────────────────────────────────────────

  /// `GET /api/matrix`, paging until every mapping is in hand.
  pub async fn get_matrix(&self) -> Result<MatrixView> {
    let mut view = self.matrix_page(0).await?;
    while view.mappings.len() < view.summary.total_mappings {
      let page = self.matrix_page(view.mappings.len()).await?;
      if page.mappings.is_empty() {
        // The matrix shrank between pages; take what we have.
        break;
      }
      view.mappings.extend(page.mappings);
    }

    // A page only indexes the mappings it carries; rebuild each soul's
    // channel list from the merged set.
    let mut by_soul: HashMap<SoulId, Vec<IntegrationId>> = HashMap::new();
    for mapping in &view.mappings {
      by_soul
        .entry(mapping.soul_id.clone())
        .or_default()
        .push(mapping.integration_id.clone());
    }
    for soul in &mut view.souls {
      soul.integration_ids =
        by_soul.remove(&soul.soul.soul_id).unwrap_or_default();
    }

    Ok(view)
  }

  async fn matrix_page(&self, offset: usize) -> Result<MatrixView> {
    let resp = self
      .auth(self.client.get(self.url("/matrix")))
      .query(&[
        ("limit", PAGE_SIZE.to_string()),
        ("offset", offset.to_string()),
      ])
      .send()
      .await
      .context("GET /matrix failed")?;
    Self::decode(resp, "GET /matrix").await
  }

  // ── Mappings ──────────────────────────────────────────────────────────────

  /// `POST /api/matrix/mappings/toggle`
  pub async fn toggle(
    &self,
    soul_id: &SoulId,
    integration_id: &IntegrationId,
  ) -> Result<ToggleOutcome> {
    let resp = self
      .auth(self.client.post(self.url("/matrix/mappings/toggle")))
      .json(&serde_json::json!({
        "soulId":        soul_id,
        "integrationId": integration_id,
      }))
      .send()
      .await
      .context("POST /matrix/mappings/toggle failed")?;
    Self::decode(resp, "POST /matrix/mappings/toggle").await
  }

  /// `POST /api/matrix/mappings/{id}/primary`
  pub async fn set_primary(&self, mapping_id: Uuid) -> Result<MappingDetail> {
    let url = self.url(&format!("/matrix/mappings/{mapping_id}/primary"));
    let resp = self
      .auth(self.client.post(url))
      .send()
      .await
      .context("POST /matrix/mappings/{id}/primary failed")?;
    Self::decode(resp, "POST /matrix/mappings/{id}/primary").await
  }

  /// `PATCH /api/matrix/mappings/{id}`
  pub async fn update_mapping(
    &self,
    mapping_id: Uuid,
    patch: &serde_json::Value,
  ) -> Result<MappingDetail> {
    let url = self.url(&format!("/matrix/mappings/{mapping_id}"));
    let resp = self
      .auth(self.client.patch(url))
      .json(patch)
      .send()
      .await
      .context("PATCH /matrix/mappings/{id} failed")?;
    Self::decode(resp, "PATCH /matrix/mappings/{id}").await
  }

  /// `POST /api/matrix/mappings/bulk`
  pub async fn bulk(
    &self,
    operation: BulkOperation,
    mappings: Vec<BulkItem>,
  ) -> Result<BulkReport> {
    let resp = self
      .auth(self.client.post(self.url("/matrix/mappings/bulk")))
      .json(&BulkRequest { operation, mappings })
      .send()
      .await
      .context("POST /matrix/mappings/bulk failed")?;
    Self::decode(resp, "POST /matrix/mappings/bulk").await
  }
}
