//! Handlers for the matrix view endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/matrix` | Optional `soulId`, `integrationId`, `isPrimary`, `limit`, `offset` |
//! | `GET`  | `/matrix/souls/:soul_id/integrations` | Mappings for one soul, primary first |
//! | `GET`  | `/matrix/integrations/:integration_id/souls` | Mappings for one integration, primary first |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use serde::Deserialize;
use weft_core::{
  directory::{IntegrationDirectory, SoulDirectory},
  id::{IntegrationId, SoulId},
  matrix::{MappingList, MatrixView},
  store::{MappingFilter, MappingStore},
};
use weft_service::MatrixService;

use crate::{Caller, error::ApiError};

/// Largest accepted `limit` value.
pub const MAX_LIMIT: usize = 100;

/// Page size when the caller does not pass `limit`.
pub const DEFAULT_LIMIT: usize = 50;

// ─── Filters ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixParams {
  pub soul_id:        Option<SoulId>,
  pub integration_id: Option<IntegrationId>,
  pub is_primary:     Option<bool>,
  pub limit:          Option<usize>,
  pub offset:         Option<usize>,
}

impl MatrixParams {
  /// Range-check the pagination knobs and build the store filter. The
  /// mapping page is always bounded, even for callers that pass nothing.
  fn into_filter(self) -> Result<MappingFilter, ApiError> {
    let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
    if limit == 0 || limit > MAX_LIMIT {
      return Err(ApiError::BadRequest(format!(
        "limit must be between 1 and {MAX_LIMIT}, got {limit}"
      )));
    }
    Ok(MappingFilter {
      soul_id:        self.soul_id,
      integration_id: self.integration_id,
      is_primary:     self.is_primary,
      limit:          Some(limit),
      offset:         Some(self.offset.unwrap_or(0)),
    })
  }
}

// ─── View ────────────────────────────────────────────────────────────────────

/// `GET /matrix[?soulId=...][&integrationId=...][&isPrimary=...][&limit=...][&offset=...]`
pub async fn view<M, S, I>(
  State(service): State<Arc<MatrixService<M, S, I>>>,
  caller: Caller,
  Query(params): Query<MatrixParams>,
) -> Result<Json<MatrixView>, ApiError>
where
  M: MappingStore,
  S: SoulDirectory,
  I: IntegrationDirectory,
{
  let filter = params.into_filter()?;
  let view = service.get_matrix(&caller.org_id, &filter).await?;
  Ok(Json(view))
}

// ─── Per-side lists ──────────────────────────────────────────────────────────

/// `GET /matrix/souls/:soul_id/integrations`
pub async fn integrations_for_soul<M, S, I>(
  State(service): State<Arc<MatrixService<M, S, I>>>,
  caller: Caller,
  Path(soul_id): Path<SoulId>,
) -> Result<Json<MappingList>, ApiError>
where
  M: MappingStore,
  S: SoulDirectory,
  I: IntegrationDirectory,
{
  let list = service
    .get_integrations_for_soul(&caller.org_id, &soul_id)
    .await?;
  Ok(Json(list))
}

/// `GET /matrix/integrations/:integration_id/souls`
pub async fn souls_for_integration<M, S, I>(
  State(service): State<Arc<MatrixService<M, S, I>>>,
  caller: Caller,
  Path(integration_id): Path<IntegrationId>,
) -> Result<Json<MappingList>, ApiError>
where
  M: MappingStore,
  S: SoulDirectory,
  I: IntegrationDirectory,
{
  let list = service
    .get_souls_for_integration(&caller.org_id, &integration_id)
    .await?;
  Ok(Json(list))
}
