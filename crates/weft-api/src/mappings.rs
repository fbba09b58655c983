//! Handlers for `/matrix/mappings` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/matrix/mappings` | Body: [`CreateBody`]; returns 201 + enriched mapping |
//! | `POST`   | `/matrix/mappings/toggle` | Body: [`ToggleBody`]; returns the action taken |
//! | `POST`   | `/matrix/mappings/bulk` | Body: [`BulkRequest`]; 200 + per-item report |
//! | `GET`    | `/matrix/mappings/:id` | 404 if not found |
//! | `PATCH`  | `/matrix/mappings/:id` | Body: [`UpdateBody`]; unset fields untouched |
//! | `DELETE` | `/matrix/mappings/:id` | 204 on success |
//! | `POST`   | `/matrix/mappings/:id/primary` | Promote to the soul's sole primary |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;
use weft_core::{
  directory::{IntegrationDirectory, SoulDirectory},
  id::{IntegrationId, SoulId},
  mapping::{DEFAULT_PRIORITY, Mapping, MappingPatch, NewMapping},
  matrix::{BulkReport, BulkRequest, MappingDetail, ToggleOutcome},
  store::MappingStore,
};
use weft_service::MatrixService;

use crate::{Caller, error::ApiError};

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBody {
  pub soul_id:        SoulId,
  pub integration_id: IntegrationId,
  #[serde(default)]
  pub is_primary:     bool,
  pub priority:       Option<u8>,
  pub notes:          Option<String>,
}

/// `POST /matrix/mappings`: returns 201 + the stored mapping enriched with
/// its integration details. The creator is the authenticated caller, never
/// a body field.
pub async fn create<M, S, I>(
  State(service): State<Arc<MatrixService<M, S, I>>>,
  caller: Caller,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  M: MappingStore,
  S: SoulDirectory,
  I: IntegrationDirectory,
{
  let input = NewMapping {
    soul_id:        body.soul_id,
    integration_id: body.integration_id,
    is_primary:     body.is_primary,
    priority:       body.priority.unwrap_or(DEFAULT_PRIORITY),
    notes:          body.notes,
    created_by:     caller.actor,
  };
  let detail = service.create_mapping(&caller.org_id, input).await?;
  Ok((StatusCode::CREATED, Json(detail)))
}

// ─── Toggle ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleBody {
  pub soul_id:        SoulId,
  pub integration_id: IntegrationId,
}

/// `POST /matrix/mappings/toggle`: deletes the pair's mapping if present,
/// creates a defaults-only one if absent. The response carries which action
/// was taken.
pub async fn toggle<M, S, I>(
  State(service): State<Arc<MatrixService<M, S, I>>>,
  caller: Caller,
  Json(body): Json<ToggleBody>,
) -> Result<Json<ToggleOutcome>, ApiError>
where
  M: MappingStore,
  S: SoulDirectory,
  I: IntegrationDirectory,
{
  let outcome = service
    .toggle_mapping(
      &caller.org_id,
      &body.soul_id,
      &body.integration_id,
      caller.actor,
    )
    .await?;
  Ok(Json(outcome))
}

// ─── Bulk ────────────────────────────────────────────────────────────────────

/// `POST /matrix/mappings/bulk`: the report is 200 even when some items
/// failed; only a bad item count rejects the request whole.
pub async fn bulk<M, S, I>(
  State(service): State<Arc<MatrixService<M, S, I>>>,
  caller: Caller,
  Json(request): Json<BulkRequest>,
) -> Result<Json<BulkReport>, ApiError>
where
  M: MappingStore,
  S: SoulDirectory,
  I: IntegrationDirectory,
{
  let report = service
    .bulk_operations(&caller.org_id, request, caller.actor)
    .await?;
  Ok(Json(report))
}

// ─── Single mapping ──────────────────────────────────────────────────────────

/// `GET /matrix/mappings/:id`
pub async fn get_one<M, S, I>(
  State(service): State<Arc<MatrixService<M, S, I>>>,
  caller: Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<Mapping>, ApiError>
where
  M: MappingStore,
  S: SoulDirectory,
  I: IntegrationDirectory,
{
  let mapping = service.get_mapping(&caller.org_id, id).await?;
  Ok(Json(mapping))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBody {
  pub is_primary: Option<bool>,
  pub priority:   Option<u8>,
  pub notes:      Option<String>,
}

/// `PATCH /matrix/mappings/:id`: partial update; unset fields are left
/// untouched.
pub async fn update<M, S, I>(
  State(service): State<Arc<MatrixService<M, S, I>>>,
  caller: Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<UpdateBody>,
) -> Result<Json<MappingDetail>, ApiError>
where
  M: MappingStore,
  S: SoulDirectory,
  I: IntegrationDirectory,
{
  let patch = MappingPatch {
    is_primary: body.is_primary,
    priority:   body.priority,
    notes:      body.notes,
  };
  let detail = service.update_mapping(&caller.org_id, id, patch).await?;
  Ok(Json(detail))
}

/// `DELETE /matrix/mappings/:id`: 204 on success, 404 when the id is
/// absent in this tenant.
pub async fn delete<M, S, I>(
  State(service): State<Arc<MatrixService<M, S, I>>>,
  caller: Caller,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  M: MappingStore,
  S: SoulDirectory,
  I: IntegrationDirectory,
{
  service.delete_mapping(&caller.org_id, id).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /matrix/mappings/:id/primary`: atomically make this mapping its
/// soul's sole primary.
pub async fn set_primary<M, S, I>(
  State(service): State<Arc<MatrixService<M, S, I>>>,
  caller: Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<MappingDetail>, ApiError>
where
  M: MappingStore,
  S: SoulDirectory,
  I: IntegrationDirectory,
{
  let detail = service.set_primary_channel(&caller.org_id, id).await?;
  Ok(Json(detail))
}
