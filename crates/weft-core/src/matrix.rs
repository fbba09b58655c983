//! Composite view and report types shared by the service, the API, and the
//! terminal client.
//!
//! These are the wire shapes: every type here serializes with camelCase
//! field names and round-trips through JSON unchanged.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  id::{IntegrationId, SoulId},
  integration::IntegrationDetails,
  mapping::Mapping,
  soul::Soul,
};

// ─── Matrix view ─────────────────────────────────────────────────────────────

/// One row of the matrix: a soul plus the ids of every integration it is
/// mapped to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixSoul {
  #[serde(flatten)]
  pub soul:            Soul,
  pub integration_ids: Vec<IntegrationId>,
}

/// Headline counts for a matrix view. `total_mappings` counts every mapping
/// matching the active filters, before pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixSummary {
  pub total_souls:        usize,
  pub total_integrations: usize,
  pub total_mappings:     usize,
}

/// The full soul × integration grid for one organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixView {
  pub souls:        Vec<MatrixSoul>,
  pub integrations: Vec<IntegrationDetails>,
  pub mappings:     Vec<Mapping>,
  pub summary:      MatrixSummary,
}

/// Mappings for one side of the grid (a single soul, or a single
/// integration), primary first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingList {
  pub mappings: Vec<Mapping>,
  pub count:    usize,
}

/// A mapping enriched with the display details of its integration. The
/// integration is `None` when the directory no longer knows the id (e.g. a
/// soft delete that landed after the mapping was written).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingDetail {
  #[serde(flatten)]
  pub mapping:     Mapping,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub integration: Option<IntegrationDetails>,
}

// ─── Toggle ──────────────────────────────────────────────────────────────────

/// What a toggle did. The only operation whose effect depends on prior
/// state: an existing pair is deleted, an absent one is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ToggleOutcome {
  Created { mapping: Mapping },
  Deleted,
}

// ─── Bulk operations ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkOperation {
  Create,
  Delete,
}

/// One pair in a bulk request. `priority` and `notes` only apply to creates;
/// deletes ignore them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkItem {
  pub soul_id:        SoulId,
  pub integration_id: IntegrationId,
  pub priority:       Option<u8>,
  pub notes:          Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRequest {
  pub operation: BulkOperation,
  pub mappings:  Vec<BulkItem>,
}

/// A per-item failure. The batch keeps going; these accumulate instead of
/// aborting it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkError {
  pub soul_id:        SoulId,
  pub integration_id: IntegrationId,
  pub error:          String,
}

/// Aggregated outcome of a bulk request. `created_ids` is present for
/// creates only, in application order of the successful items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkReport {
  pub succeeded:   usize,
  pub failed:      usize,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub created_ids: Option<Vec<Uuid>>,
  pub errors:      Vec<BulkError>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::mapping::NewMapping;

  fn sample_mapping() -> Mapping {
    let input = NewMapping::new("soul-a".into(), "int-x".into());
    Mapping {
      mapping_id:     Uuid::new_v4(),
      org_id:         "org-1".into(),
      soul_id:        input.soul_id,
      integration_id: input.integration_id,
      is_primary:     input.is_primary,
      priority:       input.priority,
      notes:          input.notes,
      created_by:     input.created_by,
      created_at:     chrono::Utc::now(),
      updated_at:     chrono::Utc::now(),
    }
  }

  #[test]
  fn toggle_outcome_is_action_tagged() {
    let deleted = serde_json::to_value(ToggleOutcome::Deleted).unwrap();
    assert_eq!(deleted, serde_json::json!({ "action": "deleted" }));

    let created =
      serde_json::to_value(ToggleOutcome::Created { mapping: sample_mapping() })
        .unwrap();
    assert_eq!(created["action"], "created");
    assert_eq!(created["mapping"]["soulId"], "soul-a");
    assert_eq!(created["mapping"]["isPrimary"], false);
  }

  #[test]
  fn bulk_report_omits_created_ids_for_deletes() {
    let report = BulkReport {
      succeeded:   2,
      failed:      0,
      created_ids: None,
      errors:      vec![],
    };
    let value = serde_json::to_value(&report).unwrap();
    assert!(value.get("createdIds").is_none());
    assert_eq!(value["succeeded"], 2);
  }

  #[test]
  fn bulk_request_accepts_sparse_items() {
    let request: BulkRequest = serde_json::from_value(serde_json::json!({
      "operation": "delete",
      "mappings":  [{ "soulId": "soul-a", "integrationId": "int-x" }],
    }))
    .unwrap();
    assert_eq!(request.operation, BulkOperation::Delete);
    assert!(request.mappings[0].priority.is_none());
  }

  #[test]
  fn mapping_detail_flattens_the_mapping() {
    let detail = MappingDetail { mapping: sample_mapping(), integration: None };
    let value = serde_json::to_value(&detail).unwrap();
    assert_eq!(value["soulId"], "soul-a");
    assert!(value.get("integration").is_none());
  }
}
