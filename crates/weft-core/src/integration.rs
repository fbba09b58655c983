//! Integration: a connected social channel owned by the external
//! integration directory.
//!
//! The directory soft-deletes rows; a soft-deleted integration is treated as
//! nonexistent everywhere in this system, so the soft-delete marker never
//! appears in this type.

use serde::{Deserialize, Serialize};

use crate::id::IntegrationId;

/// Display attributes for a channel, as returned by the integration
/// directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationDetails {
  pub integration_id: IntegrationId,
  pub name:           String,
  pub picture:        Option<String>,
  /// Platform identifier, e.g. `"bluesky"` or `"mastodon"`. Opaque to this
  /// system; used for display and client-side filtering only.
  pub provider:       String,
  /// Disabled channels stay visible in the matrix but are flagged so the
  /// grid can dim them. Disabling does not affect mapping operations.
  pub disabled:       bool,
}
