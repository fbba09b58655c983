//! Soul: an identity container owned by the external soul directory.
//!
//! The matrix core never creates, updates, or deletes souls; it validates
//! existence and reads display attributes, nothing more.

use serde::{Deserialize, Serialize};

use crate::id::SoulId;

/// Display attributes for a soul, as returned by the soul directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Soul {
  pub soul_id:      SoulId,
  pub display_name: String,
  pub email:        Option<String>,
}
