//! Mapping: the association record linking one soul to one channel.
//!
//! Mappings are the only entity this system owns. The natural key is the
//! `(org_id, soul_id, integration_id)` triple; per `(org_id, soul_id)` at
//! most one mapping may be primary at any time. Deletion is physical; there
//! is no soft-delete for mappings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  id::{IntegrationId, OrgId, SoulId},
};

// ─── Limits ──────────────────────────────────────────────────────────────────

/// Upper bound (inclusive) for [`Mapping::priority`].
pub const MAX_PRIORITY: u8 = 100;

/// Priority assigned when the caller does not supply one.
pub const DEFAULT_PRIORITY: u8 = 0;

/// Maximum length of [`Mapping::notes`] in characters.
pub const MAX_NOTES_LEN: usize = 500;

/// Maximum number of items in one bulk request.
pub const MAX_BULK_ITEMS: usize = 100;

/// Check a priority value against [`MAX_PRIORITY`].
pub fn validate_priority(priority: u8) -> Result<()> {
  if priority > MAX_PRIORITY {
    return Err(Error::PriorityOutOfRange(priority));
  }
  Ok(())
}

/// Check a notes value against [`MAX_NOTES_LEN`]. Counts characters, not
/// bytes.
pub fn validate_notes(notes: Option<&str>) -> Result<()> {
  if let Some(n) = notes {
    let chars = n.chars().count();
    if chars > MAX_NOTES_LEN {
      return Err(Error::NotesTooLong(chars));
    }
  }
  Ok(())
}

// ─── Mapping ─────────────────────────────────────────────────────────────────

/// A soul ↔ channel association within one organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
  /// Store-assigned at creation.
  pub mapping_id:     Uuid,
  pub org_id:         OrgId,
  pub soul_id:        SoulId,
  pub integration_id: IntegrationId,
  /// At most one primary mapping per `(org_id, soul_id)` at any time.
  pub is_primary:     bool,
  /// Ordering weight, 0–100. No uniqueness constraint.
  pub priority:       u8,
  /// Free text, at most 500 characters.
  pub notes:          Option<String>,
  /// Actor captured at creation; never mutated afterwards.
  pub created_by:     Option<String>,
  pub created_at:     DateTime<Utc>,
  /// Bumped on every mutation, including sibling demotion caused by a
  /// primary promotion.
  pub updated_at:     DateTime<Utc>,
}

// ─── NewMapping ──────────────────────────────────────────────────────────────

/// Input to [`crate::store::MappingStore::create`]. The id and both
/// timestamps are assigned by the store; they are not accepted from callers.
#[derive(Debug, Clone)]
pub struct NewMapping {
  pub soul_id:        SoulId,
  pub integration_id: IntegrationId,
  pub is_primary:     bool,
  pub priority:       u8,
  pub notes:          Option<String>,
  pub created_by:     Option<String>,
}

impl NewMapping {
  /// Convenience constructor: non-primary, default priority, no notes or
  /// creator. This is exactly what a toggle's create branch uses.
  pub fn new(soul_id: SoulId, integration_id: IntegrationId) -> Self {
    Self {
      soul_id,
      integration_id,
      is_primary: false,
      priority: DEFAULT_PRIORITY,
      notes: None,
      created_by: None,
    }
  }

  /// Validate field ranges. Existence of the referenced soul and channel is
  /// the service layer's job, not this type's.
  pub fn validate(&self) -> Result<()> {
    validate_priority(self.priority)?;
    validate_notes(self.notes.as_deref())
  }
}

// ─── MappingPatch ────────────────────────────────────────────────────────────

/// Partial update for a mapping. Unset fields are left untouched; `None`
/// never means "clear".
#[derive(Debug, Clone, Default)]
pub struct MappingPatch {
  pub is_primary: Option<bool>,
  pub priority:   Option<u8>,
  pub notes:      Option<String>,
}

impl MappingPatch {
  /// `true` when no field is set; applying such a patch changes nothing,
  /// not even `updated_at`.
  pub fn is_empty(&self) -> bool {
    self.is_primary.is_none() && self.priority.is_none() && self.notes.is_none()
  }

  pub fn validate(&self) -> Result<()> {
    if let Some(p) = self.priority {
      validate_priority(p)?;
    }
    validate_notes(self.notes.as_deref())
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn new_mapping_defaults_are_secondary() {
    let m = NewMapping::new(SoulId::from("s1"), IntegrationId::from("i1"));
    assert!(!m.is_primary);
    assert_eq!(m.priority, DEFAULT_PRIORITY);
    assert!(m.notes.is_none());
    assert!(m.created_by.is_none());
    assert!(m.validate().is_ok());
  }

  #[test]
  fn priority_above_bound_rejected() {
    let mut m = NewMapping::new(SoulId::from("s1"), IntegrationId::from("i1"));
    m.priority = 101;
    assert!(matches!(
      m.validate(),
      Err(Error::PriorityOutOfRange(101))
    ));
  }

  #[test]
  fn notes_over_limit_rejected_by_chars_not_bytes() {
    // 500 multi-byte characters are fine; 501 are not.
    let ok = "ü".repeat(MAX_NOTES_LEN);
    assert!(validate_notes(Some(&ok)).is_ok());

    let too_long = "ü".repeat(MAX_NOTES_LEN + 1);
    assert!(matches!(
      validate_notes(Some(&too_long)),
      Err(Error::NotesTooLong(n)) if n == MAX_NOTES_LEN + 1
    ));
  }

  #[test]
  fn empty_patch_is_empty() {
    assert!(MappingPatch::default().is_empty());
    let patch = MappingPatch { is_primary: Some(true), ..Default::default() };
    assert!(!patch.is_empty());
  }
}
