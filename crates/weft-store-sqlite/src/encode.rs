//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, UUIDs as hyphenated lowercase
//! strings. Booleans and priorities live in INTEGER columns and need no
//! encoding, only a range check on the way out.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use weft_core::{
  id::{IntegrationId, OrgId, SoulId},
  mapping::{Mapping, MAX_PRIORITY},
};

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn decode_priority(v: i64) -> Result<u8> {
  u8::try_from(v)
    .ok()
    .filter(|p| *p <= MAX_PRIORITY)
    .ok_or_else(|| Error::Decode(format!("priority {v} out of range")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `mappings` row, in column order.
pub struct RawMapping {
  pub mapping_id:     String,
  pub org_id:         String,
  pub soul_id:        String,
  pub integration_id: String,
  pub is_primary:     bool,
  pub priority:       i64,
  pub notes:          Option<String>,
  pub created_by:     Option<String>,
  pub created_at:     String,
  pub updated_at:     String,
}

impl RawMapping {
  /// Read a row produced by a `SELECT` over `MAPPING_COLUMNS`, in that exact
  /// column order.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      mapping_id:     row.get(0)?,
      org_id:         row.get(1)?,
      soul_id:        row.get(2)?,
      integration_id: row.get(3)?,
      is_primary:     row.get(4)?,
      priority:       row.get(5)?,
      notes:          row.get(6)?,
      created_by:     row.get(7)?,
      created_at:     row.get(8)?,
      updated_at:     row.get(9)?,
    })
  }

  pub fn into_mapping(self) -> Result<Mapping> {
    Ok(Mapping {
      mapping_id:     decode_uuid(&self.mapping_id)?,
      org_id:         OrgId::new(self.org_id),
      soul_id:        SoulId::new(self.soul_id),
      integration_id: IntegrationId::new(self.integration_id),
      is_primary:     self.is_primary,
      priority:       decode_priority(self.priority)?,
      notes:          self.notes,
      created_by:     self.created_by,
      created_at:     decode_dt(&self.created_at)?,
      updated_at:     decode_dt(&self.updated_at)?,
    })
  }
}
