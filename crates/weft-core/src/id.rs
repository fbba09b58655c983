//! Opaque identifier newtypes.
//!
//! Soul, integration, and organization ids are minted by their owning
//! directories, not by this system, so they are carried as opaque strings.
//! Distinct wrapper types keep the three from being swapped at a call site.
//! Mapping ids are store-assigned [`uuid::Uuid`]s and need no wrapper.

use std::fmt;

use serde::{Deserialize, Serialize};

// ─── OrgId ───────────────────────────────────────────────────────────────────

/// Tenant scope. Every store and directory operation takes one explicitly;
/// there is no ambient "current organization".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrgId(String);

impl OrgId {
  pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for OrgId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for OrgId {
  fn from(s: &str) -> Self { Self(s.to_owned()) }
}

impl From<String> for OrgId {
  fn from(s: String) -> Self { Self(s) }
}

// ─── SoulId ──────────────────────────────────────────────────────────────────

/// Identifier of a soul in the soul directory's document store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SoulId(String);

impl SoulId {
  pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for SoulId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for SoulId {
  fn from(s: &str) -> Self { Self(s.to_owned()) }
}

impl From<String> for SoulId {
  fn from(s: String) -> Self { Self(s) }
}

// ─── IntegrationId ───────────────────────────────────────────────────────────

/// Identifier of a channel in the integration directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntegrationId(String);

impl IntegrationId {
  pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for IntegrationId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for IntegrationId {
  fn from(s: &str) -> Self { Self(s.to_owned()) }
}

impl From<String> for IntegrationId {
  fn from(s: String) -> Self { Self(s) }
}
