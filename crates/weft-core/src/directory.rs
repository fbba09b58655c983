//! Directory traits for the two identity catalogs mappings refer to.
//!
//! Souls and integrations are owned by systems outside the mapping store
//! (souls live in a document store, integrations in a relational one), so the
//! service layer reaches them through these read-side traits. Mappings hold
//! plain ids into both catalogs; referential integrity is validated at the
//! service layer, never by the database.

use std::future::Future;

use crate::{
  id::{IntegrationId, OrgId, SoulId},
  integration::IntegrationDetails,
  soul::Soul,
};

// ─── Souls ───────────────────────────────────────────────────────────────────

/// Read access to the soul catalog.
pub trait SoulDirectory: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Look up a single soul. `None` when absent in this tenant.
  fn get_soul<'a>(
    &'a self,
    org: &'a OrgId,
    soul: &'a SoulId,
  ) -> impl Future<Output = Result<Option<Soul>, Self::Error>> + Send + 'a;

  /// Up to `limit` souls for an organization, ordered by id for stable
  /// pagination across calls.
  fn list_souls<'a>(
    &'a self,
    org: &'a OrgId,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Soul>, Self::Error>> + Send + 'a;
}

// ─── Integrations ────────────────────────────────────────────────────────────

/// Read access to the integration catalog.
///
/// Integrations are soft-deleted upstream; implementations must treat a
/// soft-deleted row as absent from both methods.
pub trait IntegrationDirectory: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Look up a single integration. `None` when absent or soft-deleted.
  fn get_integration<'a>(
    &'a self,
    org: &'a OrgId,
    integration: &'a IntegrationId,
  ) -> impl Future<Output = Result<Option<IntegrationDetails>, Self::Error>> + Send + 'a;

  /// All live integrations for an organization, ordered by name.
  fn list_integrations<'a>(
    &'a self,
    org: &'a OrgId,
  ) -> impl Future<Output = Result<Vec<IntegrationDetails>, Self::Error>> + Send + 'a;
}
