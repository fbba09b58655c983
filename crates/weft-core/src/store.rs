//! The `MappingStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `weft-store-sqlite`).
//! The service layer depends on this abstraction, never on a concrete
//! backend, and is the only caller; the API layer goes through the service.

use std::future::Future;

use uuid::Uuid;

use crate::{
  id::{IntegrationId, OrgId, SoulId},
  mapping::{Mapping, MappingPatch, NewMapping},
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Filters for [`MappingStore::find_all`].
///
/// Unset fields are ignored; they never mean "match nothing".
#[derive(Debug, Clone, Default)]
pub struct MappingFilter {
  pub soul_id:        Option<SoulId>,
  pub integration_id: Option<IntegrationId>,
  pub is_primary:     Option<bool>,
  pub limit:          Option<usize>,
  pub offset:         Option<usize>,
}

/// One page of mappings plus the total row count matching the filters before
/// limit/offset were applied.
#[derive(Debug, Clone)]
pub struct MappingPage {
  pub mappings: Vec<Mapping>,
  pub total:    usize,
}

/// Outcome of [`MappingStore::create`].
///
/// The natural-key violation is part of the trait's vocabulary rather than a
/// backend error so that callers generic over the store can report a conflict
/// without downcasting `Self::Error`.
#[derive(Debug, Clone)]
pub enum CreateResult {
  Created(Mapping),
  /// A mapping already exists for this `(org, soul, integration)` triple.
  /// A create never silently overwrites it.
  DuplicatePair,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a tenant-scoped mapping store backend.
///
/// Every operation takes an explicit [`OrgId`]; an id that belongs to another
/// tenant must behave exactly like one that does not exist. Writes that touch
/// `is_primary` (create-as-primary, patch-to-primary, [`set_primary`]) must
/// demote conflicting siblings and apply the change as a single atomic unit:
/// no reader may ever observe two primaries for one soul, nor a gap where one
/// existed before.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
///
/// [`set_primary`]: MappingStore::set_primary
pub trait MappingStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Page through an organization's mappings with optional filters.
  fn find_all<'a>(
    &'a self,
    org: &'a OrgId,
    filter: &'a MappingFilter,
  ) -> impl Future<Output = Result<MappingPage, Self::Error>> + Send + 'a;

  /// Retrieve a mapping by id. `None` when absent in this tenant, including
  /// when the id exists under a different organization.
  fn find_by_id<'a>(
    &'a self,
    org: &'a OrgId,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Mapping>, Self::Error>> + Send + 'a;

  /// The at-most-one mapping for a `(soul, integration)` pair.
  fn find_by_pair<'a>(
    &'a self,
    org: &'a OrgId,
    soul: &'a SoulId,
    integration: &'a IntegrationId,
  ) -> impl Future<Output = Result<Option<Mapping>, Self::Error>> + Send + 'a;

  /// All mappings for a soul, primary first, then ascending priority.
  fn find_by_soul<'a>(
    &'a self,
    org: &'a OrgId,
    soul: &'a SoulId,
  ) -> impl Future<Output = Result<Vec<Mapping>, Self::Error>> + Send + 'a;

  /// All mappings for a channel, primary first, then ascending priority.
  fn find_by_integration<'a>(
    &'a self,
    org: &'a OrgId,
    integration: &'a IntegrationId,
  ) -> impl Future<Output = Result<Vec<Mapping>, Self::Error>> + Send + 'a;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Persist a new mapping. Duplicate pairs are reported via
  /// [`CreateResult::DuplicatePair`], enforced by the backend even under
  /// concurrent creates. When `input.is_primary` is set, any sibling primary
  /// is demoted within the same atomic unit as the insert.
  fn create<'a>(
    &'a self,
    org: &'a OrgId,
    input: NewMapping,
  ) -> impl Future<Output = Result<CreateResult, Self::Error>> + Send + 'a;

  /// Apply a partial update. Unset patch fields are left untouched. Returns
  /// `None` when the id is absent in this tenant. Patching to primary
  /// demotes sibling primaries within the same atomic unit.
  fn update<'a>(
    &'a self,
    org: &'a OrgId,
    id: Uuid,
    patch: MappingPatch,
  ) -> impl Future<Output = Result<Option<Mapping>, Self::Error>> + Send + 'a;

  /// Physically delete a mapping. Returns `false` when the id was absent,
  /// a no-op at this layer; the service decides whether that is an error.
  fn delete<'a>(
    &'a self,
    org: &'a OrgId,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Delete by natural key. Same no-op semantics as [`delete`].
  ///
  /// [`delete`]: MappingStore::delete
  fn delete_by_pair<'a>(
    &'a self,
    org: &'a OrgId,
    soul: &'a SoulId,
    integration: &'a IntegrationId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Atomically make the mapping its soul's sole primary: resolve the
  /// target's soul, demote every sibling primary, promote the target, all in
  /// one transaction. Returns the updated mapping, or `None` when the id is
  /// absent in this tenant.
  fn set_primary<'a>(
    &'a self,
    org: &'a OrgId,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Mapping>, Self::Error>> + Send + 'a;
}
