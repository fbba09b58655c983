//! [`MatrixService`]: the single locus of matrix business rules.

use std::collections::HashMap;

use uuid::Uuid;

use weft_core::{
  directory::{IntegrationDirectory, SoulDirectory},
  id::{IntegrationId, OrgId, SoulId},
  integration::IntegrationDetails,
  mapping::{
    DEFAULT_PRIORITY, MAX_BULK_ITEMS, Mapping, MappingPatch, NewMapping,
    validate_notes, validate_priority,
  },
  matrix::{
    BulkError, BulkItem, BulkOperation, BulkReport, BulkRequest,
    MappingDetail, MappingList, MatrixSoul, MatrixSummary, MatrixView,
    ToggleOutcome,
  },
  soul::Soul,
  store::{CreateResult, MappingFilter, MappingStore},
};

use crate::{Error, Result};

/// Souls fetched per matrix view when the deployment does not configure a
/// cap of its own.
pub const DEFAULT_SOUL_LIMIT: usize = 500;

// ─── Service ─────────────────────────────────────────────────────────────────

/// The matrix service over a mapping store and the two identity directories.
///
/// Mappings reference souls and integrations by plain id with no database
/// enforcement behind them, so every write validates its references here
/// first. Invariants that must hold under concurrency (the natural key, the
/// single primary per soul) are enforced by the store; this layer turns
/// their outcomes into caller-facing errors.
pub struct MatrixService<M, S, I> {
  mappings:     M,
  souls:        S,
  integrations: I,
  soul_limit:   usize,
}

impl<M, S, I> MatrixService<M, S, I>
where
  M: MappingStore,
  S: SoulDirectory,
  I: IntegrationDirectory,
{
  pub fn new(mappings: M, souls: S, integrations: I) -> Self {
    Self {
      mappings,
      souls,
      integrations,
      soul_limit: DEFAULT_SOUL_LIMIT,
    }
  }

  /// Cap on souls fetched per matrix view.
  pub fn with_soul_limit(mut self, limit: usize) -> Self {
    self.soul_limit = limit;
    self
  }

  // ── Reference lookups ───────────────────────────────────────────────────

  async fn require_soul(&self, org: &OrgId, soul: &SoulId) -> Result<Soul> {
    self
      .souls
      .get_soul(org, soul)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::SoulNotFound(soul.clone()))
  }

  async fn require_integration(
    &self,
    org: &OrgId,
    integration: &IntegrationId,
  ) -> Result<IntegrationDetails> {
    self
      .integrations
      .get_integration(org, integration)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::IntegrationNotFound(integration.clone()))
  }

  /// Attach integration display details to a mapping. Absence is not an
  /// error here; the integration may have been soft-deleted after the
  /// mapping was written.
  async fn enrich(
    &self,
    org: &OrgId,
    mapping: Mapping,
  ) -> Result<MappingDetail> {
    let integration = self
      .integrations
      .get_integration(org, &mapping.integration_id)
      .await
      .map_err(Error::store)?;
    Ok(MappingDetail { mapping, integration })
  }

  // ── Views ───────────────────────────────────────────────────────────────

  /// Assemble the full grid: souls (up to the configured cap), all live
  /// integrations, and one page of mappings. The per-soul integration index
  /// is built from the returned mappings, so it reflects the active filters.
  pub async fn get_matrix(
    &self,
    org: &OrgId,
    filter: &MappingFilter,
  ) -> Result<MatrixView> {
    let souls = self
      .souls
      .list_souls(org, self.soul_limit)
      .await
      .map_err(Error::store)?;
    let integrations = self
      .integrations
      .list_integrations(org)
      .await
      .map_err(Error::store)?;
    let page = self
      .mappings
      .find_all(org, filter)
      .await
      .map_err(Error::store)?;

    let mut by_soul: HashMap<SoulId, Vec<IntegrationId>> = HashMap::new();
    for mapping in &page.mappings {
      by_soul
        .entry(mapping.soul_id.clone())
        .or_default()
        .push(mapping.integration_id.clone());
    }

    let summary = MatrixSummary {
      total_souls:        souls.len(),
      total_integrations: integrations.len(),
      total_mappings:     page.total,
    };

    let souls = souls
      .into_iter()
      .map(|soul| {
        let integration_ids =
          by_soul.remove(&soul.soul_id).unwrap_or_default();
        MatrixSoul { soul, integration_ids }
      })
      .collect();

    Ok(MatrixView {
      souls,
      integrations,
      mappings: page.mappings,
      summary,
    })
  }

  /// Every mapping for one soul, primary first.
  pub async fn get_integrations_for_soul(
    &self,
    org: &OrgId,
    soul: &SoulId,
  ) -> Result<MappingList> {
    self.require_soul(org, soul).await?;
    let mappings = self
      .mappings
      .find_by_soul(org, soul)
      .await
      .map_err(Error::store)?;
    Ok(MappingList { count: mappings.len(), mappings })
  }

  /// Every mapping for one integration, primary first.
  pub async fn get_souls_for_integration(
    &self,
    org: &OrgId,
    integration: &IntegrationId,
  ) -> Result<MappingList> {
    self.require_integration(org, integration).await?;
    let mappings = self
      .mappings
      .find_by_integration(org, integration)
      .await
      .map_err(Error::store)?;
    Ok(MappingList { count: mappings.len(), mappings })
  }

  pub async fn get_mapping(&self, org: &OrgId, id: Uuid) -> Result<Mapping> {
    self
      .mappings
      .find_by_id(org, id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::MappingNotFound(id))
  }

  // ── Writes ──────────────────────────────────────────────────────────────

  /// Create a mapping after validating that both referenced identities
  /// exist.
  ///
  /// The pair is checked twice: a lookup here for the common case, and the
  /// store's own natural-key enforcement for the race where two creates
  /// pass the lookup together. Both report the same conflict.
  pub async fn create_mapping(
    &self,
    org: &OrgId,
    input: NewMapping,
  ) -> Result<MappingDetail> {
    input.validate()?;
    self.require_soul(org, &input.soul_id).await?;
    self.require_integration(org, &input.integration_id).await?;

    if self
      .mappings
      .find_by_pair(org, &input.soul_id, &input.integration_id)
      .await
      .map_err(Error::store)?
      .is_some()
    {
      return Err(Error::PairExists {
        soul_id:        input.soul_id,
        integration_id: input.integration_id,
      });
    }

    let soul_id = input.soul_id.clone();
    let integration_id = input.integration_id.clone();
    match self.mappings.create(org, input).await.map_err(Error::store)? {
      CreateResult::Created(mapping) => self.enrich(org, mapping).await,
      CreateResult::DuplicatePair => {
        Err(Error::PairExists { soul_id, integration_id })
      }
    }
  }

  /// Flip a pair: delete the mapping if one exists, create a defaults-only
  /// one (non-primary, priority 0) if none does.
  pub async fn toggle_mapping(
    &self,
    org: &OrgId,
    soul: &SoulId,
    integration: &IntegrationId,
    actor: Option<String>,
  ) -> Result<ToggleOutcome> {
    self.require_soul(org, soul).await?;
    self.require_integration(org, integration).await?;

    let existing = self
      .mappings
      .find_by_pair(org, soul, integration)
      .await
      .map_err(Error::store)?;

    if existing.is_some() {
      // Racing deletes both observe Deleted; the pair is gone either way.
      self
        .mappings
        .delete_by_pair(org, soul, integration)
        .await
        .map_err(Error::store)?;
      return Ok(ToggleOutcome::Deleted);
    }

    let mut input = NewMapping::new(soul.clone(), integration.clone());
    input.created_by = actor;

    match self.mappings.create(org, input).await.map_err(Error::store)? {
      CreateResult::Created(mapping) => Ok(ToggleOutcome::Created { mapping }),
      // Lost a create race after observing absence.
      CreateResult::DuplicatePair => Err(Error::PairExists {
        soul_id:        soul.clone(),
        integration_id: integration.clone(),
      }),
    }
  }

  pub async fn update_mapping(
    &self,
    org: &OrgId,
    id: Uuid,
    patch: MappingPatch,
  ) -> Result<MappingDetail> {
    patch.validate()?;
    let mapping = self
      .mappings
      .update(org, id, patch)
      .await
      .map_err(Error::store)?
      .ok_or(Error::MappingNotFound(id))?;
    self.enrich(org, mapping).await
  }

  pub async fn delete_mapping(&self, org: &OrgId, id: Uuid) -> Result<()> {
    if !self.mappings.delete(org, id).await.map_err(Error::store)? {
      return Err(Error::MappingNotFound(id));
    }
    Ok(())
  }

  /// Make the mapping its soul's sole primary channel. The demotion of
  /// sibling primaries and the promotion land atomically in the store.
  pub async fn set_primary_channel(
    &self,
    org: &OrgId,
    id: Uuid,
  ) -> Result<MappingDetail> {
    let mapping = self
      .mappings
      .set_primary(org, id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::MappingNotFound(id))?;
    self.enrich(org, mapping).await
  }

  // ── Bulk ────────────────────────────────────────────────────────────────

  /// Apply a batch of creates or deletes, best effort.
  ///
  /// Only a bad item count rejects the request whole. Every item is first
  /// validated independently, then the survivors are applied one by one;
  /// failures accumulate in the report and never roll back other items.
  /// Backend failures are not per-item outcomes; they abort the request.
  pub async fn bulk_operations(
    &self,
    org: &OrgId,
    request: BulkRequest,
    actor: Option<String>,
  ) -> Result<BulkReport> {
    let requested = request.mappings.len();
    if requested == 0 || requested > MAX_BULK_ITEMS {
      return Err(Error::InvalidRequest(format!(
        "bulk request must contain between 1 and {MAX_BULK_ITEMS} mappings, \
         got {requested}"
      )));
    }

    let operation = request.operation;
    let mut errors = Vec::new();
    let mut valid = Vec::new();

    for item in request.mappings {
      match self.validate_item(org, &item, operation).await {
        Ok(()) => valid.push(item),
        Err(Error::Store(e)) => return Err(Error::Store(e)),
        Err(e) => errors.push(BulkError {
          soul_id:        item.soul_id,
          integration_id: item.integration_id,
          error:          e.to_string(),
        }),
      }
    }

    let mut succeeded = 0;
    let mut created_ids = Vec::new();

    for item in valid {
      let outcome = match operation {
        BulkOperation::Create => {
          self.apply_bulk_create(org, &item, actor.clone()).await
        }
        BulkOperation::Delete => self.apply_bulk_delete(org, &item).await,
      };
      match outcome {
        Ok(created) => {
          succeeded += 1;
          if let Some(id) = created {
            created_ids.push(id);
          }
        }
        Err(Error::Store(e)) => return Err(Error::Store(e)),
        Err(e) => errors.push(BulkError {
          soul_id:        item.soul_id,
          integration_id: item.integration_id,
          error:          e.to_string(),
        }),
      }
    }

    tracing::debug!(
      org = %org,
      ?operation,
      requested,
      succeeded,
      failed = errors.len(),
      "bulk batch applied"
    );

    Ok(BulkReport {
      succeeded,
      failed: errors.len(),
      created_ids: (operation == BulkOperation::Create).then_some(created_ids),
      errors,
    })
  }

  async fn validate_item(
    &self,
    org: &OrgId,
    item: &BulkItem,
    operation: BulkOperation,
  ) -> Result<()> {
    self.require_soul(org, &item.soul_id).await?;
    self.require_integration(org, &item.integration_id).await?;
    if operation == BulkOperation::Create {
      if let Some(priority) = item.priority {
        validate_priority(priority)?;
      }
      validate_notes(item.notes.as_deref())?;
    }
    Ok(())
  }

  /// Bulk items never create primaries; promotion is a deliberate
  /// single-mapping act.
  async fn apply_bulk_create(
    &self,
    org: &OrgId,
    item: &BulkItem,
    actor: Option<String>,
  ) -> Result<Option<Uuid>> {
    let input = NewMapping {
      soul_id:        item.soul_id.clone(),
      integration_id: item.integration_id.clone(),
      is_primary:     false,
      priority:       item.priority.unwrap_or(DEFAULT_PRIORITY),
      notes:          item.notes.clone(),
      created_by:     actor,
    };
    match self.mappings.create(org, input).await.map_err(Error::store)? {
      CreateResult::Created(mapping) => Ok(Some(mapping.mapping_id)),
      CreateResult::DuplicatePair => Err(Error::PairExists {
        soul_id:        item.soul_id.clone(),
        integration_id: item.integration_id.clone(),
      }),
    }
  }

  async fn apply_bulk_delete(
    &self,
    org: &OrgId,
    item: &BulkItem,
  ) -> Result<Option<Uuid>> {
    let deleted = self
      .mappings
      .delete_by_pair(org, &item.soul_id, &item.integration_id)
      .await
      .map_err(Error::store)?;
    if deleted {
      Ok(None)
    } else {
      Err(Error::PairNotFound {
        soul_id:        item.soul_id.clone(),
        integration_id: item.integration_id.clone(),
      })
    }
  }
}
