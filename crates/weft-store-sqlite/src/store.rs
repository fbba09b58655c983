//! [`SqliteMatrixStore`]: the SQLite implementation of [`MappingStore`] and
//! [`IntegrationDirectory`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use weft_core::{
  directory::IntegrationDirectory,
  id::{IntegrationId, OrgId, SoulId},
  integration::IntegrationDetails,
  mapping::{Mapping, MappingPatch, NewMapping},
  store::{CreateResult, MappingFilter, MappingPage, MappingStore},
};

use crate::{
  encode::{encode_dt, encode_uuid, RawMapping},
  schema::MATRIX_SCHEMA,
  Error, Result,
};

/// `mappings` columns in the order [`RawMapping::from_row`] reads them.
pub const MAPPING_COLUMNS: &str = "mapping_id, org_id, soul_id, \
   integration_id, is_primary, priority, notes, created_by, created_at, \
   updated_at";

/// Shared WHERE clause for filtered mapping queries. NULL parameters switch
/// their condition off, so one statement serves every filter combination
/// with a fixed parameter layout (?1 org, ?2 soul, ?3 integration,
/// ?4 is_primary).
const MAPPING_FILTER: &str = "WHERE org_id = ?1
   AND (?2 IS NULL OR soul_id = ?2)
   AND (?3 IS NULL OR integration_id = ?3)
   AND (?4 IS NULL OR is_primary = ?4)";

// ─── Store ───────────────────────────────────────────────────────────────────

/// The matrix store backed by a single SQLite file: mapping rows plus the
/// integration catalog.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteMatrixStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteMatrixStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(MATRIX_SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Fetch one mapping row by a WHERE clause with up to three string
  /// parameters, in column order.
  async fn fetch_one(
    &self,
    where_clause: &'static str,
    params: Vec<String>,
  ) -> Result<Option<Mapping>> {
    let raw: Option<RawMapping> = self
      .conn
      .call(move |conn| {
        let sql =
          format!("SELECT {MAPPING_COLUMNS} FROM mappings {where_clause}");
        Ok(
          conn
            .query_row(
              &sql,
              rusqlite::params_from_iter(params),
              RawMapping::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawMapping::into_mapping).transpose()
  }

  /// Fetch all mappings for one side of the grid, primary first, then
  /// ascending priority.
  async fn fetch_side(
    &self,
    key_column: &'static str,
    org: &OrgId,
    key: String,
  ) -> Result<Vec<Mapping>> {
    let org_str = org.as_str().to_owned();

    let raws: Vec<RawMapping> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {MAPPING_COLUMNS} FROM mappings
           WHERE org_id = ?1 AND {key_column} = ?2
           ORDER BY is_primary DESC, priority ASC, created_at ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![org_str, key], RawMapping::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMapping::into_mapping).collect()
  }
}

// ─── MappingStore impl ───────────────────────────────────────────────────────

impl MappingStore for SqliteMatrixStore {
  type Error = Error;

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn find_all(
    &self,
    org: &OrgId,
    filter: &MappingFilter,
  ) -> Result<MappingPage> {
    let org_str = org.as_str().to_owned();
    let soul_str = filter.soul_id.as_ref().map(|s| s.as_str().to_owned());
    let int_str = filter
      .integration_id
      .as_ref()
      .map(|i| i.as_str().to_owned());
    let primary = filter.is_primary;
    // SQLite treats LIMIT -1 as "no limit".
    let limit_val = filter.limit.map(|l| l as i64).unwrap_or(-1);
    let offset_val = filter.offset.unwrap_or(0) as i64;

    let (raws, total): (Vec<RawMapping>, i64) = self
      .conn
      .call(move |conn| {
        let total: i64 = conn.query_row(
          &format!("SELECT COUNT(*) FROM mappings {MAPPING_FILTER}"),
          rusqlite::params![org_str, soul_str, int_str, primary],
          |row| row.get(0),
        )?;

        let sql = format!(
          "SELECT {MAPPING_COLUMNS} FROM mappings {MAPPING_FILTER}
           ORDER BY created_at, mapping_id
           LIMIT ?5 OFFSET ?6"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![
              org_str, soul_str, int_str, primary, limit_val, offset_val
            ],
            RawMapping::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((rows, total))
      })
      .await?;

    let mappings = raws
      .into_iter()
      .map(RawMapping::into_mapping)
      .collect::<Result<Vec<_>>>()?;

    Ok(MappingPage { mappings, total: total as usize })
  }

  async fn find_by_id(&self, org: &OrgId, id: Uuid) -> Result<Option<Mapping>> {
    self
      .fetch_one(
        "WHERE org_id = ?1 AND mapping_id = ?2",
        vec![org.as_str().to_owned(), encode_uuid(id)],
      )
      .await
  }

  async fn find_by_pair(
    &self,
    org: &OrgId,
    soul: &SoulId,
    integration: &IntegrationId,
  ) -> Result<Option<Mapping>> {
    self
      .fetch_one(
        "WHERE org_id = ?1 AND soul_id = ?2 AND integration_id = ?3",
        vec![
          org.as_str().to_owned(),
          soul.as_str().to_owned(),
          integration.as_str().to_owned(),
        ],
      )
      .await
  }

  async fn find_by_soul(
    &self,
    org: &OrgId,
    soul: &SoulId,
  ) -> Result<Vec<Mapping>> {
    self
      .fetch_side("soul_id", org, soul.as_str().to_owned())
      .await
  }

  async fn find_by_integration(
    &self,
    org: &OrgId,
    integration: &IntegrationId,
  ) -> Result<Vec<Mapping>> {
    self
      .fetch_side("integration_id", org, integration.as_str().to_owned())
      .await
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn create(&self, org: &OrgId, input: NewMapping) -> Result<CreateResult> {
    let now = Utc::now();
    let mapping = Mapping {
      mapping_id:     Uuid::new_v4(),
      org_id:         org.clone(),
      soul_id:        input.soul_id,
      integration_id: input.integration_id,
      is_primary:     input.is_primary,
      priority:       input.priority,
      notes:          input.notes,
      created_by:     input.created_by,
      created_at:     now,
      updated_at:     now,
    };

    let id_str   = encode_uuid(mapping.mapping_id);
    let org_str  = mapping.org_id.as_str().to_owned();
    let soul_str = mapping.soul_id.as_str().to_owned();
    let int_str  = mapping.integration_id.as_str().to_owned();
    let primary  = mapping.is_primary;
    let priority = i64::from(mapping.priority);
    let notes    = mapping.notes.clone();
    let creator  = mapping.created_by.clone();
    let now_str  = encode_dt(now);

    let inserted: bool = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        // Demote first so the new row can land as the sole primary. A
        // duplicate-pair rollback below undoes this too.
        if primary {
          tx.execute(
            "UPDATE mappings SET is_primary = 0, updated_at = ?1
             WHERE org_id = ?2 AND soul_id = ?3 AND is_primary = 1",
            rusqlite::params![now_str, org_str, soul_str],
          )?;
        }

        let insert = tx.execute(
          "INSERT INTO mappings (mapping_id, org_id, soul_id, integration_id,
             is_primary, priority, notes, created_by, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          rusqlite::params![
            id_str, org_str, soul_str, int_str, primary, priority, notes,
            creator, now_str, now_str
          ],
        );

        match insert {
          Ok(_) => {}
          // The (org, soul, integration) unique index fired: some other
          // write already owns this pair. Dropping the transaction rolls
          // back any demotion above.
          Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
          {
            return Ok(false);
          }
          Err(e) => return Err(e.into()),
        }

        tx.commit()?;
        Ok(true)
      })
      .await?;

    if inserted {
      Ok(CreateResult::Created(mapping))
    } else {
      Ok(CreateResult::DuplicatePair)
    }
  }

  async fn update(
    &self,
    org: &OrgId,
    id: Uuid,
    patch: MappingPatch,
  ) -> Result<Option<Mapping>> {
    let org_str = org.as_str().to_owned();
    let id_str  = encode_uuid(id);
    let now_str = encode_dt(Utc::now());

    let raw: Option<RawMapping> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let sql = format!(
          "SELECT {MAPPING_COLUMNS} FROM mappings
           WHERE org_id = ?1 AND mapping_id = ?2"
        );
        let current = tx
          .query_row(
            &sql,
            rusqlite::params![org_str, id_str],
            RawMapping::from_row,
          )
          .optional()?;
        let Some(current) = current else { return Ok(None) };

        // An empty patch changes nothing, not even updated_at.
        if patch.is_empty() {
          return Ok(Some(current));
        }

        if patch.is_primary == Some(true) {
          tx.execute(
            "UPDATE mappings SET is_primary = 0, updated_at = ?1
             WHERE org_id = ?2 AND soul_id = ?3 AND is_primary = 1
               AND mapping_id != ?4",
            rusqlite::params![now_str, org_str, current.soul_id, id_str],
          )?;
        }

        let new_primary  = patch.is_primary.unwrap_or(current.is_primary);
        let new_priority =
          patch.priority.map(i64::from).unwrap_or(current.priority);
        let new_notes    = patch.notes.or(current.notes);

        tx.execute(
          "UPDATE mappings
           SET is_primary = ?1, priority = ?2, notes = ?3, updated_at = ?4
           WHERE org_id = ?5 AND mapping_id = ?6",
          rusqlite::params![
            new_primary, new_priority, new_notes, now_str, org_str, id_str
          ],
        )?;

        let updated = tx.query_row(
          &sql,
          rusqlite::params![org_str, id_str],
          RawMapping::from_row,
        )?;

        tx.commit()?;
        Ok(Some(updated))
      })
      .await?;

    raw.map(RawMapping::into_mapping).transpose()
  }

  async fn delete(&self, org: &OrgId, id: Uuid) -> Result<bool> {
    let org_str = org.as_str().to_owned();
    let id_str  = encode_uuid(id);

    let deleted = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "DELETE FROM mappings WHERE org_id = ?1 AND mapping_id = ?2",
          rusqlite::params![org_str, id_str],
        )?;
        Ok(n > 0)
      })
      .await?;

    Ok(deleted)
  }

  async fn delete_by_pair(
    &self,
    org: &OrgId,
    soul: &SoulId,
    integration: &IntegrationId,
  ) -> Result<bool> {
    let org_str  = org.as_str().to_owned();
    let soul_str = soul.as_str().to_owned();
    let int_str  = integration.as_str().to_owned();

    let deleted = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "DELETE FROM mappings
           WHERE org_id = ?1 AND soul_id = ?2 AND integration_id = ?3",
          rusqlite::params![org_str, soul_str, int_str],
        )?;
        Ok(n > 0)
      })
      .await?;

    Ok(deleted)
  }

  async fn set_primary(&self, org: &OrgId, id: Uuid) -> Result<Option<Mapping>> {
    let org_str = org.as_str().to_owned();
    let id_str  = encode_uuid(id);
    let now_str = encode_dt(Utc::now());

    let raw: Option<RawMapping> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let soul_id: Option<String> = tx
          .query_row(
            "SELECT soul_id FROM mappings
             WHERE org_id = ?1 AND mapping_id = ?2",
            rusqlite::params![org_str, id_str],
            |row| row.get(0),
          )
          .optional()?;
        let Some(soul_id) = soul_id else { return Ok(None) };

        tx.execute(
          "UPDATE mappings SET is_primary = 0, updated_at = ?1
           WHERE org_id = ?2 AND soul_id = ?3 AND is_primary = 1
             AND mapping_id != ?4",
          rusqlite::params![now_str, org_str, soul_id, id_str],
        )?;
        tx.execute(
          "UPDATE mappings SET is_primary = 1, updated_at = ?1
           WHERE org_id = ?2 AND mapping_id = ?3",
          rusqlite::params![now_str, org_str, id_str],
        )?;

        let promoted = tx.query_row(
          &format!(
            "SELECT {MAPPING_COLUMNS} FROM mappings
             WHERE org_id = ?1 AND mapping_id = ?2"
          ),
          rusqlite::params![org_str, id_str],
          RawMapping::from_row,
        )?;

        tx.commit()?;
        Ok(Some(promoted))
      })
      .await?;

    raw.map(RawMapping::into_mapping).transpose()
  }
}

// ─── IntegrationDirectory impl ───────────────────────────────────────────────

fn integration_from_row(
  row: &rusqlite::Row<'_>,
) -> rusqlite::Result<IntegrationDetails> {
  Ok(IntegrationDetails {
    integration_id: IntegrationId::new(row.get::<_, String>(0)?),
    name:           row.get(1)?,
    picture:        row.get(2)?,
    provider:       row.get(3)?,
    disabled:       row.get(4)?,
  })
}

impl IntegrationDirectory for SqliteMatrixStore {
  type Error = Error;

  async fn get_integration(
    &self,
    org: &OrgId,
    integration: &IntegrationId,
  ) -> Result<Option<IntegrationDetails>> {
    let org_str = org.as_str().to_owned();
    let int_str = integration.as_str().to_owned();

    let details = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT integration_id, name, picture, provider, disabled
               FROM integrations
               WHERE org_id = ?1 AND integration_id = ?2
                 AND deleted_at IS NULL",
              rusqlite::params![org_str, int_str],
              integration_from_row,
            )
            .optional()?,
        )
      })
      .await?;

    Ok(details)
  }

  async fn list_integrations(
    &self,
    org: &OrgId,
  ) -> Result<Vec<IntegrationDetails>> {
    let org_str = org.as_str().to_owned();

    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT integration_id, name, picture, provider, disabled
           FROM integrations
           WHERE org_id = ?1 AND deleted_at IS NULL
           ORDER BY name",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![org_str], integration_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(rows)
  }
}

// ─── Directory-owned writes ──────────────────────────────────────────────────

impl SqliteMatrixStore {
  /// Insert or refresh a catalog entry. Putting an id that was soft-deleted
  /// revives it. Used by the owning directory service, the seed loader, and
  /// tests, never by the matrix service.
  pub async fn put_integration(
    &self,
    org: &OrgId,
    details: &IntegrationDetails,
  ) -> Result<()> {
    let org_str  = org.as_str().to_owned();
    let int_str  = details.integration_id.as_str().to_owned();
    let name     = details.name.clone();
    let picture  = details.picture.clone();
    let provider = details.provider.clone();
    let disabled = details.disabled;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO integrations
             (integration_id, org_id, name, picture, provider, disabled,
              deleted_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL)
           ON CONFLICT (org_id, integration_id) DO UPDATE SET
             name = excluded.name,
             picture = excluded.picture,
             provider = excluded.provider,
             disabled = excluded.disabled,
             deleted_at = NULL",
          rusqlite::params![int_str, org_str, name, picture, provider, disabled],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Soft-delete a catalog entry. Returns `false` when the id was absent or
  /// already deleted.
  pub async fn remove_integration(
    &self,
    org: &OrgId,
    integration: &IntegrationId,
  ) -> Result<bool> {
    let org_str = org.as_str().to_owned();
    let int_str = integration.as_str().to_owned();
    let now_str = encode_dt(Utc::now());

    let removed = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE integrations SET deleted_at = ?1
           WHERE org_id = ?2 AND integration_id = ?3 AND deleted_at IS NULL",
          rusqlite::params![now_str, org_str, int_str],
        )?;
        Ok(n > 0)
      })
      .await?;

    Ok(removed)
  }
}
