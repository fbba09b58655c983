//! [`SoulDocStore`]: souls as JSON documents in their own SQLite file.
//!
//! The soul catalog belongs to a different system; we mirror its
//! document-store shape rather than normalising it. Rows are
//! `(org_id, soul_id, doc)` and the document is parsed on read, so documents
//! carrying fields this crate does not know about still load fine.

use std::path::Path;

use rusqlite::OptionalExtension as _;

use weft_core::{
  directory::SoulDirectory,
  id::{OrgId, SoulId},
  soul::Soul,
};

use crate::{schema::SOUL_SCHEMA, Result};

/// Soul document store. Cloning is cheap; the inner connection is
/// reference-counted.
#[derive(Clone)]
pub struct SoulDocStore {
  conn: tokio_rusqlite::Connection,
}

impl SoulDocStore {
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
        conn.execute_batch(SOUL_SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Insert or replace a soul document. Used by the owning directory
  /// service, the seed loader, and tests, never by the matrix service.
  pub async fn put_soul(&self, org: &OrgId, soul: &Soul) -> Result<()> {
    let org_str  = org.as_str().to_owned();
    let soul_str = soul.soul_id.as_str().to_owned();
    let doc      = serde_json::to_string(soul)?;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO souls (org_id, soul_id, doc) VALUES (?1, ?2, ?3)
           ON CONFLICT (org_id, soul_id) DO UPDATE SET doc = excluded.doc",
          rusqlite::params![org_str, soul_str, doc],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

impl SoulDirectory for SoulDocStore {
  type Error = crate::Error;

  async fn get_soul(&self, org: &OrgId, soul: &SoulId) -> Result<Option<Soul>> {
    let org_str  = org.as_str().to_owned();
    let soul_str = soul.as_str().to_owned();

    let doc: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT doc FROM souls WHERE org_id = ?1 AND soul_id = ?2",
              rusqlite::params![org_str, soul_str],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    Ok(doc.as_deref().map(serde_json::from_str::<Soul>).transpose()?)
  }

  async fn list_souls(&self, org: &OrgId, limit: usize) -> Result<Vec<Soul>> {
    let org_str   = org.as_str().to_owned();
    let limit_val = limit as i64;

    let docs: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT doc FROM souls WHERE org_id = ?1 ORDER BY soul_id LIMIT ?2",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![org_str, limit_val], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    docs
      .iter()
      .map(|doc| serde_json::from_str::<Soul>(doc).map_err(crate::Error::Json))
      .collect()
  }
}
