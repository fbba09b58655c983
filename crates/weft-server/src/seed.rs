//! TOML fixture loader for the identity catalogs.
//!
//! Souls and integrations are owned by upstream systems; a standalone
//! deployment still needs rows and columns to map, so the server can ingest
//! a fixture file at startup (`--seed fixtures.toml`):
//!
//! ```toml
//! [[souls]]
//! org_id       = "org-1"
//! soul_id      = "soul-ada"
//! display_name = "Ada"
//! email        = "ada@example.com"
//!
//! [[integrations]]
//! org_id         = "org-1"
//! integration_id = "int-chirper"
//! name           = "Chirper Main"
//! provider       = "chirper"
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use weft_core::{
  id::{IntegrationId, OrgId, SoulId},
  integration::IntegrationDetails,
  soul::Soul,
};
use weft_store_sqlite::{SoulDocStore, SqliteMatrixStore};

#[derive(Debug, Error)]
pub enum SeedError {
  #[error("failed to read seed file: {0}")]
  Io(#[from] std::io::Error),
  #[error("failed to parse seed file: {0}")]
  Parse(#[from] toml::de::Error),
  #[error("failed to write seed entry: {0}")]
  Store(#[from] weft_store_sqlite::Error),
}

#[derive(Debug, Deserialize)]
pub struct SeedFile {
  #[serde(default)]
  pub souls:        Vec<SeedSoul>,
  #[serde(default)]
  pub integrations: Vec<SeedIntegration>,
}

#[derive(Debug, Deserialize)]
pub struct SeedSoul {
  pub org_id:       OrgId,
  pub soul_id:      SoulId,
  pub display_name: String,
  pub email:        Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SeedIntegration {
  pub org_id:         OrgId,
  pub integration_id: IntegrationId,
  pub name:           String,
  pub picture:        Option<String>,
  pub provider:       String,
  #[serde(default)]
  pub disabled:       bool,
}

/// Parse a fixture without touching any store.
pub fn parse(input: &str) -> Result<SeedFile, SeedError> {
  Ok(toml::from_str(input)?)
}

/// Write a parsed fixture into the two stores. Entries with ids already
/// present are replaced. Returns `(souls, integrations)` written.
pub async fn apply(
  file: &SeedFile,
  souls: &SoulDocStore,
  matrix: &SqliteMatrixStore,
) -> Result<(usize, usize), SeedError> {
  for entry in &file.souls {
    souls
      .put_soul(&entry.org_id, &Soul {
        soul_id:      entry.soul_id.clone(),
        display_name: entry.display_name.clone(),
        email:        entry.email.clone(),
      })
      .await?;
  }

  for entry in &file.integrations {
    matrix
      .put_integration(&entry.org_id, &IntegrationDetails {
        integration_id: entry.integration_id.clone(),
        name:           entry.name.clone(),
        picture:        entry.picture.clone(),
        provider:       entry.provider.clone(),
        disabled:       entry.disabled,
      })
      .await?;
  }

  Ok((file.souls.len(), file.integrations.len()))
}

/// Read the fixture at `path` and apply it to both stores.
pub async fn load(
  path: &Path,
  souls: &SoulDocStore,
  matrix: &SqliteMatrixStore,
) -> Result<(usize, usize), SeedError> {
  let file = parse(&std::fs::read_to_string(path)?)?;
  apply(&file, souls, matrix).await
}

#[cfg(test)]
mod tests {
  use weft_core::directory::{IntegrationDirectory, SoulDirectory};

  use super::*;

  const FIXTURE: &str = r#"
    [[souls]]
    org_id       = "org-1"
    soul_id      = "soul-ada"
    display_name = "Ada"
    email        = "ada@example.com"

    [[souls]]
    org_id       = "org-1"
    soul_id      = "soul-brio"
    display_name = "Brio"

    [[integrations]]
    org_id         = "org-1"
    integration_id = "int-chirper"
    name           = "Chirper Main"
    provider       = "chirper"

    [[integrations]]
    org_id         = "org-1"
    integration_id = "int-album"
    name           = "Album Backup"
    provider       = "album"
    disabled       = true
  "#;

  #[test]
  fn fixture_parses() {
    let file = parse(FIXTURE).unwrap();
    assert_eq!(file.souls.len(), 2);
    assert_eq!(file.integrations.len(), 2);
    assert_eq!(file.souls[1].email, None);
    assert!(file.integrations[1].disabled);
  }

  #[tokio::test]
  async fn fixture_applies_to_the_stores() {
    let matrix = SqliteMatrixStore::open_in_memory().await.unwrap();
    let souls = SoulDocStore::open_in_memory().await.unwrap();

    let file = parse(FIXTURE).unwrap();
    let (soul_count, integration_count) =
      apply(&file, &souls, &matrix).await.unwrap();
    assert_eq!((soul_count, integration_count), (2, 2));

    let org = OrgId::new("org-1");
    let ada = souls
      .get_soul(&org, &SoulId::new("soul-ada"))
      .await
      .unwrap()
      .unwrap();
    assert_eq!(ada.display_name, "Ada");

    let album = matrix
      .get_integration(&org, &IntegrationId::new("int-album"))
      .await
      .unwrap()
      .unwrap();
    assert!(album.disabled);
  }
}
