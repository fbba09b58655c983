//! Error type for `weft-service`.
//!
//! Variants map one-to-one onto caller-facing failure classes: the not-found
//! family, the pair conflict, invalid input, and backend trouble. The API
//! layer translates them to status codes without inspecting messages.

use thiserror::Error;
use uuid::Uuid;

use weft_core::id::{IntegrationId, SoulId};

#[derive(Debug, Error)]
pub enum Error {
  #[error("soul not found: {0}")]
  SoulNotFound(SoulId),

  #[error("integration not found: {0}")]
  IntegrationNotFound(IntegrationId),

  #[error("mapping not found: {0}")]
  MappingNotFound(Uuid),

  /// The `(soul, integration)` pair already has a mapping. Creates never
  /// overwrite it.
  #[error(
    "a mapping for soul {soul_id} and integration {integration_id} \
     already exists"
  )]
  PairExists {
    soul_id:        SoulId,
    integration_id: IntegrationId,
  },

  /// A pair-addressed operation found no mapping to act on. Only surfaced
  /// per item from bulk deletes; a toggle treats the absence as its create
  /// branch instead.
  #[error("no mapping exists for soul {soul_id} and integration {integration_id}")]
  PairNotFound {
    soul_id:        SoulId,
    integration_id: IntegrationId,
  },

  #[error("invalid request: {0}")]
  InvalidRequest(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Box a backend error. The store and directory error types vary with the
  /// service's type parameters, so they are erased at this boundary.
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }
}

/// Field-range failures from `weft-core` are invalid requests.
impl From<weft_core::Error> for Error {
  fn from(err: weft_core::Error) -> Self {
    Self::InvalidRequest(err.to_string())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
