//! Caller identity, as established by the hosting server.

use axum::{extract::FromRequestParts, http::request::Parts};
use weft_core::id::OrgId;

use crate::error::ApiError;

/// The authenticated caller: a tenant plus an optional human actor.
///
/// The hosting server authenticates each request and inserts a `Caller` as
/// a request extension before this router runs. Handlers take it as an
/// extractor; a missing extension means the auth layer was not applied,
/// which is a wiring bug and answers 500, not 401.
#[derive(Debug, Clone)]
pub struct Caller {
  /// Tenant every operation is scoped to.
  pub org_id: OrgId,
  /// Recorded as `created_by` on mappings this caller creates.
  pub actor:  Option<String>,
}

impl<S> FromRequestParts<S> for Caller
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    parts
      .extensions
      .get::<Caller>()
      .cloned()
      .ok_or_else(|| ApiError::Internal("caller extension missing".into()))
  }
}
