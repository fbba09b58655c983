//! JSON REST API for the Weft soul-channel matrix.
//!
//! Exposes an axum [`Router`] backed by a [`weft_service::MatrixService`].
//! Tenancy rides on the [`Caller`] request extension: the hosting server
//! authenticates each request and inserts one before routing here. Auth,
//! TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", weft_api::api_router(service.clone()))
//! ```

pub mod caller;
pub mod error;
pub mod mappings;
pub mod matrix;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use weft_core::{
  directory::{IntegrationDirectory, SoulDirectory},
  store::MappingStore,
};
use weft_service::MatrixService;

pub use caller::Caller;
pub use error::ApiError;

/// Build a fully-materialised API router for `service`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<M, S, I>(service: Arc<MatrixService<M, S, I>>) -> Router<()>
where
  M: MappingStore + 'static,
  S: SoulDirectory + 'static,
  I: IntegrationDirectory + 'static,
{
  Router::new()
    // Views
    .route("/matrix", get(matrix::view::<M, S, I>))
    .route(
      "/matrix/souls/{soul_id}/integrations",
      get(matrix::integrations_for_soul::<M, S, I>),
    )
    .route(
      "/matrix/integrations/{integration_id}/souls",
      get(matrix::souls_for_integration::<M, S, I>),
    )
    // Mappings
    .route("/matrix/mappings", post(mappings::create::<M, S, I>))
    .route("/matrix/mappings/toggle", post(mappings::toggle::<M, S, I>))
    .route("/matrix/mappings/bulk", post(mappings::bulk::<M, S, I>))
    .route(
      "/matrix/mappings/{id}",
      get(mappings::get_one::<M, S, I>)
        .patch(mappings::update::<M, S, I>)
        .delete(mappings::delete::<M, S, I>),
    )
    .route(
      "/matrix/mappings/{id}/primary",
      post(mappings::set_primary::<M, S, I>),
    )
    .with_state(service)
}
