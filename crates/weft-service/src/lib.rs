//! Business rules for the Weft soul-channel matrix.
//!
//! [`MatrixService`] composes a mapping store with the two identity
//! directories behind their `weft-core` traits. Everything above this crate
//! (HTTP handlers, the terminal client) calls the service; nothing above it
//! talks to a store directly. Referential validation, conflict reporting,
//! view assembly, and bulk orchestration all live here.

mod error;
mod service;

pub use error::{Error, Result};
pub use service::{DEFAULT_SOUL_LIMIT, MatrixService};
