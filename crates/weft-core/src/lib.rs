//! Core types and trait definitions for the Weft soul-channel matrix.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod directory;
pub mod error;
pub mod id;
pub mod integration;
pub mod mapping;
pub mod matrix;
pub mod soul;
pub mod store;

pub use error::{Error, Result};
