//! SQLite backends for the Weft soul-channel matrix.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! pool without blocking the async runtime. Two stores live here:
//! [`SqliteMatrixStore`] (mappings and the integration catalog, one
//! relational file) and [`SoulDocStore`] (souls as JSON documents, a separate
//! file). The split matches ownership: souls belong to a different system and
//! share nothing with the matrix beyond their ids.

mod encode;
mod schema;
mod souls;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use souls::SoulDocStore;
pub use store::SqliteMatrixStore;
