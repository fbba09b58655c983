//! Error types for `weft-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("priority {0} is out of range 0-100")]
  PriorityOutOfRange(u8),

  #[error("notes exceed 500 characters (got {0})")]
  NotesTooLong(usize),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
