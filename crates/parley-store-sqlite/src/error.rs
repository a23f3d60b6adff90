//! Error type for `parley-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] parley_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("conversation not found: {0}")]
  ConversationNotFound(uuid::Uuid),

  #[error("prompt profile not found: {0}")]
  ProfileNotFound(uuid::Uuid),

  /// A rewrite would give two profiles the same prompt text.
  #[error("another prompt profile ({0}) already holds this prompt text")]
  DuplicatePrompt(uuid::Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
