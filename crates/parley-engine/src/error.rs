//! Error type for `parley-engine`.
//!
//! The variants form the failure taxonomy callers dispatch on: validation and
//! not-found failures are the caller's fault, upstream failures belong to the
//! model provider, persistence failures to the store.

use std::path::PathBuf;

use parley_core::gateway::GatewayError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid request: {0}")]
  Validation(String),

  #[error("conversation not found: {0}")]
  ConversationNotFound(Uuid),

  #[error("message not found: {0}")]
  MessageNotFound(Uuid),

  #[error("variant not found: {0:?}")]
  ConfigNotFound(String),

  #[error("variant {label:?} is invalid: {reason}")]
  InvalidVariant { label: String, reason: String },

  #[error("failed to read variant source {path:?}: {reason}")]
  VariantSource { path: PathBuf, reason: String },

  #[error("model call failed: {0}")]
  Upstream(#[from] GatewayError),

  #[error("store error: {0}")]
  Persistence(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend error from any [`ConversationStore`].
  ///
  /// [`ConversationStore`]: parley_core::store::ConversationStore
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Persistence(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Parse a caller-supplied UUID, reporting which field was malformed.
pub(crate) fn parse_id(field: &str, raw: &str) -> Result<Uuid> {
  Uuid::parse_str(raw.trim())
    .map_err(|_| Error::Validation(format!("{field} is not a valid UUID: {raw:?}")))
}
