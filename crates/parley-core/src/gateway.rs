//! The `ModelGateway` trait — the single seam to a generative-model provider.

use std::future::Future;

use serde::Serialize;
use thiserror::Error;

use crate::{
  context::ChatMessage,
  variant::{ConfigVariant, SamplingParams},
};

/// One completion request: model, role-tagged messages, sampling parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
  pub model:    String,
  pub messages: Vec<ChatMessage>,
  pub sampling: SamplingParams,
}

impl CompletionRequest {
  /// Apply a variant's model and sampling parameters to `messages`.
  pub fn for_variant(variant: &ConfigVariant, messages: Vec<ChatMessage>) -> Self {
    Self {
      model: variant.model.clone(),
      messages,
      sampling: variant.sampling,
    }
  }
}

/// Any failure on the provider side of a call.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
  #[error("provider unreachable: {0}")]
  Network(String),

  #[error("provider rate limited the request")]
  RateLimited,

  #[error("provider returned {status}: {message}")]
  Status { status: u16, message: String },

  #[error("malformed provider response: {0}")]
  Malformed(String),

  /// The completion arrived but did not have the structure the caller
  /// asked for.
  #[error("unparseable model output: {0}")]
  UnparseableOutput(String),
}

impl GatewayError {
  /// HTTP status reported by the provider, if there was one.
  pub fn status(&self) -> Option<u16> {
    match self {
      Self::RateLimited => Some(429),
      Self::Status { status, .. } => Some(*status),
      _ => None,
    }
  }
}

/// A generative-model provider.
///
/// Each call is one fresh, single-attempt request. Implementations must not
/// retry or cache; timeouts and retry policy belong to the caller.
pub trait ModelGateway: Send + Sync {
  fn complete(
    &self,
    request: CompletionRequest,
  ) -> impl Future<Output = Result<String, GatewayError>> + Send + '_;
}
