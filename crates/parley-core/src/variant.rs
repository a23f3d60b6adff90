//! Configuration variants: named bundles of model, sampling parameters and
//! default system context.

use serde::{Deserialize, Serialize};

/// Sampling parameters forwarded verbatim to the model provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
  pub temperature:       f32,
  pub max_tokens:        u32,
  #[serde(default)]
  pub frequency_penalty: f32,
}

/// A resolved variant. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigVariant {
  pub label:             String,
  pub model:             String,
  pub sampling:          SamplingParams,
  pub system_prompt:     String,
  /// Reference snippets, attached to new conversations in this order.
  pub knowledge_sources: Vec<String>,
}
