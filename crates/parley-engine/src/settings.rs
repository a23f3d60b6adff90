//! Tunables for the judge model and the refinement loop.

use parley_core::variant::SamplingParams;
use serde::Deserialize;

/// The judge model used for evaluation and prompt rewrites.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JudgeSettings {
  pub model:                 String,
  pub temperature:           f32,
  pub evaluation_max_tokens: u32,
  pub refinement_max_tokens: u32,
}

impl Default for JudgeSettings {
  fn default() -> Self {
    Self {
      model:                 "llama3-70b-8192".into(),
      temperature:           0.3,
      evaluation_max_tokens: 300,
      refinement_max_tokens: 500,
    }
  }
}

impl JudgeSettings {
  pub fn sampling(&self, max_tokens: u32) -> SamplingParams {
    SamplingParams {
      temperature:       self.temperature,
      max_tokens,
      frequency_penalty: 0.0,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RefinementSettings {
  /// Conversations scoring strictly below this are rewritten.
  pub threshold:              u8,
  /// Prompt given to conversations that have no profile when they are
  /// refined. Empty disables auto-creation; such conversations are skipped.
  pub default_profile_prompt: String,
  /// Run a single-conversation refinement right after each feedback update.
  pub refine_on_feedback:     bool,
}

impl Default for RefinementSettings {
  fn default() -> Self {
    Self {
      threshold:              6,
      default_profile_prompt: "You are a helpful assistant.".into(),
      refine_on_feedback:     false,
    }
  }
}

impl RefinementSettings {
  pub fn default_profile_prompt(&self) -> Option<&str> {
    let prompt = self.default_profile_prompt.trim();
    (!prompt.is_empty()).then_some(prompt)
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
  pub judge:      JudgeSettings,
  pub refinement: RefinementSettings,
}
