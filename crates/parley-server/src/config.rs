//! Runtime configuration, layered from an optional TOML file and `PARLEY_*`
//! environment variables.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use parley_engine::{
  EngineSettings,
  settings::{JudgeSettings, RefinementSettings},
};
use parley_llm::GatewayConfig;
use serde::Deserialize;

/// Environment variables override the file, e.g. `PARLEY_PORT=9000` or
/// `PARLEY_PROVIDER__API_KEY=...`.
pub const ENV_PREFIX: &str = "PARLEY";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:            String,
  pub port:            u16,
  pub store_path:      PathBuf,
  /// The declarative variant source.
  pub variants_path:   PathBuf,
  pub default_variant: String,
  pub provider:        ProviderConfig,
  pub judge:           JudgeSettings,
  pub refinement:      RefinementSettings,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:            "127.0.0.1".into(),
      port:            8000,
      store_path:      PathBuf::from("parley.db"),
      variants_path:   PathBuf::from("variants.toml"),
      default_variant: "A".into(),
      provider:        ProviderConfig::default(),
      judge:           JudgeSettings::default(),
      refinement:      RefinementSettings::default(),
    }
  }
}

/// An OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
  pub base_url:     String,
  pub api_key:      String,
  pub timeout_secs: u64,
}

impl Default for ProviderConfig {
  fn default() -> Self {
    Self {
      base_url:     "https://api.groq.com/openai/v1".into(),
      api_key:      String::new(),
      timeout_secs: 60,
    }
  }
}

impl ServerConfig {
  /// Read `path` (if it exists) and apply environment overrides.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix(ENV_PREFIX)
          .prefix_separator("_")
          .separator("__"),
      )
      .build()?
      .try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn gateway(&self) -> GatewayConfig {
    GatewayConfig {
      base_url: self.provider.base_url.clone(),
      api_key:  self.provider.api_key.clone(),
      timeout:  Duration::from_secs(self.provider.timeout_secs),
    }
  }

  pub fn engine_settings(&self) -> EngineSettings {
    EngineSettings {
      judge:      self.judge.clone(),
      refinement: self.refinement.clone(),
    }
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
