//! [`VariantRegistry`] — resolves variant labels against a declarative source.
//!
//! The source is a mapping from label to
//! `{model, temperature, max_tokens, frequency_penalty, system_prompt,
//! knowledge_sources}` in TOML, or JSON when the file ends in `.json`. Labels
//! keep the case they are declared with. Entries are kept as raw values and
//! validated when they are resolved, so one malformed variant never poisons
//! the others.

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
  sync::{PoisonError, RwLock},
};

use parley_core::variant::{ConfigVariant, SamplingParams};
use serde::Deserialize;
use serde_json::Value;

use crate::{Error, Result};

/// The shape every variant entry must have. All keys are required.
#[derive(Debug, Deserialize)]
struct VariantDef {
  model:             String,
  temperature:       f32,
  max_tokens:        u32,
  frequency_penalty: f32,
  system_prompt:     String,
  knowledge_sources: Vec<String>,
}

impl VariantDef {
  fn into_variant(self, label: String) -> ConfigVariant {
    ConfigVariant {
      label,
      model:             self.model,
      sampling:          SamplingParams {
        temperature:       self.temperature,
        max_tokens:        self.max_tokens,
        frequency_penalty: self.frequency_penalty,
      },
      system_prompt:     self.system_prompt,
      knowledge_sources: self.knowledge_sources,
    }
  }
}

/// One entry of a snapshot: the label as declared and its raw definition.
#[derive(Debug, Clone)]
struct Entry {
  label: String,
  raw:   Value,
}

type Snapshot = HashMap<String, Entry>;

/// Labels are compared case-insensitively.
fn normalize(label: &str) -> String { label.trim().to_lowercase() }

fn snapshot(raw: HashMap<String, Value>) -> Snapshot {
  raw
    .into_iter()
    .map(|(label, raw)| (normalize(&label), Entry { label, raw }))
    .collect()
}

fn read_source(path: &Path) -> Result<Snapshot> {
  let source_error = |reason: String| Error::VariantSource {
    path: path.to_owned(),
    reason,
  };
  let text = std::fs::read_to_string(path).map_err(|e| source_error(e.to_string()))?;
  let raw: HashMap<String, Value> = match path.extension().and_then(|e| e.to_str()) {
    Some("json") => serde_json::from_str(&text).map_err(|e| source_error(e.to_string()))?,
    _ => toml::from_str(&text).map_err(|e| source_error(e.to_string()))?,
  };
  Ok(snapshot(raw))
}

/// Process-wide cache of the declarative variant source.
///
/// `resolve` always reads the current snapshot; `reload` swaps in a fresh
/// one. Readers never observe a half-loaded source.
#[derive(Debug)]
pub struct VariantRegistry {
  source:        Option<PathBuf>,
  default_label: String,
  variants:      RwLock<Snapshot>,
}

impl VariantRegistry {
  /// Read the variant source at `path`.
  pub fn load(path: impl Into<PathBuf>, default_label: impl Into<String>) -> Result<Self> {
    let path = path.into();
    let variants = read_source(&path)?;
    tracing::info!(path = %path.display(), variants = variants.len(), "loaded variant source");
    Ok(Self {
      source:        Some(path),
      default_label: default_label.into(),
      variants:      RwLock::new(variants),
    })
  }

  /// Build a registry from an in-memory mapping of label to definition.
  ///
  /// `raw` must be a JSON object; anything else yields an empty registry.
  pub fn from_value(raw: Value, default_label: impl Into<String>) -> Self {
    let entries = match raw {
      Value::Object(map) => map.into_iter().collect(),
      _ => HashMap::new(),
    };
    Self {
      source:        None,
      default_label: default_label.into(),
      variants:      RwLock::new(snapshot(entries)),
    }
  }

  pub fn default_label(&self) -> &str { &self.default_label }

  /// Labels currently loaded, as declared, sorted.
  pub fn labels(&self) -> Vec<String> {
    let variants = self.variants.read().unwrap_or_else(PoisonError::into_inner);
    let mut labels: Vec<String> = variants.values().map(|e| e.label.clone()).collect();
    labels.sort();
    labels
  }

  /// Re-read the backing source and return the number of variants loaded.
  ///
  /// On failure the previous snapshot stays in place. A registry built with
  /// [`VariantRegistry::from_value`] has nothing to re-read and keeps its
  /// contents.
  pub fn reload(&self) -> Result<usize> {
    let Some(path) = &self.source else {
      return Ok(self.labels().len());
    };
    let fresh = match read_source(path) {
      Ok(fresh) => fresh,
      Err(e) => {
        tracing::warn!(path = %path.display(), error = %e, "variant reload failed; keeping previous source");
        return Err(e);
      }
    };
    let count = fresh.len();
    *self.variants.write().unwrap_or_else(PoisonError::into_inner) = fresh;
    tracing::info!(path = %path.display(), variants = count, "reloaded variant source");
    Ok(count)
  }

  /// Resolve `label`, or the default label when none is given.
  pub fn resolve(&self, label: Option<&str>) -> Result<ConfigVariant> {
    let requested = label.unwrap_or(self.default_label.as_str());
    let entry = {
      let variants = self.variants.read().unwrap_or_else(PoisonError::into_inner);
      variants.get(&normalize(requested)).cloned()
    };
    let Some(Entry { label, raw }) = entry else {
      return Err(Error::ConfigNotFound(requested.to_owned()));
    };

    let def: VariantDef = serde_json::from_value(raw).map_err(|e| Error::InvalidVariant {
      label:  label.clone(),
      reason: e.to_string(),
    })?;
    Ok(def.into_variant(label))
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn registry() -> VariantRegistry {
    VariantRegistry::from_value(
      json!({
        "A": {
          "model": "llama3-70b-8192",
          "temperature": 0.7,
          "max_tokens": 150,
          "frequency_penalty": 0.5,
          "system_prompt": "You are concise.",
          "knowledge_sources": ["Sky is blue."]
        },
        "broken": {
          "model": "llama3-8b-8192",
          "temperature": 0.2
        }
      }),
      "a",
    )
  }

  #[test]
  fn resolves_declared_variant() {
    let v = registry().resolve(Some("A")).unwrap();
    assert_eq!(v.label, "A");
    assert_eq!(v.model, "llama3-70b-8192");
    assert_eq!(v.sampling.max_tokens, 150);
    assert_eq!(v.sampling.frequency_penalty, 0.5);
    assert_eq!(v.system_prompt, "You are concise.");
    assert_eq!(v.knowledge_sources, ["Sky is blue."]);
  }

  #[test]
  fn labels_match_case_insensitively() {
    let r = registry();
    assert_eq!(r.resolve(Some("a")).unwrap().label, "A");
    assert_eq!(r.resolve(Some(" a ")).unwrap().label, "A");
  }

  #[test]
  fn missing_label_uses_default() {
    assert_eq!(registry().resolve(None).unwrap().label, "A");
  }

  #[test]
  fn unknown_label_is_config_not_found() {
    assert!(matches!(
      registry().resolve(Some("nope")),
      Err(Error::ConfigNotFound(label)) if label == "nope"
    ));
  }

  #[test]
  fn missing_keys_fail_only_that_variant() {
    let r = registry();
    assert!(matches!(
      r.resolve(Some("broken")),
      Err(Error::InvalidVariant { label, .. }) if label == "broken"
    ));
    assert!(r.resolve(Some("A")).is_ok());
  }

  #[test]
  fn file_labels_keep_their_declared_case() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("variants.toml");
    std::fs::write(
      &path,
      r#"
[Concise]
model = "m1"
temperature = 0.5
max_tokens = 100
frequency_penalty = 0.0
system_prompt = "Be brief."
knowledge_sources = []
"#,
    )
    .unwrap();

    let r = VariantRegistry::load(&path, "concise").unwrap();
    assert_eq!(r.labels(), ["Concise"]);
    assert_eq!(r.resolve(None).unwrap().label, "Concise");
    assert_eq!(r.resolve(Some("CONCISE")).unwrap().label, "Concise");
  }

  #[test]
  fn json_source_is_read_by_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("variants.json");
    std::fs::write(
      &path,
      json!({
        "B": {
          "model": "m2",
          "temperature": 0.1,
          "max_tokens": 50,
          "frequency_penalty": 0.0,
          "system_prompt": "Be thorough.",
          "knowledge_sources": ["k"]
        }
      })
      .to_string(),
    )
    .unwrap();

    let v = VariantRegistry::load(&path, "B").unwrap().resolve(None).unwrap();
    assert_eq!(v.label, "B");
    assert_eq!(v.knowledge_sources, ["k"]);
  }

  #[test]
  fn missing_source_is_a_source_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
      VariantRegistry::load(dir.path().join("absent.toml"), "A"),
      Err(Error::VariantSource { .. })
    ));
  }

  #[test]
  fn reload_swaps_snapshot_and_keeps_it_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("variants.toml");
    std::fs::write(
      &path,
      r#"
[A]
model = "m1"
temperature = 0.5
max_tokens = 100
frequency_penalty = 0.0
system_prompt = "First."
knowledge_sources = ["j"]
"#,
    )
    .unwrap();

    let r = VariantRegistry::load(&path, "A").unwrap();
    assert_eq!(r.resolve(None).unwrap().system_prompt, "First.");

    std::fs::write(
      &path,
      r#"
[B]
model = "m2"
temperature = 0.1
max_tokens = 50
frequency_penalty = 0.0
system_prompt = "Second."
knowledge_sources = ["k"]
"#,
    )
    .unwrap();
    assert_eq!(r.reload().unwrap(), 1);
    assert!(matches!(r.resolve(Some("A")), Err(Error::ConfigNotFound(_))));
    assert_eq!(r.resolve(Some("b")).unwrap().knowledge_sources, ["k"]);

    std::fs::write(&path, "this is [not toml").unwrap();
    assert!(matches!(r.reload(), Err(Error::VariantSource { .. })));
    assert_eq!(r.labels(), ["B"]);
    assert_eq!(r.resolve(Some("B")).unwrap().model, "m2");
  }
}
