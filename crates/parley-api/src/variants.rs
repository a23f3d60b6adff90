//! `POST /variants/reload` — re-read the variant source without a restart.

use axum::{Json, extract::State};
use parley_core::{gateway::ModelGateway, store::ConversationStore};
use parley_engine::Engine;
use serde::Serialize;

use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct Reloaded {
  pub variants: usize,
  /// Labels now available, as declared.
  pub labels:   Vec<String>,
}

/// A failed reload answers 500 and leaves the previous variants in place.
pub async fn reload<S, G>(
  State(engine): State<Engine<S, G>>,
) -> Result<Json<Reloaded>, ApiError>
where
  S: ConversationStore,
  G: ModelGateway,
{
  let registry = engine.registry();
  let variants = registry.reload()?;
  Ok(Json(Reloaded {
    variants,
    labels: registry.labels(),
  }))
}
