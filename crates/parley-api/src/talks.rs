//! `GET /talks-data` — every conversation with its ordered messages.

use axum::{Json, extract::State};
use parley_core::{conversation::ConversationLog, gateway::ModelGateway, store::ConversationStore};
use parley_engine::Engine;

use crate::error::ApiError;

pub async fn list<S, G>(
  State(engine): State<Engine<S, G>>,
) -> Result<Json<Vec<ConversationLog>>, ApiError>
where
  S: ConversationStore,
  G: ModelGateway,
{
  Ok(Json(engine.conversation_logs().await?))
}
