//! `POST /chat` — run one conversation turn.

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use parley_core::{gateway::ModelGateway, store::ConversationStore};
use parley_engine::{
  Engine,
  chat::{TurnReply, TurnRequest},
};

use crate::error::ApiError;

/// Body: `{"message", "conversation_id"?, "variant"?}`.
pub async fn turn<S, G>(
  State(engine): State<Engine<S, G>>,
  body: Result<Json<TurnRequest>, JsonRejection>,
) -> Result<Json<TurnReply>, ApiError>
where
  S: ConversationStore,
  G: ModelGateway,
{
  let Json(request) = body?;
  Ok(Json(engine.turn(request).await?))
}
