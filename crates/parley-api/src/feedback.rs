//! `PATCH /feedback` — set thumbs and free-text feedback on a message.

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use parley_core::{conversation::Feedback, gateway::ModelGateway, store::ConversationStore};
use parley_engine::{Engine, feedback::FeedbackRequest};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ApiError;

/// The stored feedback after the update.
#[derive(Debug, Serialize)]
pub struct FeedbackAck {
  pub success:    bool,
  pub message_id: Uuid,
  #[serde(flatten)]
  pub feedback:   Feedback,
}

/// Body: `{"message_id", "thumbs_up"?, "thumbs_down"?, "feedback_text"?}`.
/// Omitted fields keep their stored value.
pub async fn submit<S, G>(
  State(engine): State<Engine<S, G>>,
  body: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Result<Json<FeedbackAck>, ApiError>
where
  S: ConversationStore,
  G: ModelGateway,
{
  let Json(request) = body?;
  let message = engine.submit_feedback(request).await?;
  Ok(Json(FeedbackAck {
    success:    true,
    message_id: message.message_id,
    feedback:   message.feedback,
  }))
}
