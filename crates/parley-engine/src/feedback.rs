//! The feedback service: per-message thumbs and free text.

use parley_core::{
  conversation::{FeedbackUpdate, Message},
  gateway::ModelGateway,
  store::ConversationStore,
};
use serde::Deserialize;

use crate::{Engine, Error, Result, error::parse_id};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedbackRequest {
  pub message_id:    String,
  #[serde(default)]
  pub thumbs_up:     Option<bool>,
  #[serde(default)]
  pub thumbs_down:   Option<bool>,
  #[serde(default)]
  pub feedback_text: Option<String>,
}

impl<S: ConversationStore, G: ModelGateway> Engine<S, G> {
  /// Overwrite the supplied feedback fields of a message and return it.
  ///
  /// With `refine_on_feedback` on, the message's conversation is refined
  /// straight away. That refinement is best-effort: its failures are logged
  /// and the stored feedback is returned regardless.
  pub async fn submit_feedback(&self, request: FeedbackRequest) -> Result<Message> {
    let message_id = parse_id("message_id", &request.message_id)?;
    let update = FeedbackUpdate {
      thumbs_up:     request.thumbs_up,
      thumbs_down:   request.thumbs_down,
      feedback_text: request.feedback_text,
    };
    let has_signal = !update.is_empty();

    let message = self
      .store
      .update_feedback(message_id, update)
      .await
      .map_err(Error::store)?
      .ok_or(Error::MessageNotFound(message_id))?;
    tracing::debug!(%message_id, conversation_id = %message.conversation_id, "feedback recorded");

    if has_signal && self.settings.refinement.refine_on_feedback {
      match self.refine_conversation(message.conversation_id).await {
        Ok(outcome) => tracing::info!(
          conversation_id = %message.conversation_id,
          ?outcome,
          "refined on feedback"
        ),
        Err(e) => tracing::warn!(
          conversation_id = %message.conversation_id,
          error = %e,
          "refinement on feedback failed"
        ),
      }
    }
    Ok(message)
  }
}
