//! The turn service: one user message in, one assistant reply out.

use parley_core::{
  context::ChatMessage,
  conversation::{Conversation, ConversationLog, Message},
  gateway::ModelGateway,
  store::{ConversationStore, Started},
  variant::ConfigVariant,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Engine, Error, Result,
  assembly::{assemble, invoke, new_conversation, variant_context},
  error::parse_id,
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TurnRequest {
  pub message:         String,
  /// Continue this conversation; start a new one when absent.
  #[serde(default)]
  pub conversation_id: Option<String>,
  /// Variant for a new conversation. Ignored when continuing one.
  #[serde(default)]
  pub variant:         Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnReply {
  pub reply:           String,
  pub conversation_id: Uuid,
  /// The stored assistant message; feedback refers to this id.
  pub message_id:      Uuid,
}

impl<S: ConversationStore, G: ModelGateway> Engine<S, G> {
  /// Run one turn.
  ///
  /// Nothing is written unless the model answers. A continuing conversation
  /// gets the user message and the reply appended together; a new one is
  /// created with its profile, sources and first exchange in one go.
  pub async fn turn(&self, request: TurnRequest) -> Result<TurnReply> {
    if request.message.trim().is_empty() {
      return Err(Error::Validation("message must not be empty".into()));
    }
    let existing = request
      .conversation_id
      .as_deref()
      .map(|raw| parse_id("conversation_id", raw))
      .transpose()?;

    let (conversation_id, assistant, variant) = match existing {
      Some(id) => self.continue_conversation(id, request.message).await?,
      None => {
        let variant = self.registry.resolve(request.variant.as_deref())?;
        let mut input = variant_context(&variant);
        input.push(ChatMessage::user(request.message.as_str()));
        let reply = invoke(self.gateway.as_ref(), &variant, input).await?;

        let started = self
          .store
          .start_conversation(new_conversation(&variant), request.message, reply)
          .await
          .map_err(Error::store)?;
        let Started { materialized, assistant, .. } = started;
        tracing::info!(
          conversation_id = %materialized.conversation.conversation_id,
          profile_id = %materialized.profile.profile_id,
          variant = %variant.label,
          sources = materialized.sources.len(),
          "created conversation"
        );
        (materialized.conversation.conversation_id, assistant, variant)
      }
    };

    tracing::debug!(
      %conversation_id,
      message_id = %assistant.message_id,
      variant = %variant.label,
      "turn completed"
    );
    Ok(TurnReply {
      reply:      assistant.content,
      conversation_id,
      message_id: assistant.message_id,
    })
  }

  async fn continue_conversation(
    &self,
    conversation_id: Uuid,
    message: String,
  ) -> Result<(Uuid, Message, ConfigVariant)> {
    let conversation = self
      .store
      .get_conversation(conversation_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::ConversationNotFound(conversation_id))?;
    let variant = self.variant_for(&conversation)?;

    let mut input = assemble(self.store.as_ref(), &conversation).await?;
    input.push(ChatMessage::user(message.as_str()));
    let reply = invoke(self.gateway.as_ref(), &variant, input).await?;

    let (_, assistant) = self
      .store
      .append_exchange(conversation_id, message, reply)
      .await
      .map_err(Error::store)?;
    Ok((conversation_id, assistant, variant))
  }

  /// The variant a continuing conversation runs with: its recorded label if
  /// that still resolves, the default label otherwise.
  fn variant_for(&self, conversation: &Conversation) -> Result<ConfigVariant> {
    let Some(label) = conversation.variant_label.as_deref() else {
      return self.registry.resolve(None);
    };
    match self.registry.resolve(Some(label)) {
      Err(Error::ConfigNotFound(_)) => {
        tracing::warn!(
          conversation_id = %conversation.conversation_id,
          variant = %label,
          default = %self.registry.default_label(),
          "recorded variant no longer exists; using the default"
        );
        self.registry.resolve(None)
      }
      resolved => resolved,
    }
  }

  /// Every conversation with its ordered messages, oldest first.
  pub async fn conversation_logs(&self) -> Result<Vec<ConversationLog>> {
    let conversations = self.store.list_conversations().await.map_err(Error::store)?;
    let mut logs = Vec::with_capacity(conversations.len());
    for conversation in conversations {
      let messages = self
        .store
        .messages(conversation.conversation_id)
        .await
        .map_err(Error::store)?;
      logs.push(ConversationLog { conversation, messages });
    }
    Ok(logs)
  }
}
