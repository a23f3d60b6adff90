//! Conversation assembly: the configuration a variant gives a new
//! conversation, the model input for a turn, and submitting it.
//!
//! The model input is always the system context (profile prompt, then the
//! knowledge separator and sources) followed by the stored turns in order.
//! System entries are rebuilt on every call and never written back.

use parley_core::{
  context::{ChatMessage, system_context},
  conversation::Conversation,
  gateway::{CompletionRequest, ModelGateway},
  store::{ConversationStore, NewConversation},
  variant::ConfigVariant,
};

use crate::{Error, Result};

/// The rows a new conversation configured from `variant` starts with: its
/// profile (shared with every other conversation using the same prompt
/// text) and its knowledge sources, in declaration order.
pub fn new_conversation(variant: &ConfigVariant) -> NewConversation {
  NewConversation {
    variant_label:     Some(variant.label.clone()),
    profile_name:      Some(variant.label.clone()),
    system_prompt:     variant.system_prompt.clone(),
    knowledge_sources: variant.knowledge_sources.clone(),
  }
}

/// The system context a conversation materialised from `variant` would have.
pub fn variant_context(variant: &ConfigVariant) -> Vec<ChatMessage> {
  system_context(Some(variant.system_prompt.as_str()), &variant.knowledge_sources)
}

/// The system context of `conversation` as currently stored.
///
/// Reads the profile fresh, so a refined prompt takes effect on the next
/// turn. A conversation without a profile has an empty context.
pub async fn system_context_for<S: ConversationStore>(
  store: &S,
  conversation: &Conversation,
) -> Result<Vec<ChatMessage>> {
  let Some(profile_id) = conversation.prompt_profile_id else {
    return Ok(Vec::new());
  };

  let profile = store.get_profile(profile_id).await.map_err(Error::store)?;
  let Some(profile) = profile else {
    tracing::warn!(
      conversation_id = %conversation.conversation_id,
      %profile_id,
      "attached prompt profile is missing; assembling without system context"
    );
    return Ok(Vec::new());
  };

  let sources = store
    .knowledge_sources(conversation.conversation_id)
    .await
    .map_err(Error::store)?;
  let contents: Vec<&str> = sources.iter().map(|s| s.content.as_str()).collect();
  Ok(system_context(Some(profile.system_prompt.as_str()), &contents))
}

/// System context followed by every stored turn, oldest first.
pub async fn assemble<S: ConversationStore>(
  store: &S,
  conversation: &Conversation,
) -> Result<Vec<ChatMessage>> {
  let mut input = system_context_for(store, conversation).await?;
  let turns = store
    .messages(conversation.conversation_id)
    .await
    .map_err(Error::store)?;
  input.extend(turns.iter().map(ChatMessage::from));
  Ok(input)
}

/// Submit `messages` with the variant's model and sampling parameters.
///
/// One attempt; a provider failure surfaces as [`Error::Upstream`].
pub async fn invoke<G: ModelGateway>(
  gateway: &G,
  variant: &ConfigVariant,
  messages: Vec<ChatMessage>,
) -> Result<String> {
  let request = CompletionRequest::for_variant(variant, messages);
  gateway.complete(request).await.map_err(|e| {
    tracing::warn!(model = %variant.model, variant = %variant.label, error = %e, "model call failed");
    Error::Upstream(e)
  })
}
