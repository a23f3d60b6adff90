//! The `ConversationStore` trait and its input types.
//!
//! The trait is implemented by storage backends (e.g. `parley-store-sqlite`).
//! The engine and the HTTP layer depend on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  conversation::{Conversation, FeedbackUpdate, Message},
  profile::{KnowledgeSource, PromptProfile},
};

// ─── Input types ─────────────────────────────────────────────────────────────

/// Input to [`ConversationStore::materialize`]: everything needed to create a
/// configured conversation in one unit of work.
#[derive(Debug, Clone)]
pub struct NewConversation {
  pub variant_label:     Option<String>,
  /// Display name given to the profile if it has to be created.
  pub profile_name:      Option<String>,
  pub system_prompt:     String,
  pub knowledge_sources: Vec<String>,
}

/// The result of materialising a new conversation.
#[derive(Debug, Clone)]
pub struct Materialized {
  pub conversation: Conversation,
  pub profile:      PromptProfile,
  /// In attachment order.
  pub sources:      Vec<KnowledgeSource>,
}

/// A conversation created together with its first exchange.
#[derive(Debug, Clone)]
pub struct Started {
  pub materialized: Materialized,
  pub user:         Message,
  pub assistant:    Message,
}

/// The outcome of a prompt rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptUpdate {
  /// The stored prompt now holds the new text.
  Changed,
  /// The new text equals the stored one; nothing was written.
  Unchanged,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Parley conversation store backend.
///
/// Messages are append-only except for their feedback fields. Knowledge
/// sources are written once, when a conversation is materialised. Prompt
/// profiles are deduplicated by their text.
///
/// Every method that writes more than one row must do so atomically.
pub trait ConversationStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Conversations ─────────────────────────────────────────────────────

  /// Create a bare conversation with no profile and no knowledge sources.
  fn create_conversation(
    &self,
    variant_label: Option<String>,
  ) -> impl Future<Output = Result<Conversation, Self::Error>> + Send + '_;

  /// Create a conversation, get-or-create the profile for
  /// `input.system_prompt`, attach it, and attach one knowledge source per
  /// entry of `input.knowledge_sources`, all in one transaction.
  ///
  /// Two concurrent calls with the same prompt text must end up sharing one
  /// profile row.
  fn materialize(
    &self,
    input: NewConversation,
  ) -> impl Future<Output = Result<Materialized, Self::Error>> + Send + '_;

  /// [`materialize`](Self::materialize) and
  /// [`append_exchange`](Self::append_exchange) as one transaction: either
  /// the configured conversation exists with both messages, or nothing was
  /// written.
  fn start_conversation(
    &self,
    input: NewConversation,
    user: String,
    assistant: String,
  ) -> impl Future<Output = Result<Started, Self::Error>> + Send + '_;

  /// Retrieve a conversation by UUID. Returns `None` if not found.
  fn get_conversation(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Conversation>, Self::Error>> + Send + '_;

  /// List all conversations, oldest first.
  fn list_conversations(
    &self,
  ) -> impl Future<Output = Result<Vec<Conversation>, Self::Error>> + Send + '_;

  /// Attach `profile_id` to a conversation that has none yet.
  ///
  /// If a profile is already attached the call leaves it in place. Returns
  /// the conversation as stored afterwards, so callers can tell which profile
  /// won.
  fn attach_profile(
    &self,
    conversation_id: Uuid,
    profile_id: Uuid,
  ) -> impl Future<Output = Result<Conversation, Self::Error>> + Send + '_;

  // ── Prompt profiles ───────────────────────────────────────────────────

  /// Return the profile whose prompt equals `system_prompt`, creating it if
  /// none exists.
  fn get_or_create_profile(
    &self,
    system_prompt: String,
    name: Option<String>,
  ) -> impl Future<Output = Result<PromptProfile, Self::Error>> + Send + '_;

  fn get_profile(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<PromptProfile>, Self::Error>> + Send + '_;

  /// Replace a profile's prompt in place. Writes nothing when the text is
  /// unchanged.
  fn update_profile_prompt(
    &self,
    id: Uuid,
    system_prompt: String,
  ) -> impl Future<Output = Result<PromptUpdate, Self::Error>> + Send + '_;

  /// Knowledge sources of a conversation, in attachment order.
  fn knowledge_sources(
    &self,
    conversation_id: Uuid,
  ) -> impl Future<Output = Result<Vec<KnowledgeSource>, Self::Error>> + Send + '_;

  // ── Messages ──────────────────────────────────────────────────────────

  /// Append a user message and the assistant's reply in one transaction.
  /// The reply's timestamp is strictly later than the user message's.
  fn append_exchange(
    &self,
    conversation_id: Uuid,
    user: String,
    assistant: String,
  ) -> impl Future<Output = Result<(Message, Message), Self::Error>> + Send + '_;

  /// All messages of a conversation, ordered by timestamp ascending.
  fn messages(
    &self,
    conversation_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + '_;

  fn get_message(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Message>, Self::Error>> + Send + '_;

  /// Overwrite the supplied feedback fields of a message. Returns `None` if
  /// the message does not exist.
  fn update_feedback(
    &self,
    message_id: Uuid,
    update: FeedbackUpdate,
  ) -> impl Future<Output = Result<Option<Message>, Self::Error>> + Send + '_;
}
