//! Model-facing message lists.
//!
//! A conversation's model input is its system context (prompt, then an
//! optional separator and knowledge sources) followed by its stored turns.

use serde::{Deserialize, Serialize};

use crate::conversation::{Message, Role};

/// Introduces the knowledge sources in the system context.
pub const KNOWLEDGE_SEPARATOR: &str =
  "The following sources are for your knowledge context:";

/// One role-tagged entry of a model request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
  pub role:    Role,
  pub content: String,
}

impl ChatMessage {
  pub fn new(role: Role, content: impl Into<String>) -> Self {
    Self { role, content: content.into() }
  }

  pub fn system(content: impl Into<String>) -> Self {
    Self::new(Role::System, content)
  }

  pub fn user(content: impl Into<String>) -> Self {
    Self::new(Role::User, content)
  }
}

impl From<&Message> for ChatMessage {
  fn from(m: &Message) -> Self { Self::new(m.role, m.content.clone()) }
}

/// Build the system context for a prompt and its knowledge sources.
///
/// Without a prompt the prefix is empty. The separator is emitted only when
/// at least one source follows it.
pub fn system_context<S: AsRef<str>>(
  prompt: Option<&str>,
  sources: &[S],
) -> Vec<ChatMessage> {
  let Some(prompt) = prompt else {
    return Vec::new();
  };

  let mut entries = Vec::with_capacity(sources.len() + 2);
  entries.push(ChatMessage::system(prompt));
  if !sources.is_empty() {
    entries.push(ChatMessage::system(KNOWLEDGE_SEPARATOR));
    entries.extend(sources.iter().map(|s| ChatMessage::system(s.as_ref())));
  }
  entries
}

/// Render stored turns as role-labelled plain text, one line per message.
pub fn transcript(messages: &[Message]) -> String {
  messages
    .iter()
    .map(|m| format!("{}: {}", m.role.speaker(), m.content))
    .collect::<Vec<_>>()
    .join("\n")
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use uuid::Uuid;

  use super::*;
  use crate::conversation::Feedback;

  fn message(role: Role, content: &str) -> Message {
    Message {
      message_id:      Uuid::new_v4(),
      conversation_id: Uuid::nil(),
      role,
      content:         content.into(),
      created_at:      Utc::now(),
      feedback:        Feedback::default(),
    }
  }

  #[test]
  fn prompt_then_separator_then_sources() {
    let ctx = system_context(Some("You are concise."), &["Sky is blue."]);
    assert_eq!(ctx, vec![
      ChatMessage::system("You are concise."),
      ChatMessage::system(KNOWLEDGE_SEPARATOR),
      ChatMessage::system("Sky is blue."),
    ]);
  }

  #[test]
  fn no_separator_without_sources() {
    let ctx = system_context::<&str>(Some("Be kind."), &[]);
    assert_eq!(ctx, vec![ChatMessage::system("Be kind.")]);
  }

  #[test]
  fn missing_prompt_yields_empty_prefix() {
    assert!(system_context(None, &["orphan"]).is_empty());
  }

  #[test]
  fn transcript_labels_each_turn() {
    let text = transcript(&[
      message(Role::User, "What colour is the sky?"),
      message(Role::Assistant, "Blue."),
    ]);
    assert_eq!(text, "User: What colour is the sky?\nAssistant: Blue.");
    assert_eq!(transcript(&[]), "");
  }
}
