//! Conversations, messages and per-message feedback.
//!
//! A conversation is an append-only log of user and assistant turns. System
//! messages are never stored; they are synthesised at assembly time from the
//! conversation's prompt profile and knowledge sources.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Role ────────────────────────────────────────────────────────────────────

/// Who authored a message.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  User,
  Assistant,
  System,
}

impl Role {
  /// Parse the lowercase role name stored in the database.
  pub fn parse(s: &str) -> Result<Self> {
    Self::from_str(s).map_err(|_| Error::UnknownRole(s.to_owned()))
  }

  /// Speaker label used when a conversation is rendered as plain text.
  pub fn speaker(&self) -> &'static str {
    match self {
      Self::User => "User",
      Self::Assistant => "Assistant",
      Self::System => "System",
    }
  }
}

// ─── Conversation ────────────────────────────────────────────────────────────

/// A thin envelope around an ordered list of messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
  pub conversation_id:   Uuid,
  pub started_at:        DateTime<Utc>,
  /// Assigned at most once; `None` for conversations that were never
  /// configured.
  pub prompt_profile_id: Option<Uuid>,
  /// The variant the conversation was created under, kept for aggregation.
  pub variant_label:     Option<String>,
}

// ─── Feedback ────────────────────────────────────────────────────────────────

/// Feedback signals attached to a message. Each field is independent and
/// last-write-wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
  pub thumbs_up:     Option<bool>,
  pub thumbs_down:   Option<bool>,
  pub feedback_text: Option<String>,
}

impl Feedback {
  /// True when no signal has ever been recorded.
  pub fn is_empty(&self) -> bool {
    self.thumbs_up.is_none()
      && self.thumbs_down.is_none()
      && self.feedback_text.is_none()
  }
}

/// A partial feedback write. `None` fields leave the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackUpdate {
  pub thumbs_up:     Option<bool>,
  pub thumbs_down:   Option<bool>,
  pub feedback_text: Option<String>,
}

impl FeedbackUpdate {
  pub fn is_empty(&self) -> bool {
    self.thumbs_up.is_none()
      && self.thumbs_down.is_none()
      && self.feedback_text.is_none()
  }

  /// Overwrite every supplied field on `feedback`.
  pub fn apply_to(&self, feedback: &mut Feedback) {
    if let Some(up) = self.thumbs_up {
      feedback.thumbs_up = Some(up);
    }
    if let Some(down) = self.thumbs_down {
      feedback.thumbs_down = Some(down);
    }
    if let Some(text) = &self.feedback_text {
      feedback.feedback_text = Some(text.clone());
    }
  }
}

// ─── Message ─────────────────────────────────────────────────────────────────

/// A persisted user or assistant turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
  pub message_id:      Uuid,
  pub conversation_id: Uuid,
  pub role:            Role,
  pub content:         String,
  /// Server-assigned; strictly increasing within a conversation.
  pub created_at:      DateTime<Utc>,
  #[serde(flatten)]
  pub feedback:        Feedback,
}

/// A conversation together with its full message history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationLog {
  #[serde(flatten)]
  pub conversation: Conversation,
  pub messages:     Vec<Message>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn role_parses_lowercase_names() {
    assert_eq!(Role::parse("user").unwrap(), Role::User);
    assert_eq!(Role::parse("assistant").unwrap(), Role::Assistant);
    assert!(matches!(Role::parse("bot"), Err(Error::UnknownRole(_))));
    assert_eq!(Role::Assistant.to_string(), "assistant");
  }

  #[test]
  fn feedback_update_only_touches_supplied_fields() {
    let mut fb = Feedback {
      thumbs_up:     Some(true),
      thumbs_down:   None,
      feedback_text: Some("first".into()),
    };

    FeedbackUpdate {
      thumbs_down: Some(true),
      ..Default::default()
    }
    .apply_to(&mut fb);
    assert_eq!(fb.thumbs_up, Some(true));
    assert_eq!(fb.thumbs_down, Some(true));
    assert_eq!(fb.feedback_text.as_deref(), Some("first"));

    FeedbackUpdate {
      feedback_text: Some("second".into()),
      ..Default::default()
    }
    .apply_to(&mut fb);
    assert_eq!(fb.feedback_text.as_deref(), Some("second"));
  }

  #[test]
  fn repeated_update_is_idempotent() {
    let update = FeedbackUpdate {
      thumbs_up: Some(true),
      ..Default::default()
    };
    let mut once = Feedback::default();
    update.apply_to(&mut once);
    let mut twice = once.clone();
    update.apply_to(&mut twice);
    assert_eq!(once, twice);
  }
}
