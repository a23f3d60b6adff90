//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that lexical order equals chronological order.
//! UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, Duration, SecondsFormat, SubsecRound as _, Utc};
use parley_core::{
  conversation::{Conversation, Feedback, Message, Role},
  profile::{KnowledgeSource, PromptProfile},
};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

/// The current time at storage precision.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

/// A storage-precision timestamp strictly later than `last`.
pub fn next_timestamp(last: Option<DateTime<Utc>>) -> DateTime<Utc> {
  let now = now();
  match last {
    Some(last) if now <= last => {
      last.trunc_subsecs(6) + Duration::microseconds(1)
    }
    _ => now,
  }
}

// ─── Prompt digest ───────────────────────────────────────────────────────────

/// SHA-256 hex digest of a prompt; the uniqueness key for profiles.
pub fn prompt_digest(prompt: &str) -> String {
  hex::encode(Sha256::digest(prompt.as_bytes()))
}

// ─── Column lists ────────────────────────────────────────────────────────────

pub const CONVERSATION_COLUMNS: &str =
  "conversation_id, started_at, prompt_profile_id, variant_label";

pub const PROFILE_COLUMNS: &str =
  "profile_id, name, system_prompt, created_at";

pub const SOURCE_COLUMNS: &str =
  "source_id, conversation_id, content, created_at";

pub const MESSAGE_COLUMNS: &str = "message_id, conversation_id, role, content, \
                                   created_at, thumbs_up, thumbs_down, \
                                   feedback_text";

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `conversations` row.
pub struct RawConversation {
  pub conversation_id:   String,
  pub started_at:        String,
  pub prompt_profile_id: Option<String>,
  pub variant_label:     Option<String>,
}

impl RawConversation {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      conversation_id:   row.get(0)?,
      started_at:        row.get(1)?,
      prompt_profile_id: row.get(2)?,
      variant_label:     row.get(3)?,
    })
  }

  pub fn into_conversation(self) -> Result<Conversation> {
    Ok(Conversation {
      conversation_id:   decode_uuid(&self.conversation_id)?,
      started_at:        decode_dt(&self.started_at)?,
      prompt_profile_id: self
        .prompt_profile_id
        .as_deref()
        .map(decode_uuid)
        .transpose()?,
      variant_label:     self.variant_label,
    })
  }
}

/// Raw strings read directly from a `prompt_profiles` row.
pub struct RawProfile {
  pub profile_id:    String,
  pub name:          Option<String>,
  pub system_prompt: String,
  pub created_at:    String,
}

impl RawProfile {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      profile_id:    row.get(0)?,
      name:          row.get(1)?,
      system_prompt: row.get(2)?,
      created_at:    row.get(3)?,
    })
  }

  pub fn into_profile(self) -> Result<PromptProfile> {
    Ok(PromptProfile {
      profile_id:    decode_uuid(&self.profile_id)?,
      name:          self.name,
      system_prompt: self.system_prompt,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `knowledge_sources` row.
pub struct RawSource {
  pub source_id:       String,
  pub conversation_id: String,
  pub content:         String,
  pub created_at:      String,
}

impl RawSource {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      source_id:       row.get(0)?,
      conversation_id: row.get(1)?,
      content:         row.get(2)?,
      created_at:      row.get(3)?,
    })
  }

  pub fn into_source(self) -> Result<KnowledgeSource> {
    Ok(KnowledgeSource {
      source_id:       decode_uuid(&self.source_id)?,
      conversation_id: decode_uuid(&self.conversation_id)?,
      content:         self.content,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `messages` row.
pub struct RawMessage {
  pub message_id:      String,
  pub conversation_id: String,
  pub role:            String,
  pub content:         String,
  pub created_at:      String,
  pub feedback:        Feedback,
}

impl RawMessage {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      message_id:      row.get(0)?,
      conversation_id: row.get(1)?,
      role:            row.get(2)?,
      content:         row.get(3)?,
      created_at:      row.get(4)?,
      feedback:        Feedback {
        thumbs_up:     row.get(5)?,
        thumbs_down:   row.get(6)?,
        feedback_text: row.get(7)?,
      },
    })
  }

  pub fn into_message(self) -> Result<Message> {
    Ok(Message {
      message_id:      decode_uuid(&self.message_id)?,
      conversation_id: decode_uuid(&self.conversation_id)?,
      role:            Role::parse(&self.role)?,
      content:         self.content,
      created_at:      decode_dt(&self.created_at)?,
      feedback:        self.feedback,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn encoded_timestamps_sort_lexically() {
    let a = Utc::now();
    let b = a + Duration::microseconds(1);
    let c = a + Duration::seconds(1);
    assert!(encode_dt(a) < encode_dt(b));
    assert!(encode_dt(b) < encode_dt(c));
    assert_eq!(encode_dt(a).len(), encode_dt(c).len());
  }

  #[test]
  fn next_timestamp_is_strictly_later() {
    let far_future = Utc::now() + Duration::hours(1);
    let next = next_timestamp(Some(far_future));
    assert!(next > far_future);
    assert_eq!(decode_dt(&encode_dt(next)).unwrap(), next);
  }

  #[test]
  fn digest_is_stable_and_content_sensitive() {
    assert_eq!(prompt_digest("a"), prompt_digest("a"));
    assert_ne!(prompt_digest("a"), prompt_digest("a "));
    assert_eq!(prompt_digest("a").len(), 64);
  }
}
