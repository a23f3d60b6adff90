//! Prompt profiles and knowledge sources — the system context of a
//! conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A system prompt shared by every conversation that references it.
///
/// The prompt text is unique across profiles. After creation only the
/// refinement loop rewrites `system_prompt`, and only in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptProfile {
  pub profile_id:    Uuid,
  pub name:          Option<String>,
  pub system_prompt: String,
  pub created_at:    DateTime<Utc>,
}

/// A reference snippet attached to one conversation when it is created.
/// Never updated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeSource {
  pub source_id:       Uuid,
  pub conversation_id: Uuid,
  pub content:         String,
  pub created_at:      DateTime<Utc>,
}
