//! Judge-model prompts and parsing of what the judge sends back.
//!
//! Judge output is untrusted text. Parsing never panics; anything that does
//! not have the requested shape becomes [`GatewayError::UnparseableOutput`].

use std::fmt;

use parley_core::{conversation::Message, gateway::GatewayError};
use serde::Serialize;
use serde_json::Value;

// ─── Score ────────────────────────────────────────────────────────────────────

/// A judge score, always within `1..=10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Score(u8);

impl Score {
  pub const MAX: u8 = 10;
  pub const MIN: u8 = 1;

  pub fn new(value: i64) -> Option<Self> {
    u8::try_from(value)
      .ok()
      .filter(|v| (Self::MIN..=Self::MAX).contains(v))
      .map(Self)
  }

  pub fn get(self) -> u8 { self.0 }
}

impl fmt::Display for Score {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

/// A parsed evaluation: the score and the judge's short rationale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
  pub score:   Score,
  pub comment: String,
}

// ─── Prompts ──────────────────────────────────────────────────────────────────

pub fn evaluation_prompt(transcript: &str) -> String {
  format!(
    "Evaluate the quality of the assistant's replies in the conversation below.\n\
     Score it from 1 to 10 for relevance, clarity and helpfulness, and justify \
     the score in one or two sentences.\n\n\
     Conversation:\n{transcript}\n\n\
     Answer with a single JSON object and nothing else, in exactly this form:\n\
     {{\"score\": <integer 1-10>, \"comment\": \"<rationale>\"}}"
  )
}

pub fn refinement_prompt(current_prompt: &str, transcript: &str, feedback: &str) -> String {
  format!(
    "You are an expert in prompt engineering.\n\n\
     Below are the system prompt a chatbot ran with, a conversation it had, and \
     the feedback the user left on its replies. Revise the system prompt so that \
     future replies serve the user better, as the conversation and feedback \
     show. Keep the assistant's role and boundaries. Change only what the \
     conversation shows needs changing.\n\n\
     Current system prompt:\n\"\"\"{current_prompt}\"\"\"\n\n\
     Conversation:\n{transcript}\n\n\
     User feedback:\n{feedback}\n\n\
     Return only the revised system prompt, with no explanation."
  )
}

/// Feedback signals left on `messages`, one line per message that has any.
pub fn render_feedback(messages: &[Message]) -> String {
  let lines: Vec<String> = messages
    .iter()
    .enumerate()
    .filter(|(_, m)| !m.feedback.is_empty())
    .map(|(i, m)| {
      let mut signals = Vec::new();
      if m.feedback.thumbs_up == Some(true) {
        signals.push("thumbs up".to_owned());
      }
      if m.feedback.thumbs_down == Some(true) {
        signals.push("thumbs down".to_owned());
      }
      match m.feedback.feedback_text.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => signals.push(format!("\"{text}\"")),
        _ => {}
      }
      if signals.is_empty() {
        signals.push("no signal".to_owned());
      }
      format!("- on message {} ({}): {}", i + 1, m.role.speaker(), signals.join(", "))
    })
    .collect();

  if lines.is_empty() {
    "No feedback was left.".to_owned()
  } else {
    lines.join("\n")
  }
}

// ─── Parsing ──────────────────────────────────────────────────────────────────

fn unparseable(reason: impl Into<String>) -> GatewayError {
  GatewayError::UnparseableOutput(reason.into())
}

/// Extract `{"score", "comment"}` from the judge's reply.
///
/// Prose or code fences around the object are tolerated; the object itself
/// must be valid JSON with an integral score in range and a string comment.
pub fn parse_verdict(raw: &str) -> Result<Verdict, GatewayError> {
  let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) else {
    return Err(unparseable("no JSON object in judge reply"));
  };
  if end < start {
    return Err(unparseable("no JSON object in judge reply"));
  }

  let value: Value = serde_json::from_str(&raw[start..=end])
    .map_err(|e| unparseable(format!("invalid JSON in judge reply: {e}")))?;

  let score = match value.get("score") {
    Some(Value::Number(n)) => n
      .as_i64()
      .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
    _ => None,
  }
  .ok_or_else(|| unparseable("score is missing or not an integer"))?;
  let score = Score::new(score)
    .ok_or_else(|| unparseable(format!("score {score} is outside 1..=10")))?;

  let comment = value
    .get("comment")
    .and_then(Value::as_str)
    .ok_or_else(|| unparseable("comment is missing or not a string"))?
    .trim()
    .to_owned();

  Ok(Verdict { score, comment })
}

/// Clean a rewritten prompt: drop surrounding whitespace, code fences and
/// triple quotes. `None` when nothing is left.
pub fn clean_prompt(raw: &str) -> Option<String> {
  let mut text = raw.trim();
  if let Some(inner) = text.strip_prefix("```") {
    // Drop an optional language tag on the opening fence.
    let inner = inner.split_once('\n').map_or(inner, |(_, rest)| rest);
    text = inner.strip_suffix("```").unwrap_or(inner).trim();
  }
  if let Some(inner) = text
    .strip_prefix("\"\"\"")
    .and_then(|t| t.strip_suffix("\"\"\""))
  {
    text = inner.trim();
  }
  (!text.is_empty()).then(|| text.to_owned())
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use parley_core::conversation::{Feedback, Role};
  use uuid::Uuid;

  use super::*;

  #[test]
  fn parses_bare_object() {
    let v = parse_verdict(r#"{"score": 7, "comment": "Clear and on topic."}"#).unwrap();
    assert_eq!(v.score.get(), 7);
    assert_eq!(v.comment, "Clear and on topic.");
  }

  #[test]
  fn tolerates_fences_and_prose() {
    let raw = "Here is my evaluation:\n```json\n{\"score\": 3.0, \"comment\": \"Too verbose.\"}\n```";
    let v = parse_verdict(raw).unwrap();
    assert_eq!(v.score.get(), 3);
    assert_eq!(v.comment, "Too verbose.");
  }

  #[test]
  fn rejects_malformed_verdicts() {
    for raw in [
      "no json here",
      "} backwards {",
      r#"{"score": "seven", "comment": "x"}"#,
      r#"{"score": 7.5, "comment": "x"}"#,
      r#"{"score": 0, "comment": "x"}"#,
      r#"{"score": 11, "comment": "x"}"#,
      r#"{"score": 5}"#,
      r#"{"score": 5, "comment": 5}"#,
      r#"{"score": 5, "comment": "unterminated}"#,
    ] {
      assert!(
        matches!(parse_verdict(raw), Err(GatewayError::UnparseableOutput(_))),
        "accepted {raw:?}"
      );
    }
  }

  #[test]
  fn clean_prompt_strips_wrapping() {
    assert_eq!(clean_prompt("  Be brief.  ").as_deref(), Some("Be brief."));
    assert_eq!(clean_prompt("```text\nBe brief.\n```").as_deref(), Some("Be brief."));
    assert_eq!(clean_prompt("\"\"\"Be brief.\"\"\"").as_deref(), Some("Be brief."));
    assert_eq!(clean_prompt("   "), None);
    assert_eq!(clean_prompt("```\n```"), None);
  }

  #[test]
  fn feedback_lists_only_messages_with_signals() {
    let message = |role, feedback| Message {
      message_id:      Uuid::new_v4(),
      conversation_id: Uuid::nil(),
      role,
      content:         "x".into(),
      created_at:      Utc::now(),
      feedback,
    };
    let messages = [
      message(Role::User, Feedback::default()),
      message(Role::Assistant, Feedback {
        thumbs_down:   Some(true),
        feedback_text: Some("too verbose".into()),
        ..Default::default()
      }),
    ];
    assert_eq!(
      render_feedback(&messages),
      "- on message 2 (Assistant): thumbs down, \"too verbose\""
    );
    assert_eq!(render_feedback(&messages[..1]), "No feedback was left.");
  }
}
