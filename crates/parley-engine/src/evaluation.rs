//! The evaluation batch: score every stored conversation with the judge model
//! and average the scores per variant.
//!
//! One conversation's failure never stops the batch. It is recorded as
//! [`Outcome::Failed`] and left out of the averages.

use std::collections::BTreeMap;

use parley_core::{
  context::{ChatMessage, transcript},
  conversation::Conversation,
  gateway::{CompletionRequest, ModelGateway},
  store::ConversationStore,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  Engine, Error, Result,
  judge::{Score, Verdict, evaluation_prompt, parse_verdict},
};

/// Averages key for conversations recorded without a variant label.
pub const UNLABELLED: &str = "unlabelled";

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
  Scored(Verdict),
  /// Nothing to judge, e.g. a conversation with no messages.
  Skipped(String),
  Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
  pub conversation_id: Uuid,
  pub variant_label:   Option<String>,
  pub outcome:         Outcome,
}

impl Evaluation {
  pub fn score(&self) -> Option<Score> {
    match &self.outcome {
      Outcome::Scored(verdict) => Some(verdict.score),
      _ => None,
    }
  }
}

/// The flat, serialisable view of one [`Evaluation`].
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationRecord {
  pub conversation_id: Uuid,
  pub variant_label:   Option<String>,
  pub score:           Option<Score>,
  pub comment:         Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error:           Option<String>,
}

impl From<&Evaluation> for EvaluationRecord {
  fn from(e: &Evaluation) -> Self {
    let (score, comment, error) = match &e.outcome {
      Outcome::Scored(v) => (Some(v.score), Some(v.comment.clone()), None),
      Outcome::Skipped(_) => (None, None, None),
      Outcome::Failed(reason) => (None, None, Some(reason.clone())),
    };
    Self {
      conversation_id: e.conversation_id,
      variant_label:   e.variant_label.clone(),
      score,
      comment,
      error,
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct EvaluationReport {
  pub evaluations: Vec<Evaluation>,
  /// Mean score per variant label, over scored conversations only.
  pub averages:    BTreeMap<String, f64>,
}

impl EvaluationReport {
  pub fn records(&self) -> Vec<EvaluationRecord> {
    self.evaluations.iter().map(EvaluationRecord::from).collect()
  }

  pub fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
    self.evaluations.iter().filter(|e| pred(&e.outcome)).count()
  }
}

impl Serialize for EvaluationReport {
  fn serialize<Ser: serde::Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
    #[derive(Serialize)]
    struct Wire<'a> {
      results:  Vec<EvaluationRecord>,
      averages: &'a BTreeMap<String, f64>,
    }
    Wire {
      results:  self.records(),
      averages: &self.averages,
    }
    .serialize(serializer)
  }
}

/// Mean score per label. Labels with no scored conversation are absent.
pub fn averages(evaluations: &[Evaluation]) -> BTreeMap<String, f64> {
  let mut sums: BTreeMap<String, (u32, u32)> = BTreeMap::new();
  for e in evaluations {
    let Some(score) = e.score() else { continue };
    let label = e.variant_label.clone().unwrap_or_else(|| UNLABELLED.to_owned());
    let (total, count) = sums.entry(label).or_default();
    *total += u32::from(score.get());
    *count += 1;
  }
  sums
    .into_iter()
    .map(|(label, (total, count))| (label, f64::from(total) / f64::from(count)))
    .collect()
}

impl<S: ConversationStore, G: ModelGateway> Engine<S, G> {
  /// Score every stored conversation, oldest first.
  ///
  /// Only failing to list conversations fails the whole batch.
  pub async fn evaluate_all(&self) -> Result<EvaluationReport> {
    let conversations = self.store.list_conversations().await.map_err(Error::store)?;
    let mut evaluations = Vec::with_capacity(conversations.len());
    for conversation in &conversations {
      evaluations.push(self.evaluate(conversation).await);
    }

    let report = EvaluationReport {
      averages: averages(&evaluations),
      evaluations,
    };
    tracing::info!(
      conversations = conversations.len(),
      scored = report.count(|o| matches!(o, Outcome::Scored(_))),
      skipped = report.count(|o| matches!(o, Outcome::Skipped(_))),
      failed = report.count(|o| matches!(o, Outcome::Failed(_))),
      "evaluation finished"
    );
    Ok(report)
  }

  /// Score one conversation. Failures are folded into the outcome.
  pub async fn evaluate(&self, conversation: &Conversation) -> Evaluation {
    let conversation_id = conversation.conversation_id;
    let outcome = match self.judge(conversation_id).await {
      Ok(Some(verdict)) => Outcome::Scored(verdict),
      Ok(None) => Outcome::Skipped("conversation has no messages".into()),
      Err(e) => {
        tracing::warn!(%conversation_id, error = %e, "evaluation failed");
        Outcome::Failed(e.to_string())
      }
    };
    Evaluation {
      conversation_id,
      variant_label: conversation.variant_label.clone(),
      outcome,
    }
  }

  async fn judge(&self, conversation_id: Uuid) -> Result<Option<Verdict>> {
    let messages = self
      .store
      .messages(conversation_id)
      .await
      .map_err(Error::store)?;
    if messages.is_empty() {
      return Ok(None);
    }

    let judge = &self.settings.judge;
    let request = CompletionRequest {
      model:    judge.model.clone(),
      messages: vec![ChatMessage::user(evaluation_prompt(&transcript(&messages)))],
      sampling: judge.sampling(judge.evaluation_max_tokens),
    };
    let raw = self.gateway.complete(request).await?;
    Ok(Some(parse_verdict(&raw)?))
  }
}
