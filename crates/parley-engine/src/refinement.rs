//! The refinement batch: rewrite the prompt profile behind each low-scoring
//! conversation.
//!
//! A conversation is a candidate only if it was scored and the score is
//! strictly below the configured threshold. Unscored and failed evaluations
//! are never treated as low. A rewrite is committed only when it is
//! non-empty and differs from the current prompt, so re-running on stable
//! judge output changes nothing.

use parley_core::{
  context::{ChatMessage, transcript},
  conversation::Conversation,
  gateway::{CompletionRequest, ModelGateway},
  profile::PromptProfile,
  store::{ConversationStore, PromptUpdate},
};
use uuid::Uuid;

use crate::{
  Engine, Error, Result,
  evaluation::Evaluation,
  judge::{clean_prompt, refinement_prompt, render_feedback},
};

/// What happened to one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefineOutcome {
  /// The profile now holds the revised prompt.
  Updated { profile_id: Uuid },
  /// The judge returned nothing usable or the same prompt.
  Unchanged { profile_id: Uuid },
  Skipped(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refinement {
  pub conversation_id: Uuid,
  /// `Err` holds the reason a candidate failed.
  pub outcome:         Result<RefineOutcome, String>,
}

#[derive(Debug, Clone, Default)]
pub struct RefinementReport {
  pub refinements: Vec<Refinement>,
}

impl RefinementReport {
  /// Number of profiles whose prompt actually changed.
  pub fn updated(&self) -> usize {
    self
      .refinements
      .iter()
      .filter(|r| matches!(r.outcome, Ok(RefineOutcome::Updated { .. })))
      .count()
  }

  pub fn failed(&self) -> usize {
    self.refinements.iter().filter(|r| r.outcome.is_err()).count()
  }
}

impl<S: ConversationStore, G: ModelGateway> Engine<S, G> {
  /// Whether `evaluation` selects its conversation for refinement.
  pub fn is_candidate(&self, evaluation: &Evaluation) -> bool {
    evaluation
      .score()
      .is_some_and(|score| score.get() < self.settings.refinement.threshold)
  }

  /// Refine every candidate among `evaluations`, in order.
  ///
  /// A failing candidate is logged and recorded; the rest still run.
  pub async fn refine_all(&self, evaluations: &[Evaluation]) -> RefinementReport {
    let mut report = RefinementReport::default();
    for evaluation in evaluations.iter().filter(|e| self.is_candidate(e)) {
      let conversation_id = evaluation.conversation_id;
      let outcome = self.refine_conversation(conversation_id).await.map_err(|e| {
        tracing::warn!(%conversation_id, error = %e, "refinement failed");
        e.to_string()
      });
      report.refinements.push(Refinement { conversation_id, outcome });
    }

    tracing::info!(
      candidates = report.refinements.len(),
      updated = report.updated(),
      failed = report.failed(),
      "refinement finished"
    );
    report
  }

  /// Ask the judge for a revised prompt for one conversation and commit it.
  pub async fn refine_conversation(&self, conversation_id: Uuid) -> Result<RefineOutcome> {
    let conversation = self
      .store
      .get_conversation(conversation_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::ConversationNotFound(conversation_id))?;

    let messages = self
      .store
      .messages(conversation_id)
      .await
      .map_err(Error::store)?;
    if messages.is_empty() {
      return Ok(RefineOutcome::Skipped("conversation has no messages".into()));
    }

    let Some(profile) = self.profile_for(&conversation).await? else {
      return Ok(RefineOutcome::Skipped(
        "no prompt profile attached and default profile creation is disabled".into(),
      ));
    };
    let profile_id = profile.profile_id;

    let judge = &self.settings.judge;
    let prompt = refinement_prompt(
      &profile.system_prompt,
      &transcript(&messages),
      &render_feedback(&messages),
    );
    let request = CompletionRequest {
      model:    judge.model.clone(),
      messages: vec![ChatMessage::user(prompt)],
      sampling: judge.sampling(judge.refinement_max_tokens),
    };
    let raw = self.gateway.complete(request).await?;

    let Some(revised) = clean_prompt(&raw) else {
      tracing::debug!(%conversation_id, %profile_id, "judge returned an empty prompt");
      return Ok(RefineOutcome::Unchanged { profile_id });
    };
    if revised == profile.system_prompt {
      return Ok(RefineOutcome::Unchanged { profile_id });
    }

    match self
      .store
      .update_profile_prompt(profile_id, revised)
      .await
      .map_err(Error::store)?
    {
      PromptUpdate::Changed => {
        tracing::info!(%conversation_id, %profile_id, "updated prompt profile");
        Ok(RefineOutcome::Updated { profile_id })
      }
      PromptUpdate::Unchanged => Ok(RefineOutcome::Unchanged { profile_id }),
    }
  }

  /// The profile to rewrite for a conversation.
  ///
  /// A conversation without one gets the default profile attached first,
  /// unless auto-creation is disabled. If another writer attached a profile
  /// in the meantime, that one is used. An attached profile that cannot be
  /// read back is a persistence failure.
  async fn profile_for(&self, conversation: &Conversation) -> Result<Option<PromptProfile>> {
    let conversation_id = conversation.conversation_id;
    let profile_id = match conversation.prompt_profile_id {
      Some(id) => id,
      None => {
        let Some(prompt) = self.settings.refinement.default_profile_prompt() else {
          return Ok(None);
        };
        let profile = self
          .store
          .get_or_create_profile(prompt.to_owned(), Some("default".into()))
          .await
          .map_err(Error::store)?;
        let attached = self
          .store
          .attach_profile(conversation_id, profile.profile_id)
          .await
          .map_err(Error::store)?;
        tracing::info!(%conversation_id, profile_id = %profile.profile_id, "attached default prompt profile");

        match attached.prompt_profile_id {
          Some(id) if id != profile.profile_id => id,
          _ => return Ok(Some(profile)),
        }
      }
    };

    match self.store.get_profile(profile_id).await.map_err(Error::store)? {
      Some(profile) => Ok(Some(profile)),
      None => Err(Error::Persistence(
        format!("conversation {conversation_id} references missing prompt profile {profile_id}")
          .into(),
      )),
    }
  }
}
