//! [`ScriptedGateway`] — a deterministic [`ModelGateway`] that replays queued
//! completions.

use std::{
  collections::VecDeque,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use parley_core::gateway::{CompletionRequest, GatewayError, ModelGateway};

#[derive(Default)]
struct Script {
  queue:    VecDeque<Result<String, GatewayError>>,
  fallback: Option<String>,
  seen:     Vec<CompletionRequest>,
}

/// Replays queued responses in order and records every request.
///
/// Once the queue is empty the fallback reply (if any) is returned; without
/// one the call fails with a 503 status error. Clones share the same script.
#[derive(Clone, Default)]
pub struct ScriptedGateway {
  script: Arc<Mutex<Script>>,
}

impl ScriptedGateway {
  pub fn new() -> Self { Self::default() }

  /// A gateway that answers every call with `reply`.
  pub fn always(reply: impl Into<String>) -> Self {
    let gateway = Self::new();
    gateway.lock().fallback = Some(reply.into());
    gateway
  }

  fn lock(&self) -> MutexGuard<'_, Script> {
    self.script.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Queue a successful completion.
  pub fn push_reply(&self, reply: impl Into<String>) -> &Self {
    self.lock().queue.push_back(Ok(reply.into()));
    self
  }

  /// Queue a failure.
  pub fn push_error(&self, error: GatewayError) -> &Self {
    self.lock().queue.push_back(Err(error));
    self
  }

  /// Every request received so far, oldest first.
  pub fn requests(&self) -> Vec<CompletionRequest> { self.lock().seen.clone() }
}

impl ModelGateway for ScriptedGateway {
  async fn complete(&self, request: CompletionRequest) -> Result<String, GatewayError> {
    let mut script = self.lock();
    script.seen.push(request);
    match script.queue.pop_front() {
      Some(outcome) => outcome,
      None => script.fallback.clone().ok_or(GatewayError::Status {
        status:  503,
        message: "script exhausted".into(),
      }),
    }
  }
}

#[cfg(test)]
mod tests {
  use parley_core::{context::ChatMessage, variant::SamplingParams};

  use super::*;

  fn request(text: &str) -> CompletionRequest {
    CompletionRequest {
      model:    "m".into(),
      messages: vec![ChatMessage::user(text)],
      sampling: SamplingParams {
        temperature:       0.0,
        max_tokens:        10,
        frequency_penalty: 0.0,
      },
    }
  }

  #[tokio::test]
  async fn replays_queue_then_fallback() {
    let g = ScriptedGateway::always("fallback");
    g.push_reply("one").push_error(GatewayError::RateLimited);

    assert_eq!(g.complete(request("a")).await.unwrap(), "one");
    assert!(matches!(g.complete(request("b")).await, Err(GatewayError::RateLimited)));
    assert_eq!(g.complete(request("c")).await.unwrap(), "fallback");
    assert_eq!(g.requests().len(), 3);
    assert_eq!(g.requests()[1].messages[0].content, "b");
  }

  #[tokio::test]
  async fn exhausted_script_without_fallback_fails() {
    let g = ScriptedGateway::new();
    assert_eq!(g.complete(request("a")).await.unwrap_err().status(), Some(503));
  }
}
