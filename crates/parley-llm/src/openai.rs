//! [`OpenAiGateway`] — a [`ModelGateway`] over the OpenAI chat-completions
//! wire format.

use std::time::Duration;

use parley_core::gateway::{CompletionRequest, GatewayError, ModelGateway};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
  /// Base URL up to and including the API version, e.g.
  /// `https://api.groq.com/openai/v1`.
  pub base_url: String,
  pub api_key:  String,
  /// Upper bound for one request, connect to last byte.
  pub timeout:  Duration,
}

/// HTTP client for a chat-completions endpoint.
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based. Every call
/// is a single attempt; nothing is retried or cached.
#[derive(Clone)]
pub struct OpenAiGateway {
  client: Client,
  config: GatewayConfig,
}

impl OpenAiGateway {
  pub fn new(config: GatewayConfig) -> reqwest::Result<Self> {
    let client = Client::builder().timeout(config.timeout).build()?;
    Ok(Self { client, config })
  }

  fn url(&self) -> String {
    format!(
      "{}/chat/completions",
      self.config.base_url.trim_end_matches('/')
    )
  }
}

// ─── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
  model:             &'a str,
  messages:          Vec<ApiMessage<'a>>,
  temperature:       f32,
  max_tokens:        u32,
  frequency_penalty: f32,
  stream:            bool,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
  role:    &'a str,
  content: &'a str,
}

impl<'a> ApiRequest<'a> {
  fn from_request(request: &'a CompletionRequest) -> Self {
    Self {
      model:             &request.model,
      messages:          request
        .messages
        .iter()
        .map(|m| ApiMessage {
          role:    m.role.as_ref(),
          content: &m.content,
        })
        .collect(),
      temperature:       request.sampling.temperature,
      max_tokens:        request.sampling.max_tokens,
      frequency_penalty: request.sampling.frequency_penalty,
      stream:            false,
    }
  }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
  #[serde(default)]
  choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
  message: ApiReply,
}

#[derive(Debug, Deserialize)]
struct ApiReply {
  content: Option<String>,
}

/// Pull the first choice's text out of a response body.
fn completion_text(body: &str) -> Result<String, GatewayError> {
  let response: ApiResponse = serde_json::from_str(body)
    .map_err(|e| GatewayError::Malformed(format!("invalid JSON body: {e}")))?;
  response
    .choices
    .into_iter()
    .next()
    .and_then(|c| c.message.content)
    .ok_or_else(|| GatewayError::Malformed("no completion in response".into()))
}

// ─── ModelGateway impl ────────────────────────────────────────────────────────

impl ModelGateway for OpenAiGateway {
  async fn complete(&self, request: CompletionRequest) -> Result<String, GatewayError> {
    let body = ApiRequest::from_request(&request);
    tracing::debug!(
      model = %request.model,
      messages = request.messages.len(),
      "sending completion request"
    );

    let resp = self
      .client
      .post(self.url())
      .bearer_auth(&self.config.api_key)
      .json(&body)
      .send()
      .await
      .map_err(|e| GatewayError::Network(e.to_string()))?;

    let status = resp.status();
    let text = resp
      .text()
      .await
      .map_err(|e| GatewayError::Network(e.to_string()))?;

    if status == StatusCode::TOO_MANY_REQUESTS {
      return Err(GatewayError::RateLimited);
    }
    if !status.is_success() {
      tracing::warn!(status = status.as_u16(), body = %text, "provider returned error");
      return Err(GatewayError::Status {
        status:  status.as_u16(),
        message: text,
      });
    }

    completion_text(&text)
  }
}
