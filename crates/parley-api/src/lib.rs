//! JSON HTTP API for Parley.
//!
//! Exposes an axum [`Router`] over a [`parley_engine::Engine`]. TLS, auth and
//! request tracing are the caller's responsibility.
//!
//! | Method  | Path          | Body / result |
//! |---------|---------------|---------------|
//! | `GET`   | `/ping`       | `{"message": "pong"}` |
//! | `POST`  | `/chat`       | [`TurnRequest`] → [`TurnReply`] |
//! | `PATCH` | `/feedback`   | [`FeedbackRequest`] → [`feedback::FeedbackAck`] |
//! | `GET`   | `/talks-data` | every conversation with its messages |
//! | `POST`  | `/variants/reload` | re-read the variant source → [`variants::Reloaded`] |
//!
//! [`TurnRequest`]: parley_engine::chat::TurnRequest
//! [`TurnReply`]: parley_engine::chat::TurnReply
//! [`FeedbackRequest`]: parley_engine::feedback::FeedbackRequest

pub mod chat;
pub mod error;
pub mod feedback;
pub mod talks;
pub mod variants;


use axum::{
  Json, Router,
  routing::{get, patch, post},
};
use parley_core::{gateway::ModelGateway, store::ConversationStore};
use parley_engine::Engine;
use serde_json::{Value, json};

pub use error::ApiError;

/// Build the API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, G>(engine: Engine<S, G>) -> Router<()>
where
  S: ConversationStore + 'static,
  G: ModelGateway + 'static,
{
  Router::new()
    .route("/ping", get(ping))
    .route("/chat", post(chat::turn::<S, G>))
    .route("/feedback", patch(feedback::submit::<S, G>))
    .route("/talks-data", get(talks::list::<S, G>))
    .route("/variants/reload", post(variants::reload::<S, G>))
    .with_state(engine)
}

/// `GET /ping`
async fn ping() -> Json<Value> { Json(json!({ "message": "pong" })) }
