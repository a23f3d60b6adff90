//! Model providers for Parley.
//!
//! [`OpenAiGateway`] talks to any OpenAI-compatible `/chat/completions`
//! endpoint (OpenAI, Groq, OpenRouter, a local server). [`ScriptedGateway`]
//! replays canned completions and is used by tests and offline runs.

mod openai;
mod scripted;

pub use openai::{GatewayConfig, OpenAiGateway};
pub use scripted::ScriptedGateway;
