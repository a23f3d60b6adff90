//! Core types and trait definitions for Parley.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends implement [`store::ConversationStore`]; model providers
//! implement [`gateway::ModelGateway`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod context;
pub mod conversation;
pub mod error;
pub mod gateway;
pub mod profile;
pub mod store;
pub mod variant;

pub use error::{Error, Result};
