//! The conversational engine: variant resolution, context assembly, turns,
//! feedback, and the evaluate/refine loop.
//!
//! Everything here is generic over a [`ConversationStore`] and a
//! [`ModelGateway`]; the HTTP layer and the binary pick the concrete types.

pub mod assembly;
pub mod chat;
pub mod error;
pub mod evaluation;
pub mod feedback;
pub mod judge;
pub mod refinement;
pub mod registry;
pub mod settings;


use std::sync::Arc;

pub use error::{Error, Result};
use parley_core::{gateway::ModelGateway, store::ConversationStore};
pub use registry::VariantRegistry;
pub use settings::EngineSettings;

/// Shared handles for every engine operation.
///
/// Cheap to clone; all clones share the same store, gateway and registry.
pub struct Engine<S, G> {
  store:    Arc<S>,
  gateway:  Arc<G>,
  registry: Arc<VariantRegistry>,
  settings: Arc<EngineSettings>,
}

impl<S, G> Clone for Engine<S, G> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      gateway:  Arc::clone(&self.gateway),
      registry: Arc::clone(&self.registry),
      settings: Arc::clone(&self.settings),
    }
  }
}

impl<S: ConversationStore, G: ModelGateway> Engine<S, G> {
  pub fn new(
    store: Arc<S>,
    gateway: Arc<G>,
    registry: Arc<VariantRegistry>,
    settings: EngineSettings,
  ) -> Self {
    Self {
      store,
      gateway,
      registry,
      settings: Arc::new(settings),
    }
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn registry(&self) -> &VariantRegistry { &self.registry }

  pub fn settings(&self) -> &EngineSettings { &self.settings }
}
