//! Source registry.
//!
//! An ordered map keyed by source id. Iteration order is ascending priority,
//! with registration order breaking ties.

use std::sync::Arc;

use tracing::debug;

use crate::error::{EngineResult, GuidanceError};
use crate::source::GuidanceSource;

#[derive(Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn GuidanceSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self { sources: Vec::new() }
    }

    /// Register a source under its `id()`.
    pub fn register(&mut self, source: Arc<dyn GuidanceSource>) -> EngineResult<()> {
        let id = source.id().to_string();
        if self.contains(&id) {
            return Err(GuidanceError::DuplicateSource(id));
        }
        debug!("Registering guidance source: {} (priority {})", id, source.priority());

        // Stable insert keeps registration order among equal priorities
        let at = self
            .sources
            .iter()
            .position(|s| s.priority() > source.priority())
            .unwrap_or(self.sources.len());
        self.sources.insert(at, source);
        Ok(())
    }

    pub fn unregister(&mut self, id: &str) -> Option<Arc<dyn GuidanceSource>> {
        let index = self.sources.iter().position(|s| s.id() == id)?;
        debug!("Unregistering guidance source: {}", id);
        Some(self.sources.remove(index))
    }

    fn contains(&self, id: &str) -> bool {
        self.sources.iter().any(|s| s.id() == id)
    }

    /// Source ids in evaluation order.
    pub fn ids(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.id()).collect()
    }

    /// Sources in evaluation order.
    pub fn ordered(&self) -> Vec<Arc<dyn GuidanceSource>> {
        self.sources.clone()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("sources", &self.ids())
            .finish()
    }
}
