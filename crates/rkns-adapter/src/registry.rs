use std::fmt;
use std::sync::Arc;

use rkns_types::FormatId;
use tracing::{debug, warn};

use crate::adapter::FormatAdapter;
use crate::error::{AdapterError, AdapterResult};

/// Maps foreign format ids to their adapters.
///
/// Built once at startup and then shared read-only; callers pass it
/// explicitly wherever a document needs to detect or populate. Detection
/// tries adapters in registration order and the first match wins.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: Vec<(FormatId, Arc<dyn FormatAdapter>)>,
}

impl AdapterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `adapter` for its format.
    ///
    /// Re-registering a format replaces the previous adapter in place, so
    /// detection order does not change, and logs a warning.
    pub fn register(&mut self, adapter: Arc<dyn FormatAdapter>) -> AdapterResult<()> {
        let format = adapter.format();
        if !format.is_foreign() {
            return Err(AdapterError::ReservedFormat(format));
        }
        match self.adapters.iter_mut().find(|(id, _)| *id == format) {
            Some(slot) => {
                warn!(
                    format = %format,
                    previous = slot.1.name(),
                    replacement = adapter.name(),
                    "adapter replaced"
                );
                slot.1 = adapter;
            }
            None => {
                debug!(format = %format, adapter = adapter.name(), "adapter registered");
                self.adapters.push((format, adapter));
            }
        }
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, adapter: Arc<dyn FormatAdapter>) -> AdapterResult<Self> {
        self.register(adapter)?;
        Ok(self)
    }

    /// The adapter for `format`.
    pub fn get(&self, format: FormatId) -> AdapterResult<Arc<dyn FormatAdapter>> {
        self.adapters
            .iter()
            .find(|(id, _)| *id == format)
            .map(|(_, adapter)| Arc::clone(adapter))
            .ok_or(AdapterError::NotFound(format))
    }

    pub fn contains(&self, format: FormatId) -> bool {
        self.adapters.iter().any(|(id, _)| *id == format)
    }

    /// Registered formats in detection order.
    pub fn formats(&self) -> Vec<FormatId> {
        self.adapters.iter().map(|(id, _)| *id).collect()
    }

    /// Adapters in detection order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn FormatAdapter>> {
        self.adapters.iter().map(|(_, adapter)| adapter)
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// First format whose adapter accepts `prefix`.
    pub fn detect(&self, prefix: &[u8]) -> Option<FormatId> {
        self.adapters
            .iter()
            .find(|(_, adapter)| adapter.detect(prefix))
            .map(|(id, _)| *id)
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("adapter_count", &self.adapters.len())
            .field("formats", &self.formats())
            .finish()
    }
}
