//! Shared handles every store and cache is built from.

use crate::backend::BackingStore;
use affconf_core::{Clock, ReaderConfig, SystemClock, MAX_SAVE_ATTEMPTS};
use std::sync::Arc;

/// Backing store, clock and retry budget shared by the storage layer.
#[derive(Clone)]
pub struct StorageContext {
    pub backend: Arc<dyn BackingStore>,
    pub clock: Arc<dyn Clock>,
    pub save_attempts: u32,
}

impl StorageContext {
    /// Context on the wall clock with the default retry budget.
    pub fn new(backend: Arc<dyn BackingStore>) -> Self {
        Self {
            backend,
            clock: Arc::new(SystemClock),
            save_attempts: MAX_SAVE_ATTEMPTS,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_save_attempts(mut self, attempts: u32) -> Self {
        self.save_attempts = attempts;
        self
    }

    /// Apply the retry budget from a reader configuration.
    pub fn configured(self, config: &ReaderConfig) -> Self {
        self.with_save_attempts(config.save_attempts)
    }
}

impl std::fmt::Debug for StorageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageContext")
            .field("clock", &self.clock)
            .field("save_attempts", &self.save_attempts)
            .finish_non_exhaustive()
    }
}
