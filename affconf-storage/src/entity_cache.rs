//! Application cache: name → resolved [`Application`], sliding expiration.
//!
//! Reads within the window share one `Application` and therefore one store
//! collection, whose stores may be stale. Bounding staleness is the job of
//! [`ConfigurationStore::aged_less_than`](crate::ConfigurationStore::aged_less_than),
//! not of eviction here.

use crate::application::Application;
use crate::cache::{CacheStats, SlidingCache};
use crate::context::StorageContext;
use affconf_core::{AffconfResult, LookupError};
use std::sync::Arc;
use std::time::Duration;

/// Sliding cache of applications resolved through the backing store.
#[derive(Debug)]
pub struct EntityCache {
    cache: SlidingCache<String, Arc<Application>>,
}

impl EntityCache {
    pub fn new(context: StorageContext, window: Duration) -> Self {
        let clock = Arc::clone(&context.clock);
        let cache = SlidingCache::new(window, clock, move |name: &String| {
            let record = context
                .backend
                .find_application(name)?
                .ok_or_else(|| LookupError::ApplicationNotFound { name: name.clone() })?;
            tracing::debug!(application = %name, "Resolved application");
            Ok(Arc::new(Application::new(record, context.clone())))
        });
        Self { cache }
    }

    /// The cached application, resolving it if absent or idle too long.
    pub fn get(&self, name: &str) -> AffconfResult<Arc<Application>> {
        self.cache.get(&name.to_string())
    }

    pub fn invalidate(&self, name: &str) -> AffconfResult<()> {
        self.cache.invalidate(&name.to_string())
    }

    pub fn clear(&self) -> AffconfResult<()> {
        self.cache.clear()
    }

    /// Drop applications idle for longer than the window.
    pub fn purge_expired(&self) -> AffconfResult<u64> {
        self.cache.purge_expired()
    }

    pub fn window(&self) -> Duration {
        self.cache.window()
    }

    pub fn stats(&self) -> AffconfResult<CacheStats> {
        self.cache.stats()
    }
}
