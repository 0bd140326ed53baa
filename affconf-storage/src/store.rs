//! Configuration store: one lazily loaded property bag with an explicit age.
//!
//! A store does not touch the backing store until its properties are first
//! needed. From then on it serves the in-memory snapshot and reports how old
//! that snapshot is; [`ConfigurationStore::aged_less_than`] is the gate that
//! refreshes it once a caller's tolerance is exceeded.
//!
//! # Locking
//!
//! All state sits behind one mutex. Loads and reloads run while it is held,
//! so at most one is in flight per store and concurrent readers wait for it
//! and then see its result. `save` also holds the lock, but concurrent saves
//! from several writers are outside the contract: one administrative writer
//! is assumed.

use crate::backend::BackingStore;
use crate::context::StorageContext;
use crate::retry::persist_with_retry;
use affconf_core::{
    elapsed_between, is_default_store, names_match, AffconfResult, BackendError, Clock,
    PropertyBag, StateError, StoreId, StoreOperation, Timestamp,
};
use serde_json::Value;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Default)]
struct StoreState {
    loaded: bool,
    properties: PropertyBag,
    /// `None` means never synchronized.
    last_synchronized: Option<Timestamp>,
}

/// Property bag of one `(application, store_id)` pair.
pub struct ConfigurationStore {
    application: String,
    store_id: StoreId,
    backend: Arc<dyn BackingStore>,
    clock: Arc<dyn Clock>,
    save_attempts: u32,
    state: Mutex<StoreState>,
}

/// Live access to a store's properties.
///
/// Holds the store lock; drop it before calling other store methods from the
/// same thread.
pub struct Properties<'a> {
    guard: MutexGuard<'a, StoreState>,
}

impl Deref for Properties<'_> {
    type Target = PropertyBag;

    fn deref(&self) -> &PropertyBag {
        &self.guard.properties
    }
}

impl DerefMut for Properties<'_> {
    fn deref_mut(&mut self) -> &mut PropertyBag {
        &mut self.guard.properties
    }
}

impl ConfigurationStore {
    /// Create a store in the not-yet-loaded state. No I/O happens here.
    pub fn new(
        context: &StorageContext,
        application: impl Into<String>,
        store_id: impl Into<StoreId>,
    ) -> Self {
        Self {
            application: application.into(),
            store_id: store_id.into(),
            backend: Arc::clone(&context.backend),
            clock: Arc::clone(&context.clock),
            save_attempts: context.save_attempts,
            state: Mutex::new(StoreState::default()),
        }
    }

    pub fn application(&self) -> &str {
        &self.application
    }

    pub fn store_id(&self) -> &str {
        &self.store_id
    }

    /// Whether this is the one store this system may write.
    pub fn is_default(&self) -> bool {
        is_default_store(&self.store_id)
    }

    fn lock(&self) -> AffconfResult<MutexGuard<'_, StoreState>> {
        Ok(self.state.lock().map_err(|_| BackendError::LockPoisoned)?)
    }

    /// Properties, loading them first if this is the first access.
    ///
    /// Edits through the returned guard stay local until [`save`](Self::save).
    pub fn properties(&self) -> AffconfResult<Properties<'_>> {
        let mut guard = self.lock()?;
        if !guard.loaded {
            self.load_locked(&mut guard)?;
        }
        Ok(Properties { guard })
    }

    /// Non-null value of `name`.
    pub fn get(&self, name: &str) -> AffconfResult<Option<Value>> {
        Ok(self.properties()?.value(name).cloned())
    }

    /// Set `name` locally.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> AffconfResult<()> {
        self.properties()?.set(name, value);
        Ok(())
    }

    pub fn is_loaded(&self) -> AffconfResult<bool> {
        Ok(self.lock()?.loaded)
    }

    pub fn last_synchronized(&self) -> AffconfResult<Option<Timestamp>> {
        Ok(self.lock()?.last_synchronized)
    }

    /// Time since the last synchronization, `None` if never synchronized.
    pub fn age(&self) -> AffconfResult<Option<Duration>> {
        let state = self.lock()?;
        Ok(self.age_of(&state))
    }

    fn age_of(&self, state: &StoreState) -> Option<Duration> {
        state
            .last_synchronized
            .map(|at| elapsed_between(at, self.clock.now()))
    }

    /// Reload if loaded and older than `max_age`; otherwise leave as is.
    ///
    /// A reload discards unsaved local edits. A store that was never loaded
    /// is left alone: its first access loads it anyway.
    pub fn aged_less_than(&self, max_age: Duration) -> AffconfResult<&Self> {
        let mut state = self.lock()?;
        if state.loaded {
            if let Some(age) = self.age_of(&state) {
                if age > max_age {
                    tracing::debug!(
                        application = %self.application,
                        store_id = %self.store_id,
                        age_ms = age.as_millis() as u64,
                        max_age_ms = max_age.as_millis() as u64,
                        "Configuration store too old, reloading"
                    );
                    self.reload_locked(&mut state)?;
                }
            }
        }
        Ok(self)
    }

    /// Populate from the backing store if not loaded yet.
    pub fn load(&self) -> AffconfResult<()> {
        let mut state = self.lock()?;
        if !state.loaded {
            self.load_locked(&mut state)?;
        }
        Ok(())
    }

    /// Refetch values from the backing store, discarding local edits.
    pub fn reload(&self) -> AffconfResult<()> {
        let mut state = self.lock()?;
        if state.loaded {
            self.reload_locked(&mut state)
        } else {
            self.load_locked(&mut state)
        }
    }

    /// Seed every schema name with null, then overlay stored values.
    fn load_locked(&self, state: &mut StoreState) -> AffconfResult<()> {
        let schema = self.backend.schema(&self.application)?;
        let mut bag = PropertyBag::seeded(&schema);
        self.fetch_into(&mut bag)?;
        state.properties = bag;
        state.loaded = true;
        state.last_synchronized = Some(self.clock.now());
        tracing::debug!(
            application = %self.application,
            store_id = %self.store_id,
            properties = state.properties.len(),
            "Loaded configuration store"
        );
        Ok(())
    }

    /// Null out existing names, then overlay stored values. No schema query.
    fn reload_locked(&self, state: &mut StoreState) -> AffconfResult<()> {
        let mut bag = state.properties.clone();
        bag.clear_values();
        self.fetch_into(&mut bag)?;
        state.properties = bag;
        state.last_synchronized = Some(self.clock.now());
        Ok(())
    }

    fn fetch_into(&self, bag: &mut PropertyBag) -> AffconfResult<()> {
        match self
            .backend
            .fetch_properties(&self.application, &self.store_id, bag)
        {
            Ok(()) | Err(BackendError::NoMapping { .. }) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn ensure_default(&self, operation: StoreOperation) -> AffconfResult<()> {
        if self.is_default() {
            Ok(())
        } else {
            Err(StateError::ReadOnlyStore {
                application: self.application.clone(),
                store_id: self.store_id.clone(),
                operation,
            }
            .into())
        }
    }

    /// Persist the whole property bag. Default store only.
    ///
    /// Names missing from the backing schema are registered first. The write
    /// itself is retried on stale-credential conflicts up to the configured
    /// budget.
    pub fn save(&self) -> AffconfResult<()> {
        self.ensure_default(StoreOperation::Save)?;
        let mut state = self.lock()?;
        if !state.loaded {
            self.load_locked(&mut state)?;
        }

        self.reconcile_schema(&state.properties)?;

        let attempts = persist_with_retry(
            self.save_attempts,
            &self.application,
            &self.store_id,
            || {
                self.backend
                    .write_properties(&self.application, &self.store_id, &state.properties)
            },
        )?;
        state.last_synchronized = Some(self.clock.now());
        tracing::info!(
            application = %self.application,
            store_id = %self.store_id,
            attempts,
            "Saved configuration store"
        );
        Ok(())
    }

    fn reconcile_schema(&self, properties: &PropertyBag) -> AffconfResult<()> {
        let schema = self.backend.schema(&self.application)?;
        let declared = |name: &str| schema.iter().any(|s| names_match(s, name));
        for name in properties.names().filter(|n| !declared(n)) {
            match self.backend.register_property(&self.application, name) {
                Ok(()) | Err(BackendError::AlreadyExists { .. }) => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    /// Remove the backing record. Default store only; absent is success.
    pub fn delete(&self) -> AffconfResult<()> {
        self.ensure_default(StoreOperation::Delete)?;
        let mut state = self.lock()?;
        match self.backend.delete_store(&self.application, &self.store_id) {
            Ok(()) | Err(BackendError::NoMapping { .. }) => {}
            Err(err) => return Err(err.into()),
        }
        *state = StoreState::default();
        tracing::info!(
            application = %self.application,
            store_id = %self.store_id,
            "Deleted configuration store"
        );
        Ok(())
    }
}

impl std::fmt::Debug for ConfigurationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurationStore")
            .field("application", &self.application)
            .field("store_id", &self.store_id)
            .finish_non_exhaustive()
    }
}
