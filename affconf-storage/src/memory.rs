//! In-memory backing store.
//!
//! A complete implementation of [`BackingStore`] for tests and local
//! development, with hooks for injecting write conflicts and simulating a
//! second writer.

use crate::backend::{BackendResult, BackingStore};
use affconf_core::{
    names_match, new_store_id, ApplicationRecord, BackendError, ContactFilter, PropertyBag,
    StoreId,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

#[derive(Debug, Clone)]
struct ApplicationState {
    record: ApplicationRecord,
    /// Declared property names, compared with [`names_match`].
    schema: Vec<String>,
    stores: HashMap<StoreId, PropertyBag>,
}

impl ApplicationState {
    fn declares(&self, name: &str) -> bool {
        self.schema.iter().any(|s| names_match(s, name))
    }

    fn declare(&mut self, name: &str) -> bool {
        if self.declares(name) {
            return false;
        }
        self.schema.push(name.to_string());
        true
    }
}

#[derive(Debug, Default)]
struct Faults {
    pending_conflicts: u32,
    write_failure: Option<String>,
}

/// In-memory [`BackingStore`].
#[derive(Debug, Default)]
pub struct InMemoryBackingStore {
    applications: Arc<RwLock<HashMap<String, ApplicationState>>>,
    faults: Mutex<Faults>,
    write_attempts: AtomicU64,
    fetches: AtomicU64,
}

fn poisoned<T>(_: T) -> BackendError {
    BackendError::LockPoisoned
}

fn unknown_application(name: &str) -> BackendError {
    BackendError::Transport {
        reason: format!("unknown application '{}'", name),
    }
}

impl InMemoryBackingStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls to `write_properties` fail with
    /// [`BackendError::StaleCredentials`].
    pub fn inject_conflicts(&self, count: u32) -> BackendResult<()> {
        self.faults.lock().map_err(poisoned)?.pending_conflicts = count;
        Ok(())
    }

    /// Make every write fail with a transport error until cleared.
    pub fn inject_write_failure(&self, reason: impl Into<String>) -> BackendResult<()> {
        self.faults.lock().map_err(poisoned)?.write_failure = Some(reason.into());
        Ok(())
    }

    pub fn clear_faults(&self) -> BackendResult<()> {
        *self.faults.lock().map_err(poisoned)? = Faults::default();
        Ok(())
    }

    /// Number of `write_properties` calls, successful or not.
    pub fn write_attempts(&self) -> u64 {
        self.write_attempts.load(Ordering::SeqCst)
    }

    /// Number of `fetch_properties` calls.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Write one value directly, as another writer process would.
    ///
    /// Declares the name in the schema and creates the store record if
    /// needed. Bypasses fault injection.
    pub fn put_property(
        &self,
        application: &str,
        store_id: &str,
        name: &str,
        value: impl Into<Value>,
    ) -> BackendResult<()> {
        let mut applications = self.applications.write().map_err(poisoned)?;
        let state = applications
            .get_mut(application)
            .ok_or_else(|| unknown_application(application))?;
        state.declare(name);
        state
            .stores
            .entry(store_id.to_string())
            .or_default()
            .set(name, value);
        Ok(())
    }

    /// Record a store created by some other system and return its identifier.
    pub fn add_foreign_store(
        &self,
        application: &str,
        properties: PropertyBag,
    ) -> BackendResult<StoreId> {
        let mut applications = self.applications.write().map_err(poisoned)?;
        let state = applications
            .get_mut(application)
            .ok_or_else(|| unknown_application(application))?;
        for name in properties.names() {
            state.declare(name);
        }
        let store_id = new_store_id();
        state.stores.insert(store_id.clone(), properties);
        Ok(store_id)
    }

    /// Snapshot of what is persisted for a store.
    pub fn stored_properties(
        &self,
        application: &str,
        store_id: &str,
    ) -> BackendResult<Option<PropertyBag>> {
        let applications = self.applications.read().map_err(poisoned)?;
        Ok(applications
            .get(application)
            .and_then(|state| state.stores.get(store_id))
            .cloned())
    }

    /// Get count of stored applications.
    pub fn application_count(&self) -> usize {
        self.applications.read().map(|a| a.len()).unwrap_or(0)
    }

    fn take_write_fault(&self, application: &str, store_id: &str) -> BackendResult<()> {
        let mut faults = self.faults.lock().map_err(poisoned)?;
        if let Some(reason) = &faults.write_failure {
            return Err(BackendError::Transport {
                reason: reason.clone(),
            });
        }
        if faults.pending_conflicts > 0 {
            faults.pending_conflicts -= 1;
            return Err(BackendError::StaleCredentials {
                application: application.to_string(),
                store_id: store_id.to_string(),
            });
        }
        Ok(())
    }
}

impl BackingStore for InMemoryBackingStore {
    fn create_application(&self, record: &ApplicationRecord) -> BackendResult<()> {
        let mut applications = self.applications.write().map_err(poisoned)?;
        if applications.contains_key(&record.name) {
            return Err(BackendError::AlreadyExists {
                name: record.name.clone(),
            });
        }
        applications.insert(
            record.name.clone(),
            ApplicationState {
                record: record.clone(),
                schema: Vec::new(),
                stores: HashMap::new(),
            },
        );
        Ok(())
    }

    fn find_application(&self, name: &str) -> BackendResult<Option<ApplicationRecord>> {
        let applications = self.applications.read().map_err(poisoned)?;
        Ok(applications.get(name).map(|state| state.record.clone()))
    }

    fn find_applications(&self, filter: &ContactFilter) -> BackendResult<Vec<ApplicationRecord>> {
        let applications = self.applications.read().map_err(poisoned)?;
        let mut records: Vec<ApplicationRecord> = applications
            .values()
            .filter(|state| filter.matches(&state.record))
            .map(|state| state.record.clone())
            .collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    fn delete_application(&self, name: &str) -> BackendResult<()> {
        self.applications.write().map_err(poisoned)?.remove(name);
        Ok(())
    }

    fn store_ids(&self, application: &str) -> BackendResult<Vec<StoreId>> {
        let applications = self.applications.read().map_err(poisoned)?;
        let state = applications
            .get(application)
            .ok_or_else(|| unknown_application(application))?;
        let mut ids: Vec<StoreId> = state.stores.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn schema(&self, application: &str) -> BackendResult<Vec<String>> {
        let applications = self.applications.read().map_err(poisoned)?;
        let state = applications
            .get(application)
            .ok_or_else(|| unknown_application(application))?;
        Ok(state.schema.clone())
    }

    fn register_property(&self, application: &str, name: &str) -> BackendResult<()> {
        let mut applications = self.applications.write().map_err(poisoned)?;
        let state = applications
            .get_mut(application)
            .ok_or_else(|| unknown_application(application))?;
        if state.declare(name) {
            Ok(())
        } else {
            Err(BackendError::AlreadyExists {
                name: name.to_string(),
            })
        }
    }

    fn fetch_properties(
        &self,
        application: &str,
        store_id: &str,
        bag: &mut PropertyBag,
    ) -> BackendResult<()> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let applications = self.applications.read().map_err(poisoned)?;
        let stored = applications
            .get(application)
            .and_then(|state| state.stores.get(store_id))
            .ok_or_else(|| BackendError::NoMapping {
                application: application.to_string(),
                store_id: store_id.to_string(),
            })?;
        for (name, value) in stored.iter() {
            bag.set(name, value.clone());
        }
        Ok(())
    }

    fn write_properties(
        &self,
        application: &str,
        store_id: &str,
        bag: &PropertyBag,
    ) -> BackendResult<()> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        self.take_write_fault(application, store_id)?;

        let mut applications = self.applications.write().map_err(poisoned)?;
        let state = applications
            .get_mut(application)
            .ok_or_else(|| unknown_application(application))?;
        if let Some(undeclared) = bag.names().find(|name| !state.declares(name)) {
            return Err(BackendError::Transport {
                reason: format!("property '{}' is not declared for '{}'", undeclared, application),
            });
        }
        state.stores.insert(store_id.to_string(), bag.clone());
        Ok(())
    }

    fn delete_store(&self, application: &str, store_id: &str) -> BackendResult<()> {
        let mut applications = self.applications.write().map_err(poisoned)?;
        let removed = applications
            .get_mut(application)
            .and_then(|state| state.stores.remove(store_id));
        match removed {
            Some(_) => Ok(()),
            None => Err(BackendError::NoMapping {
                application: application.to_string(),
                store_id: store_id.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use affconf_core::DEFAULT_STORE_ID;
    use serde_json::json;

    fn store_with_app(name: &str) -> InMemoryBackingStore {
        let store = InMemoryBackingStore::new();
        store
            .create_application(&ApplicationRecord::owned(name, "test", "users", "admins"))
            .unwrap();
        store
    }

    #[test]
    fn test_create_duplicate_application_fails() {
        let store = store_with_app("App1");
        let result =
            store.create_application(&ApplicationRecord::owned("App1", "again", "u", "a"));
        assert!(matches!(result, Err(BackendError::AlreadyExists { .. })));
    }

    #[test]
    fn test_fetch_unknown_store_is_no_mapping() {
        let store = store_with_app("App1");
        let mut bag = PropertyBag::new();
        let result = store.fetch_properties("App1", DEFAULT_STORE_ID, &mut bag);
        assert!(matches!(result, Err(BackendError::NoMapping { .. })));
        assert_eq!(store.fetch_count(), 1);
    }

    #[test]
    fn test_write_requires_declared_names() {
        let store = store_with_app("App1");
        let mut bag = PropertyBag::new();
        bag.set("K", "V");
        assert!(matches!(
            store.write_properties("App1", DEFAULT_STORE_ID, &bag),
            Err(BackendError::Transport { .. })
        ));

        store.register_property("App1", "K").unwrap();
        store.write_properties("App1", DEFAULT_STORE_ID, &bag).unwrap();
        let stored = store.stored_properties("App1", DEFAULT_STORE_ID).unwrap().unwrap();
        assert_eq!(stored.get("k"), Some(&json!("V")));
    }

    #[test]
    fn test_register_property_twice_is_already_exists() {
        let store = store_with_app("App1");
        store.register_property("App1", "Key").unwrap();
        assert!(matches!(
            store.register_property("App1", "KEY"),
            Err(BackendError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn test_injected_conflicts_are_consumed() {
        let store = store_with_app("App1");
        store.inject_conflicts(2).unwrap();
        let bag = PropertyBag::new();
        for _ in 0..2 {
            assert!(matches!(
                store.write_properties("App1", DEFAULT_STORE_ID, &bag),
                Err(BackendError::StaleCredentials { .. })
            ));
        }
        store.write_properties("App1", DEFAULT_STORE_ID, &bag).unwrap();
        assert_eq!(store.write_attempts(), 3);
    }

    #[test]
    fn test_delete_missing_store_is_no_mapping() {
        let store = store_with_app("App1");
        assert!(matches!(
            store.delete_store("App1", DEFAULT_STORE_ID),
            Err(BackendError::NoMapping { .. })
        ));
    }

    #[test]
    fn test_foreign_store_listed() {
        let store = store_with_app("App1");
        let id = store.add_foreign_store("App1", PropertyBag::new()).unwrap();
        assert_eq!(store.store_ids("App1").unwrap(), vec![id]);
    }

    #[test]
    fn test_find_applications_by_contact() {
        let store = store_with_app("App1");
        store
            .create_application(&ApplicationRecord {
                name: "Other".to_string(),
                description: String::new(),
                contact: "someone@else".to_string(),
                user_group: "u".to_string(),
                administrator_group: "a".to_string(),
            })
            .unwrap();

        assert_eq!(store.find_applications(&ContactFilter::Any).unwrap().len(), 2);
        let owned = store.find_applications(&ContactFilter::owned()).unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].name, "App1");
    }
}
