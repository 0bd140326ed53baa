//! The set of configuration stores recorded for one application.

use crate::context::StorageContext;
use crate::store::ConfigurationStore;
use affconf_core::{is_default_store, AffconfResult, ApplicationRecord, StoreId, DEFAULT_STORE_ID};
use std::collections::HashMap;
use std::sync::Arc;

/// Stores of one application, keyed by store identifier.
///
/// The key set is fixed at construction; the stores' properties are not.
#[derive(Debug)]
pub struct ConfigurationStoreCollection {
    application: String,
    stores: HashMap<StoreId, Arc<ConfigurationStore>>,
}

impl ConfigurationStoreCollection {
    /// Discover the application's stores.
    ///
    /// An application owned by this system always gets a default store, even
    /// before anything has been written to it.
    pub fn for_application(
        context: &StorageContext,
        record: &ApplicationRecord,
    ) -> AffconfResult<Self> {
        let mut stores = HashMap::new();
        for id in context.backend.store_ids(&record.name)? {
            let store = ConfigurationStore::new(context, record.name.clone(), id.clone());
            stores.insert(id, Arc::new(store));
        }
        if record.is_owned_by_us() && !stores.contains_key(DEFAULT_STORE_ID) {
            let store = ConfigurationStore::new(context, record.name.clone(), DEFAULT_STORE_ID);
            stores.insert(DEFAULT_STORE_ID.to_string(), Arc::new(store));
        }
        tracing::debug!(
            application = %record.name,
            stores = stores.len(),
            "Resolved configuration stores"
        );
        Ok(Self {
            application: record.name.clone(),
            stores,
        })
    }

    pub fn application(&self) -> &str {
        &self.application
    }

    pub fn get(&self, store_id: &str) -> Option<&Arc<ConfigurationStore>> {
        self.stores.get(store_id)
    }

    pub fn contains_key(&self, store_id: &str) -> bool {
        self.stores.contains_key(store_id)
    }

    pub fn values(&self) -> impl Iterator<Item = &Arc<ConfigurationStore>> {
        self.stores.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.stores.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// The store this system owns, if the application has one.
    pub fn default_store(&self) -> Option<&Arc<ConfigurationStore>> {
        self.stores.get(DEFAULT_STORE_ID)
    }

    /// Whether any store was created by some other system.
    pub fn contains_foreign_stores(&self) -> bool {
        self.stores.keys().any(|id| !is_default_store(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackingStore;
    use crate::memory::InMemoryBackingStore;
    use affconf_core::PropertyBag;

    fn foreign_record(name: &str) -> ApplicationRecord {
        ApplicationRecord {
            name: name.to_string(),
            description: String::new(),
            contact: "other@system".to_string(),
            user_group: "u".to_string(),
            administrator_group: "a".to_string(),
        }
    }

    #[test]
    fn test_owned_application_gets_default_store() {
        let backend = Arc::new(InMemoryBackingStore::new());
        let record = ApplicationRecord::owned("App1", "", "u", "a");
        backend.create_application(&record).unwrap();
        let context = StorageContext::new(backend);

        let stores = ConfigurationStoreCollection::for_application(&context, &record).unwrap();
        assert_eq!(stores.len(), 1);
        assert!(stores.default_store().is_some());
        assert!(stores.contains_key(DEFAULT_STORE_ID));
        assert!(!stores.contains_foreign_stores());
    }

    #[test]
    fn test_foreign_application_has_no_default_store() {
        let backend = Arc::new(InMemoryBackingStore::new());
        let record = foreign_record("Foreign");
        backend.create_application(&record).unwrap();
        let foreign_id = backend
            .add_foreign_store("Foreign", PropertyBag::new())
            .unwrap();
        let context = StorageContext::new(backend);

        let stores = ConfigurationStoreCollection::for_application(&context, &record).unwrap();
        assert!(stores.default_store().is_none());
        assert!(stores.contains_foreign_stores());
        assert_eq!(stores.ids().collect::<Vec<_>>(), vec![foreign_id.as_str()]);
    }

    #[test]
    fn test_default_store_listed_once() {
        let backend = Arc::new(InMemoryBackingStore::new());
        let record = ApplicationRecord::owned("App1", "", "u", "a");
        backend.create_application(&record).unwrap();
        backend
            .put_property("App1", DEFAULT_STORE_ID, "K", "V")
            .unwrap();
        backend.add_foreign_store("App1", PropertyBag::new()).unwrap();
        let context = StorageContext::new(backend);

        let stores = ConfigurationStoreCollection::for_application(&context, &record).unwrap();
        assert_eq!(stores.len(), 2);
        assert_eq!(stores.ids().filter(|id| *id == DEFAULT_STORE_ID).count(), 1);
        assert!(stores.contains_foreign_stores());
    }
}
