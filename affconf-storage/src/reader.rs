//! Read-through property reader.
//!
//! The read path of the whole system: application name and property name in,
//! value out, never older than the configured maximum age.
//!
//! # Process scope
//!
//! A process normally builds one reader at start-up and installs it with
//! [`install_global`]; it then lives for the rest of the process. Code that
//! reads configuration should depend on [`PropertyReader`] rather than on the
//! global so tests can hand it a fake.

use crate::context::StorageContext;
use crate::entity_cache::EntityCache;
use affconf_core::{
    AffconfResult, LookupError, ReaderConfig, StateError, ValidationError, DEFAULT_MAX_AGE,
};
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Anything that can answer `(application, property)` reads.
pub trait PropertyReader: Send + Sync {
    /// Value of `property` in the application's default store.
    fn read(&self, application: &str, property: &str) -> AffconfResult<Value>;

    /// Like [`read`](Self::read), requiring a string value.
    fn read_string(&self, application: &str, property: &str) -> AffconfResult<String> {
        match self.read(application, property)? {
            Value::String(s) => Ok(s),
            _ => Err(ValidationError::UnexpectedValueType {
                application: application.to_string(),
                property: property.to_string(),
                expected: "string".to_string(),
            }
            .into()),
        }
    }
}

/// Reader backed by an [`EntityCache`] and default stores.
#[derive(Debug)]
pub struct ReadThroughReader {
    applications: Arc<EntityCache>,
    max_age: Duration,
}

impl ReadThroughReader {
    pub fn new(applications: Arc<EntityCache>) -> Self {
        Self {
            applications,
            max_age: DEFAULT_MAX_AGE,
        }
    }

    /// Build the entity cache and reader from one configuration.
    pub fn from_config(context: StorageContext, config: &ReaderConfig) -> Self {
        let context = context.configured(config);
        let applications = Arc::new(EntityCache::new(context, config.entity_cache_window));
        Self::new(applications).with_max_age(config.max_age)
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn applications(&self) -> &Arc<EntityCache> {
        &self.applications
    }
}

impl PropertyReader for ReadThroughReader {
    fn read(&self, application: &str, property: &str) -> AffconfResult<Value> {
        let app = self.applications.get(application)?;
        let store = app
            .config_stores()?
            .default_store()
            .ok_or_else(|| StateError::NoDefaultStore {
                application: application.to_string(),
            })?;

        let properties = store.aged_less_than(self.max_age)?.properties()?;
        match properties.value(property) {
            Some(value) => Ok(value.clone()),
            None => Err(LookupError::PropertyNotFound {
                application: application.to_string(),
                property: property.to_string(),
            }
            .into()),
        }
    }
}

static GLOBAL_READER: OnceCell<Arc<dyn PropertyReader>> = OnceCell::new();

/// Install the process-wide reader. Only the first install succeeds.
pub fn install_global(reader: Arc<dyn PropertyReader>) -> AffconfResult<()> {
    GLOBAL_READER
        .set(reader)
        .map_err(|_| StateError::ReaderAlreadyInstalled.into())
}

/// The process-wide reader.
pub fn global() -> AffconfResult<Arc<dyn PropertyReader>> {
    GLOBAL_READER
        .get()
        .cloned()
        .ok_or_else(|| StateError::ReaderNotInstalled.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackingStore;
    use crate::memory::InMemoryBackingStore;
    use affconf_core::{AffconfError, ApplicationRecord, ManualClock, DEFAULT_STORE_ID};
    use serde_json::json;

    fn reader_with(backend: Arc<InMemoryBackingStore>) -> ReadThroughReader {
        let context = StorageContext::new(backend).with_clock(Arc::new(ManualClock::new()));
        ReadThroughReader::from_config(context, &ReaderConfig::default())
    }

    #[test]
    fn test_read_returns_value_case_insensitively() {
        let backend = Arc::new(InMemoryBackingStore::new());
        backend
            .create_application(&ApplicationRecord::owned("App1", "", "u", "a"))
            .unwrap();
        backend
            .put_property("App1", DEFAULT_STORE_ID, "Key1", "V1")
            .unwrap();

        let reader = reader_with(backend);
        assert_eq!(reader.read("App1", "key1").unwrap(), json!("V1"));
        assert_eq!(reader.read_string("App1", "KEY1").unwrap(), "V1");
    }

    #[test]
    fn test_null_value_is_property_not_found() {
        let backend = Arc::new(InMemoryBackingStore::new());
        backend
            .create_application(&ApplicationRecord::owned("App1", "", "u", "a"))
            .unwrap();
        backend.register_property("App1", "Declared").unwrap();

        let reader = reader_with(backend);
        let err = reader.read("App1", "Declared").unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("Declared"));
    }

    #[test]
    fn test_foreign_application_is_invalid_state() {
        let backend = Arc::new(InMemoryBackingStore::new());
        backend
            .create_application(&ApplicationRecord {
                name: "Foreign".to_string(),
                description: String::new(),
                contact: "other@system".to_string(),
                user_group: "u".to_string(),
                administrator_group: "a".to_string(),
            })
            .unwrap();

        let reader = reader_with(backend);
        let err = reader.read("Foreign", "Anything").unwrap_err();
        assert!(matches!(
            err,
            AffconfError::State(StateError::NoDefaultStore { .. })
        ));
    }

    #[test]
    fn test_read_string_rejects_non_string() {
        let backend = Arc::new(InMemoryBackingStore::new());
        backend
            .create_application(&ApplicationRecord::owned("App1", "", "u", "a"))
            .unwrap();
        backend
            .put_property("App1", DEFAULT_STORE_ID, "Limit", 10)
            .unwrap();

        let reader = reader_with(backend);
        assert_eq!(reader.read("App1", "Limit").unwrap(), json!(10));
        assert!(matches!(
            reader.read_string("App1", "Limit"),
            Err(AffconfError::Validation(_))
        ));
    }

    #[test]
    fn test_read_never_writes() {
        let backend = Arc::new(InMemoryBackingStore::new());
        backend
            .create_application(&ApplicationRecord::owned("App1", "", "u", "a"))
            .unwrap();
        let reader = reader_with(backend.clone());
        let _ = reader.read("App1", "K");
        assert_eq!(backend.write_attempts(), 0);
    }
}
