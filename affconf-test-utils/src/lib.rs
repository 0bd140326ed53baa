//! AFFCONF Test Utilities
//!
//! Shared test infrastructure for the AFFCONF workspace:
//! - Tracing setup for test output
//! - Proptest generators for names and values
//! - Fixtures wiring an in-memory backend, a manual clock and a reader
//! - Assertions over error categories

// Re-export the types nearly every test touches
pub use affconf_core::{
    AffconfError, AffconfResult, ApplicationRecord, BackendError, ErrorKind, LookupError,
    ManualClock, PropertyBag, ReaderConfig, StateError, DEFAULT_STORE_ID, OWNER_CONTACT,
};
pub use affconf_storage::{
    ApplicationDirectory, BackingStore, ConfigurationStore, InMemoryBackingStore,
    PropertyReader, ReadThroughReader, StorageContext,
};

use std::sync::Arc;

/// Route `tracing` output to the test harness.
///
/// Honors `RUST_LOG`; defaults to `warn`. Safe to call from every test.
pub fn init_test_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for AFFCONF inputs.

    use proptest::prelude::*;
    use serde_json::Value;

    /// Valid application name: non-empty, no whitespace.
    pub fn arb_application_name() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9_.-]{0,23}"
    }

    /// Names the directory must reject.
    pub fn arb_invalid_application_name() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(String::new()),
            "[A-Za-z]{1,8}[ \t][A-Za-z]{1,8}",
        ]
    }

    pub fn arb_property_name() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9_]{0,15}"
    }

    /// Non-null property value.
    pub fn arb_property_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            "[ -~]{0,32}".prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            any::<bool>().prop_map(Value::from),
        ]
    }

    /// Same letters, arbitrary ASCII casing.
    pub fn arb_recased(name: String) -> impl Strategy<Value = String> {
        let len = name.len();
        proptest::collection::vec(any::<bool>(), len).prop_map(move |upper| {
            name.chars()
                .zip(upper)
                .map(|(c, u)| {
                    if u {
                        c.to_ascii_uppercase()
                    } else {
                        c.to_ascii_lowercase()
                    }
                })
                .collect()
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! A complete in-memory deployment for scenario tests.

    use super::*;

    /// In-memory backend, manual clock and the reader built on them.
    pub struct TestBed {
        pub backend: Arc<InMemoryBackingStore>,
        pub clock: Arc<ManualClock>,
        pub context: StorageContext,
        pub directory: ApplicationDirectory,
        pub config: ReaderConfig,
    }

    impl TestBed {
        pub fn new() -> Self {
            Self::with_config(ReaderConfig::default())
        }

        pub fn with_config(config: ReaderConfig) -> Self {
            let backend = Arc::new(InMemoryBackingStore::new());
            let clock = Arc::new(ManualClock::new());
            let context = StorageContext::new(backend.clone())
                .with_clock(clock.clone())
                .configured(&config);
            let directory = ApplicationDirectory::new(context.clone());
            Self {
                backend,
                clock,
                context,
                directory,
                config,
            }
        }

        /// A reader over this bed's backend and clock.
        pub fn reader(&self) -> ReadThroughReader {
            ReadThroughReader::from_config(self.context.clone(), &self.config)
        }

        /// Create an application owned by this system.
        pub fn owned_app(&self, name: &str) {
            self.directory
                .create(name, "test application", "users", "admins")
                .unwrap();
        }

        /// Create an application owned by someone else, with one store.
        pub fn foreign_app(&self, name: &str) -> String {
            self.backend
                .create_application(&ApplicationRecord {
                    name: name.to_string(),
                    description: "foreign application".to_string(),
                    contact: "someone@elsewhere".to_string(),
                    user_group: "users".to_string(),
                    administrator_group: "admins".to_string(),
                })
                .unwrap();
            self.backend
                .add_foreign_store(name, PropertyBag::new())
                .unwrap()
        }

        /// A fresh handle on the application's default store.
        pub fn default_store(&self, application: &str) -> ConfigurationStore {
            ConfigurationStore::new(&self.context, application, DEFAULT_STORE_ID)
        }

        /// Write and save through a fresh default store.
        pub fn save_property(&self, application: &str, name: &str, value: &str) {
            let store = self.default_store(application);
            store.set(name, value).unwrap();
            store.save().unwrap();
        }
    }

    impl Default for TestBed {
        fn default() -> Self {
            Self::new()
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over AFFCONF error categories.

    use super::*;

    /// Assert that a result failed with the given category.
    #[track_caller]
    pub fn assert_kind<T: std::fmt::Debug>(result: &AffconfResult<T>, kind: ErrorKind) {
        match result {
            Err(err) => assert_eq!(err.kind(), kind, "wrong category for {:?}", err),
            Ok(value) => panic!("Expected {:?} error, got Ok({:?})", kind, value),
        }
    }

    /// Assert a NotFound error whose message mentions `needle`.
    #[track_caller]
    pub fn assert_not_found_mentioning<T: std::fmt::Debug>(
        result: &AffconfResult<T>,
        needle: &str,
    ) {
        assert_kind(result, ErrorKind::NotFound);
        if let Err(err) = result {
            assert!(
                err.to_string().contains(needle),
                "'{}' does not mention '{}'",
                err,
                needle
            );
        }
    }

    #[track_caller]
    pub fn assert_invalid_state<T: std::fmt::Debug>(result: &AffconfResult<T>) {
        assert_kind(result, ErrorKind::InvalidState);
    }
}
