//! AFFCONF Core - Data Types
//!
//! Records, property bags, constants, errors and configuration shared by the
//! storage layer. This crate contains no I/O.

use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

pub mod config;
pub mod entities;
pub mod error;
pub mod property;
pub mod time;

pub use config::ReaderConfig;
pub use entities::{validate_application_name, ApplicationRecord, ContactFilter};
pub use error::{
    AffconfError, AffconfResult, BackendError, ConfigError, ErrorKind, LookupError, StateError,
    StoreOperation, ValidationError,
};
pub use property::{fold_name, names_match, PropertyBag};
pub use time::{elapsed_between, Clock, ManualClock, SystemClock};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Identifier of one configuration store within an application.
pub type StoreId = String;

/// Generate an identifier for a store not owned by this system.
///
/// UUIDv7 strings never collide with [`DEFAULT_STORE_ID`], whose version
/// nibble is 4.
pub fn new_store_id() -> StoreId {
    Uuid::now_v7().to_string()
}

// ============================================================================
// CONSTANTS
// ============================================================================

/// Identifier of the one store per application this system owns and writes.
pub const DEFAULT_STORE_ID: &str = "7a2f9c4e-3b1d-4e8a-9f6c-2d5b8e1a0c37";

/// Contact recorded on applications created by this system.
pub const OWNER_CONTACT: &str = "affconf@configuration.service";

/// Default freshness bound for read-through reads.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(60);

/// Default sliding window of the application cache.
pub const DEFAULT_ENTITY_CACHE_WINDOW: Duration = Duration::from_secs(300);

/// Total persist attempts when saving keeps hitting stale credentials.
pub const MAX_SAVE_ATTEMPTS: u32 = 5;

/// Whether `store_id` is the default store identifier.
pub fn is_default_store(store_id: &str) -> bool {
    store_id == DEFAULT_STORE_ID
}
