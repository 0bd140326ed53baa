//! Backing-store protocol.
//!
//! The remote store that actually persists applications and their property
//! sets is an external collaborator. This trait is the whole of what the
//! cache and store layers need from it.

use affconf_core::{ApplicationRecord, BackendError, ContactFilter, PropertyBag, StoreId};

/// Result of a single backing-store call.
pub type BackendResult<T> = Result<T, BackendError>;

/// Persistence for application records and per-store property bags.
///
/// Implementations must be thread-safe; every call may block on I/O.
///
/// # Signals
///
/// - [`BackendError::NoMapping`]: no record exists yet for a store identifier.
///   Returned by `fetch_properties` and `delete_store`.
/// - [`BackendError::StaleCredentials`]: an optimistic write lost a race.
///   Returned only by `write_properties`.
/// - [`BackendError::AlreadyExists`]: returned by `create_application` and
///   `register_property`.
pub trait BackingStore: Send + Sync {
    // === Application Operations ===

    /// Create an application record.
    fn create_application(&self, record: &ApplicationRecord) -> BackendResult<()>;

    /// Look up an application by exact name.
    fn find_application(&self, name: &str) -> BackendResult<Option<ApplicationRecord>>;

    /// Enumerate applications matching a contact filter.
    fn find_applications(&self, filter: &ContactFilter) -> BackendResult<Vec<ApplicationRecord>>;

    /// Delete an application record together with its stores and schema.
    fn delete_application(&self, name: &str) -> BackendResult<()>;

    // === Store Operations ===

    /// Identifiers of every store recorded for the application.
    fn store_ids(&self, application: &str) -> BackendResult<Vec<StoreId>>;

    /// Property names declared valid for the application.
    fn schema(&self, application: &str) -> BackendResult<Vec<String>>;

    /// Declare a property name valid for the application.
    fn register_property(&self, application: &str, name: &str) -> BackendResult<()>;

    /// Fill `bag` with the values held for `(application, store_id)` by
    /// calling [`PropertyBag::set`] once per stored value.
    fn fetch_properties(
        &self,
        application: &str,
        store_id: &str,
        bag: &mut PropertyBag,
    ) -> BackendResult<()>;

    /// Persist every entry of `bag` for `(application, store_id)`.
    fn write_properties(
        &self,
        application: &str,
        store_id: &str,
        bag: &PropertyBag,
    ) -> BackendResult<()>;

    /// Remove the record for `(application, store_id)`.
    fn delete_store(&self, application: &str, store_id: &str) -> BackendResult<()>;
}
