//! AFFCONF Storage - Stores, Caches and the Read Path
//!
//! Layers, bottom up:
//!
//! - [`BackingStore`]: the remote persistence protocol, with
//!   [`InMemoryBackingStore`] for tests and local development.
//! - [`ConfigurationStore`]: one lazily loaded property bag with an age.
//! - [`Application`] and [`ConfigurationStoreCollection`]: an application
//!   record and the stores discovered for it.
//! - [`EntityCache`]: applications by name, sliding expiration.
//! - [`ReadThroughReader`]: `(application, property)` reads bounded by a
//!   maximum age.
//!
//! [`ApplicationDirectory`] is the administrative surface for creating and
//! removing applications.

pub mod application;
pub mod backend;
pub mod cache;
pub mod collection;
pub mod context;
pub mod directory;
pub mod entity_cache;
pub mod memory;
pub mod reader;
pub mod retry;
pub mod store;

pub use application::Application;
pub use backend::{BackendResult, BackingStore};
pub use cache::{CacheStats, SlidingCache};
pub use collection::ConfigurationStoreCollection;
pub use context::StorageContext;
pub use directory::ApplicationDirectory;
pub use entity_cache::EntityCache;
pub use memory::InMemoryBackingStore;
pub use reader::{global, install_global, PropertyReader, ReadThroughReader};
pub use retry::{persist_with_retry, AttemptResult, SaveAttempt};
pub use store::{ConfigurationStore, Properties};
