//! Resolved application with lazily discovered stores.

use crate::collection::ConfigurationStoreCollection;
use crate::context::StorageContext;
use affconf_core::{AffconfResult, ApplicationRecord};
use once_cell::sync::OnceCell;

/// An application record bound to the storage context it was resolved in.
///
/// The record never changes. The store collection is discovered on first
/// use, once; a failed discovery leaves it undiscovered so the next call
/// retries.
#[derive(Debug)]
pub struct Application {
    record: ApplicationRecord,
    context: StorageContext,
    stores: OnceCell<ConfigurationStoreCollection>,
}

impl Application {
    pub fn new(record: ApplicationRecord, context: StorageContext) -> Self {
        Self {
            record,
            context,
            stores: OnceCell::new(),
        }
    }

    pub fn record(&self) -> &ApplicationRecord {
        &self.record
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn description(&self) -> &str {
        &self.record.description
    }

    pub fn contact(&self) -> &str {
        &self.record.contact
    }

    pub fn user_group(&self) -> &str {
        &self.record.user_group
    }

    pub fn administrator_group(&self) -> &str {
        &self.record.administrator_group
    }

    pub fn is_owned_by_us(&self) -> bool {
        self.record.is_owned_by_us()
    }

    /// The application's stores, discovered on first call.
    pub fn config_stores(&self) -> AffconfResult<&ConfigurationStoreCollection> {
        self.stores.get_or_try_init(|| {
            ConfigurationStoreCollection::for_application(&self.context, &self.record)
        })
    }
}
