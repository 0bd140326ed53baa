//! Administrative access to application records.
//!
//! Setup and teardown for the single administrative writer. The read path
//! never goes through here.

use crate::application::Application;
use crate::context::StorageContext;
use affconf_core::{validate_application_name, AffconfResult, ApplicationRecord, ContactFilter};

/// Create, enumerate and delete applications in the backing store.
#[derive(Debug, Clone)]
pub struct ApplicationDirectory {
    context: StorageContext,
}

impl ApplicationDirectory {
    pub fn new(context: StorageContext) -> Self {
        Self { context }
    }

    /// Create an application owned by this system.
    ///
    /// Fails with [`BackendError::AlreadyExists`](affconf_core::BackendError::AlreadyExists)
    /// if the name is taken.
    pub fn create(
        &self,
        name: &str,
        description: &str,
        user_group: &str,
        administrator_group: &str,
    ) -> AffconfResult<Application> {
        validate_application_name(name)?;
        let record = ApplicationRecord::owned(name, description, user_group, administrator_group);
        self.context.backend.create_application(&record)?;
        tracing::info!(application = %name, "Created application");
        Ok(self.bind(record))
    }

    pub fn find(&self, name: &str) -> AffconfResult<Option<Application>> {
        Ok(self
            .context
            .backend
            .find_application(name)?
            .map(|record| self.bind(record)))
    }

    pub fn find_by_contact(&self, filter: &ContactFilter) -> AffconfResult<Vec<Application>> {
        Ok(self
            .context
            .backend
            .find_applications(filter)?
            .into_iter()
            .map(|record| self.bind(record))
            .collect())
    }

    /// Applications created by this system.
    pub fn owned(&self) -> AffconfResult<Vec<Application>> {
        self.find_by_contact(&ContactFilter::owned())
    }

    /// Delete the application record. Absent is success.
    pub fn delete(&self, name: &str) -> AffconfResult<()> {
        self.context.backend.delete_application(name)?;
        tracing::info!(application = %name, "Deleted application");
        Ok(())
    }

    fn bind(&self, record: ApplicationRecord) -> Application {
        Application::new(record, self.context.clone())
    }
}
