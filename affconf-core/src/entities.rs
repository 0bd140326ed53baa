//! Application records as the backing store describes them.

use crate::{ValidationError, OWNER_CONTACT};
use serde::{Deserialize, Serialize};

/// Descriptive attributes of one application.
///
/// Records are values: a fresh lookup yields a fresh record and nothing
/// mutates one in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    /// Unique, case-preserving, no whitespace.
    pub name: String,
    pub description: String,
    pub contact: String,
    pub user_group: String,
    pub administrator_group: String,
}

impl ApplicationRecord {
    /// Record for an application created by this system.
    pub fn owned(
        name: impl Into<String>,
        description: impl Into<String>,
        user_group: impl Into<String>,
        administrator_group: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            contact: OWNER_CONTACT.to_string(),
            user_group: user_group.into(),
            administrator_group: administrator_group.into(),
        }
    }

    /// True iff the contact is this system's sentinel contact.
    pub fn is_owned_by_us(&self) -> bool {
        self.contact == OWNER_CONTACT
    }
}

/// Contact filter for enumerating applications.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContactFilter {
    /// Wildcard: ignore the contact.
    #[default]
    Any,
    /// Case-insensitive contact match.
    Contact(String),
}

impl ContactFilter {
    /// Applications created by this system.
    pub fn owned() -> Self {
        Self::Contact(OWNER_CONTACT.to_string())
    }

    pub fn matches(&self, record: &ApplicationRecord) -> bool {
        match self {
            ContactFilter::Any => true,
            ContactFilter::Contact(contact) => contact.eq_ignore_ascii_case(&record.contact),
        }
    }
}

/// Check an application name: non-empty, no whitespace.
pub fn validate_application_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::InvalidApplicationName {
            name: name.to_string(),
            reason: "name is empty".to_string(),
        });
    }
    if name.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidApplicationName {
            name: name.to_string(),
            reason: "name contains whitespace".to_string(),
        });
    }
    Ok(())
}
