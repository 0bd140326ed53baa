//! Error types for AFFCONF operations

use std::fmt;
use thiserror::Error;

/// Lookup failures: the named application or property does not exist.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("Application not found: {name}")]
    ApplicationNotFound { name: String },

    #[error("Property '{property}' has no value for application '{application}'")]
    PropertyNotFound {
        application: String,
        property: String,
    },
}

/// Caller misuse. Never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("Application '{application}' has no default configuration store")]
    NoDefaultStore { application: String },

    #[error("Cannot {operation} store {store_id} of application '{application}': only the default store is writable")]
    ReadOnlyStore {
        application: String,
        store_id: String,
        operation: StoreOperation,
    },

    #[error("A process-wide property reader is already installed")]
    ReaderAlreadyInstalled,

    #[error("No process-wide property reader has been installed")]
    ReaderNotInstalled,
}

/// Mutating operations that are restricted to the default store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    Save,
    Delete,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreOperation::Save => write!(f, "save"),
            StoreOperation::Delete => write!(f, "delete"),
        }
    }
}

/// Signals reported by the backing store.
///
/// `StaleCredentials`, `NoMapping` and `AlreadyExists` are distinguished
/// from `Transport` because callers treat each of them differently.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// Optimistic write lost a race. The only retried signal.
    #[error("Stale credentials writing {store_id} of '{application}'")]
    StaleCredentials {
        application: String,
        store_id: String,
    },

    #[error("No mapping exists for store {store_id} of '{application}'")]
    NoMapping {
        application: String,
        store_id: String,
    },

    #[error("Already exists: {name}")]
    AlreadyExists { name: String },

    #[error("Backing store request failed: {reason}")]
    Transport { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid application name '{name}': {reason}")]
    InvalidApplicationName { name: String, reason: String },

    #[error("Property '{property}' of application '{application}' is not a {expected}")]
    UnexpectedValueType {
        application: String,
        property: String,
        expected: String,
    },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Coarse classification used by callers deciding how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    Conflict,
    Backend,
    Validation,
    Config,
}

/// Master error type for all AFFCONF errors.
#[derive(Debug, Clone, Error)]
pub enum AffconfError {
    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Saving store {store_id} of '{application}' still conflicted after {attempts} attempts")]
    SaveConflictExhausted {
        application: String,
        store_id: String,
        attempts: u32,
    },
}

impl AffconfError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AffconfError::Lookup(_) => ErrorKind::NotFound,
            AffconfError::State(_) => ErrorKind::InvalidState,
            AffconfError::Backend(BackendError::StaleCredentials { .. })
            | AffconfError::SaveConflictExhausted { .. } => ErrorKind::Conflict,
            AffconfError::Backend(_) => ErrorKind::Backend,
            AffconfError::Validation(_) => ErrorKind::Validation,
            AffconfError::Config(_) => ErrorKind::Config,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_invalid_state(&self) -> bool {
        self.kind() == ErrorKind::InvalidState
    }
}

/// Result type alias for AFFCONF operations.
pub type AffconfResult<T> = Result<T, AffconfError>;

// =============================================================================
// TESTS
// =============================================================================
