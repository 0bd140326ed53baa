//! Bounded retry of stale-credential write conflicts.
//!
//! The backing store's optimistic concurrency check occasionally rejects a
//! write that succeeds when repeated at once. Only
//! [`BackendError::StaleCredentials`] is retried; every other signal fails
//! the save immediately.
//!
//! # State Transition Diagram
//!
//! ```text
//! Attempting(1) ── conflict, n < budget ──→ Attempting(n + 1)
//!      │          ── conflict, n == budget ─→ Failed(SaveConflictExhausted)
//!      │          ── other signal ──────────→ Failed(signal)
//!      └───────── success ─────────────────→ Succeeded
//! ```

use affconf_core::{AffconfError, AffconfResult, BackendError};

/// Position of a save in the retry state machine.
#[derive(Debug, Clone)]
pub enum SaveAttempt {
    /// About to make attempt `n` (1-based).
    Attempting(u32),
    Succeeded,
    Failed(AffconfError),
}

/// Outcome of a single persist call.
pub type AttemptResult = Result<(), BackendError>;

impl SaveAttempt {
    /// Advance from `Attempting(n)` given the outcome of attempt `n`.
    ///
    /// Terminal states are returned unchanged.
    pub fn next(
        self,
        outcome: AttemptResult,
        budget: u32,
        application: &str,
        store_id: &str,
    ) -> SaveAttempt {
        let attempt = match self {
            SaveAttempt::Attempting(n) => n,
            terminal => return terminal,
        };
        match outcome {
            Ok(()) => SaveAttempt::Succeeded,
            Err(BackendError::StaleCredentials { .. }) if attempt < budget => {
                SaveAttempt::Attempting(attempt + 1)
            }
            Err(BackendError::StaleCredentials { .. }) => {
                SaveAttempt::Failed(AffconfError::SaveConflictExhausted {
                    application: application.to_string(),
                    store_id: store_id.to_string(),
                    attempts: attempt,
                })
            }
            Err(
                other @ (BackendError::NoMapping { .. }
                | BackendError::AlreadyExists { .. }
                | BackendError::Transport { .. }
                | BackendError::LockPoisoned),
            ) => SaveAttempt::Failed(other.into()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SaveAttempt::Attempting(_))
    }
}

/// Run `persist` until it succeeds, fails with a non-conflict signal, or
/// `budget` attempts have all conflicted. Returns the number of attempts made.
pub fn persist_with_retry<F>(
    budget: u32,
    application: &str,
    store_id: &str,
    mut persist: F,
) -> AffconfResult<u32>
where
    F: FnMut() -> AttemptResult,
{
    let mut state = SaveAttempt::Attempting(1);
    let mut attempts = 0;
    loop {
        state = match state {
            SaveAttempt::Attempting(n) => {
                attempts = n;
                let outcome = persist();
                if let Err(BackendError::StaleCredentials { .. }) = &outcome {
                    tracing::warn!(
                        application,
                        store_id,
                        attempt = n,
                        budget,
                        "Stale credentials while saving configuration store"
                    );
                }
                SaveAttempt::Attempting(n).next(outcome, budget, application, store_id)
            }
            SaveAttempt::Succeeded => return Ok(attempts),
            SaveAttempt::Failed(err) => {
                tracing::error!(
                    application,
                    store_id,
                    attempts,
                    error = %err,
                    "Saving configuration store failed"
                );
                return Err(err);
            }
        };
    }
}
