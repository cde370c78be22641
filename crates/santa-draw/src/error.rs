use std::time::Duration;

use thiserror::Error;

/// Failures that end a draw. Delivery problems are not in here: they are
/// reported in the summary, never raised.
#[derive(Debug, Error)]
pub enum DrawError {
    #[error("at least {required} participants required, found {found}")]
    InsufficientParticipants { found: usize, required: usize },

    #[error("no valid assignment found after {attempts} attempts, run the draw again")]
    GenerationExhausted { attempts: usize },

    #[error("storage error while trying to {operation}: {source}")]
    Storage {
        operation: &'static str,
        source: anyhow::Error,
    },

    #[error("no assignments are stored, run a draw first")]
    NoAssignments,
}

impl DrawError {
    /// The draw was attempted and abandoned (as opposed to rejected up front).
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::GenerationExhausted { .. } | Self::Storage { .. })
    }
}

/// Why a single notification did not go through.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The channel answered and refused the message (blocked bot, unknown chat).
    #[error("rejected by channel: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}
