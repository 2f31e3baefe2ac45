//! Error types for the turn engine and its collaborators.

use derive_more::{Display, Error};
use tracing::instrument;

use crate::GameId;

/// Why a player move was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum IllegalMoveReason {
    /// The game already has a winner or the heap is empty.
    #[display("game already finished")]
    GameFinished,
    /// The count is not part of the game's legal-move set.
    #[display("move not allowed")]
    MoveNotAllowed,
    /// The count is larger than the remaining heap.
    #[display("insufficient tokens")]
    InsufficientTokens,
}

/// Failures surfaced by the turn engine.
///
/// Every variant maps to a distinct status at the HTTP boundary, so callers
/// can always tell a rejected move from a missing game or a bad configuration.
#[derive(Debug, Clone, Display, Error)]
pub enum NimError {
    /// Game creation parameters are malformed.
    #[display("Invalid configuration for '{field}': {message}")]
    InvalidConfiguration {
        /// Name of the offending request field.
        field: &'static str,
        /// Human readable explanation.
        message: String,
    },
    /// A player move violates the rules.
    #[display("Invalid turn, taking {count}: {reason}")]
    IllegalMove {
        /// Token count the player tried to take.
        count: i64,
        /// Which rule was violated.
        reason: IllegalMoveReason,
    },
    /// No game with the identifier exists.
    #[display("No game with ID {id}")]
    NotFound {
        /// Identifier that was looked up.
        id: GameId,
    },
    /// The strategy identifier is not recognized.
    #[display("No Strategy named {id}")]
    UnknownStrategy {
        /// Identifier that failed to resolve.
        id: String,
    },
    /// The persistence collaborator failed.
    #[display("Storage failure: {source}")]
    Storage {
        /// Underlying store error.
        source: StoreError,
    },
}

impl NimError {
    /// Builds an [`NimError::InvalidConfiguration`] for `field`.
    pub fn invalid_configuration(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field,
            message: message.into(),
        }
    }

    /// Builds an [`NimError::IllegalMove`].
    pub fn illegal_move(count: i64, reason: IllegalMoveReason) -> Self {
        Self::IllegalMove { count, reason }
    }

    /// Stable name of the error kind, used by the wire format.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration { .. } => "InvalidConfiguration",
            Self::IllegalMove { .. } => "IllegalMove",
            Self::NotFound { .. } => "NotFound",
            Self::UnknownStrategy { .. } => "UnknownStrategy",
            Self::Storage { .. } => "Storage",
        }
    }
}

impl From<StoreError> for NimError {
    fn from(source: StoreError) -> Self {
        Self::Storage { source }
    }
}

/// Store error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Store error: {} at {}:{}", message, file, line)]
pub struct StoreError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl StoreError {
    /// Creates a new store error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}
