//! Database error types.

use derive_more::{Display, Error};
use strictly_nim::StoreError;
use tracing::instrument;

/// Which part of the database layer failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DbErrorKind {
    /// Opening the database file or configuring the connection.
    Connection,
    /// Applying embedded migrations.
    Migration,
    /// A query or statement failed.
    Query,
    /// A stored row holds a value the game model rejects.
    CorruptRow,
    /// Stored snapshots disagree with a game's history.
    HistoryMismatch,
}

/// Database error: a failure kind over the location-tracked [`StoreError`].
#[derive(Debug, Clone, Display, Error)]
#[display("{kind} error: {source}")]
pub struct DbError {
    /// What failed.
    pub kind: DbErrorKind,
    /// Message and the place it was raised.
    pub source: StoreError,
}

impl DbError {
    /// Creates a database error located at the caller.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(kind: DbErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            source: StoreError::new(message),
        }
    }

    /// A stored row the game model rejects.
    #[track_caller]
    pub fn corrupt_row(message: impl Into<String>) -> Self {
        Self::new(DbErrorKind::CorruptRow, message)
    }
}

impl From<diesel::result::Error> for DbError {
    #[track_caller]
    fn from(err: diesel::result::Error) -> Self {
        Self::new(DbErrorKind::Query, format!("Diesel error: {}", err))
    }
}

impl From<diesel::ConnectionError> for DbError {
    #[track_caller]
    fn from(err: diesel::ConnectionError) -> Self {
        Self::new(DbErrorKind::Connection, format!("Connection error: {}", err))
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        let mut source = err.source;
        source.message = format!("{}: {}", err.kind, source.message);
        source
    }
}
