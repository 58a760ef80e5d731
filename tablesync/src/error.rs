//! Error taxonomy shared by every component.
//!
//! Each variant is raised to the immediate caller; nothing in this crate
//! retries. "Nothing changed" is not an error, see
//! [`SyncOutcome::NoChanges`](crate::sync::SyncOutcome::NoChanges).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The relational server could not be reached or refused the session.
    #[error("Couldn't connect to the database server: {0}")]
    Connection(String),

    /// A required configuration key is unset, unknown, or no target table
    /// could be resolved.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A table is not registered, or a schema description violates its
    /// invariants.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A Data Store slot was requested that was never written.
    #[error("`{0}` does not exist in the data store")]
    NotFound(String),

    /// A statement failed after a connection was obtained. For a
    /// synchronization batch this means the whole batch was rolled back.
    #[error("Persistence failed: {0}")]
    Persistence(String),
}

impl Error {
    pub(crate) fn schema(msg: impl Into<String>) -> Self {
        Error::Schema(msg.into())
    }

    pub(crate) fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub(crate) fn persistence(err: sea_orm::DbErr) -> Self {
        Error::Persistence(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
