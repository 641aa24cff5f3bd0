//! Error hierarchy for the state layer.
//!
//! Errors are grouped by the component that raises them: the watch engine,
//! constraint parsing, and the coordination-store handshake. The top-level
//! [`Error`] nests the component enums transparently so callers can match on
//! either level.

use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The watcher was stopped, either explicitly or by manager shutdown.
    #[error("state watcher was stopped")]
    WatcherStopped,

    /// An entity CRUD collaborator could not find the requested document.
    #[error("{0} not found")]
    NotFound(String),

    /// The backing store failed while seeding or applying a change.
    #[error(transparent)]
    Backing(#[from] BackingError),

    /// Constraint string parsing failures
    #[error(transparent)]
    Constraint(#[from] ConstraintError),

    /// Coordination-store dial/bootstrap failures
    #[error(transparent)]
    Coord(#[from] CoordError),

    /// Configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    /// A background task terminated abnormally
    #[error("background task failed: {0}")]
    Task(#[from] JoinError),
}

/// Failure reported by a [`Backing`](crate::multiwatcher::Backing).
///
/// A single backing error is terminal for the store manager, so the same
/// error must be surfaced to every pending waiter and to `stop()`. Backings
/// therefore flatten their underlying cause into a cloneable message.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct BackingError(pub String);

impl BackingError {
    pub fn new(cause: impl std::fmt::Display) -> Self {
        BackingError(cause.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConstraintError {
    /// Token is not of the form `name=value`.
    #[error("malformed constraint {0:?}")]
    Malformed(String),

    /// Constraint name is not recognized.
    #[error("unknown constraint {0:?}")]
    Unknown(String),

    /// Value rejected by the named constraint's grammar.
    #[error("bad {name:?} constraint: {reason}")]
    Bad { name: String, reason: String },
}

impl ConstraintError {
    pub(crate) fn bad(
        name: &str,
        reason: impl Into<String>,
    ) -> Self {
        ConstraintError::Bad {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordError {
    /// Connection info carried no server addresses.
    #[error("no coordination server addresses")]
    NoServers,

    /// The ensemble could not be reached or the session never established.
    #[error("could not connect to coordination servers")]
    ConnectFailed,

    /// The session failed after being established.
    #[error("session error: {0}")]
    Session(String),

    /// Node creation hit an existing node.
    #[error("node {0} already exists")]
    NodeExists(String),

    /// The `/initialized` sentinel did not appear within the deadline.
    #[error("timed out waiting for initialization")]
    InitializationTimeout,
}
