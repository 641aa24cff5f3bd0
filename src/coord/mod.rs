//! Coordination-store collaborator contracts and cluster bootstrap.
//!
//! The coordination store is a hierarchical node service used for cluster
//! rendezvous. This crate does not implement it; it names the session
//! contract it relies on and builds the one-shot bootstrap handshake on top:
//! the `/initialized` sentinel is the only process-wide synchronization
//! point, a single-writer many-reader latch observed with an
//! existence-watch.

mod bootstrap;


pub use bootstrap::State;
pub use bootstrap::initialize;
pub use bootstrap::open;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::CoordError;

/// Fixed top-level nodes created at cluster bootstrap.
pub const SKELETON_PATHS: [&str; 5] = ["/charms", "/services", "/machines", "/units", "/relations"];

/// Sentinel node whose existence marks a fully-initialized cluster.
pub const INITIALIZED_PATH: &str = "/initialized";

/// Outcome of an armed existence-watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The watched node came into existence.
    Created,
    /// The session failed before the node appeared.
    SessionError(String),
}

/// One-shot notification channel for an existence-watch.
pub type ExistsWatch = oneshot::Receiver<SessionEvent>;

/// An established session with the coordination service.
///
/// All nodes are created with "anyone" permissions; finer-grained ACLs are
/// not part of this contract.
#[async_trait]
pub trait CoordSession: Send + Sync + 'static {
    /// Creates a node at `path` holding `data`. Fails with
    /// [`CoordError::NodeExists`] when the node is already present.
    async fn create(
        &self,
        path: &str,
        data: &[u8],
    ) -> Result<(), CoordError>;

    /// Whether a node exists at `path`.
    async fn exists(
        &self,
        path: &str,
    ) -> Result<bool, CoordError>;

    /// Existence check that also arms a one-shot watch: if the node does
    /// not exist, the returned channel fires when it is created or when the
    /// session fails.
    async fn exists_watch(
        &self,
        path: &str,
    ) -> Result<(bool, ExistsWatch), CoordError>;

    /// Releases the session.
    async fn close(&self) -> Result<(), CoordError>;
}

/// Dials a coordination-service ensemble and establishes a session.
#[async_trait]
pub trait CoordConnector: Send + Sync {
    type Session: CoordSession;

    /// Connects to one of `addrs` (each `host:port`), waiting up to
    /// `session_timeout` for the session to establish.
    async fn dial(
        &self,
        addrs: &[String],
        session_timeout: std::time::Duration,
    ) -> Result<Self::Session, CoordError>;
}
