//! One-shot cluster bootstrap over a coordination session.

use tokio::time::timeout;
use tracing::debug;
use tracing::info;

use super::CoordConnector;
use super::CoordSession;
use super::INITIALIZED_PATH;
use super::SKELETON_PATHS;
use super::SessionEvent;
use crate::CoordError;
use crate::Result;
use crate::config::CoordinationConfig;

/// A live connection to the cluster's state, produced by [`open`] or
/// [`initialize`].
pub struct State<S: CoordSession> {
    session: S,
}

impl<S: CoordSession> std::fmt::Debug for State<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State").finish_non_exhaustive()
    }
}

impl<S: CoordSession> State<S> {
    pub fn session(&self) -> &S {
        &self.session
    }

    pub async fn close(self) -> Result<()> {
        self.session.close().await?;
        Ok(())
    }
}

/// Connects to the ensemble described by `config`, waits for the cluster to
/// be initialized, and returns a [`State`] for it.
///
/// Blocks until the `/initialized` sentinel exists, up to the configured
/// deadline.
pub async fn open<C: CoordConnector>(
    connector: &C,
    config: &CoordinationConfig,
) -> Result<State<C::Session>> {
    let session = dial(connector, config).await?;
    if let Err(err) = wait_for_initialization(&session, config).await {
        let _ = session.close().await;
        return Err(err);
    }
    Ok(State { session })
}

/// Sets up an initial empty cluster state and returns it. Needs to be
/// performed only once for a given ensemble; opening an already-initialized
/// ensemble this way succeeds without re-creating anything.
pub async fn initialize<C: CoordConnector>(
    connector: &C,
    config: &CoordinationConfig,
) -> Result<State<C::Session>> {
    let session = dial(connector, config).await?;
    if let Err(err) = create_skeleton(&session).await {
        let _ = session.close().await;
        return Err(err);
    }
    Ok(State { session })
}

async fn dial<C: CoordConnector>(
    connector: &C,
    config: &CoordinationConfig,
) -> Result<C::Session> {
    if config.addrs.is_empty() {
        return Err(CoordError::NoServers.into());
    }
    debug!(addrs = ?config.addrs, "dialing coordination ensemble");
    let session = connector.dial(&config.addrs, config.session_timeout()).await?;
    Ok(session)
}

async fn create_skeleton<S: CoordSession>(session: &S) -> Result<()> {
    if session.exists(INITIALIZED_PATH).await? {
        return Ok(());
    }
    for path in SKELETON_PATHS {
        session.create(path, b"").await?;
    }
    // Created last: the sentinel is the atomic commit of the bootstrap.
    session.create(INITIALIZED_PATH, b"").await?;
    info!("cluster state initialized");
    Ok(())
}

async fn wait_for_initialization<S: CoordSession>(
    session: &S,
    config: &CoordinationConfig,
) -> Result<()> {
    let (exists, watch) = session.exists_watch(INITIALIZED_PATH).await?;
    if exists {
        return Ok(());
    }
    debug!("waiting for cluster initialization");
    match timeout(config.initialization_timeout(), watch).await {
        Ok(Ok(SessionEvent::Created)) => Ok(()),
        Ok(Ok(SessionEvent::SessionError(cause))) => Err(CoordError::Session(cause).into()),
        Ok(Err(_)) => Err(CoordError::Session("session closed".to_string()).into()),
        Err(_) => Err(CoordError::InitializationTimeout.into()),
    }
}
