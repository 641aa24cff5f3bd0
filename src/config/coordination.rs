use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Default coordination session timeout, in seconds.
const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 15;

/// Default deadline for the initialization sentinel to appear, in seconds.
const DEFAULT_INITIALIZATION_TIMEOUT_SECS: u64 = 180;

/// Connection parameters for the coordination-service ensemble.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationConfig {
    /// Ensemble endpoints, each in `host:port` form.
    #[serde(default)]
    pub addrs: Vec<String>,

    /// Session establishment/keepalive timeout, in seconds.
    pub session_timeout_secs: u64,

    /// How long `open` waits for the cluster to be initialized, in seconds.
    pub initialization_timeout_secs: u64,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        CoordinationConfig {
            addrs: Vec::new(),
            session_timeout_secs: DEFAULT_SESSION_TIMEOUT_SECS,
            initialization_timeout_secs: DEFAULT_INITIALIZATION_TIMEOUT_SECS,
        }
    }
}

impl CoordinationConfig {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn initialization_timeout(&self) -> Duration {
        Duration::from_secs(self.initialization_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        for addr in &self.addrs {
            let port = addr
                .rsplit_once(':')
                .filter(|(host, _)| !host.is_empty())
                .map(|(_, port)| port);
            let valid = matches!(port, Some(p) if p.parse::<u16>().is_ok());
            if !valid {
                return Err(ConfigError::Message(format!(
                    "invalid coordination address {addr:?} (expected host:port)"
                ))
                .into());
            }
        }
        if self.session_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "coordination session timeout must be positive".to_string(),
            )
            .into());
        }
        if self.initialization_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "initialization timeout must be positive".to_string(),
            )
            .into());
        }
        Ok(())
    }
}
