//! Configuration loading for the state layer.
//!
//! Hierarchical override support:
//! 1. Default values from code
//! 2. Configuration file named by `CONFIG_PATH`
//! 3. Environment variables (highest priority)

mod coordination;

pub use coordination::*;


use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Environment variable prefix for overrides, e.g.
/// `FLEETSTATE__COORDINATION__SESSION_TIMEOUT_SECS=30`.
const ENV_PREFIX: &str = "FLEETSTATE";

/// Top-level configuration for the state layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateConfig {
    /// Coordination-service ensemble and handshake deadlines
    pub coordination: CoordinationConfig,
}

impl StateConfig {
    /// Loads configuration with hierarchical override support: type
    /// defaults, then the file named by `CONFIG_PATH` (if set), then
    /// `FLEETSTATE__`-prefixed environment variables.
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.coordination.validate()
    }
}
