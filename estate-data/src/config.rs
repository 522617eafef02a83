//! Run configuration.
//!
//! Settings come from three layers, later ones winning: built-in defaults,
//! an optional TOML file, then command-line flags.
//!
//! ```toml
//! skip_invalid = true
//!
//! [sweep]
//! max_multiple = 100
//! step_size = 0.1
//! ```

use std::path::{Path, PathBuf};

use estate_core::calculations::{SweepConfig, SweepConfigError};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::report::InvalidCountryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid sweep: {0}")]
    Sweep(#[from] SweepConfigError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub sweep: SweepConfig,

    /// Skip countries with malformed rows instead of aborting the run.
    pub skip_invalid: bool,
}

impl RunConfig {
    /// Parses and validates a TOML configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys and
    /// [`ConfigError::Sweep`] for an unusable sweep.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.sweep.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read, otherwise
    /// as [`Self::from_toml_str`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Applies command-line overrides and re-validates the sweep.
    ///
    /// `skip_invalid` can only be switched on from the command line.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Sweep`] if the overridden sweep is unusable.
    pub fn with_overrides(
        mut self,
        max_multiple: Option<Decimal>,
        step_size: Option<Decimal>,
        skip_invalid: bool,
    ) -> Result<Self, ConfigError> {
        if let Some(max_multiple) = max_multiple {
            self.sweep.max_multiple = max_multiple;
        }
        if let Some(step_size) = step_size {
            self.sweep.step_size = step_size;
        }
        self.skip_invalid |= skip_invalid;

        self.sweep.validate()?;
        Ok(self)
    }

    pub fn policy(&self) -> InvalidCountryPolicy {
        if self.skip_invalid {
            InvalidCountryPolicy::Skip
        } else {
            InvalidCountryPolicy::Abort
        }
    }
}
