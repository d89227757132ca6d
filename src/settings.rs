//! Tool settings read from the environment.
//!
//! Every setting has a default, so an empty environment is valid. A `.env`
//! file in the working directory is loaded first when present.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::cloudformation::{DEFAULT_DRY_RUN_DIR, DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL, Waiter};
use crate::error::{ConfigError, Result};

/// Seconds between polls of a running stack operation.
pub const POLL_INTERVAL_VAR: &str = "OAM_ECS_POLL_INTERVAL_SECS";

/// Number of polls before a stack operation is abandoned.
pub const MAX_ATTEMPTS_VAR: &str = "OAM_ECS_MAX_ATTEMPTS";

/// Directory dry-run templates are written to.
pub const DRY_RUN_DIR_VAR: &str = "OAM_ECS_DRY_RUN_DIR";

/// Runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Delay between polls.
    pub poll_interval: Duration,
    /// Maximum number of polls per stack operation.
    pub max_attempts: u32,
    /// Dry-run output directory.
    pub dry_run_dir: PathBuf,
    /// AWS region override. `None` leaves the choice to the AWS config chain.
    pub region: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            dry_run_dir: PathBuf::from(DEFAULT_DRY_RUN_DIR),
            region: None,
        }
    }
}

impl Settings {
    /// Loads `.env` if present, then reads the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `.env` cannot be parsed or a variable holds an
    /// invalid value.
    pub fn from_env() -> Result<Self> {
        load_dotenv(Path::new(".env"))?;
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads settings through a variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for a non-numeric interval or
    /// attempt count, or for zero attempts.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(raw) = lookup(POLL_INTERVAL_VAR) {
            let secs: u64 = parse(POLL_INTERVAL_VAR, &raw)?;
            settings.poll_interval = Duration::from_secs(secs);
        }

        if let Some(raw) = lookup(MAX_ATTEMPTS_VAR) {
            let attempts: u32 = parse(MAX_ATTEMPTS_VAR, &raw)?;
            if attempts == 0 {
                return Err(invalid(MAX_ATTEMPTS_VAR, &raw).into());
            }
            settings.max_attempts = attempts;
        }

        if let Some(dir) = lookup(DRY_RUN_DIR_VAR).filter(|d| !d.trim().is_empty()) {
            settings.dry_run_dir = PathBuf::from(dir);
        }

        debug!("Loaded settings: {settings:?}");
        Ok(settings)
    }

    /// Sets the region override.
    #[must_use]
    pub fn with_region(mut self, region: Option<String>) -> Self {
        if region.is_some() {
            self.region = region;
        }
        self
    }

    /// Builds the poll settings for stack waits.
    #[must_use]
    pub const fn waiter(&self) -> Waiter {
        Waiter::new(self.poll_interval, self.max_attempts)
    }
}

fn load_dotenv(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }

    debug!("Loading environment from {}", path.display());
    dotenvy::from_path(path).map_err(|e| ConfigError::EnvFile {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(())
}

fn parse<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| invalid(name, raw).into())
}

fn invalid(name: &str, raw: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        value: raw.to_string(),
    }
}
