//! Configuration for the thread-pool queue
//!
//! The worker count used to come from the environment at queue init; here it is
//! an explicit value handed to the constructor. `from_env` keeps the old knob
//! available to binaries that want it.

use std::env;

use log::debug;

use crate::common::config::{DEFAULT_NTHREADS, DEFAULT_QUEUE_CAPACITY, MAX_NTHREADS, NTHREADS_ENV};
use crate::common::exception::ConfigError;

/// Size of the worker pool backing one queue instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadPoolConfig {
    nthreads: usize,
}

impl ThreadPoolConfig {
    /// Validates `nthreads` against 1..=1023.
    pub fn new(nthreads: usize) -> Result<Self, ConfigError> {
        if nthreads == 0 || nthreads > MAX_NTHREADS {
            return Err(ConfigError::InvalidThreadCount(
                i64::try_from(nthreads).unwrap_or(i64::MAX),
            ));
        }
        Ok(Self { nthreads })
    }

    /// Reads the thread count from `THRPOOL_NTHREADS`, falling back to the default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_var(NTHREADS_ENV)
    }

    pub fn from_env_var(var: &str) -> Result<Self, ConfigError> {
        match env::var(var) {
            Ok(value) => {
                debug!("{} set to {:?}", var, value);
                Self::from_setting(var, &value)
            }
            Err(_) => Ok(Self::default()),
        }
    }

    /// Parses the textual value of setting `name`, as found in the environment.
    pub fn from_setting(name: &str, value: &str) -> Result<Self, ConfigError> {
        let nthreads = value
            .trim()
            .parse::<i64>()
            .map_err(|_| ConfigError::NotANumber {
                var: name.to_string(),
                value: value.to_string(),
            })?;
        match usize::try_from(nthreads) {
            Ok(n) if n <= MAX_NTHREADS => Self::new(n),
            _ => Err(ConfigError::InvalidThreadCount(nthreads)),
        }
    }

    pub fn nthreads(&self) -> usize {
        self.nthreads
    }
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            nthreads: DEFAULT_NTHREADS,
        }
    }
}

/// Everything a `ThreadPoolQueue` needs at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    pub capacity: u32,
    pub pool: ThreadPoolConfig,
}

impl QueueConfig {
    pub fn new(capacity: u32, pool: ThreadPoolConfig) -> Self {
        Self { capacity, pool }
    }

    pub fn with_capacity(capacity: u32) -> Self {
        Self {
            capacity,
            pool: ThreadPoolConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }
}
