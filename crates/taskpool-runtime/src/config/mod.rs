//! Pool configuration
//!
//! Compile-time defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Environment variables (runtime)
//! 2. File named by `TP_CONFIG_RS` at build time
//! 3. Library defaults
//!
//! # Example
//!
//! ```rust,ignore
//! use taskpool_runtime::config::PoolConfig;
//!
//! let config = PoolConfig::from_env()
//!     .num_workers(8)
//!     .recollector_capacity(128);
//! ```

pub mod defaults;

use taskpool_core::constants::{MAX_RECOLLECTOR_CAPACITY, MAX_WORKERS};
use taskpool_core::env::{env_get, env_get_bool};
use taskpool_core::{kprintln, PoolError};

/// Pool configuration with builder pattern.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of worker threads
    pub num_workers: usize,
    /// Free-list capacity of each worker's recollector
    pub recollector_capacity: usize,
    /// Async results pre-allocated into each recollector at start-up
    pub prewarm_results: usize,
    /// OS stack size of each worker thread
    pub worker_stack_size: usize,
    /// Log worker lifecycle at info level instead of debug
    pub debug_logging: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl PoolConfig {
    /// Create config from compile-time defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `TP_NUM_WORKERS` - Number of worker threads
    /// - `TP_RECOLLECTOR_CAPACITY` - Free-list capacity per worker
    /// - `TP_PREWARM_RESULTS` - Results pre-allocated per worker
    /// - `TP_WORKER_STACK_SIZE` - Worker thread stack size in bytes
    /// - `TP_DEBUG` - Verbose worker lifecycle logging (0/1)
    pub fn from_env() -> Self {
        Self {
            num_workers: env_get("TP_NUM_WORKERS", defaults::NUM_WORKERS),
            recollector_capacity: env_get(
                "TP_RECOLLECTOR_CAPACITY",
                defaults::RECOLLECTOR_CAPACITY,
            ),
            prewarm_results: env_get("TP_PREWARM_RESULTS", defaults::PREWARM_RESULTS),
            worker_stack_size: env_get("TP_WORKER_STACK_SIZE", defaults::WORKER_STACK_SIZE),
            debug_logging: env_get_bool("TP_DEBUG", defaults::DEBUG_LOGGING),
        }
    }

    /// Create config with the compile-time defaults only (no env override).
    /// Useful for testing or when you want full control.
    pub fn new() -> Self {
        Self {
            num_workers: defaults::NUM_WORKERS,
            recollector_capacity: defaults::RECOLLECTOR_CAPACITY,
            prewarm_results: defaults::PREWARM_RESULTS,
            worker_stack_size: defaults::WORKER_STACK_SIZE,
            debug_logging: defaults::DEBUG_LOGGING,
        }
    }

    // Builder methods

    pub fn num_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    pub fn recollector_capacity(mut self, cap: usize) -> Self {
        self.recollector_capacity = cap;
        self
    }

    pub fn prewarm_results(mut self, n: usize) -> Self {
        self.prewarm_results = n;
        self
    }

    pub fn worker_stack_size(mut self, size: usize) -> Self {
        self.worker_stack_size = size;
        self
    }

    pub fn debug_logging(mut self, enable: bool) -> Self {
        self.debug_logging = enable;
        self
    }

    /// Validate configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_workers == 0 {
            return Err(ConfigError::InvalidValue("num_workers must be > 0"));
        }
        if self.num_workers > MAX_WORKERS {
            return Err(ConfigError::InvalidValue("num_workers exceeds MAX_WORKERS"));
        }
        if self.recollector_capacity > MAX_RECOLLECTOR_CAPACITY {
            return Err(ConfigError::InvalidValue(
                "recollector_capacity exceeds MAX_RECOLLECTOR_CAPACITY",
            ));
        }
        if self.prewarm_results > self.recollector_capacity {
            return Err(ConfigError::InvalidValue(
                "prewarm_results must be <= recollector_capacity",
            ));
        }
        if self.worker_stack_size < 64 * 1024 {
            return Err(ConfigError::InvalidValue("worker_stack_size must be >= 64KB"));
        }
        Ok(())
    }

    /// Print configuration (for debugging)
    pub fn print(&self) {
        kprintln!("taskpool configuration:");
        kprintln!("  num_workers:            {}", self.num_workers);
        kprintln!("  recollector_capacity:   {}", self.recollector_capacity);
        kprintln!("  prewarm_results:        {}", self.prewarm_results);
        kprintln!("  worker_stack_size:      {}", self.worker_stack_size);
        kprintln!("  debug_logging:          {}", self.debug_logging);
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for PoolError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::InvalidValue(msg) => PoolError::Config(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = PoolConfig::new();
        assert!(config.num_workers >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = PoolConfig::new()
            .num_workers(8)
            .recollector_capacity(16)
            .prewarm_results(4);

        assert_eq!(config.num_workers, 8);
        assert_eq!(config.recollector_capacity, 16);
        assert_eq!(config.prewarm_results, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        assert!(PoolConfig::new().num_workers(0).validate().is_err());
        assert!(PoolConfig::new().num_workers(MAX_WORKERS + 1).validate().is_err());
        assert!(PoolConfig::new().worker_stack_size(1024).validate().is_err());

        let err = PoolConfig::new()
            .recollector_capacity(2)
            .prewarm_results(3)
            .validate()
            .unwrap_err();
        assert_eq!(err, ConfigError::InvalidValue("prewarm_results must be <= recollector_capacity"));
    }

    #[test]
    fn test_into_pool_error() {
        let err: PoolError = ConfigError::InvalidValue("x").into();
        assert_eq!(err, PoolError::Config("x"));
    }
}
