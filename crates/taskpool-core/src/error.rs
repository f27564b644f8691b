//! Error types for the task pool

use core::fmt;

/// Result type for pool operations
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors that can occur in pool operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// Semaphore (or other OS resource) could not be created; carries errno
    ResourceExhausted(i32),

    /// Worker thread error
    WorkerError(WorkerError),

    /// Submission after shutdown was requested
    ShuttingDown,

    /// Explicit submission target does not exist
    InvalidWorker(usize),

    /// Completion was signalled without a written value
    NoValue,

    /// Value read back as a different scalar type than the one written
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Invalid configuration
    Config(&'static str),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::ResourceExhausted(errno) => {
                write!(f, "resource exhausted: errno {}", errno)
            }
            PoolError::WorkerError(e) => write!(f, "worker error: {}", e),
            PoolError::ShuttingDown => write!(f, "pool is shutting down"),
            PoolError::InvalidWorker(idx) => write!(f, "no worker with index {}", idx),
            PoolError::NoValue => write!(f, "completion carried no value"),
            PoolError::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {}, found {}", expected, found)
            }
            PoolError::Config(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for PoolError {}

/// Worker thread related errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// Failed to spawn worker thread
    SpawnFailed,

    /// Worker thread panicked outside a task body
    Panicked,

    /// Worker index does not fit an owner id
    TooManyWorkers,
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerError::SpawnFailed => write!(f, "failed to spawn worker thread"),
            WorkerError::Panicked => write!(f, "worker thread panicked"),
            WorkerError::TooManyWorkers => write!(f, "too many workers"),
        }
    }
}

impl From<WorkerError> for PoolError {
    fn from(e: WorkerError) -> Self {
        PoolError::WorkerError(e)
    }
}

/// Error returned when a recollector refuses an object.
///
/// The object is handed back so the caller decides what happens to it,
/// usually a release to the heap.
#[derive(Debug, PartialEq, Eq)]
pub enum ReleaseError<T> {
    /// Free list is at capacity
    Full(T),

    /// Object belongs to another owner's recollector
    Foreign(T),
}

impl<T> ReleaseError<T> {
    /// Take the rejected object back
    pub fn into_inner(self) -> T {
        match self {
            ReleaseError::Full(t) | ReleaseError::Foreign(t) => t,
        }
    }
}

impl<T> fmt::Display for ReleaseError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseError::Full(_) => write!(f, "recollector full"),
            ReleaseError::Foreign(_) => write!(f, "object belongs to another recollector"),
        }
    }
}

impl<T: fmt::Debug> std::error::Error for ReleaseError<T> {}
