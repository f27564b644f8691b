//! Completion status and worker lifecycle state types

use core::fmt;

/// Completion status of an async result
///
/// Transitions exactly once per lifetime, Pending -> Done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResultStatus {
    /// Producer has not signalled yet
    Pending = 0,

    /// Producer has signalled, the payload is visible
    Done = 1,
}

impl ResultStatus {
    #[inline]
    pub const fn is_done(&self) -> bool {
        matches!(self, ResultStatus::Done)
    }
}

impl From<u8> for ResultStatus {
    fn from(v: u8) -> Self {
        match v {
            1 => ResultStatus::Done,
            _ => ResultStatus::Pending,
        }
    }
}

impl From<ResultStatus> for u8 {
    fn from(status: ResultStatus) -> u8 {
        status as u8
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultStatus::Pending => write!(f, "pending"),
            ResultStatus::Done => write!(f, "done"),
        }
    }
}

/// Lifecycle state of a worker thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// Parked on the wake semaphore, or about to be
    Idle = 0,

    /// Executing a dequeued task
    Running = 1,

    /// Shutdown requested, finishing queued tasks
    Draining = 2,

    /// Queue drained, thread exited (or exiting)
    Stopped = 3,
}

impl WorkerState {
    /// Check if the worker still accepts submissions
    #[inline]
    pub const fn is_accepting(&self) -> bool {
        matches!(self, WorkerState::Idle | WorkerState::Running)
    }

    #[inline]
    pub const fn is_stopped(&self) -> bool {
        matches!(self, WorkerState::Stopped)
    }
}

impl From<u8> for WorkerState {
    fn from(v: u8) -> Self {
        match v {
            0 => WorkerState::Idle,
            1 => WorkerState::Running,
            2 => WorkerState::Draining,
            _ => WorkerState::Stopped,
        }
    }
}

impl From<WorkerState> for u8 {
    fn from(state: WorkerState) -> u8 {
        state as u8
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Idle => write!(f, "idle"),
            WorkerState::Running => write!(f, "running"),
            WorkerState::Draining => write!(f, "draining"),
            WorkerState::Stopped => write!(f, "stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        assert_eq!(ResultStatus::from(u8::from(ResultStatus::Done)), ResultStatus::Done);
        assert_eq!(ResultStatus::from(0), ResultStatus::Pending);
        // Unknown raw values read as Pending
        assert_eq!(ResultStatus::from(42), ResultStatus::Pending);
        assert!(ResultStatus::Done.is_done());
        assert!(!ResultStatus::Pending.is_done());
    }

    #[test]
    fn test_worker_state_accepting() {
        assert!(WorkerState::Idle.is_accepting());
        assert!(WorkerState::Running.is_accepting());
        assert!(!WorkerState::Draining.is_accepting());
        assert!(!WorkerState::Stopped.is_accepting());
        assert!(WorkerState::Stopped.is_stopped());
        assert_eq!(WorkerState::from(2), WorkerState::Draining);
        assert_eq!(WorkerState::from(200), WorkerState::Stopped);
    }
}
