use std::fmt;
use std::io;

use thiserror::Error;

use crate::common::config::Lba;
use crate::storage::disk::thrpool::request::Request;

pub type Result<T> = std::result::Result<T, EngineError>;

// errno values used when a device error carries no OS code of its own.
const EIO: i32 = 5;
const EINVAL: i32 = 22;
const ERANGE: i32 = 34;
const ENOTSUP: i32 = 95;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid thread count {0}, expected 1..=1023")]
    InvalidThreadCount(i64),
    #[error("{var}={value:?} is not an integer")]
    NotANumber { var: String, value: String },
    #[error("queue capacity must be at least one slot")]
    ZeroCapacity,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("queue is full ({capacity} commands outstanding)")]
    Busy { capacity: u32 },
    #[error("completion queue lock is contended")]
    Contended,
    #[error("failed to spawn worker thread: {0}")]
    ThreadSpawn(#[source] io::Error),
    #[error("worker {worker} panicked")]
    WorkerPanicked { worker: usize },
}

impl EngineError {
    /// Busy and Contended clear up on their own once completions are drained.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Busy { .. } | EngineError::Contended)
    }
}

/// Failure reported by a blocking device for a single command.
///
/// Device errors are data: they travel to the submitter inside its
/// `Completion` and never stop the pipeline.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("device I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("LBA range [{slba}, {slba}+{nlb}] exceeds device of {nblocks} blocks")]
    OutOfRange { slba: Lba, nlb: u16, nblocks: u64 },
    #[error("buffer holds {got} bytes, command needs {needed}")]
    BufferTooSmall { needed: usize, got: usize },
    #[error("unsupported command: {0}")]
    Unsupported(String),
    #[error("device panicked while executing command: {0}")]
    Panicked(String),
}

impl DeviceError {
    /// Negative errno-style status, zero being reserved for success.
    pub fn status_code(&self) -> i32 {
        match self {
            DeviceError::Io(err) => -err.raw_os_error().unwrap_or(EIO),
            DeviceError::OutOfRange { .. } => -ERANGE,
            DeviceError::BufferTooSmall { .. } => -EINVAL,
            DeviceError::Unsupported(_) => -ENOTSUP,
            DeviceError::Panicked(_) => -EIO,
        }
    }
}

/// A submission the queue refused, handed back so the caller can retry it.
pub struct SubmitError<C> {
    error: EngineError,
    request: Request<C>,
}

impl<C> SubmitError<C> {
    pub(crate) fn new(error: EngineError, request: Request<C>) -> Self {
        Self { error, request }
    }

    pub fn error(&self) -> &EngineError {
        &self.error
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.error, EngineError::Busy { .. })
    }

    pub fn into_request(self) -> Request<C> {
        self.request
    }

    pub fn into_parts(self) -> (EngineError, Request<C>) {
        (self.error, self.request)
    }
}

impl<C> fmt::Debug for SubmitError<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmitError")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<C> fmt::Display for SubmitError<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "submission rejected: {}", self.error)
    }
}

impl<C> std::error::Error for SubmitError<C> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl<C> From<SubmitError<C>> for EngineError {
    fn from(err: SubmitError<C>) -> Self {
        err.error
    }
}
