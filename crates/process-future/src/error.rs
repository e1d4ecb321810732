//! Error types for background process handles

use crate::codec::CodecError;
use crate::process::ExitStatus;
use thiserror::Error;

/// Unified error type for background process handles
#[derive(Error, Debug)]
pub enum Error {
    /// The child could not be spawned
    #[error("failed to initialize process: {reason}")]
    InitializationFailed {
        /// The reason for the spawn failure
        reason: String,
    },

    /// The child ran but wrote to its error channel
    #[error("process reported an error ({status}): {}", String::from_utf8_lossy(.stderr).trim_end())]
    ProcessExecution {
        /// Everything the child wrote to stderr
        stderr: Vec<u8>,
        /// How the child exited
        status: ExitStatus,
    },

    /// The child's output could not be turned into the expected result
    #[error("could not interpret process output: {reason}")]
    OutputInterpretation {
        /// Why the output was rejected
        reason: String,
    },

    /// No classifier accepted the descriptor
    #[error("process cannot be handled in the background: {descriptor}")]
    UnsupportedProcess {
        /// The descriptor that was rejected
        descriptor: String,
    },

    /// The descriptor could not be split into a command line
    #[error("invalid process descriptor: {reason}")]
    InvalidDescriptor {
        /// What was wrong with the descriptor
        reason: String,
    },

    /// A rerun was requested while the child is still alive
    #[error("process is already running")]
    AlreadyRunning,

    /// A stop timeout that is negative or not finite
    #[error("invalid stop timeout: {seconds}s")]
    InvalidTimeout {
        /// The rejected timeout in seconds
        seconds: f64,
    },

    /// Failed to send signal to process
    #[error("failed to send signal {signal}: {reason}")]
    SignalFailed {
        /// The signal number that failed to send
        signal: i32,
        /// The reason for the signal failure
        reason: String,
    },

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Nix error (Unix signal handling)
    #[cfg(unix)]
    #[error(transparent)]
    Nix(#[from] nix::Error),
}

impl Error {
    /// Create an initialization failed error
    pub fn initialization_failed(reason: impl Into<String>) -> Self {
        Self::InitializationFailed {
            reason: reason.into(),
        }
    }

    /// Create a signal failed error
    pub fn signal_failed(signal: i32, reason: impl Into<String>) -> Self {
        Self::SignalFailed {
            signal,
            reason: reason.into(),
        }
    }

    /// Create an output interpretation error
    pub fn output_interpretation(reason: impl Into<String>) -> Self {
        Self::OutputInterpretation {
            reason: reason.into(),
        }
    }

    /// Returns true when the handle that produced this error cannot make
    /// progress without a `rerun`.
    ///
    /// Execution and interpretation failures describe a finished run; the
    /// handle itself is fine and can be rerun. Initialization failures mean no
    /// child exists at all.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::InitializationFailed { .. })
    }
}

impl From<CodecError> for Error {
    fn from(err: CodecError) -> Self {
        Error::output_interpretation(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
