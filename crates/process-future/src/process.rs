//! Process exit status and handle lifecycle states

use std::fmt;

/// Process exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    /// Exit code if the process exited normally
    pub code: Option<i32>,
    /// Signal that terminated the process (Unix only)
    pub signal: Option<i32>,
}

impl ExitStatus {
    /// Returns true if the process exited successfully (code 0)
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Returns true if the process was terminated by a signal
    pub fn terminated_by_signal(&self) -> bool {
        self.signal.is_some()
    }

    /// A single signed exit code.
    ///
    /// Signal terminations follow the shell convention of `128 + signal`;
    /// `-1` is reported when the platform gave neither.
    pub fn exit_code(&self) -> i32 {
        match (self.code, self.signal) {
            (Some(code), _) => code,
            (None, Some(signal)) => 128 + signal,
            (None, None) => -1,
        }
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
            #[cfg(unix)]
            signal: {
                use std::os::unix::process::ExitStatusExt;
                status.signal()
            },
            #[cfg(not(unix))]
            signal: None,
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(signal)) => write!(f, "signal {}", signal),
            (None, None) => write!(f, "unknown exit status"),
        }
    }
}

/// Lifecycle state of a process handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// A child is being started
    Spawning,
    /// A child is alive, or has exited but not yet been drained
    Running,
    /// The work ran inline, to completion, while the handle was created
    DegradedSynchronous,
    /// The child exited and its output was drained and reaped
    Completed,
    /// The child was terminated on request and reaped
    Stopped,
    /// The child could not be started
    Uninitializable,
}

impl RunState {
    /// Whether this state ends a run
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Stopped)
    }

    /// Whether a child may still be attached to the handle
    pub fn is_active(&self) -> bool {
        matches!(self, RunState::Spawning | RunState::Running)
    }
}
