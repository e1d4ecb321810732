//! Host capability detection
//!
//! Whether this host can drive a child without blocking, and whether it can
//! deliver catchable termination signals, is decided once per process and
//! cached. Handles receive the result through [`SpawnOptions`](crate::SpawnOptions)
//! instead of probing on their own.

use std::sync::OnceLock;
use tracing::debug;

/// What the host lets a handle do with a child process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Children can be spawned with pipes, polled, signalled and reaped
    /// without blocking the caller
    pub subprocess_control: bool,
    /// A catchable termination signal can be delivered to a child
    pub deliverable_signals: bool,
}

static DETECTED: OnceLock<Capabilities> = OnceLock::new();

impl Capabilities {
    /// The capabilities of the current host, detected on first use
    pub fn detect() -> Self {
        *DETECTED.get_or_init(|| {
            let caps = Self {
                subprocess_control: cfg!(any(unix, windows)),
                deliverable_signals: cfg!(unix),
            };
            debug!(?caps, "Detected host process capabilities");
            caps
        })
    }

    /// Capabilities that force every handle into synchronous execution
    pub fn synchronous() -> Self {
        Self {
            subprocess_control: false,
            deliverable_signals: false,
        }
    }

    /// Whether handles must run their work inline
    pub fn requires_synchronous(&self) -> bool {
        !self.subprocess_control
    }
}
