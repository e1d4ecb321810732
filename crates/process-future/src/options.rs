//! Spawn and termination options

use crate::capability::Capabilities;
use crate::error::{Error, Result};
use crate::isolation::StreamIsolation;
use std::time::Duration;

/// Default interval between liveness checks during a graceful stop
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Graceful stop timeouts below this are not waited on
pub const DEFAULT_MIN_GRACEFUL_TIMEOUT: Duration = Duration::from_millis(100);

/// Default grace period for a graceful stop
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// How a graceful stop is carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationPolicy {
    /// Interval between liveness checks while waiting for a graceful exit
    pub poll_interval: Duration,
    /// Graceful timeouts below this are treated as a forced stop
    pub min_graceful_timeout: Duration,
    /// Grace period used when the caller does not give one
    pub default_timeout: Duration,
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            min_graceful_timeout: DEFAULT_MIN_GRACEFUL_TIMEOUT,
            default_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

/// Everything a handle needs besides the command it runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnOptions {
    /// Which channels get their own pipes
    pub isolation: StreamIsolation,
    /// What the host supports
    pub capabilities: Capabilities,
    /// Graceful stop parameters
    pub termination: TerminationPolicy,
}

impl Default for SpawnOptions {
    fn default() -> Self {
        Self {
            isolation: StreamIsolation::default(),
            capabilities: Capabilities::detect(),
            termination: TerminationPolicy::default(),
        }
    }
}

impl SpawnOptions {
    /// Set the isolation policy
    pub fn with_isolation(mut self, isolation: StreamIsolation) -> Self {
        self.isolation = isolation;
        self
    }

    /// Set the host capabilities
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Set the termination policy
    pub fn with_termination(mut self, termination: TerminationPolicy) -> Self {
        self.termination = termination;
        self
    }
}

/// A request to stop a running child
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopRequest {
    /// Kill immediately
    #[default]
    Force,
    /// Ask the child to exit, killing it once the timeout elapses
    Graceful(Duration),
}

impl StopRequest {
    /// A graceful stop with a timeout given in seconds
    ///
    /// Negative, NaN and infinite timeouts are rejected.
    pub fn graceful_secs(seconds: f64) -> Result<Self> {
        Duration::try_from_secs_f64(seconds)
            .map(StopRequest::Graceful)
            .map_err(|_| Error::InvalidTimeout { seconds })
    }

    /// Build a request from the `force`/`timeout` pair
    pub fn new(force: bool, timeout: Duration) -> Self {
        if force {
            StopRequest::Force
        } else {
            StopRequest::Graceful(timeout)
        }
    }
}
