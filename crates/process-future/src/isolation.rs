//! Per-channel pipe isolation

use async_process::Stdio;
use serde::{Deserialize, Serialize};

/// One of the three standard channels of a child process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Standard input
    Stdin,
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}

/// Whether each standard channel of a child gets its own pipe.
///
/// An isolated channel is a pipe created for, and owned by, the handle. A
/// channel that is not isolated is inherited from the parent process and is
/// never closed by the handle. Every channel is isolated by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamIsolation {
    /// Give stdin its own pipe
    pub stdin: bool,
    /// Give stdout its own pipe
    pub stdout: bool,
    /// Give stderr its own pipe
    pub stderr: bool,
}

impl Default for StreamIsolation {
    fn default() -> Self {
        Self::all(true)
    }
}

impl StreamIsolation {
    /// A policy with every channel set to `isolated`
    pub fn all(isolated: bool) -> Self {
        Self {
            stdin: isolated,
            stdout: isolated,
            stderr: isolated,
        }
    }

    /// Set every channel at once
    pub fn set_all(&mut self, isolated: bool) -> &mut Self {
        *self = Self::all(isolated);
        self
    }

    /// Set whether stdin is isolated
    pub fn with_stdin(mut self, isolated: bool) -> Self {
        self.stdin = isolated;
        self
    }

    /// Set whether stdout is isolated
    pub fn with_stdout(mut self, isolated: bool) -> Self {
        self.stdout = isolated;
        self
    }

    /// Set whether stderr is isolated
    pub fn with_stderr(mut self, isolated: bool) -> Self {
        self.stderr = isolated;
        self
    }

    /// Whether `channel` is isolated
    pub fn is_isolated(&self, channel: Channel) -> bool {
        match channel {
            Channel::Stdin => self.stdin,
            Channel::Stdout => self.stdout,
            Channel::Stderr => self.stderr,
        }
    }

    /// The stdio configuration to spawn `channel` with
    pub(crate) fn stdio(&self, channel: Channel) -> Stdio {
        if self.is_isolated(channel) {
            Stdio::piped()
        } else {
            Stdio::inherit()
        }
    }
}
