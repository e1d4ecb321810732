//! One entry point for every kind of background process
//!
//! [`BackgroundProcess::spawn`] classifies a descriptor, starts the matching
//! specialization, and exposes the operations they share:
//!
//! ```no_run
//! use process_future::{BackgroundProcess, ProcessOutput, Settings};
//!
//! # async fn run() -> process_future::Result<()> {
//! let settings = Settings::default();
//! let mut report = BackgroundProcess::spawn("jobs/report.sh --daily", &settings)?;
//! let mut page = BackgroundProcess::spawn("https://example.com", &settings)?;
//!
//! if let ProcessOutput::Http(response) = page.wait().await? {
//!     println!("{} {}", response.status, response.body.len());
//! }
//! report.stop(false, std::time::Duration::from_secs(2)).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::Settings;
use crate::error::Result;
use crate::handlers::{CurlHandle, ScriptHandle};
use crate::http::HttpResponse;
use crate::process::RunState;
use crate::router::{ProcessType, ProcessTypeRouter};
use std::time::Duration;

/// A running (or finished) background process of any supported type
pub enum BackgroundProcess {
    /// A script run by its interpreter
    Script(ScriptHandle),
    /// A request run by the fetch worker
    Curl(CurlHandle),
}

/// The result of a background process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutput<'a> {
    /// Raw stdout of a script
    Raw(&'a [u8]),
    /// Response fetched by the worker
    Http(&'a HttpResponse),
}

impl BackgroundProcess {
    /// Classify `descriptor` with the default router and start it
    pub fn spawn(descriptor: &str, settings: &Settings) -> Result<Self> {
        Self::spawn_with(&ProcessTypeRouter::with_defaults(settings), descriptor, settings)
    }

    /// Classify `descriptor` with `router` and start it
    pub fn spawn_with(
        router: &ProcessTypeRouter,
        descriptor: &str,
        settings: &Settings,
    ) -> Result<Self> {
        let options = settings.spawn_options();
        match router.classify(descriptor)? {
            ProcessType::Url => Ok(Self::Curl(CurlHandle::curl(
                descriptor,
                &settings.fetch_worker_path(),
                options,
            )?)),
            ProcessType::Script => Ok(Self::Script(ScriptHandle::script(
                descriptor,
                &settings.interpreters,
                options,
            )?)),
        }
    }

    /// Which specialization runs this process
    pub fn process_type(&self) -> ProcessType {
        match self {
            Self::Script(_) => ProcessType::Script,
            Self::Curl(_) => ProcessType::Url,
        }
    }

    /// See [`ProcessHandle::is_running`](crate::ProcessHandle::is_running)
    pub fn is_running(&mut self) -> bool {
        match self {
            Self::Script(handle) => handle.is_running(),
            Self::Curl(handle) => handle.is_running(),
        }
    }

    /// See [`ProcessHandle::wait`](crate::ProcessHandle::wait)
    pub async fn wait(&mut self) -> Result<ProcessOutput<'_>> {
        match self {
            Self::Script(handle) => handle.wait().await.map(|raw| ProcessOutput::Raw(raw)),
            Self::Curl(handle) => handle.wait().await.map(ProcessOutput::Http),
        }
    }

    /// See [`ProcessHandle::wait_blocking`](crate::ProcessHandle::wait_blocking)
    pub fn wait_blocking(&mut self) -> Result<ProcessOutput<'_>> {
        match self {
            Self::Script(handle) => handle.wait_blocking().map(|raw| ProcessOutput::Raw(raw)),
            Self::Curl(handle) => handle.wait_blocking().map(ProcessOutput::Http),
        }
    }

    /// See [`ProcessHandle::stop`](crate::ProcessHandle::stop)
    pub async fn stop(&mut self, force: bool, timeout: Duration) -> Result<bool> {
        match self {
            Self::Script(handle) => handle.stop(force, timeout).await,
            Self::Curl(handle) => handle.stop(force, timeout).await,
        }
    }

    /// See [`ProcessHandle::result`](crate::ProcessHandle::result)
    pub fn result(&self) -> Option<ProcessOutput<'_>> {
        match self {
            Self::Script(handle) => handle.result().map(|raw| ProcessOutput::Raw(raw)),
            Self::Curl(handle) => handle.result().map(ProcessOutput::Http),
        }
    }

    /// See [`ProcessHandle::rerun`](crate::ProcessHandle::rerun)
    pub fn rerun(&mut self) -> Result<()> {
        match self {
            Self::Script(handle) => handle.rerun(),
            Self::Curl(handle) => handle.rerun(),
        }
    }

    /// See [`ProcessHandle::exit_code`](crate::ProcessHandle::exit_code)
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Script(handle) => handle.exit_code(),
            Self::Curl(handle) => handle.exit_code(),
        }
    }

    /// See [`ProcessHandle::state`](crate::ProcessHandle::state)
    pub fn state(&self) -> RunState {
        match self {
            Self::Script(handle) => handle.state(),
            Self::Curl(handle) => handle.state(),
        }
    }

    /// See [`ProcessHandle::is_degraded`](crate::ProcessHandle::is_degraded)
    pub fn is_degraded(&self) -> bool {
        self.state() == RunState::DegradedSynchronous
    }

    /// The command line the child was spawned with
    pub fn descriptor(&self) -> &str {
        match self {
            Self::Script(handle) => handle.descriptor(),
            Self::Curl(handle) => handle.descriptor(),
        }
    }
}
