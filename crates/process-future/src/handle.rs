//! Future-like handle over one background process
//!
//! A [`ProcessHandle`] spawns its child as soon as it is created and then
//! behaves like a future: [`is_running`](ProcessHandle::is_running) polls without
//! blocking, [`wait`](ProcessHandle::wait) drains and reaps the child, and
//! [`stop`](ProcessHandle::stop) terminates it, gracefully or not. A finished
//! handle can be started again with [`rerun`](ProcessHandle::rerun).
//!
//! Output is always drained before the child is reaped, and again after a
//! stop, so nothing the child wrote before exiting is lost.

use crate::command::Command;
use crate::error::{Error, Result};
use crate::options::{SpawnOptions, StopRequest};
use crate::process::{ExitStatus, RunState};
use crate::stdin::StdinHandle;
use crate::transform::{OutputTransform, Passthrough};
use async_io::Timer;
use async_process::{Child, ChildStderr, ChildStdin, ChildStdout};
use futures_lite::future;
use futures_lite::io::{AsyncRead, AsyncReadExt};
use std::io;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A handle to one background process and the result it produces
pub struct ProcessHandle<X: OutputTransform = Passthrough> {
    command: Command,
    descriptor: String,
    transform: X,
    options: SpawnOptions,
    state: RunState,
    live: Option<LiveRun>,
    finished: Option<FinishedRun<X::Output>>,
    init_failure: Option<String>,
}

/// The child of the current run and the pipe ends the handle owns.
///
/// Inherited channels are `None` from the start and are never touched.
struct LiveRun {
    child: Child,
    pid: u32,
    /// The child leads its own process group
    own_group: bool,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
}

/// Everything recorded when a run ends, written in one step.
struct FinishedRun<T> {
    status: ExitStatus,
    raw_output: Vec<u8>,
    error_output: Vec<u8>,
    outcome: std::result::Result<T, RunFailure>,
}

#[derive(Debug, Clone)]
enum RunFailure {
    /// stderr was not empty
    Execution,
    /// the transform rejected stdout
    Interpretation(String),
    /// reading a pipe or reaping failed
    Io(io::ErrorKind, String),
}

impl ProcessHandle<Passthrough> {
    /// Spawn `command` with default options, exposing raw stdout as the result
    pub fn new(command: Command) -> Result<Self> {
        Self::spawn(command, Passthrough, SpawnOptions::default())
    }
}

impl<X: OutputTransform> ProcessHandle<X> {
    /// Spawn `command` and return a handle to it.
    ///
    /// When the host cannot drive children without blocking, the command runs
    /// to completion before this returns and the handle starts out in
    /// [`RunState::DegradedSynchronous`].
    pub fn spawn(command: Command, transform: X, options: SpawnOptions) -> Result<Self> {
        let descriptor = command.to_string();
        let mut handle = Self {
            command,
            descriptor,
            transform,
            options,
            state: RunState::Spawning,
            live: None,
            finished: None,
            init_failure: None,
        };
        handle.start()?;
        Ok(handle)
    }

    /// The command line the child is spawned with
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// The command the child is spawned from
    pub fn command(&self) -> &Command {
        &self.command
    }

    /// The options this handle was created with
    pub fn options(&self) -> &SpawnOptions {
        &self.options
    }

    /// Current lifecycle state
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Whether the last run was executed inline because the host lacks
    /// non-blocking process control
    pub fn is_degraded(&self) -> bool {
        self.state == RunState::DegradedSynchronous
    }

    /// Process ID of the live child, if there is one
    pub fn pid(&self) -> Option<u32> {
        self.live.as_ref().map(|live| live.pid)
    }

    /// Whether the child is still alive. Never blocks.
    pub fn is_running(&mut self) -> bool {
        if self.state != RunState::Running {
            return false;
        }
        match self.live.as_mut() {
            Some(live) => matches!(live.child.try_status(), Ok(None)),
            None => false,
        }
    }

    /// Writer for the child's stdin, when stdin is isolated and still open
    pub fn stdin_mut(&mut self) -> Option<StdinHandle<'_>> {
        let live = self.live.as_mut()?;
        if live.stdin.is_none() {
            return None;
        }
        Some(StdinHandle::new(&mut live.stdin))
    }

    /// Wait for the child to exit and return its result.
    ///
    /// Closes stdin, drains stdout and stderr to EOF, then reaps the child.
    /// Anything written to stderr fails the run with
    /// [`Error::ProcessExecution`]. Once a run has ended, every call returns
    /// the same cached outcome without touching the child again.
    pub async fn wait(&mut self) -> Result<&X::Output> {
        if self.state == RunState::Running {
            self.finish(RunState::Completed).await;
        }
        self.outcome()
    }

    /// Blocking form of [`wait`](Self::wait) for callers without an executor
    pub fn wait_blocking(&mut self) -> Result<&X::Output> {
        if self.state == RunState::Running {
            future::block_on(self.finish(RunState::Completed));
        }
        self.outcome()
    }

    /// Stop the child.
    ///
    /// With `force` the child is killed at once. Otherwise it is asked to exit
    /// and killed once `timeout` elapses. Returns whether the kill was needed.
    pub async fn stop(&mut self, force: bool, timeout: Duration) -> Result<bool> {
        self.stop_with(StopRequest::new(force, timeout)).await
    }

    /// Ask the child to exit, killing it after the policy's default timeout
    pub async fn stop_gracefully(&mut self) -> Result<bool> {
        let timeout = self.options.termination.default_timeout;
        self.stop_with(StopRequest::Graceful(timeout)).await
    }

    /// Stop the child as described by `request`; see [`stop`](Self::stop).
    ///
    /// Does nothing if the child is not running. A graceful timeout shorter
    /// than the policy's minimum, or a host without deliverable signals, turns
    /// the request into a forced stop. Output written before termination is
    /// drained and kept either way.
    pub async fn stop_with(&mut self, request: StopRequest) -> Result<bool> {
        if self.state == RunState::Uninitializable {
            return self.outcome().map(|_| false);
        }
        if !self.is_running() && !self.group_alive() {
            if self.state == RunState::Running {
                // Exited on its own; keep its output.
                self.finish(RunState::Completed).await;
            }
            return Ok(false);
        }

        let policy = self.options.termination;
        let forced = match request {
            StopRequest::Graceful(timeout)
                if self.options.capabilities.deliverable_signals
                    && timeout >= policy.min_graceful_timeout =>
            {
                self.terminate_gracefully(timeout).await?
            }
            StopRequest::Graceful(timeout) => {
                debug!(
                    pid = ?self.pid(),
                    ?timeout,
                    "Graceful stop not possible, killing instead"
                );
                self.kill()?;
                true
            }
            StopRequest::Force => {
                self.kill()?;
                true
            }
        };

        self.finish(RunState::Stopped).await;
        info!(descriptor = %self.descriptor, forced, "Stopped background process");
        Ok(forced)
    }

    /// The result of the last completed run, if it succeeded. Never blocks.
    pub fn result(&self) -> Option<&X::Output> {
        self.finished.as_ref()?.outcome.as_ref().ok()
    }

    /// Everything the child wrote to stdout during the last finished run
    pub fn raw_output(&self) -> Option<&[u8]> {
        self.finished.as_ref().map(|f| f.raw_output.as_slice())
    }

    /// Everything the child wrote to stderr during the last finished run
    pub fn error_output(&self) -> Option<&[u8]> {
        self.finished.as_ref().map(|f| f.error_output.as_slice())
    }

    /// Exit status of the last reaped child
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.finished.as_ref().map(|f| f.status)
    }

    /// Exit code of the last reaped child; see [`ExitStatus::exit_code`]
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_status().map(|status| status.exit_code())
    }

    /// Run the same command again.
    ///
    /// Fails with [`Error::AlreadyRunning`] while the child is alive. Any
    /// result of the previous run is discarded first, including output of a
    /// child that exited but was never waited on.
    pub fn rerun(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(Error::AlreadyRunning);
        }
        if self.live.take().is_some() {
            debug!(descriptor = %self.descriptor, "Discarding output of undrained run");
        }
        self.start()
    }

    /// Kill any live child without draining it and release its pipes.
    ///
    /// Safe to call any number of times. Dropping the handle does the same.
    pub fn abandon(&mut self) {
        if let Some(live) = self.live.take() {
            drop(live);
            self.state = RunState::Stopped;
        }
    }

    fn start(&mut self) -> Result<()> {
        self.state = RunState::Spawning;
        self.finished = None;
        self.init_failure = None;

        let mut cmd = self.command.prepare(&self.options.isolation);

        if self.options.capabilities.requires_synchronous() {
            debug!(descriptor = %self.descriptor, "Running process synchronously");
            let output = match future::block_on(cmd.output()) {
                Ok(output) => output,
                Err(e) => return Err(self.fail_init(e)),
            };
            self.record(output.status.into(), output.stdout, output.stderr, None);
            self.state = RunState::DegradedSynchronous;
            return Ok(());
        }

        // async-process registers the pipes non-blocking with its reactor.
        let mut child = cmd.spawn().map_err(|e| self.fail_init(e))?;
        let pid = child.id();
        self.live = Some(LiveRun {
            stdin: child.stdin.take(),
            stdout: child.stdout.take(),
            stderr: child.stderr.take(),
            child,
            pid,
            own_group: cfg!(unix) && self.options.isolation.stdin,
        });
        self.state = RunState::Running;
        info!(pid, descriptor = %self.descriptor, "Spawned background process");
        Ok(())
    }

    fn fail_init(&mut self, err: io::Error) -> Error {
        let reason = format!("failed to spawn `{}`: {}", self.descriptor, err);
        warn!("{}", reason);
        self.state = RunState::Uninitializable;
        self.init_failure = Some(reason.clone());
        Error::initialization_failed(reason)
    }

    /// Drain, reap and record the current run, moving to `terminal`.
    async fn finish(&mut self, terminal: RunState) {
        let Some(mut live) = self.live.take() else {
            return;
        };

        live.stdin.take();
        let (stdout, stderr) = future::zip(
            read_to_end(live.stdout.take()),
            read_to_end(live.stderr.take()),
        )
        .await;
        let status = live.child.status().await;
        drop(live);

        let mut failure = None;
        let mut take = |read: io::Result<Vec<u8>>| {
            read.unwrap_or_else(|e| {
                failure.get_or_insert(RunFailure::Io(e.kind(), e.to_string()));
                Vec::new()
            })
        };
        let stdout = take(stdout);
        let stderr = take(stderr);
        let status = take_status(status, &mut failure);

        debug!(
            descriptor = %self.descriptor,
            stdout_bytes = stdout.len(),
            stderr_bytes = stderr.len(),
            %status,
            "Drained background process"
        );
        self.record(status, stdout, stderr, failure);
        self.state = terminal;
    }

    fn record(
        &mut self,
        status: ExitStatus,
        raw_output: Vec<u8>,
        error_output: Vec<u8>,
        failure: Option<RunFailure>,
    ) {
        let outcome = match failure {
            Some(failure) => Err(failure),
            None if !error_output.is_empty() => Err(RunFailure::Execution),
            None => self
                .transform
                .transform(&raw_output)
                .map_err(|e| RunFailure::Interpretation(e.to_string())),
        };
        self.finished = Some(FinishedRun {
            status,
            raw_output,
            error_output,
            outcome,
        });
    }

    fn outcome(&self) -> Result<&X::Output> {
        let Some(finished) = &self.finished else {
            let reason = self
                .init_failure
                .clone()
                .unwrap_or_else(|| "process has not been started".to_string());
            return Err(Error::initialization_failed(reason));
        };

        match &finished.outcome {
            Ok(output) => Ok(output),
            Err(RunFailure::Execution) => Err(Error::ProcessExecution {
                stderr: finished.error_output.clone(),
                status: finished.status,
            }),
            Err(RunFailure::Interpretation(reason)) => {
                Err(Error::output_interpretation(reason.clone()))
            }
            Err(RunFailure::Io(kind, message)) => {
                Err(Error::Io(io::Error::new(*kind, message.clone())))
            }
        }
    }

    async fn terminate_gracefully(&mut self, timeout: Duration) -> Result<bool> {
        let poll_interval = self.options.termination.poll_interval;
        self.signal_terminate()?;

        let started = Instant::now();
        loop {
            // Descendants that outlive the child can still hold its pipes.
            if !self.is_running() && !self.group_alive() {
                return Ok(false);
            }
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                warn!(
                    pid = ?self.pid(),
                    ?timeout,
                    "Process group ignored termination request, killing"
                );
                self.kill()?;
                return Ok(true);
            }
            Timer::after(poll_interval.min(timeout - elapsed)).await;
        }
    }

    #[cfg(unix)]
    fn signal_terminate(&mut self) -> Result<()> {
        match self.live.as_ref() {
            Some(live) => live.signal(nix::sys::signal::Signal::SIGTERM),
            None => Ok(()),
        }
    }

    #[cfg(not(unix))]
    fn signal_terminate(&mut self) -> Result<()> {
        self.kill()
    }

    fn kill(&mut self) -> Result<()> {
        match self.live.as_mut() {
            Some(live) => live.kill(),
            None => Ok(()),
        }
    }

    fn group_alive(&self) -> bool {
        self.live.as_ref().is_some_and(LiveRun::group_alive)
    }
}

impl LiveRun {
    #[cfg(unix)]
    fn signal(&self, signal: nix::sys::signal::Signal) -> Result<()> {
        use nix::errno::Errno;
        use nix::sys::signal::killpg;
        use nix::unistd::Pid;

        let pid = Pid::from_raw(self.pid as i32);
        let sent = if self.own_group {
            killpg(pid, signal)
        } else {
            nix::sys::signal::kill(pid, signal)
        };
        match sent {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(Error::signal_failed(signal as i32, e.to_string())),
        }
    }

    #[cfg(unix)]
    fn kill(&mut self) -> Result<()> {
        self.signal(nix::sys::signal::Signal::SIGKILL)
    }

    /// Whether any member of the child's process group still exists
    #[cfg(unix)]
    fn group_alive(&self) -> bool {
        use nix::errno::Errno;
        use nix::sys::signal::killpg;
        use nix::unistd::Pid;

        self.own_group && !matches!(killpg(Pid::from_raw(self.pid as i32), None), Err(Errno::ESRCH))
    }

    #[cfg(not(unix))]
    fn group_alive(&self) -> bool {
        false
    }

    #[cfg(not(unix))]
    fn kill(&mut self) -> Result<()> {
        self.child
            .kill()
            .map_err(|e| Error::signal_failed(-1, e.to_string()))
    }
}

impl Drop for LiveRun {
    fn drop(&mut self) {
        let leader_alive = matches!(self.child.try_status(), Ok(None));
        if leader_alive || self.group_alive() {
            if let Err(e) = self.kill() {
                warn!(pid = self.pid, "Failed to kill background process on drop: {}", e);
            }
        }
        // Remaining pipe ends close with the fields; async-process reaps the child.
    }
}

async fn read_to_end<R: AsyncRead + Unpin>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

fn take_status(
    status: io::Result<std::process::ExitStatus>,
    failure: &mut Option<RunFailure>,
) -> ExitStatus {
    match status {
        Ok(status) => status.into(),
        Err(e) => {
            failure.get_or_insert(RunFailure::Io(e.kind(), e.to_string()));
            ExitStatus {
                code: None,
                signal: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Capabilities;
    use crate::transform::Utf8Text;

    fn sh(script: &str) -> Command {
        Command::builder("sh").arg("-c").arg(script).build()
    }

    #[test]
    fn test_spawn_failure_is_uninitializable() {
        let err = ProcessHandle::new(Command::new("this_command_does_not_exist_12345"))
            .err()
            .unwrap();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("failed to initialize"));
    }

    #[test]
    fn test_wait_blocking_returns_stdout() {
        let mut handle = ProcessHandle::new(sh("printf hello")).unwrap();
        assert_eq!(handle.wait_blocking().unwrap(), b"hello");
        assert_eq!(handle.state(), RunState::Completed);
        assert_eq!(handle.exit_code(), Some(0));
        assert!(handle.pid().is_none());
    }

    #[test]
    fn test_synchronous_mode_runs_inline() {
        let options = SpawnOptions::default().with_capabilities(Capabilities::synchronous());
        let mut handle = ProcessHandle::spawn(sh("printf inline"), Utf8Text, options).unwrap();

        assert!(handle.is_degraded());
        assert!(!handle.is_running());
        assert_eq!(handle.result().map(String::as_str), Some("inline"));
        assert_eq!(handle.wait_blocking().unwrap(), "inline");
    }

    #[test]
    fn test_synchronous_mode_reports_stderr() {
        let options = SpawnOptions::default().with_capabilities(Capabilities::synchronous());
        let mut handle =
            ProcessHandle::spawn(sh("echo broken >&2; exit 4"), Passthrough, options).unwrap();

        match handle.wait_blocking() {
            Err(Error::ProcessExecution { stderr, status }) => {
                assert_eq!(stderr, b"broken\n");
                assert_eq!(status.code, Some(4));
            }
            other => panic!("unexpected outcome: {:?}", other.map(|v| v.len())),
        }
        assert!(handle.result().is_none());
    }

    #[test]
    fn test_transform_failure_is_interpretation_error() {
        let reject = |_: &[u8]| -> std::result::Result<(), std::io::Error> {
            Err(std::io::Error::other("not a report"))
        };
        let mut handle =
            ProcessHandle::spawn(sh("printf data"), reject, SpawnOptions::default()).unwrap();

        let err = handle.wait_blocking().err().unwrap();
        assert!(matches!(err, Error::OutputInterpretation { .. }));
        assert!(!err.is_fatal());
        assert_eq!(handle.raw_output(), Some(&b"data"[..]));
    }
}
