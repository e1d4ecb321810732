//! Shared helpers for process-future integration tests

#![allow(dead_code)]

use process_future::{Capabilities, Command, SpawnOptions, TerminationPolicy};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// `sh -c <script>`
pub fn sh(script: &str) -> Command {
    Command::builder("sh").arg("-c").arg(script).build()
}

/// Poll interval used by [`fast_options`]
pub const FAST_POLL: Duration = Duration::from_millis(20);

/// Scheduling allowance on top of a stop's timeout and one poll interval
pub const STOP_SLACK: Duration = Duration::from_millis(250);

/// Options with a short poll interval so stop tests run quickly
pub fn fast_options() -> SpawnOptions {
    SpawnOptions::default().with_termination(TerminationPolicy {
        poll_interval: FAST_POLL,
        ..TerminationPolicy::default()
    })
}

/// Options forcing inline execution
pub fn synchronous_options() -> SpawnOptions {
    SpawnOptions::default().with_capabilities(Capabilities::synchronous())
}

/// Write an executable file into `dir`
pub fn write_script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, body).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    path
}

/// Whether a process with `pid` exists and has not exited
#[cfg(unix)]
pub fn pid_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    if kill(Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }
    // Zombies still accept signal 0.
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => !stat
            .rsplit(')')
            .next()
            .is_some_and(|fields| fields.trim_start().starts_with('Z')),
        Err(_) => true,
    }
}

/// Poll `condition` until it holds or `limit` elapses
pub fn eventually(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    condition()
}

/// Wait until `path` exists, e.g. a marker a script writes once its traps are set
pub fn wait_for_file(path: &Path) {
    assert!(
        eventually(Duration::from_secs(5), || path.exists()),
        "{} never appeared",
        path.display()
    );
}
