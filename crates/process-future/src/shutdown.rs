//! Owned subscription to termination signals
//!
//! A long-running child (such as the fetch worker) uses a [`ShutdownSignal`]
//! to notice that its parent asked it to stop. The handlers are installed
//! when the subscription is created and removed again when it is dropped.

use signal_hook::SigId;
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Signals that ask a process to shut down
pub const TERMINATION_SIGNALS: [i32; 3] = [SIGTERM, SIGINT, SIGHUP];

/// Flag raised when any of the subscribed signals arrives
#[derive(Debug)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
    ids: Vec<SigId>,
}

impl ShutdownSignal {
    /// Subscribe to the termination signals
    pub fn termination() -> io::Result<Self> {
        Self::register(&TERMINATION_SIGNALS)
    }

    /// Subscribe to `signals`.
    ///
    /// While subscribed, these signals no longer run their default action.
    pub fn register(signals: &[i32]) -> io::Result<Self> {
        let flag = Arc::new(AtomicBool::new(false));
        let mut subscription = Self {
            flag,
            ids: Vec::with_capacity(signals.len()),
        };
        for &signal in signals {
            // Handlers registered so far are removed by Drop on failure.
            let id = signal_hook::flag::register(signal, Arc::clone(&subscription.flag))?;
            subscription.ids.push(id);
        }
        debug!(?signals, "Subscribed to shutdown signals");
        Ok(subscription)
    }

    /// Whether a subscribed signal has arrived
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// A shared view of the flag, for threads that only need to read it
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }
}

impl Drop for ShutdownSignal {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            signal_hook::low_level::unregister(id);
        }
    }
}
