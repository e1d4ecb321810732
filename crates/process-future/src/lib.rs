//! Future-like handles over background OS processes
//!
//! A [`ProcessHandle`] starts a child process when it is created and lets the
//! caller poll it, wait for its result, or stop it. The result is whatever
//! the handle's [`OutputTransform`] makes of the child's stdout; anything the
//! child writes to stderr fails the run.
//!
//! Descriptors such as `jobs/report.sh --daily` or `https://example.com` can
//! be started through [`BackgroundProcess`], which routes them to the script
//! or network request specialization.
//!
//! The crate is runtime-agnostic: children are driven by `async-process` and
//! the two suspending operations, [`wait`](ProcessHandle::wait) and
//! [`stop`](ProcessHandle::stop), run on any executor.
//!
//! ```no_run
//! use process_future::{Command, ProcessHandle};
//!
//! # fn main() -> process_future::Result<()> {
//! let mut handle = ProcessHandle::new(Command::builder("echo").arg("hello").build())?;
//! let output = futures_lite::future::block_on(handle.wait())?;
//! assert_eq!(output, b"hello\n");
//! # Ok(())
//! # }
//! ```

pub mod background;
pub mod capability;
pub mod codec;
pub mod command;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod handle;
pub mod handlers;
pub mod http;
pub mod isolation;
pub mod options;
pub mod process;
pub mod router;
#[cfg(unix)]
pub mod shutdown;
pub mod stdin;
pub mod transform;

pub use background::{BackgroundProcess, ProcessOutput};
pub use capability::Capabilities;
pub use codec::CodecError;
pub use command::{Command, CommandBuilder};
pub use config::{ConfigError, Settings};
pub use error::{Error, Result};
pub use handle::ProcessHandle;
pub use handlers::{CurlHandle, DecodeHttpResponse, ScriptHandle};
pub use http::{HttpResponse, RequestSpec};
pub use isolation::{Channel, StreamIsolation};
pub use options::{SpawnOptions, StopRequest, TerminationPolicy};
pub use process::{ExitStatus, RunState};
pub use router::{Classifier, ProcessType, ProcessTypeRouter, ScriptClassifier, UrlClassifier};
pub use stdin::StdinHandle;
pub use transform::{OutputTransform, Passthrough, TransformError, Utf8Text};
