//! Network requests run out of process by the fetch worker
//!
//! The parent never talks to the network itself: the descriptor is handed
//! unchanged to the `fetch-worker` binary, which performs the request and
//! writes the [`HttpResponse`] back as a single codec payload.

use crate::codec;
use crate::command::Command;
use crate::error::Result;
use crate::handle::ProcessHandle;
use crate::http::HttpResponse;
use crate::options::SpawnOptions;
use crate::transform::{OutputTransform, TransformError};
use std::path::Path;

/// Decodes the fetch worker's payload into an [`HttpResponse`]
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeHttpResponse;

impl OutputTransform for DecodeHttpResponse {
    type Output = HttpResponse;

    fn transform(&self, raw: &[u8]) -> std::result::Result<Self::Output, TransformError> {
        Ok(codec::decode(raw)?)
    }
}

/// Handle to an out-of-process request
pub type CurlHandle = ProcessHandle<DecodeHttpResponse>;

impl ProcessHandle<DecodeHttpResponse> {
    /// Start `worker` on the request described by `descriptor`
    pub fn curl(descriptor: &str, worker: &Path, options: SpawnOptions) -> Result<Self> {
        Self::spawn(curl_command(descriptor, worker), DecodeHttpResponse, options)
    }
}

/// The worker invocation for a request descriptor
pub fn curl_command(descriptor: &str, worker: &Path) -> Command {
    let mut command = Command::new(worker);
    command.arg(descriptor.trim());
    command
}
