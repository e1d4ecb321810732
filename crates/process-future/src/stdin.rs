//! Writing to an isolated stdin pipe

use crate::error::Result;
use async_process::ChildStdin;
use futures_lite::io::AsyncWriteExt;

/// Handle for writing to a child's stdin
///
/// Only exists when stdin is isolated. Closing it (or finishing the run) sends
/// EOF to the child.
pub struct StdinHandle<'a> {
    stdin: &'a mut Option<ChildStdin>,
}

impl<'a> StdinHandle<'a> {
    pub(crate) fn new(stdin: &'a mut Option<ChildStdin>) -> Self {
        Self { stdin }
    }

    /// Write a line to stdin (adds newline)
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        if let Some(stdin) = self.stdin.as_mut() {
            stdin.write_all(line.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await?;
        }
        Ok(())
    }

    /// Write raw bytes to stdin
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        if let Some(stdin) = self.stdin.as_mut() {
            stdin.write_all(data).await?;
            stdin.flush().await?;
        }
        Ok(())
    }

    /// Whether the pipe is still open
    pub fn is_open(&self) -> bool {
        self.stdin.is_some()
    }

    /// Close stdin by dropping the writer
    pub fn close(&mut self) {
        self.stdin.take();
    }
}
