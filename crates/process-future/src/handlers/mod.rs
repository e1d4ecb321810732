//! Handles specialized for the process types the router recognizes
//!
//! Each specialization turns a descriptor into a [`Command`](crate::Command)
//! and picks the [`OutputTransform`](crate::OutputTransform) for its result.

pub mod curl;
pub mod script;

pub use curl::{CurlHandle, DecodeHttpResponse};
pub use script::ScriptHandle;
