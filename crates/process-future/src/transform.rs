//! Turning drained output into a result value

use std::error::Error as StdError;

/// Error type returned by output transforms
pub type TransformError = Box<dyn StdError + Send + Sync>;

/// Converts everything a child wrote to stdout into the handle's result.
///
/// A handle is constructed with exactly one transform; it runs once per run,
/// after the child has been drained and reaped and only when stderr stayed
/// empty. A failure becomes [`Error::OutputInterpretation`](crate::Error::OutputInterpretation).
pub trait OutputTransform: Send + Sync {
    /// The result type exposed by the handle
    type Output: Send + Sync;

    /// Interpret the raw stdout bytes
    fn transform(&self, raw: &[u8]) -> Result<Self::Output, TransformError>;
}

/// Exposes stdout unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl OutputTransform for Passthrough {
    type Output = Vec<u8>;

    fn transform(&self, raw: &[u8]) -> Result<Self::Output, TransformError> {
        Ok(raw.to_vec())
    }
}

/// Exposes stdout as UTF-8 text
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8Text;

impl OutputTransform for Utf8Text {
    type Output = String;

    fn transform(&self, raw: &[u8]) -> Result<Self::Output, TransformError> {
        Ok(String::from_utf8(raw.to_vec())?)
    }
}

/// Any closure over the raw bytes is a transform
impl<F, T, E> OutputTransform for F
where
    F: Fn(&[u8]) -> Result<T, E> + Send + Sync,
    T: Send + Sync,
    E: Into<TransformError>,
{
    type Output = T;

    fn transform(&self, raw: &[u8]) -> Result<Self::Output, TransformError> {
        self(raw).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_keeps_bytes() {
        assert_eq!(Passthrough.transform(b"\x00hello").unwrap(), b"\x00hello");
    }

    #[test]
    fn test_utf8_rejects_invalid_bytes() {
        assert_eq!(Utf8Text.transform(b"hi").unwrap(), "hi");
        assert!(Utf8Text.transform(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn test_closure_transform() {
        let count_lines = |raw: &[u8]| -> Result<usize, std::io::Error> {
            Ok(raw.iter().filter(|b| **b == b'\n').count())
        };
        assert_eq!(count_lines.transform(b"a\nb\n").unwrap(), 2);
    }
}
