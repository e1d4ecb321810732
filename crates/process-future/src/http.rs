//! Request descriptors and the response relayed by the fetch worker

use crate::descriptor;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::time::Duration;

/// The response the fetch worker sends back through the payload codec
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    /// Final URL after redirects
    pub url: String,
    /// HTTP status code
    pub status: u16,
    /// Response headers; repeated headers are joined with `", "`
    pub headers: BTreeMap<String, String>,
    /// Response body, byte for byte
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The body as text, with invalid UTF-8 replaced
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Look up a header case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A request parsed from a curl-style descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    /// HTTP method, upper case
    pub method: String,
    /// Target URL
    pub url: String,
    /// Request headers in the order given
    pub headers: Vec<(String, String)>,
    /// Request body
    pub body: Option<String>,
    /// Overall request timeout
    pub timeout: Option<Duration>,
}

impl RequestSpec {
    /// Parse `curl`-style options.
    ///
    /// Understands an optional leading `curl`, the URL, `-X/--request`,
    /// `-H/--header`, `-d/--data/--data-raw`, `-I/--head` and
    /// `-m/--max-time`. A body without an explicit method makes a POST.
    pub fn parse(request: &str) -> Result<Self> {
        let mut words = descriptor::split(request)?.into_iter().peekable();
        if words.peek().map(String::as_str) == Some("curl") {
            words.next();
        }

        let mut method = None;
        let mut url = None;
        let mut headers = Vec::new();
        let mut body = None;
        let mut timeout = None;

        while let Some(word) = words.next() {
            let mut value = |option: &str| {
                words
                    .next()
                    .ok_or_else(|| invalid(format!("{} needs a value", option)))
            };
            match word.as_str() {
                "-X" | "--request" => method = Some(value(&word)?.to_uppercase()),
                "-H" | "--header" => {
                    let header = value(&word)?;
                    let (name, val) = header
                        .split_once(':')
                        .ok_or_else(|| invalid(format!("malformed header '{}'", header)))?;
                    headers.push((name.trim().to_string(), val.trim().to_string()));
                }
                "-d" | "--data" | "--data-raw" => body = Some(value(&word)?),
                "-I" | "--head" => method = Some("HEAD".to_string()),
                "-m" | "--max-time" => {
                    let secs = value(&word)?;
                    let duration = secs
                        .parse::<f64>()
                        .ok()
                        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                        .ok_or_else(|| invalid(format!("invalid --max-time '{}'", secs)))?;
                    timeout = Some(duration);
                }
                option if option.starts_with('-') => {
                    return Err(invalid(format!("unsupported option '{}'", option)));
                }
                other => {
                    if url.is_some() {
                        return Err(invalid(format!("unexpected argument '{}'", other)));
                    }
                    url = Some(other.to_string());
                }
            }
        }

        let url = url.ok_or_else(|| invalid("no URL given"))?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(invalid(format!("'{}' is not an http(s) URL", url)));
        }
        let method = method.unwrap_or_else(|| {
            if body.is_some() { "POST" } else { "GET" }.to_string()
        });

        Ok(Self {
            method,
            url,
            headers,
            body,
            timeout,
        })
    }
}

fn invalid(reason: impl Into<String>) -> Error {
    Error::InvalidDescriptor {
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_url() {
        let parsed = RequestSpec::parse("https://example.com/").unwrap();
        assert_eq!(parsed.method, "GET");
        assert_eq!(parsed.url, "https://example.com/");
        assert!(parsed.headers.is_empty());
        assert_eq!(parsed.body, None);
        assert_eq!(parsed.timeout, None);
    }

    #[test]
    fn test_curl_options() {
        let parsed = RequestSpec::parse(
            r#"curl -X put https://api.test/items/1 -H 'Content-Type: application/json' -d '{"a":1}' -m 2.5"#,
        )
        .unwrap();
        assert_eq!(parsed.method, "PUT");
        assert_eq!(parsed.url, "https://api.test/items/1");
        assert_eq!(
            parsed.headers,
            vec![("Content-Type".to_string(), "application/json".to_string())]
        );
        assert_eq!(parsed.body.as_deref(), Some(r#"{"a":1}"#));
        assert_eq!(parsed.timeout, Some(Duration::from_millis(2500)));
    }

    #[test]
    fn test_body_implies_post() {
        let parsed = RequestSpec::parse("http://localhost:8080 --data x=1").unwrap();
        assert_eq!(parsed.method, "POST");
    }

    #[test]
    fn test_rejections() {
        for request in [
            "",
            "curl",
            "ftp://example.com",
            "https://a.test https://b.test",
            "https://a.test -H",
            "https://a.test -H nocolon",
            "https://a.test --compressed",
            "https://a.test -m soon",
        ] {
            assert!(
                matches!(RequestSpec::parse(request), Err(Error::InvalidDescriptor { .. })),
                "{request:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_header_lookup() {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "text/plain".to_string());
        let response = HttpResponse {
            url: "http://x.test/".to_string(),
            status: 204,
            headers,
            body: b"caf\xc3\xa9 \xff".to_vec(),
        };
        assert!(response.is_success());
        assert_eq!(response.text(), "caf\u{e9} \u{fffd}");
        assert_eq!(response.header("Content-Type"), Some("text/plain"));
        assert_eq!(response.header("Server"), None);
    }
}
