//! Performs one HTTP request and writes the response as a codec payload.
//!
//! Invoked by curl handles as `fetch-worker '<descriptor>'`. On success
//! stdout carries exactly one payload; on any failure, including a
//! termination signal, the reason goes to stderr and the exit code is
//! non-zero.

use anyhow::{Context, Result, anyhow, bail};
use async_io::Timer;
use futures_lite::future;
use process_future::codec;
use process_future::http::{HttpResponse, RequestSpec};
use reqwest::blocking::Client;
use reqwest::header::{HeaderName, HeaderValue};
use std::collections::BTreeMap;
use std::io::Write;
use std::time::Duration;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

const SHUTDOWN_POLL: Duration = Duration::from_millis(20);

fn main() -> Result<()> {
    // stderr is the failure channel: stay quiet unless asked otherwise.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error")),
        )
        .with_target(false)
        .init();

    let descriptor = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    let wanted = RequestSpec::parse(&descriptor)
        .with_context(|| format!("invalid request '{}'", descriptor))?;

    #[cfg(unix)]
    let shutdown = process_future::shutdown::ShutdownSignal::termination()
        .context("failed to subscribe to termination signals")?;

    let (tx, rx) = async_channel::bounded(1);
    std::thread::Builder::new()
        .name("fetch".to_string())
        .spawn(move || {
            let _ = tx.send_blocking(fetch(wanted));
        })
        .context("failed to start request thread")?;

    #[cfg(unix)]
    let shutdown_requested = || shutdown.is_triggered();
    #[cfg(not(unix))]
    let shutdown_requested = || false;

    let cancelled = async {
        while !shutdown_requested() {
            Timer::after(SHUTDOWN_POLL).await;
        }
        None
    };
    let finished = future::block_on(future::or(async { Some(rx.recv().await) }, cancelled));

    let response = match finished {
        Some(Ok(outcome)) => outcome?,
        Some(Err(_)) => bail!("request thread exited without a response"),
        None => {
            error!("Termination requested, abandoning request");
            bail!("request cancelled by termination signal");
        }
    };

    let payload = codec::encode(&response)?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&payload)?;
    stdout.flush()?;
    Ok(())
}

fn fetch(wanted: RequestSpec) -> Result<HttpResponse> {
    let mut builder = Client::builder();
    if let Some(timeout) = wanted.timeout {
        builder = builder.timeout(timeout);
    }
    let client = builder.build().context("failed to build HTTP client")?;

    let method = reqwest::Method::from_bytes(wanted.method.as_bytes())
        .map_err(|_| anyhow!("invalid method '{}'", wanted.method))?;
    let mut request = client.request(method, &wanted.url);
    for (name, value) in &wanted.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("invalid header name '{}'", name))?;
        let value = HeaderValue::from_str(value)
            .with_context(|| format!("invalid value for header '{}'", name))?;
        request = request.header(name, value);
    }
    if let Some(body) = wanted.body {
        request = request.body(body);
    }

    debug!(method = %wanted.method, url = %wanted.url, "Sending request");
    let response = request
        .send()
        .with_context(|| format!("request to {} failed", wanted.url))?;

    let url = response.url().to_string();
    let status = response.status().as_u16();
    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in response.headers() {
        let value = String::from_utf8_lossy(value.as_bytes());
        headers
            .entry(name.as_str().to_string())
            .and_modify(|joined| {
                joined.push_str(", ");
                joined.push_str(&value);
            })
            .or_insert_with(|| value.to_string());
    }
    let body = response.bytes().context("failed to read response body")?;
    debug!(status, bytes = body.len(), "Received response");

    Ok(HttpResponse {
        url,
        status,
        headers,
        body: body.to_vec(),
    })
}
