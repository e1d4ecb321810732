//! Routing descriptors and running requests through the fetch worker

#![cfg(unix)]

mod common;

use common::write_script;
use process_future::handlers::curl::curl_command;
use process_future::{
    BackgroundProcess, DecodeHttpResponse, Error, ProcessHandle, ProcessOutput, ProcessType,
    Settings, SpawnOptions,
};
use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpListener};
use std::path::PathBuf;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

fn fetch_worker() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_fetch-worker"))
}

/// Serve one connection: read the request head, then reply with `response`
/// unless it is `None`, in which case the connection is held open.
fn serve_once(response: Option<&'static [u8]>) -> (SocketAddr, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut head = String::new();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                break;
            }
            head.push_str(&line);
        }
        match response {
            Some(response) => {
                stream.write_all(response).unwrap();
                stream.shutdown(Shutdown::Write).unwrap();
                // Consume any request body so closing does not reset the connection.
                let _ = std::io::copy(&mut reader, &mut std::io::sink());
            }
            None => std::thread::sleep(Duration::from_secs(10)),
        }
        head
    });
    (addr, server)
}

/// A worker invocation isolated from proxy and log settings of the test run
fn curl_handle(descriptor: &str) -> ProcessHandle<DecodeHttpResponse> {
    let mut command = curl_command(descriptor, &fetch_worker());
    command
        .env("NO_PROXY", "127.0.0.1,localhost")
        .env("no_proxy", "127.0.0.1,localhost")
        .env("RUST_LOG", "error");
    ProcessHandle::spawn(command, DecodeHttpResponse, SpawnOptions::default()).unwrap()
}

#[test]
fn test_unrecognized_descriptor_is_unsupported() {
    let settings = Settings::default();
    for descriptor in ["ls -la", "ftp://example.com/file", "README.md"] {
        assert!(matches!(
            BackgroundProcess::spawn(descriptor, &settings),
            Err(Error::UnsupportedProcess { .. })
        ));
    }
}

#[smol_potat::test]
async fn test_script_descriptor_runs_through_interpreter() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("report.sh");
    std::fs::write(&script, "echo \"report for $1\"\n").unwrap();

    let mut process =
        BackgroundProcess::spawn(&format!("{} monday", script.display()), &Settings::default())
            .unwrap();
    assert_eq!(process.process_type(), ProcessType::Script);
    assert_eq!(
        process.wait().await.unwrap(),
        ProcessOutput::Raw(b"report for monday\n")
    );
    assert!(matches!(process.result(), Some(ProcessOutput::Raw(_))));
}

#[smol_potat::test]
async fn test_garbled_worker_output_is_interpretation_error() {
    let dir = tempfile::tempdir().unwrap();
    let worker = write_script(&dir, "fake-worker", "#!/bin/sh\nprintf 'not a payload'\n");
    let settings = Settings {
        fetch_worker: Some(worker),
        ..Settings::default()
    };

    let mut process = BackgroundProcess::spawn("https://example.invalid/", &settings).unwrap();
    assert_eq!(process.process_type(), ProcessType::Url);
    match process.wait().await {
        Err(Error::OutputInterpretation { reason }) => {
            assert!(reason.contains("malformed payload"), "{reason}")
        }
        Err(e) => panic!("unexpected error: {e}"),
        Ok(output) => panic!("unexpected output: {output:?}"),
    }
    assert!(process.result().is_none());
}

#[smol_potat::test]
async fn test_worker_fetches_response() {
    let (addr, server) = serve_once(Some(
        &b"HTTP/1.1 201 Created\r\nContent-Type: text/plain\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello"[..],
    ));

    let mut handle = curl_handle(&format!(
        "curl -X POST http://{}/items -H 'X-Trace: abc' -d name=x",
        addr
    ));
    let response = handle.wait().await.unwrap();

    assert_eq!(response.status, 201);
    assert_eq!(response.body, b"hello");
    assert_eq!(response.text(), "hello");
    assert_eq!(response.header("content-type"), Some("text/plain"));
    assert_eq!(response.url, format!("http://{}/items", addr));

    let head = server.join().unwrap();
    assert!(head.starts_with("POST /items HTTP/1.1"), "{head}");
    assert!(head.to_ascii_lowercase().contains("x-trace: abc"), "{head}");
}

#[smol_potat::test]
async fn test_worker_keeps_binary_body_intact() {
    let (addr, server) = serve_once(Some(
        &b"HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: 6\r\nConnection: close\r\n\r\n\xff\xfe\x00\x80zz"[..],
    ));

    let mut handle = curl_handle(&format!("http://{}/blob", addr));
    let response = handle.wait().await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"\xff\xfe\x00\x80zz");
    server.join().unwrap();
}

#[smol_potat::test]
async fn test_worker_failure_is_reported_on_stderr() {
    // Nothing listens on a port taken from a dropped listener.
    let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
    let mut handle = curl_handle(&format!("http://{}/", addr));

    match handle.wait().await {
        Err(Error::ProcessExecution { stderr, status }) => {
            assert!(!stderr.is_empty());
            assert!(!status.success());
        }
        other => panic!("expected ProcessExecution, got {:?}", other.map(|r| r.status)),
    }
}

#[smol_potat::test]
async fn test_worker_honours_graceful_stop() {
    let (addr, _server) = serve_once(None);
    let mut handle = curl_handle(&format!("http://{}/slow", addr));
    // Let the worker install its signal handlers.
    smol::Timer::after(Duration::from_millis(300)).await;
    assert!(handle.is_running());

    let started = Instant::now();
    let forced = handle.stop(false, Duration::from_secs(3)).await.unwrap();
    assert!(!forced);
    assert!(started.elapsed() < Duration::from_secs(2));

    let stderr = String::from_utf8_lossy(handle.error_output().unwrap()).into_owned();
    assert!(stderr.contains("cancelled"), "{stderr}");
    assert!(matches!(handle.wait().await, Err(Error::ProcessExecution { .. })));
}
