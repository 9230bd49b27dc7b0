//! Newline-delimited JSON front end for the pipeline.
//!
//! Each request line is `{ "code": "...", "id": ... }`; each response line
//! is the pipeline response with the request `id` echoed back. Requests on
//! one connection are answered in order. [`Service::handle`] serves a
//! blocking reader/writer pair (stdio); [`serve_tcp`] accepts connections on
//! the tokio runtime and runs every submission on a blocking worker thread.
//!
//! Request lines longer than [`MAX_REQUEST_BYTES`] are discarded up to their
//! newline and answered with an invalid-request failure. At most one blocking
//! worker per available core runs at a time; further submissions wait.

use crate::pipeline::{Pipeline, PipelineError, PipelineResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{self, BufRead, Read, Write};
use std::sync::Arc;
use std::thread;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

/// Longest request line accepted, newline excluded.
pub const MAX_REQUEST_BYTES: usize = 1 << 20;

/// Errors raised while serving connections.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Reading or writing a connection failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A blocking worker died before answering.
    #[error("Worker failed: {0}")]
    Worker(String),

    /// A response could not be encoded.
    #[error("Encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct RequestEnvelope {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Serialize)]
struct ResponseEnvelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Value>,
    #[serde(flatten)]
    response: PipelineResponse,
}

/// Shared request handler; cheap to clone across connections.
#[derive(Debug, Clone)]
pub struct Service {
    pipeline: Arc<Pipeline>,
    workers: Arc<Semaphore>,
}

/// One framed request line.
enum Line {
    Request(String),
    Oversized,
}

impl Line {
    /// Frame the bytes read by a capped `read_until`. The flag is set when the
    /// rest of an oversized line is still unread.
    fn frame(buf: &mut Vec<u8>) -> (Self, bool) {
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        } else if buf.len() > MAX_REQUEST_BYTES {
            return (Line::Oversized, true);
        }
        if buf.len() > MAX_REQUEST_BYTES {
            return (Line::Oversized, false);
        }
        (Line::Request(String::from_utf8_lossy(buf).into_owned()), false)
    }
}

fn oversized() -> PipelineError {
    PipelineError::InvalidRequest(format!(
        "request line exceeds {MAX_REQUEST_BYTES} bytes"
    ))
}

fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<Line>> {
    buf.clear();
    let read = reader
        .by_ref()
        .take(MAX_REQUEST_BYTES as u64 + 2)
        .read_until(b'\n', buf)?;
    if read == 0 {
        return Ok(None);
    }
    let (line, truncated) = Line::frame(buf);
    if truncated {
        loop {
            let available = reader.fill_buf()?;
            if available.is_empty() {
                break;
            }
            let (done, used) = match available.iter().position(|&byte| byte == b'\n') {
                Some(at) => (true, at + 1),
                None => (false, available.len()),
            };
            reader.consume(used);
            if done {
                break;
            }
        }
    }
    Ok(Some(line))
}

async fn read_line_async<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> io::Result<Option<Line>> {
    buf.clear();
    let read = (&mut *reader)
        .take(MAX_REQUEST_BYTES as u64 + 2)
        .read_until(b'\n', buf)
        .await?;
    if read == 0 {
        return Ok(None);
    }
    let (line, truncated) = Line::frame(buf);
    if truncated {
        loop {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                break;
            }
            let (done, used) = match available.iter().position(|&byte| byte == b'\n') {
                Some(at) => (true, at + 1),
                None => (false, available.len()),
            };
            reader.consume(used);
            if done {
                break;
            }
        }
    }
    Ok(Some(line))
}

impl Service {
    /// Serve requests with `pipeline`.
    pub fn new(pipeline: Pipeline) -> Self {
        let cores = thread::available_parallelism().map_or(1, |cores| cores.get());
        Self {
            pipeline: Arc::new(pipeline),
            workers: Arc::new(Semaphore::new(cores)),
        }
    }

    /// Answer every request line from `reader` on `writer`, in order.
    pub fn handle<R: BufRead, W: Write>(&self, mut reader: R, mut writer: W) -> io::Result<()> {
        let mut buf = Vec::new();
        while let Some(line) = read_line(&mut reader, &mut buf)? {
            let encoded = match line {
                Line::Request(line) if line.trim().is_empty() => continue,
                Line::Request(line) => self.respond(&line),
                Line::Oversized => self.reject(oversized()),
            }
            .map_err(io::Error::other)?;
            writer.write_all(encoded.as_bytes())?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        Ok(())
    }

    /// Encoded response line (without the newline) for one request line.
    pub fn respond(&self, line: &str) -> Result<String, serde_json::Error> {
        let envelope = match serde_json::from_str::<RequestEnvelope>(line) {
            Ok(request) => {
                let response = match request.code.as_deref() {
                    None | Some("") => PipelineResponse::failed(&PipelineError::Usage),
                    Some(code) => self.pipeline.submit(code),
                };
                ResponseEnvelope {
                    id: request.id,
                    response,
                }
            }
            Err(err) => {
                tracing::debug!(error = %err, "undecodable request");
                ResponseEnvelope {
                    id: None,
                    response: PipelineResponse::failed(&PipelineError::InvalidRequest(err.to_string())),
                }
            }
        };
        serde_json::to_string(&envelope)
    }

    fn reject(&self, err: PipelineError) -> Result<String, serde_json::Error> {
        tracing::debug!(error = %err, "rejected request");
        serde_json::to_string(&ResponseEnvelope {
            id: None,
            response: PipelineResponse::failed(&err),
        })
    }
}

/// Accept connections on `listener` until the task is dropped.
pub async fn serve_tcp(service: Service, listener: TcpListener) -> Result<(), ServiceError> {
    let local = listener.local_addr()?;
    tracing::info!(address = %local, "listening");
    loop {
        let (stream, peer) = listener.accept().await?;
        let service = service.clone();
        tokio::spawn(async move {
            tracing::debug!(peer = %peer, "connection opened");
            if let Err(err) = serve_connection(service, stream).await {
                tracing::warn!(peer = %peer, error = %err, "connection failed");
            }
            tracing::debug!(peer = %peer, "connection closed");
        });
    }
}

async fn serve_connection(service: Service, stream: TcpStream) -> Result<(), ServiceError> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    while let Some(line) = read_line_async(&mut reader, &mut buf).await? {
        let line = match line {
            Line::Request(line) if line.trim().is_empty() => continue,
            Line::Request(line) => line,
            Line::Oversized => {
                let encoded = service.reject(oversized())?;
                writer.write_all(encoded.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
                continue;
            }
        };
        let permit = Arc::clone(&service.workers)
            .acquire_owned()
            .await
            .map_err(|err| ServiceError::Worker(err.to_string()))?;
        let worker = service.clone();
        let encoded = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            worker.respond(&line)
        })
        .await
        .map_err(|err| ServiceError::Worker(err.to_string()))??;
        writer.write_all(encoded.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn respond(line: &str) -> Value {
        let service = Service::new(Pipeline::default());
        serde_json::from_str(&service.respond(line).unwrap()).unwrap()
    }

    #[test]
    fn id_is_echoed() {
        let json = respond(r#"{"id": 7, "code": "print('hi')"}"#);
        assert_eq!(json["id"], 7);
        assert_eq!(json["success"], true);
        assert_eq!(json["result"]["logs"][0], "hi");
    }

    #[test]
    fn missing_code_is_a_usage_error() {
        let json = respond(r#"{"id": "a"}"#);
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "No code provided");
    }

    #[test]
    fn undecodable_lines_are_reported() {
        let json = respond("not json");
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Invalid request");
        assert!(json["error"].is_string());
        assert!(json.get("id").is_none());
    }
}
