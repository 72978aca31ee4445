/// HTTP clients for the two external services
///
/// - `processing.rs` - background removal, enhancement, filters, batch
/// - `relay.rs` - image-to-3D generation through the relay server
/// - `operation.rs` - operation names and their multipart fields
/// - `batch.rs` - batch report payloads
///
/// Both clients share the response handling below: a non-2xx status becomes
/// `StudioError::Server` carrying whatever the server said about it.

pub mod batch;
pub mod operation;
pub mod processing;
pub mod relay;

pub use batch::{BatchItem, BatchOutcome, BatchReport};
pub use operation::{Operation, OperationKind};
pub use processing::{BackendStatus, ProcessingClient};
pub use relay::{GenerationStatus, ModelStatus, ModelSummary, RelayClient};

use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

use crate::error::{StudioError, StudioResult};

const USER_AGENT: &str = concat!("stellarion-studio/", env!("CARGO_PKG_VERSION"));

pub(crate) fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            warn!("Falling back to default HTTP client: {}", e);
            reqwest::Client::new()
        })
}

/// `base` + `path` without doubling the slash
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Pass 2xx responses through; turn anything else into a server error
pub(crate) async fn ensure_success(response: Response) -> StudioResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.bytes().await.unwrap_or_default();
    let message = server_message(status, &body);
    warn!("Server responded {}: {}", status, message);
    Err(StudioError::Server {
        status: status.as_u16(),
        message,
    })
}

/// Best human-readable error text from a failed response body.
///
/// The processing backend answers `{"detail": ...}`, the relay answers
/// `{"error": ...}`; anything else is shown as plain text. An empty body
/// falls back to the status reason.
pub fn server_message(status: StatusCode, body: &[u8]) -> String {
    if let Ok(json) = serde_json::from_slice::<Value>(body) {
        for key in ["detail", "error", "message"] {
            match json.get(key) {
                Some(Value::String(text)) => return text.clone(),
                Some(Value::Null) | None => continue,
                Some(other) => return other.to_string(),
            }
        }
    }

    let text = String::from_utf8_lossy(body).trim().to_string();
    if !text.is_empty() {
        return text;
    }

    status
        .canonical_reason()
        .unwrap_or("Unknown error")
        .to_string()
}

/// Split a `data:<mime>;base64,<payload>` URL into MIME type and bytes
pub fn decode_data_url(url: &str) -> StudioResult<(String, Vec<u8>)> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| StudioError::decode("not a data URL"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| StudioError::decode("data URL has no payload"))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| StudioError::decode("data URL is not base64 encoded"))?;

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| StudioError::decode(format!("invalid base64: {}", e)))?;

    Ok((mime.to_string(), bytes))
}

/// Inverse of `decode_data_url`
pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

#[cfg(test)]
pub(crate) mod test_server {
    //! One-shot HTTP responder on a loopback port.
    //!
    //! Reads a full request (Content-Length or chunked), answers with a canned
    //! response and counts connections, so tests can assert that validation
    //! failures never reach the network.

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    pub struct TestServer {
        pub url: String,
        hits: Arc<AtomicUsize>,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl TestServer {
        pub fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }

        /// Raw requests (head and body, lossy UTF-8) in arrival order
        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    /// Serve `status` with `content_type` and `body` to every connection
    pub async fn serve(status: u16, content_type: &'static str, body: Vec<u8>) -> TestServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let (task_hits, task_requests) = (hits.clone(), requests.clone());
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                task_hits.fetch_add(1, Ordering::SeqCst);
                let raw = read_request(&mut stream).await;
                task_requests
                    .lock()
                    .unwrap()
                    .push(String::from_utf8_lossy(&raw).to_string());

                let head = format!(
                    "HTTP/1.1 {} Test\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    status,
                    content_type,
                    body.len()
                );
                let _ = stream.write_all(head.as_bytes()).await;
                let _ = stream.write_all(&body).await;
                let _ = stream.shutdown().await;
            }
        });

        TestServer { url, hits, requests }
    }

    async fn read_request(stream: &mut tokio::net::TcpStream) -> Vec<u8> {
        let mut data = Vec::new();
        let mut buf = [0u8; 8192];

        loop {
            if let Some(head_end) = find(&data, b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&data[..head_end]).to_ascii_lowercase();
                let body = &data[head_end + 4..];
                if let Some(len) = content_length(&head) {
                    if body.len() >= len {
                        break;
                    }
                } else if head.contains("transfer-encoding: chunked") {
                    if find(body, b"0\r\n\r\n").is_some() {
                        break;
                    }
                } else {
                    break;
                }
            }

            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => data.extend_from_slice(&buf[..n]),
            }
        }

        data
    }

    fn content_length(head: &str) -> Option<usize> {
        head.lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse().ok())
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }
}
