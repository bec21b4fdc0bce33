//! In-process HTTP mock server for client tests.
//!
//! A tiny HTTP/1.1 responder on a loopback listener: it records every
//! request and computes responses through a caller-supplied closure, in the
//! spirit of one-shot `TcpListener` mocks but able to serve a whole
//! multi-request scenario.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::{Client, Endpoints};

/// One recorded HTTP request.
#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub method: String,
    /// Path plus query string, exactly as sent.
    pub target: String,
    pub head: String,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or(&self.target)
    }

    pub fn query_has(&self, needle: &str) -> bool {
        self.target
            .split_once('?')
            .is_some_and(|(_, q)| q.split('&').any(|p| p == needle))
    }

    pub fn query_param(&self, key: &str) -> bool {
        self.target
            .split_once('?')
            .is_some_and(|(_, q)| q.split('&').any(|p| p.starts_with(&format!("{key}="))))
    }

    pub fn has_bearer(&self, token: &str) -> bool {
        self.head
            .to_ascii_lowercase()
            .contains(&format!("authorization: bearer {token}"))
    }
}

pub(crate) struct MockServer {
    pub url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
    handle: JoinHandle<()>,
}

impl MockServer {
    /// Starts a server whose responses are computed by `respond`.
    pub async fn start<F>(respond: F) -> Self
    where
        F: Fn(&Recorded) -> (u16, String) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}");
        let requests: Arc<Mutex<Vec<Recorded>>> = Arc::default();
        let log = Arc::clone(&requests);

        let handle = tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                // The client under test is strictly sequential, so each
                // connection is served inline.
                let Some(request) = read_request(&mut stream).await else {
                    continue;
                };
                let (status, body) = respond(&request);
                log.lock().unwrap().push(request);
                let resp = format!(
                    "HTTP/1.1 {status} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(resp.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        Self {
            url,
            requests,
            handle,
        }
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of recorded requests whose path starts with `prefix`.
    pub fn hits(&self, prefix: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path().starts_with(prefix))
            .count()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Reads one HTTP/1.1 request: head, then a content-length body.
async fn read_request(stream: &mut TcpStream) -> Option<Recorded> {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 4096];
    let head_end = loop {
        let n = stream.read(&mut tmp).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&tmp[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        if buf.len() > 1 << 20 {
            return None;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let mut lines = head.lines();
    let request_line = lines.next()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();
    let content_length = lines
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut tmp).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&tmp[..n]);
    }
    body.truncate(content_length);

    Some(Recorded {
        method,
        target,
        head,
        body,
    })
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub(crate) fn test_client(server: &MockServer) -> Client {
    Client::with_endpoints(
        "key-1",
        "secret-1",
        Endpoints::custom(&server.url, &server.url, &server.url),
    )
    .unwrap()
}

/// A token response valid far into the future.
pub(crate) fn token_json() -> String {
    r#"{"access_token":"tok-1",".expires":"2099-01-01T00:00:00Z"}"#.to_string()
}

pub(crate) fn file_json(id: &str, name: &str, size: u64) -> serde_json::Value {
    serde_json::json!({"Id": id, "FileName": name, "FileSize": size})
}

pub(crate) fn dir_json(
    id: &str,
    name: &str,
    share: Option<&str>,
    children: Vec<serde_json::Value>,
    files: Vec<serde_json::Value>,
) -> serde_json::Value {
    serde_json::json!({
        "DirectoryId": id,
        "DirectoryName": name,
        "CurrentSharedDirectoryId": share,
        "Directories": {"$values": children},
        "Files": {"$values": files},
    })
}
