//! HTTP client behaviour against a canned local authority
//!
//! Covers:
//! 1. Non-success statuses surface as fetch errors
//! 2. Downloads without a version header are rejected
//! 3. The cached version is announced on version checks
//! 4. Progress is reported for every received chunk
//! 5. A manager built from configuration syncs and persists over HTTP

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use trust_sync::*;

/// Serves every connection with the segments `respond` returns for its
/// request head, pausing between segments so they arrive separately
async fn authority<F>(respond: F) -> String
where
    F: Fn(&str) -> Vec<Vec<u8>> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let respond = Arc::new(respond);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let respond = Arc::clone(&respond);
            tokio::spawn(async move {
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }

                let head = String::from_utf8_lossy(&head).to_ascii_lowercase();
                for segment in respond(&head) {
                    if socket.write_all(&segment).await.is_err() {
                        return;
                    }
                    let _ = socket.flush().await;
                    tokio::time::sleep(Duration::from_millis(15)).await;
                }
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{}", addr)
}

fn request_path(head: &str) -> &str {
    head.split_whitespace().nth(1).unwrap_or("/")
}

fn status_line(status: &str, headers: &[(&str, &str)]) -> String {
    let mut line = format!("HTTP/1.1 {}\r\nconnection: close\r\n", status);
    for (name, value) in headers {
        line.push_str(&format!("{}: {}\r\n", name, value));
    }
    line
}

fn respond(status: &str, headers: &[(&str, &str)], body: &[u8]) -> Vec<Vec<u8>> {
    let mut bytes = status_line(status, headers).into_bytes();
    bytes.extend_from_slice(format!("content-length: {}\r\n\r\n", body.len()).as_bytes());
    bytes.extend_from_slice(body);
    vec![bytes]
}

fn respond_chunked(headers: &[(&str, &str)], chunks: &[&[u8]]) -> Vec<Vec<u8>> {
    let mut head = status_line("200 OK", headers);
    head.push_str("transfer-encoding: chunked\r\n\r\n");

    let mut segments = vec![head.into_bytes()];
    for chunk in chunks {
        let mut segment = format!("{:x}\r\n", chunk.len()).into_bytes();
        segment.extend_from_slice(chunk);
        segment.extend_from_slice(b"\r\n");
        segments.push(segment);
    }
    segments.push(b"0\r\n\r\n".to_vec());
    segments
}

#[derive(Default)]
struct RecordingProgress {
    events: Mutex<Vec<DownloadProgress>>,
}

impl ProgressObserver for RecordingProgress {
    fn on_progress(&self, progress: &DownloadProgress) {
        self.events.lock().push(progress.clone());
    }
}

fn client(base_url: &str) -> HttpTrustDataClient {
    HttpTrustDataClient::new(
        base_url,
        "revocation-list",
        RevocationList::KIND,
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn test_non_success_status_is_fetch_error() {
    let base = authority(|_| respond("503 Service Unavailable", &[], b"maintenance")).await;
    let client = client(&base);

    match client.check_version(None).await {
        Err(TrustError::Fetch(message)) => assert!(message.contains("503"), "{}", message),
        other => panic!("expected fetch error, got {:?}", other),
    }
    assert!(matches!(
        client.download(&NoopProgress).await,
        Err(TrustError::Fetch(_))
    ));
}

#[tokio::test]
async fn test_download_without_version_header_is_rejected() {
    let base = authority(|_| respond("200 OK", &[], b"[]")).await;

    match client(&base).download(&NoopProgress).await {
        Err(TrustError::Fetch(message)) => assert!(message.contains("x-trust-version")),
        other => panic!("expected fetch error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_version_check_sends_current_version() {
    let base = authority(|head| {
        let body = if head.contains("x-trust-current-version: v1\r\n") {
            br#"{"version":"v2","newerAvailable":true}"#.to_vec()
        } else {
            br#"{"version":"v2"}"#.to_vec()
        };
        respond("200 OK", &[("content-type", "application/json")], &body)
    })
    .await;
    let client = client(&base);

    let check = client.check_version(Some("v1")).await.unwrap();
    assert_eq!(check.version, "v2");
    assert!(check.newer_available);
    assert!(!client.check_version(None).await.unwrap().newer_available);
}

#[tokio::test]
async fn test_progress_reported_per_chunk() {
    let base = authority(|_| {
        respond_chunked(
            &[("x-trust-version", "v3")],
            &[
                "[\"aa\",".as_bytes(),
                "\"bbbb\",".as_bytes(),
                "\"cccccc\"]".as_bytes(),
            ],
        )
    })
    .await;
    let progress = RecordingProgress::default();

    let downloaded = client(&base).download(&progress).await.unwrap();
    assert_eq!(downloaded.version, "v3");
    assert_eq!(downloaded.payload, b"[\"aa\",\"bbbb\",\"cccccc\"]".to_vec());

    let events = progress.events.lock();
    let received: Vec<u64> = events.iter().map(|e| e.received_bytes).collect();
    assert_eq!(received, vec![6, 13, 22]);
    assert!(events.iter().all(|e| e.material == "revocation-list"));
    assert!(events.iter().all(|e| e.total_bytes.is_none()));
}

#[tokio::test]
async fn test_manager_from_config_syncs_over_http() {
    let payload = serde_json::to_vec(&vec![hash_identifier("URN:UVCI:01:DE:A")]).unwrap();
    let (first, rest) = payload.split_at(payload.len() / 2);
    let (first, rest) = (first.to_vec(), rest.to_vec());

    let base = authority(move |head| match request_path(head) {
        "/revocation-list/version" => respond("200 OK", &[], br#"{"version":"v1"}"#),
        "/revocation-list" => {
            respond_chunked(&[("x-trust-version", "v1")], &[first.as_slice(), rest.as_slice()])
        }
        _ => respond("404 Not Found", &[], b""),
    })
    .await;

    let dir = tempfile::TempDir::new().unwrap();
    let config = TrustSyncConfig {
        server_url: base,
        cache_dir: dir.path().to_path_buf(),
        request_timeout: Duration::from_secs(5),
        ..TrustSyncConfig::default()
    };
    let revocations = config.revocation_manager().unwrap();

    assert!(revocations.is_listed("URN:UVCI:01:DE:A").await.unwrap());
    assert!(!revocations.is_listed("URN:UVCI:01:DE:B").await.unwrap());

    let stored = config.file_store(RevocationList::KIND).load().await.unwrap().unwrap();
    assert_eq!(stored.version, "v1");
    assert_eq!(stored.payload, payload);
}
