//! Shared helpers for functional tests

use magic_quill_client::config::BackendConfig;
use magic_quill_client::{DataUri, HttpBackend};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::MockServer;

/// Minimal PNG header; enough for dimension sniffing
pub fn png_header(width: u32, height: u32) -> Vec<u8> {
    let mut data = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    data.extend_from_slice(&13u32.to_be_bytes());
    data.extend_from_slice(b"IHDR");
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&[8, 6, 0, 0, 0]);
    data
}

pub fn png_uri(width: u32, height: u32) -> DataUri {
    DataUri::from_bytes(&png_header(width, height))
}

pub fn backend_config(server: &MockServer) -> BackendConfig {
    BackendConfig {
        name: "mock-quill".to_string(),
        base_url: server.uri(),
        timeout_ms: 5000,
        ..Default::default()
    }
}

pub fn backend(server: &MockServer) -> HttpBackend {
    HttpBackend::new(&backend_config(server)).unwrap()
}

/// Raw server that sends headers and part of the body, then stalls.
/// Returns its base URL.
pub async fn stalled_body_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = vec![0u8; 64 * 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 100\r\n\r\n\"a cat")
                    .await;
                let _ = socket.flush().await;
                tokio::time::sleep(Duration::from_secs(30)).await;
            });
        }
    });

    format!("http://{}", addr)
}
