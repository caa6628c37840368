//! Shared test support for integration tests against a local mock server

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gpuniq_core::{Client, ClientConfig, ClientConfigBuilder, Sleeper};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::{MockServer, Request, Respond, ResponseTemplate};

pub const TEST_API_KEY: &str = "gpuniq_integration_test_key";

/// Sleeper that records requested waits instead of sleeping
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Configuration pointing at the mock server's `/v1` prefix
pub fn config_for(server: &MockServer) -> ClientConfigBuilder {
    ClientConfig::builder(TEST_API_KEY).base_url(format!("{}/v1", server.uri()))
}

/// Client whose retry waits are recorded, not slept
pub fn recording_client(server: &MockServer) -> (Client, Arc<RecordingSleeper>) {
    let sleeper = Arc::new(RecordingSleeper::default());
    let config = config_for(server)
        .sleeper(sleeper.clone())
        .build()
        .unwrap();
    (Client::new(config).unwrap(), sleeper)
}

/// Wrap a payload in the platform response schema
pub fn envelope(data: Value) -> Value {
    json!({"exception": 0, "message": "OK", "data": data})
}

/// In-memory volume file that accepts sequential chunk uploads and serves
/// the assembled content back
#[derive(Clone, Default)]
pub struct VolumeFile {
    content: Arc<Mutex<Vec<u8>>>,
}

impl VolumeFile {
    pub fn content(&self) -> Vec<u8> {
        self.content.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> UploadChunk {
        UploadChunk { file: self.clone() }
    }

    pub fn downloads(&self) -> ServeFile {
        ServeFile { file: self.clone() }
    }
}

pub struct UploadChunk {
    file: VolumeFile,
}

impl Respond for UploadChunk {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let offset = request
            .url
            .query_pairs()
            .find(|(key, _)| key == "offset")
            .and_then(|(_, value)| value.parse::<usize>().ok());

        let mut content = self.file.content.lock().unwrap();
        if offset != Some(content.len()) {
            return ResponseTemplate::new(409)
                .set_body_json(json!({"detail": "unexpected offset"}));
        }
        content.extend_from_slice(&request.body);

        ResponseTemplate::new(200).set_body_json(envelope(json!({"received": content.len()})))
    }
}

pub struct ServeFile {
    file: VolumeFile,
}

impl Respond for ServeFile {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_bytes(self.file.content())
    }
}

/// Serve one connection with a hand-written HTTP response and close it.
///
/// Covers framings the mock server cannot produce, such as a body that
/// disagrees with its `Content-Length`. Returns a client for the listener.
pub async fn raw_response_client(response: &'static [u8]) -> Client {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            head.extend_from_slice(&buf[..n]);
        }
        socket.write_all(response).await.unwrap();
        let _ = socket.shutdown().await;
    });

    let config = ClientConfig::builder(TEST_API_KEY)
        .base_url(format!("http://{}/v1", addr))
        .build()
        .unwrap();
    Client::new(config).unwrap()
}
