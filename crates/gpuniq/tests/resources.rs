//! Volumes, LLM, settings, payments and burst surfaces

mod common;

use std::io::Write;

use common::{client_for, envelope};
use gpuniq::{
    init, BurstOrder, ChatMessage, ChatRequest, CreateVolume, FallbackGpu, PaymentSystem,
};
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_invalid_volume_name_sends_nothing() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    let err = client
        .volumes()
        .create(&CreateVolume::new("my data!"))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "VALIDATION_ERROR");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_volume() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/volumes/"))
        .and(body_json(json!({"name": "my-data", "size_limit_gb": 20.0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({"id": 3}))))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let volume = client
        .volumes()
        .create(&CreateVolume::new("my-data").size_limit_gb(20.0))
        .await
        .unwrap();
    assert_eq!(volume["id"], 3);
}

#[tokio::test]
async fn test_volume_upload_and_download() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/volumes/3/upload"))
        .and(query_param("subpath", "data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({}))))
        .expect(4)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/volumes/3/files/data/notes.txt/download"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello volume".to_vec()))
        .mount(&server)
        .await;

    let mut local = tempfile::NamedTempFile::new().unwrap();
    local.write_all(&[7u8; 4000]).unwrap();
    local.flush().unwrap();

    let client = client_for(&server);
    let volumes = client.volumes().with_chunk_size(1000);

    let mut reports = Vec::new();
    let progress = volumes
        .upload(3, local.path(), "data", |p| reports.push(p.bytes_transferred))
        .await
        .unwrap();
    assert_eq!(progress.total_bytes, 4000);
    assert_eq!(reports, vec![1000, 2000, 3000, 4000]);

    let bytes = volumes.download(3, "data/notes.txt").await.unwrap();
    assert_eq!(bytes, b"hello volume");
}

#[tokio::test]
async fn test_chat_returns_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/llm/chat/completions"))
        .and(body_partial_json(json!({
            "model": "openai/gpt-oss-120b",
            "messages": [{"role": "user", "content": "Hello!"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(
            json!({"content": "Hi there", "model": "openai/gpt-oss-120b", "usage": {"total_tokens": 9}}),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let reply = client
        .llm()
        .chat("openai/gpt-oss-120b", "Hello!")
        .await
        .unwrap();
    assert_eq!(reply, "Hi there");
}

#[tokio::test]
async fn test_chat_completion_with_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/llm/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({"content": "4"}))))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let request = ChatRequest::new(vec![
        ChatMessage::system("Answer with a number"),
        ChatMessage::user("2+2?"),
    ])
    .max_tokens(5);
    let completion = client.llm().chat_completion(&request).await.unwrap();

    assert_eq!(completion.content, "4");
    assert!(completion.usage.is_none());
}

#[tokio::test]
async fn test_legacy_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/llm/chat/completions"))
        .and(body_partial_json(json!({"messages": [{"role": "user", "content": "ping"}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({"content": "pong"}))))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert_eq!(client.request("openai/gpt-oss-120b", "ping").await.unwrap(), "pong");
}

#[test]
fn test_init_builds_default_client() {
    let client = init(common::TEST_API_KEY).unwrap();
    assert_eq!(client.client().credentials().base_url(), gpuniq::DEFAULT_BASE_URL);
}

#[tokio::test]
async fn test_toggle_ssh_key_uses_query() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/v1/settings/ssh-keys/4/toggle"))
        .and(query_param("is_active", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({"is_active": false}))))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client.settings().toggle_ssh_key(4, false).await.unwrap();
    assert_eq!(result["is_active"], false);
}

#[tokio::test]
async fn test_deposit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/payments/deposit"))
        .and(body_json(json!({"amount": 500, "payment_system": "stripe"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(
            json!({"confirmation_url": "https://pay.example/1", "payment_id": "p1"}),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let payment = client
        .payments()
        .deposit(500, PaymentSystem::Stripe)
        .await
        .unwrap();
    assert_eq!(payment["payment_id"], "p1");

    let err = client
        .payments()
        .deposit(0, PaymentSystem::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_burst_estimate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/burst/estimate"))
        .and(body_json(json!({
            "docker_image": "pytorch/pytorch:latest",
            "primary_gpu": "RTX_4090",
            "requested_quantity": 16,
            "extra_gpus": [{"gpu_name": "RTX_3090", "max_price": 0.4}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({"hourly": 6.4}))))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let order = BurstOrder::new("pytorch/pytorch:latest", "RTX_4090", 16)
        .fallback(FallbackGpu::new("RTX_3090").max_price(0.4));
    let estimate = client.burst().estimate(&order).await.unwrap();
    assert_eq!(estimate["hourly"], 6.4);
}
