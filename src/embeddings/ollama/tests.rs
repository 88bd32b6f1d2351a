use super::*;
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Answers `/api/embed` with one vector per input, derived from the text length
struct EchoEmbeddings;

impl Respond for EchoEmbeddings {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or_default();
        let embeddings: Vec<Vec<f32>> = body["input"]
            .as_array()
            .map(|inputs| {
                inputs
                    .iter()
                    .map(|input| {
                        let len = input.as_str().map_or(0, str::len) as f32;
                        vec![len, 1.0, 0.0]
                    })
                    .collect()
            })
            .unwrap_or_default();

        ResponseTemplate::new(200).set_body_json(json!({ "embeddings": embeddings }))
    }
}

fn client_for(server: &MockServer) -> OllamaClient {
    let uri = Url::parse(&server.uri()).expect("mock server uri is valid");
    let config = OllamaConfig {
        host: uri.host_str().unwrap_or("127.0.0.1").to_string(),
        port: uri.port().unwrap_or(80),
        model: "test-model".to_string(),
        ..OllamaConfig::default()
    };
    OllamaClient::new(&config)
        .expect("Failed to create client")
        .with_retry_attempts(1)
}

#[test]
fn client_configuration() {
    let config = OllamaConfig {
        protocol: "http".to_string(),
        host: "test-host".to_string(),
        port: 1234,
        model: "test-model".to_string(),
        ..OllamaConfig::default()
    };
    let client = OllamaClient::new(&config).expect("Failed to create client");

    assert_eq!(client.model, "test-model");
    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
    assert_eq!(client.retry_attempts, DEFAULT_RETRY_ATTEMPTS);
    assert_eq!(client.model_name(), "test-model");
}

#[test]
fn client_builder_methods() {
    let client = OllamaClient::new(&OllamaConfig::default())
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(5);

    assert_eq!(client.retry_attempts, 5);

    let client = client.with_retry_attempts(0);
    assert_eq!(client.retry_attempts, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn embed_documents_preserves_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({ "model": "test-model" })))
        .respond_with(EchoEmbeddings)
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let texts = vec!["a".to_string(), "abc".to_string(), "ab".to_string()];

    let embeddings = client
        .embed_documents(&texts)
        .await
        .expect("embedding should succeed");

    let lengths: Vec<f32> = embeddings.iter().map(|e| e[0]).collect();
    assert_eq!(lengths, vec![1.0, 3.0, 2.0]);
}

#[tokio::test(flavor = "multi_thread")]
async fn embed_documents_sends_one_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(EchoEmbeddings)
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let texts: Vec<String> = (0..5).map(|i| "x".repeat(i + 1)).collect();

    let embeddings = client
        .embed_documents(&texts)
        .await
        .expect("embedding should succeed");

    assert_eq!(embeddings.len(), 5);
    assert_eq!(embeddings[4][0], 5.0);
}

#[tokio::test(flavor = "multi_thread")]
async fn embed_documents_empty_input_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(EchoEmbeddings)
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let embeddings = client
        .embed_documents(&[])
        .await
        .expect("empty input should succeed");

    assert!(embeddings.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn embed_query_returns_single_vector() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({ "input": ["capital of France"] })))
        .respond_with(EchoEmbeddings)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let embedding = client
        .embed_query("capital of France")
        .await
        .expect("query embedding should succeed");

    assert_eq!(embedding, vec![17.0, 1.0, 0.0]);
}

#[tokio::test(flavor = "multi_thread")]
async fn response_count_mismatch_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[0.1, 0.2]] })),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client
        .embed_documents(&["one".to_string(), "two".to_string()])
        .await;

    let message = format!("{:#}", result.expect_err("mismatch should fail"));
    assert!(message.contains("Mismatch"), "unexpected error: {message}");
}

#[tokio::test(flavor = "multi_thread")]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).with_retry_attempts(3);
    let result = client.embed_query("hello").await;

    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server).with_retry_attempts(2);
    let result = client.embed_query("hello").await;

    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn validate_model_accepts_latest_tag() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                { "name": "test-model:latest", "size": 45_000_000u64, "digest": "abc" },
                { "name": "llama3:8b" }
            ]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let other = client.clone();

    let result = tokio::task::spawn_blocking(move || {
        let models = client.list_models()?;
        client.health_check()?;
        Ok::<_, anyhow::Error>(models)
    })
    .await
    .expect("task should join");

    let models = result.expect("health check should pass");
    assert_eq!(models.len(), 2);
    assert_eq!(models[0].size, Some(45_000_000));

    let missing = OllamaClient {
        model: "nomic-embed-text".to_string(),
        ..other
    };
    let result = tokio::task::spawn_blocking(move || missing.validate_model())
        .await
        .expect("task should join");
    assert!(result.is_err());
}
