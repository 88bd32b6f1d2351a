#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

//! The chat client against a live query service

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use common::paris_retriever;
use travel_rag::client::{CONNECTION_HINT, ChatClient, ClientError, ConnectionStatus};
use travel_rag::server::{AppState, router};

async fn spawn_server() -> (SocketAddr, tempfile::TempDir) {
    let (retriever, dir) = paris_retriever().await;
    let app = router(AppState::new(retriever));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("should bind");
    let addr = listener.local_addr().expect("should have address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server should run");
    });

    (addr, dir)
}

fn client(addr: SocketAddr) -> ChatClient {
    ChatClient::new(
        &format!("http://{addr}"),
        Duration::from_secs(2),
        Duration::from_secs(30),
    )
    .expect("address is a valid URL")
}

#[tokio::test(flavor = "multi_thread")]
async fn ask_through_live_service() {
    let (addr, _dir) = spawn_server().await;
    let client = client(addr);

    let (status, response) = tokio::task::spawn_blocking(move || {
        (client.connection_status(), client.query("capital of France"))
    })
    .await
    .expect("task should join");

    assert_eq!(status, ConnectionStatus::Connected);
    let response = response.expect("query should succeed");
    assert_eq!(response.question, "capital of France");
    assert!(response.answer.starts_with("📍 Paris"));
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_question_is_answered_with_error_text() {
    let (addr, _dir) = spawn_server().await;
    let client = client(addr);

    let response = tokio::task::spawn_blocking(move || client.query(""))
        .await
        .expect("task should join")
        .expect("request should succeed");

    assert!(response.answer.starts_with("Error: "));
}

#[test]
fn stopped_service_shows_connection_hint() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("should bind");
        listener.local_addr().expect("should have address").port()
    };
    let client = client(SocketAddr::from(([127, 0, 0, 1], port)));

    assert_eq!(client.connection_status(), ConnectionStatus::Disconnected);

    let error = client
        .query("capital of France")
        .expect_err("nothing is listening");
    assert!(matches!(error, ClientError::Connection(_)), "{error:?}");
    assert_eq!(error.user_message(), CONNECTION_HINT);
}
