use std::time::Duration;

use integration_tests::*;
use serde_json::json;

#[tokio::test]
async fn non_success_status_passes_through_without_retry() {
    let pki = TestPki::new();

    let upstream = MockUpstream::builder()
        .status(503)
        .body(r#"{"errors":["maintenance"]}"#)
        .spawn(&pki.upstream, &pki.client_root)
        .await;

    let server = TestServer::builder()
        .pem_credentials(&pki)
        .live_url(upstream.url("/send"))
        .build()
        .await;

    let response = server.client.forward(json!({ "a": 1 })).await;

    assert_eq!(response.status(), 503);
    assert_eq!(response.text().await.unwrap(), r#"{"errors":["maintenance"]}"#);
    assert_eq!(upstream.request_count(), 1);
}

#[tokio::test]
async fn client_error_status_passes_through() {
    let pki = TestPki::new();

    let upstream = MockUpstream::builder()
        .status(422)
        .content_type(Some("text/plain"))
        .body("listing reference missing")
        .spawn(&pki.upstream, &pki.client_root)
        .await;

    let server = TestServer::builder()
        .pem_credentials(&pki)
        .live_url(upstream.url("/send"))
        .build()
        .await;

    let response = server.client.forward(json!({ "a": 1 })).await;

    assert_eq!(response.status(), 422);
    assert_eq!(response.headers()["content-type"], "text/plain");
    assert_eq!(response.text().await.unwrap(), "listing reference missing");
}

#[tokio::test]
async fn unreachable_upstream() {
    let pki = TestPki::new();

    // Reserve a port, then release it so nothing listens there.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let server = TestServer::builder()
        .pem_credentials(&pki)
        .env("UPSTREAM_LIVE_URL", format!("https://{address}/send"))
        .build()
        .await;

    let response = server.client.forward(json!({ "a": 1 })).await;
    assert_eq!(response.status(), 500);

    let body: serde_json::Value = response.json().await.unwrap();

    assert_eq!(body["code"], "connect");
    assert!(body["error"].as_str().unwrap().starts_with("Failed to reach upstream: connect error:"));
}

#[tokio::test]
async fn upstream_timeout() {
    let pki = TestPki::new();

    let upstream = MockUpstream::builder()
        .delay(Duration::from_secs(5))
        .spawn(&pki.upstream, &pki.client_root)
        .await;

    let server = TestServer::builder()
        .pem_credentials(&pki)
        .env("UPSTREAM_TIMEOUT", "300ms")
        .live_url(upstream.url("/send"))
        .build()
        .await;

    let response = server.client.forward(json!({ "a": 1 })).await;
    assert_eq!(response.status(), 500);

    let body: serde_json::Value = response.json().await.unwrap();

    assert_eq!(body["code"], "timeout");
    assert_eq!(upstream.request_count(), 1);
}

#[tokio::test]
async fn untrusted_upstream_certificate_is_rejected() {
    let pki = TestPki::new();
    let upstream = super::upstream(&pki).await;

    // No CA_CERT_PEM: the upstream root is not among the built-in roots.
    let server = TestServer::builder()
        .env("CERT_PEM", pki.client_chain_pem())
        .env("KEY_PEM", pki.client.key_pem.clone())
        .live_url(upstream.url("/send"))
        .build()
        .await;

    let response = server.client.forward(json!({ "a": 1 })).await;
    assert_eq!(response.status(), 500);

    let body: serde_json::Value = response.json().await.unwrap();

    assert_eq!(body["code"], "connect");
    assert_eq!(upstream.request_count(), 0);
}

#[tokio::test]
async fn validation_can_be_disabled_explicitly() {
    let pki = TestPki::new();
    let upstream = super::upstream(&pki).await;

    let server = TestServer::builder()
        .env("CERT_PEM", pki.client_chain_pem())
        .env("KEY_PEM", pki.client.key_pem.clone())
        .env("UPSTREAM_ACCEPT_INVALID_CERTS", "true")
        .live_url(upstream.url("/send"))
        .build()
        .await;

    let response = server.client.forward(json!({ "a": 1 })).await;

    assert_eq!(response.status(), 200);
    assert_eq!(upstream.request_count(), 1);
}

#[tokio::test]
async fn upstream_signed_by_another_root_is_rejected() {
    let pki = TestPki::new();
    let impostor = TestPki::new();

    let upstream = MockUpstream::builder()
        .spawn(&impostor.upstream, &pki.client_root)
        .await;

    let server = TestServer::builder()
        .pem_credentials(&pki)
        .live_url(upstream.url("/send"))
        .build()
        .await;

    let response = server.client.forward(json!({ "a": 1 })).await;
    assert_eq!(response.status(), 500);

    let body: serde_json::Value = response.json().await.unwrap();

    assert_eq!(body["code"], "connect");
    assert_eq!(upstream.request_count(), 0);
}

#[tokio::test]
async fn redirect_status_passes_through() {
    let pki = TestPki::new();

    let upstream = MockUpstream::builder()
        .status(302)
        .location("/v2/send")
        .body(r#"{"error":"moved"}"#)
        .spawn(&pki.upstream, &pki.client_root)
        .await;

    let server = TestServer::builder()
        .pem_credentials(&pki)
        .live_url(upstream.url("/send"))
        .build()
        .await;

    let response = server.client.forward(json!({ "a": 1 })).await;

    assert_eq!(response.status(), 302);
    assert_eq!(response.text().await.unwrap(), r#"{"error":"moved"}"#);
    assert_eq!(upstream.request_count(), 1);
}
