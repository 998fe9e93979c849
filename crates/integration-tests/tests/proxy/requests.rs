use indoc::indoc;
use integration_tests::*;
use serde_json::json;

#[tokio::test]
async fn created_response_is_mirrored() {
    let pki = TestPki::new();

    let upstream = MockUpstream::builder()
        .status(201)
        .body(r#"{"id":42}"#)
        .spawn(&pki.upstream, &pki.client_root)
        .await;

    let server = TestServer::builder()
        .pem_credentials(&pki)
        .live_url(upstream.url("/send"))
        .build()
        .await;

    let response = server.client.forward(json!({ "property": { "agent_ref": "A-1" } })).await;

    assert_eq!(response.status(), 201);
    assert_eq!(response.headers()["content-type"], "application/json");
    assert_eq!(response.text().await.unwrap(), r#"{"id":42}"#);
}

#[tokio::test]
async fn body_is_forwarded_byte_for_byte() {
    let pki = TestPki::new();

    let body = indoc! {r#"
        {
          "id": 42,
          "note": "spacing is kept"
        }
    "#};

    let upstream = MockUpstream::builder()
        .body(body)
        .spawn(&pki.upstream, &pki.client_root)
        .await;

    let server = TestServer::builder()
        .pem_credentials(&pki)
        .live_url(upstream.url("/send"))
        .build()
        .await;

    let response = server.client.forward(json!({ "a": 1 })).await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), body);
}

#[tokio::test]
async fn upstream_without_content_type() {
    let pki = TestPki::new();

    let upstream = MockUpstream::builder()
        .status(202)
        .content_type(None)
        .body("accepted")
        .spawn(&pki.upstream, &pki.client_root)
        .await;

    let server = TestServer::builder()
        .pem_credentials(&pki)
        .live_url(upstream.url("/send"))
        .build()
        .await;

    let response = server.client.forward(json!({ "a": 1 })).await;

    assert_eq!(response.status(), 202);
    assert!(response.headers().get("content-type").is_none());
    assert_eq!(response.text().await.unwrap(), "accepted");
}

#[tokio::test]
async fn scalar_payload_is_forwarded() {
    let pki = TestPki::new();
    let upstream = super::upstream(&pki).await;

    let server = TestServer::builder()
        .pem_credentials(&pki)
        .live_url(upstream.url("/send"))
        .build()
        .await;

    let response = server.client.forward(json!("just a string")).await;

    assert_eq!(response.status(), 200);
    assert_eq!(upstream.received()[0].body, json!("just a string"));
}

#[tokio::test]
async fn missing_payload() {
    let pki = TestPki::new();
    let upstream = super::upstream(&pki).await;

    let server = TestServer::builder()
        .pem_credentials(&pki)
        .live_url(upstream.url("/send"))
        .build()
        .await;

    let response = server.client.proxy(json!({ "test_mode": true })).await;
    assert_eq!(response.status(), 400);

    let body: serde_json::Value = response.json().await.unwrap();

    insta::assert_json_snapshot!(body, @r#"
    {
      "error": "Missing payload"
    }
    "#);

    assert_eq!(upstream.request_count(), 0);
}

#[tokio::test]
async fn plain_http_target_url() {
    let server = TestServer::builder().build().await;

    let response = server
        .client
        .proxy(json!({ "payload": { "a": 1 }, "target_url": "http://127.0.0.1:1/send" }))
        .await;

    assert_eq!(response.status(), 400);

    let body: serde_json::Value = response.json().await.unwrap();

    insta::assert_json_snapshot!(body, @r#"
    {
      "error": "Invalid target_url: expected an https URL, got scheme 'http'"
    }
    "#);
}

#[tokio::test]
async fn non_json_content_type() {
    let server = TestServer::builder().build().await;

    let response = server
        .client
        .request(reqwest::Method::POST, "/proxy")
        .header("content-type", "application/x-www-form-urlencoded")
        .body("payload=1")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);

    let body: serde_json::Value = response.json().await.unwrap();

    insta::assert_json_snapshot!(body, @r#"
    {
      "error": "Unsupported Content-Type, expected: 'Content-Type: application/json'"
    }
    "#);
}
