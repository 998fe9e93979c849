use config::{IdentityConfig, UpstreamConfig};
use forwarder::{ForwardRequest, Forwarder, TransportErrorKind};
use integration_tests::*;
use reqwest::header::HeaderValue;
use secrecy::SecretString;
use serde_json::json;

fn identity_config(pki: &TestPki, trust_upstream: bool) -> IdentityConfig {
    IdentityConfig {
        cert_pem: Some(pki.client_chain_pem()),
        key_pem: Some(SecretString::from(pki.client.key_pem.clone())),
        ca_cert_pem: trust_upstream.then(|| pki.upstream_ca.cert_pem()),
        ..Default::default()
    }
}

fn forwarder(pki: &TestPki) -> Forwarder {
    let identity = identity::load(&identity_config(pki, true)).unwrap();
    Forwarder::new(&identity, &UpstreamConfig::default()).unwrap()
}

#[tokio::test]
async fn returns_upstream_status_and_body() {
    let pki = TestPki::new();

    let upstream = MockUpstream::builder()
        .status(201)
        .body(r#"{"id":42}"#)
        .spawn(&pki.upstream, &pki.client_root)
        .await;

    let result = forwarder(&pki)
        .forward(ForwardRequest::new(upstream.url("/send"), json!({ "a": 1 })))
        .await
        .unwrap();

    assert_eq!(result.status.as_u16(), 201);
    assert_eq!(result.body.as_ref(), br#"{"id":42}"#);
    assert_eq!(result.content_type.unwrap(), "application/json");
}

#[tokio::test]
async fn server_error_is_a_result() {
    let pki = TestPki::new();

    let upstream = MockUpstream::builder()
        .status(500)
        .body("boom")
        .spawn(&pki.upstream, &pki.client_root)
        .await;

    let result = forwarder(&pki)
        .forward(ForwardRequest::new(upstream.url("/send"), json!({ "a": 1 })))
        .await
        .unwrap();

    assert_eq!(result.status.as_u16(), 500);
    assert_eq!(result.body.as_ref(), b"boom");
    assert_eq!(upstream.request_count(), 1);
}

#[tokio::test]
async fn unreachable_host() {
    let pki = TestPki::new();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let url = url::Url::parse(&format!("https://{address}/send")).unwrap();

    let error = forwarder(&pki)
        .forward(ForwardRequest::new(url, json!({ "a": 1 })))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), TransportErrorKind::Connect);
}

#[tokio::test]
async fn each_call_is_a_single_attempt() {
    let pki = TestPki::new();

    let upstream = MockUpstream::builder()
        .status(503)
        .spawn(&pki.upstream, &pki.client_root)
        .await;

    let forwarder = forwarder(&pki);

    for expected in 1..=3 {
        let result = forwarder
            .forward(ForwardRequest::new(upstream.url("/send"), json!({ "a": 1 })))
            .await
            .unwrap();

        assert_eq!(result.status.as_u16(), 503);
        assert_eq!(upstream.request_count(), expected);
    }
}

#[tokio::test]
async fn redirect_is_returned_not_followed() {
    let pki = TestPki::new();

    let upstream = MockUpstream::builder()
        .status(307)
        .location("/elsewhere")
        .body(r#"{"moved":true}"#)
        .spawn(&pki.upstream, &pki.client_root)
        .await;

    let result = forwarder(&pki)
        .forward(ForwardRequest::new(upstream.url("/send"), json!({ "a": 1 })))
        .await
        .unwrap();

    assert_eq!(result.status.as_u16(), 307);
    assert_eq!(result.body.as_ref(), br#"{"moved":true}"#);
    assert_eq!(upstream.request_count(), 1);
    assert_eq!(upstream.received()[0].path, "/send");
}

#[tokio::test]
async fn see_other_is_returned_not_followed() {
    let pki = TestPki::new();

    let upstream = MockUpstream::builder()
        .status(303)
        .location("/result")
        .body("")
        .content_type(None)
        .spawn(&pki.upstream, &pki.client_root)
        .await;

    let result = forwarder(&pki)
        .forward(ForwardRequest::new(upstream.url("/send"), json!({ "a": 1 })))
        .await
        .unwrap();

    assert_eq!(result.status.as_u16(), 303);
    assert_eq!(upstream.request_count(), 1);
}

#[tokio::test]
async fn validates_upstream_certificate_by_default() {
    let pki = TestPki::new();
    let upstream = MockUpstream::builder().spawn(&pki.upstream, &pki.client_root).await;

    let identity = identity::load(&identity_config(&pki, false)).unwrap();
    let forwarder = Forwarder::new(&identity, &UpstreamConfig::default()).unwrap();

    let error = forwarder
        .forward(ForwardRequest::new(upstream.url("/send"), json!({ "a": 1 })))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), TransportErrorKind::Connect);
    assert_eq!(upstream.request_count(), 0);
}

#[tokio::test]
async fn content_type_cannot_be_overridden() {
    let pki = TestPki::new();
    let upstream = MockUpstream::builder().spawn(&pki.upstream, &pki.client_root).await;

    let mut request = ForwardRequest::new(upstream.url("/send"), json!({ "a": 1 }));
    request.headers.insert("content-type", HeaderValue::from_static("text/plain"));
    request
        .headers
        .insert("x-request-source", HeaderValue::from_static("integration-tests"));

    forwarder(&pki).forward(request).await.unwrap();

    let received = upstream.received();
    assert_eq!(received[0].content_type.as_deref(), Some("application/json"));
}

#[tokio::test]
async fn shared_across_tasks() {
    let pki = TestPki::new();
    let upstream = MockUpstream::builder().spawn(&pki.upstream, &pki.client_root).await;

    let forwarder = forwarder(&pki);
    let mut tasks = Vec::new();

    for i in 0..8 {
        let forwarder = forwarder.clone();
        let url = upstream.url("/send");

        tasks.push(tokio::spawn(async move {
            forwarder.forward(ForwardRequest::new(url, json!({ "n": i }))).await
        }));
    }

    for task in tasks {
        let result = task.await.unwrap().unwrap();
        assert_eq!(result.status.as_u16(), 200);
    }

    assert_eq!(upstream.request_count(), 8);
}
