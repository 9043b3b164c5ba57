//! HTTP checker tests against a local mock server

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use url::Url;
use urlcheck::{CheckDefinition, Checker, HttpChecker, Password, ProbeOutcome, TlsTrustPolicy};
use wiremock::matchers::{any, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn definition(server: &MockServer, route: &str, expected: u16) -> CheckDefinition {
    let url = Url::parse(&format!("{}{}", server.uri(), route)).unwrap();
    CheckDefinition::new("mock", "@every 1s", url, expected)
        .with_connect_timeout(Duration::from_secs(2))
}

#[tokio::test]
async fn test_expected_status_is_success() {
    let _ = tracing_subscriber::fmt::try_init();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let report = HttpChecker::default().probe(&definition(&server, "/health", 200)).await;

    assert_eq!(report.outcome, ProbeOutcome::Success);
    assert!(report.summary.starts_with("200 mock : GET "));
}

#[tokio::test]
async fn test_unexpected_status_is_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let report = HttpChecker::default().probe(&definition(&server, "/health", 200)).await;

    assert_eq!(report.outcome, ProbeOutcome::Failure(500));
}

#[tokio::test]
async fn test_expected_code_need_not_be_2xx() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let report = HttpChecker::default().probe(&definition(&server, "/gone", 410)).await;

    assert_eq!(report.outcome, ProbeOutcome::Success);
}

#[tokio::test]
async fn test_method_and_headers_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("x-probe", "urlcheck"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let definition = definition(&server, "/hook", 202)
        .with_method(Method::POST)
        .with_header("X-Probe", "urlcheck");
    let report = HttpChecker::default().probe(&definition).await;

    assert_eq!(report.outcome, ProbeOutcome::Success);
    assert!(report.summary.contains("POST"));
}

#[tokio::test]
async fn test_invalid_header_is_transport_error() {
    let server = MockServer::start().await;

    let definition = definition(&server, "/", 200).with_header("bad header", "x");
    let report = HttpChecker::default().probe(&definition).await;

    assert!(matches!(report.outcome, ProbeOutcome::TransportError(_)));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_basic_auth_with_env_password() {
    let server = MockServer::start().await;
    // admin:secret
    Mock::given(method("GET"))
        .and(path("/private"))
        .and(header("authorization", "Basic YWRtaW46c2VjcmV0"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    // SAFETY: the variable name is unique to this test
    unsafe { std::env::set_var("URLCHECK_PROBE_TEST_PASSWORD", "secret") };

    let definition = definition(&server, "/private", 200)
        .with_credentials("admin", Password::parse("$URLCHECK_PROBE_TEST_PASSWORD"));
    let report = HttpChecker::default().probe(&definition).await;

    assert_eq!(report.outcome, ProbeOutcome::Success);
}

#[tokio::test]
async fn test_missing_password_variable_probes_without_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/private"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let definition = definition(&server, "/private", 200)
        .with_credentials("admin", Password::parse("$URLCHECK_PROBE_TEST_UNSET_VARIABLE"));
    let report = HttpChecker::default().probe(&definition).await;

    assert_eq!(report.outcome, ProbeOutcome::Failure(401));
    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let url = Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap();
    let definition = CheckDefinition::new("closed", "@every 1s", url, 200)
        .with_connect_timeout(Duration::from_secs(2));
    let report = HttpChecker::default().probe(&definition).await;

    assert!(matches!(report.outcome, ProbeOutcome::TransportError(_)));
    assert!(report.summary.starts_with("ERR closed : GET"));
}

#[tokio::test]
async fn test_proxy_url_routes_the_request() {
    let proxy = MockServer::start().await;
    Mock::given(any()).respond_with(ResponseTemplate::new(200)).mount(&proxy).await;

    let url = Url::parse("http://target.invalid/x").unwrap();
    let definition = CheckDefinition::new("proxied", "@every 1s", url, 200)
        .with_connect_timeout(Duration::from_secs(2))
        .with_proxy(Url::parse(&proxy.uri()).unwrap());
    let report = HttpChecker::default().probe(&definition).await;

    assert_eq!(report.outcome, ProbeOutcome::Success);
    assert_eq!(proxy.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_credentials_not_forwarded_to_another_origin() {
    let other = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/landing"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&other)
        .await;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/private"))
        .and(header("authorization", "Basic YWRtaW46c2VjcmV0"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", format!("{}/landing", other.uri())),
        )
        .mount(&server)
        .await;

    let definition = definition(&server, "/private", 200)
        .with_credentials("admin", Password::Plain("secret".to_string()));
    let report = HttpChecker::default().probe(&definition).await;

    assert_eq!(report.outcome, ProbeOutcome::Success);
    let requests = other.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
}

/// Serve `200 OK` over TLS with a self-signed certificate issued for another host.
fn self_signed_https_server() -> u16 {
    let key_pair = rcgen::KeyPair::generate().unwrap();
    let params = rcgen::CertificateParams::new(vec!["not-localhost".to_string()]).unwrap();
    let cert = params.self_signed(&key_pair).unwrap();

    let server_cert = rustls::pki_types::CertificateDer::from(cert.der().to_vec());
    let server_key = rustls::pki_types::PrivateKeyDer::try_from(key_pair.serialize_der()).unwrap();
    let config = Arc::new(
        rustls::ServerConfig::builder_with_provider(rustls::crypto::ring::default_provider().into())
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(vec![server_cert], server_key)
            .unwrap(),
    );

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            let connection = rustls::ServerConnection::new(config.clone()).unwrap();
            let mut tls = rustls::StreamOwned::new(connection, stream);

            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            let complete = loop {
                match tls.read(&mut buf) {
                    Ok(0) | Err(_) => break false,
                    Ok(n) => {
                        request.extend_from_slice(&buf[..n]);
                        if request.windows(4).any(|w| w == b"\r\n\r\n") {
                            break true;
                        }
                    }
                }
            };
            if complete {
                let _ = tls.write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                );
                tls.conn.send_close_notify();
                let _ = tls.flush();
            }
        }
    });

    port
}

fn https_definition(port: u16) -> CheckDefinition {
    let url = Url::parse(&format!("https://127.0.0.1:{port}/")).unwrap();
    CheckDefinition::new("tls", "@every 1s", url, 200).with_connect_timeout(Duration::from_secs(2))
}

#[tokio::test]
async fn test_accept_all_policy_trusts_self_signed_certificate() {
    let port = self_signed_https_server();

    let checker = HttpChecker::new(TlsTrustPolicy::AcceptAll);
    let report = checker.probe(&https_definition(port)).await;

    assert_eq!(report.outcome, ProbeOutcome::Success);
    assert!(report.summary.starts_with("200 tls : GET https://127.0.0.1:"));
}

#[tokio::test]
async fn test_verify_policy_rejects_self_signed_certificate() {
    let port = self_signed_https_server();

    let checker = HttpChecker::new(TlsTrustPolicy::Verify);
    let report = checker.probe(&https_definition(port)).await;

    assert!(matches!(report.outcome, ProbeOutcome::TransportError(_)), "{:?}", report.outcome);
}
