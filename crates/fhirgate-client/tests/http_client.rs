//! ServiceClient against a mock upstream.

use std::time::Duration;

use bytes::Bytes;
use fhirgate_client::{
    AttributionClient, CallContext, DataClient, HttpClientConfig, JobClient, ResourceKind,
    ServiceClient,
};
use fhirgate_core::ExportRequest;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, retries: u32) -> ServiceClient {
    ServiceClient::new(
        HttpClientConfig::new(server.uri())
            .with_retries(retries)
            .with_retry_backoff(Duration::ZERO)
            .with_timeout(Duration::from_secs(5)),
    )
    .unwrap()
}

fn ctx() -> CallContext {
    CallContext::new(Some("org-1".into()), Some("req-1".into()))
}

#[tokio::test]
async fn get_forwards_org_and_request_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Group/grp-1"))
        .and(header("X-Org", "org-1"))
        .and(header("X-Request-Id", "req-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":"grp-1"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let body = client(&server, 0)
        .get(&ctx(), ResourceKind::Group, "grp-1")
        .await
        .unwrap();
    assert_eq!(body, Bytes::from_static(br#"{"id":"grp-1"}"#));
}

#[tokio::test]
async fn post_sends_fhir_json_body() {
    let server = MockServer::start().await;
    let group = json!({ "resourceType": "Group", "type": "person", "actual": true });
    Mock::given(method("POST"))
        .and(path("/Group"))
        .and(header("Content-Type", "application/fhir+json"))
        .and(body_json(&group))
        .respond_with(ResponseTemplate::new(201).set_body_string("created"))
        .expect(1)
        .mount(&server)
        .await;

    let body = client(&server, 0)
        .post(
            &ctx(),
            ResourceKind::Group,
            Bytes::from(group.to_string()),
        )
        .await
        .unwrap();
    assert_eq!(body, Bytes::from_static(b"created"));
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Organization/org-1"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server, 2)
        .get(&ctx(), ResourceKind::Organization, "org-1")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn retry_recovers_after_transient_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Group/grp-1"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Group/grp-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let body = client(&server, 3)
        .get(&ctx(), ResourceKind::Group, "grp-1")
        .await
        .unwrap();
    assert_eq!(body, Bytes::from_static(b"ok"));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Group/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such group"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, 3)
        .get(&ctx(), ResourceKind::Group, "missing")
        .await
        .unwrap_err();
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn export_posts_request_and_returns_job_id() {
    let server = MockServer::start().await;
    let request = ExportRequest {
        output_format: "application/fhir+ndjson".into(),
        since: String::new(),
        resource_types: "Coverage,ExplanationOfBenefit".into(),
        mbis: vec!["4S58A00AA00".into()],
        provider_npi: "1111111112".into(),
        group_id: "grp-1".into(),
    };
    Mock::given(method("POST"))
        .and(path("/Group/grp-1/$export"))
        .and(header("X-Org", "org-1"))
        .and(body_json(json!({
            "outputFormat": "application/fhir+ndjson",
            "since": "",
            "type": "Coverage,ExplanationOfBenefit",
            "mbis": ["4S58A00AA00"],
            "providerNpi": "1111111112",
            "groupId": "grp-1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string("job-42\n"))
        .expect(1)
        .mount(&server)
        .await;

    let job_id = client(&server, 0).export(&ctx(), &request).await.unwrap();
    assert_eq!(job_id, "job-42");
}

#[tokio::test]
async fn export_rejects_empty_job_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Group/g/$export"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let request = ExportRequest::from_attributions("g", "ndjson", "", "", &[]);
    assert!(client(&server, 0).export(&ctx(), &request).await.is_err());
}

#[tokio::test]
async fn job_status_and_data_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Job/job-42"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"RUNNING"}"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Data/job-42-coverage.ndjson"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}\n{}\n"))
        .mount(&server)
        .await;

    let c = client(&server, 0);
    assert_eq!(
        c.status(&ctx(), "job-42").await.unwrap(),
        Bytes::from_static(br#"{"status":"RUNNING"}"#)
    );
    assert_eq!(
        c.get_file(&ctx(), "job-42-coverage.ndjson").await.unwrap(),
        Bytes::from_static(b"{}\n{}\n")
    );
}

#[tokio::test]
async fn unreachable_upstream_is_a_transport_error() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let c = ServiceClient::new(
        HttpClientConfig::new(uri)
            .with_retries(1)
            .with_retry_backoff(Duration::ZERO)
            .with_timeout(Duration::from_secs(2)),
    )
    .unwrap();
    let err = c
        .get(&CallContext::default(), ResourceKind::Group, "grp-1")
        .await
        .unwrap_err();
    assert!(err.is_retryable());
}
