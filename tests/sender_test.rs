// The HTTP sending stack against a live mock endpoint: request shape,
// status mapping, timeouts, and the shipping orchestrator on top.
use bytes::Bytes;
use logship::buffer::Batch;
use logship::sender::{
    AtomicTransportStats, BatchSender, HttpSender, PoolOptions, ReqwestSender, ShipError,
    TransmissionError, USER_AGENT, build_pooled_client,
};
use logship::{FlushTrigger, Record};
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sender_for(server: &MockServer, api_key: &str, timeout: Duration) -> ReqwestSender {
    let client = build_pooled_client(&PoolOptions::default(), timeout).unwrap();
    let endpoint = Url::parse(&format!("{}/frames", server.uri())).unwrap();
    ReqwestSender::new(client, endpoint, api_key, timeout)
}

#[tokio::test]
async fn test_send_posts_the_body_verbatim_and_reports_the_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/frames"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let sender = sender_for(&server, "key", Duration::from_secs(5));
    let body = Bytes::from_static(br#"[{"message":"verbatim"}]"#);
    let status = sender.send(body.clone()).await.unwrap();
    assert_eq!(status, 202);

    let request = &server.received_requests().await.unwrap()[0];
    assert_eq!(request.body, body.as_ref());
    assert_eq!(
        request.headers.get("content-type").unwrap(),
        "application/json"
    );
    assert_eq!(
        request
            .headers
            .get("content-length")
            .unwrap()
            .to_str()
            .unwrap(),
        body.len().to_string()
    );
    assert_eq!(request.headers.get("user-agent").unwrap(), USER_AGENT);
}

#[tokio::test]
async fn test_authorization_is_basic_with_the_key_and_empty_password() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let sender = sender_for(&server, "key", Duration::from_secs(5));
    sender.send(Bytes::from_static(b"[]")).await.unwrap();

    // base64("key:"): username only, empty password after the colon.
    let request = &server.received_requests().await.unwrap()[0];
    assert_eq!(
        request.headers.get("authorization").unwrap(),
        "Basic a2V5Og=="
    );
}

#[tokio::test]
async fn test_non_success_statuses_map_to_http_errors() {
    let server = MockServer::start().await;
    Mock::given(path("/frames"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let sender = sender_for(&server, "key", Duration::from_secs(5));
    let error = sender.send(Bytes::from_static(b"[]")).await.unwrap_err();
    assert!(matches!(error, TransmissionError::Http { status: 503 }));
}

#[tokio::test]
async fn test_slow_endpoint_hits_the_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(path("/frames"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let timeout = Duration::from_millis(100);
    let sender = sender_for(&server, "key", timeout);
    let error = sender.send(Bytes::from_static(b"[]")).await.unwrap_err();
    assert!(matches!(error, TransmissionError::Timeout(t) if t == timeout));
}

#[tokio::test]
async fn test_refused_connection_maps_to_network_error() {
    let client = build_pooled_client(&PoolOptions::default(), Duration::from_secs(2)).unwrap();
    let endpoint = Url::parse("http://127.0.0.1:1/frames").unwrap();
    let sender = ReqwestSender::new(client, endpoint, "key", Duration::from_secs(2));

    let error = sender.send(Bytes::from_static(b"[]")).await.unwrap_err();
    assert!(matches!(error, TransmissionError::Network(_)));
}

#[tokio::test]
async fn test_batch_sender_encodes_ships_and_counts_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/frames"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let stats = Arc::new(AtomicTransportStats::new());
    let sender = BatchSender::new(
        Arc::new(sender_for(&server, "key", Duration::from_secs(5))),
        Arc::clone(&stats),
    );

    let mut first = Record::from_message("one");
    first.insert("attempt", 1);
    let batch = Batch::new(
        vec![first, Record::from_message("two")],
        FlushTrigger::Manual,
    );
    let report = sender.ship(batch).await.unwrap();
    assert_eq!(report.records, 2);
    assert_eq!(report.status, 202);

    let request = &server.received_requests().await.unwrap()[0];
    let parsed: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(
        parsed,
        serde_json::json!([
            {"message": "one", "attempt": 1},
            {"message": "two"},
        ])
    );

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.batches_sent, 1);
    assert_eq!(snapshot.records_shipped, 2);
    assert_eq!(snapshot.bytes_sent, request.body.len() as u64);
    assert!(snapshot.last_send_time > 0);
}

#[tokio::test]
async fn test_failed_ship_counts_the_records_as_discarded() {
    let server = MockServer::start().await;
    Mock::given(path("/frames"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let stats = Arc::new(AtomicTransportStats::new());
    let sender = BatchSender::new(
        Arc::new(sender_for(&server, "key", Duration::from_secs(5))),
        Arc::clone(&stats),
    );

    let batch = Batch::new(
        (0..4).map(|n| Record::from_message(format!("r{n}"))).collect(),
        FlushTrigger::Interval,
    );
    let result = sender.ship(batch).await;
    assert!(matches!(
        result,
        Err(ShipError::Transmission(TransmissionError::Http {
            status: 500
        }))
    ));

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.batches_failed, 1);
    assert_eq!(snapshot.records_discarded, 4);
    assert_eq!(snapshot.batches_sent, 0);
    assert_eq!(snapshot.bytes_sent, 0);
}
