use std::time::Duration;

use apns::{DeliveryOutcome, DeviceToken, MemoryPushClient, PushMode, PushRequest};
use apns_http::{ApnsHttpServer, ServerConfig, ServerError, FEEDBACK_PATH, PUSH_PATH};
use chrono::Utc;
use hyper::{header, Body, Client, Method, Request};
use serde_json::Value;

const TOKEN: &str = "0f744707bebcf74f9b7c25d48e3358945f6aa01da5ddb387462c7eaf61bbad78";

async fn start(config: ServerConfig) -> Result<(ApnsHttpServer, MemoryPushClient), ServerError> {
    let mut handle = None;
    let server = ApnsHttpServer::start(config, |client_config, channels| {
        let client = MemoryPushClient::new(client_config, channels);
        handle = Some(client.clone());
        client
    })
    .await?;
    Ok((server, handle.expect("Push client was not constructed")))
}

async fn send(server: &ApnsHttpServer, method: Method, path: &str, body: String) -> Value {
    let request = Request::builder()
        .method(method)
        .uri(format!("http://{}{path}", server.local_addr()))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .expect("Failed to build request");
    let response = Client::new()
        .request(request)
        .await
        .expect("Request failed");
    let bytes = hyper::body::to_bytes(response.into_body())
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Response is not JSON")
}

fn push_body(token: &str) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("token", token)
        .append_pair("payload", r#"{"aps":{"alert":"hi"}}"#)
        .finish()
}

#[tokio::test]
async fn test_serves_over_tcp() {
    let (server, client) = start(ServerConfig::default())
        .await
        .expect("Failed to start server");

    let resp = send(&server, Method::POST, PUSH_PATH, push_body(TOKEN)).await;
    assert_eq!(resp["Status"], 200);
    assert_eq!(client.sent().len(), 1);

    let resp = send(&server, Method::GET, PUSH_PATH, String::new()).await;
    assert_eq!(resp["Status"], 201);

    server.shutdown().await;
}

#[tokio::test]
async fn test_instances_are_independent() {
    let (first, first_client) = start(ServerConfig::default())
        .await
        .expect("Failed to start first server");
    let (second, second_client) = start(ServerConfig::default())
        .await
        .expect("Failed to start second server");
    assert_ne!(first.local_addr(), second.local_addr());

    send(&first, Method::POST, PUSH_PATH, push_body(TOKEN)).await;
    assert_eq!(first_client.sent().len(), 1);
    assert!(second_client.sent().is_empty());

    first.shutdown().await;
    assert!(first_client.is_shut_down());
    assert!(!second_client.is_shut_down());

    let resp = send(&second, Method::GET, &format!("{FEEDBACK_PATH}?limit=1"), String::new()).await;
    assert_eq!(resp["Status"], 200);
    second.shutdown().await;
}

#[tokio::test]
async fn test_bind_failure_is_reported() {
    let (running, _client) = start(ServerConfig::default())
        .await
        .expect("Failed to start server");

    let mut handle = None;
    let config = ServerConfig {
        bind_addr: running.local_addr(),
        ..ServerConfig::default()
    };
    let result = ApnsHttpServer::start(config, |client_config, channels| {
        let client = MemoryPushClient::new(client_config, channels);
        handle = Some(client.clone());
        client
    })
    .await;

    assert!(matches!(result, Err(ServerError::Bind { .. })));
    let client = handle.expect("Push client was not constructed");
    assert_eq!(client.shutdown_count(), 1);

    running.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_releases_client_once() {
    let (server, client) = start(ServerConfig::default())
        .await
        .expect("Failed to start server");
    let addr = server.local_addr();

    server.shutdown().await;
    assert_eq!(client.shutdown_count(), 1);
    assert!(client.is_shut_down());
    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_rejected_token_comes_back_as_feedback() {
    let (server, client) = start(ServerConfig::default())
        .await
        .expect("Failed to start server");
    let token: DeviceToken = TOKEN.parse().expect("Valid token");
    client.reject_token(token);

    let resp = send(&server, Method::POST, PUSH_PATH, push_body(TOKEN)).await;
    assert_eq!(resp["Status"], 200);

    for _ in 0..100 {
        if server.stats().rejected() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(server.stats().rejected(), 1);
    assert_eq!(server.stats().delivered(), 0);

    let resp = send(&server, Method::GET, &format!("{FEEDBACK_PATH}?limit=5"), String::new()).await;
    assert_eq!(resp["Status"], 200);
    let batch = resp["Body"].as_array().expect("Body is an array");
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0]["Token"], TOKEN);

    server.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_outcome_drain() {
    let mut kept = None;
    let server = ApnsHttpServer::start(ServerConfig::default(), |client_config, channels| {
        kept = Some(channels.clone());
        MemoryPushClient::new(client_config, channels)
    })
    .await
    .expect("Failed to start server");
    let channels = kept.expect("Push client was not constructed");
    assert!(!channels.responses.is_closed());

    server.shutdown().await;

    assert!(channels.responses.is_closed());
    let token: DeviceToken = TOKEN.parse().expect("Valid token");
    let request = PushRequest {
        mode: PushMode::Enhanced,
        identifier: 1,
        expiry: Utc::now(),
        token,
        payload: Vec::new(),
    };
    let late = DeliveryOutcome::delivered(&request);
    assert!(channels.responses.send(late).await.is_err());
}
