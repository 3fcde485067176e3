/// End-to-end binding and resolution tests over the HTTP router
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tower::ServiceExt;
use trustmesh_binding::{
    binding::InMemoryResolutionCache,
    clock::ManualClock,
    config::ServiceConfig,
    ledger::{LocalTopicLog, LogIndexer, MirrorNodeClient, MirrorNodeConfig},
    server::build_router,
    AppContext,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOPIC: &str = "0.0.999";
const WORLD: &str = "world-1";
const EVM: &str = "0x52908400098527886E0F7030069857D2E4169EE7";
const START: i64 = 1_700_000_000_000;

fn test_config() -> ServiceConfig {
    let vars: HashMap<&str, &str> = [
        ("IDENTITY_TOPIC_ID", TOPIC),
        ("LEDGER_BACKEND", "local"),
        ("BINDING_SHARED_SECRET", "integration-secret"),
    ]
    .into_iter()
    .collect();
    ServiceConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap()
}

async fn build_app(clock: Arc<ManualClock>, indexer: Option<Arc<dyn LogIndexer>>) -> Router {
    let log = Arc::new(LocalTopicLog::in_memory(clock.clone()).await.unwrap());
    let indexer: Arc<dyn LogIndexer> = match indexer {
        Some(indexer) => indexer,
        None => log.clone(),
    };
    let store = Arc::new(InMemoryResolutionCache::new(
        Duration::from_secs(60),
        1_000,
        clock.clone(),
    ));
    let ctx = AppContext::from_parts(test_config(), log, indexer, store, clock);
    build_router(ctx)
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn bind_request(account: &str) -> Request<Body> {
    let body = json!({
        "worldId": WORLD,
        "evmAddress": EVM,
        "hederaAccountId": account,
        "proof": { "type": "otp_attestation", "value": "integration-secret" }
    });
    Request::builder()
        .method("POST")
        .uri("/api/v1/bind")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn resolve_request(evm: &str) -> Request<Body> {
    Request::builder()
        .uri(format!("/v1/resolve?worldId={}&evm={}", WORLD, evm))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_bind_then_resolve_on_local_log() {
    let clock = Arc::new(ManualClock::new(START));
    let app = build_app(clock.clone(), None).await;

    let (status, receipt) = call(&app, bind_request("0.0.1234")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["bindingEventId"], "0.0.999:1");

    let (status, result) = call(&app, resolve_request(&EVM.to_lowercase())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["hederaAccountId"], "0.0.1234");
    assert_eq!(result["bindingEventId"], "0.0.999:1");
    assert_eq!(result["updatedAt"], START);
}

#[tokio::test]
async fn test_rebind_is_visible_after_cache_ttl() {
    let clock = Arc::new(ManualClock::new(START));
    let app = build_app(clock.clone(), None).await;

    call(&app, bind_request("0.0.1")).await;
    let (_, first) = call(&app, resolve_request(EVM)).await;
    assert_eq!(first["hederaAccountId"], "0.0.1");

    clock.advance(1_000);
    let (status, receipt) = call(&app, bind_request("0.0.2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["bindingEventId"], "0.0.999:2");

    // Cached snapshot until the TTL runs out
    let (_, cached) = call(&app, resolve_request(EVM)).await;
    assert_eq!(cached["hederaAccountId"], "0.0.1");

    clock.advance(60_000);
    let (_, fresh) = call(&app, resolve_request(EVM)).await;
    assert_eq!(fresh["hederaAccountId"], "0.0.2");
    assert_eq!(fresh["bindingEventId"], "0.0.999:2");
    assert_eq!(fresh["updatedAt"], START + 1_000);
}

fn mirror_message(world: &str, evm: &str, seq: u64) -> Value {
    let event = json!({
        "type": "IDENTITY_BINDING",
        "worldId": world,
        "evmAddress": evm,
        "hederaAccountId": format!("0.0.{}", seq),
        "createdAt": 1_000,
        "proofType": "signature",
        "payloadHash": "0x00"
    });
    json!({
        "consensus_timestamp": format!("{}.500000000", 1_700_000_000 + seq),
        "topic_id": TOPIC,
        "sequence_number": seq,
        "message": STANDARD.encode(event.to_string()),
    })
}

async fn mirror_app(server: &MockServer, clock: Arc<ManualClock>) -> Router {
    let mirror = MirrorNodeClient::new(MirrorNodeConfig {
        base_url: format!("{}/api/v1", server.uri()),
        ..MirrorNodeConfig::default()
    })
    .unwrap();
    build_app(clock, Some(Arc::new(mirror))).await
}

#[tokio::test]
async fn test_resolve_through_mirror_node_pages() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/topics/0.0.999/messages"))
        .and(query_param("sequencenumber", "lt:9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [mirror_message(WORLD, "0x123", 5)],
            "links": { "next": "/api/v1/topics/0.0.999/messages?limit=100&order=desc&sequencenumber=lt:5" }
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/topics/0.0.999/messages"))
        .and(query_param("order", "desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [mirror_message("other", "0x999", 9)],
            "links": { "next": "/api/v1/topics/0.0.999/messages?limit=100&order=desc&sequencenumber=lt:9" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let clock = Arc::new(ManualClock::new(START));
    let app = mirror_app(&server, clock).await;

    let (status, result) = call(&app, resolve_request("0x123")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["hederaAccountId"], "0.0.5");
    assert_eq!(result["bindingEventId"], "0.0.999:5");
    assert_eq!(result["updatedAt"], 1_700_000_005_500i64);

    // Second lookup is served from the cache
    let (_, again) = call(&app, resolve_request("0x123")).await;
    assert_eq!(again, result);
}

#[tokio::test]
async fn test_unreachable_mirror_resolves_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let app = mirror_app(&server, Arc::new(ManualClock::new(START))).await;

    let (status, result) = call(&app, resolve_request("0x123")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(result["hederaAccountId"].is_null());

    let status_request = Request::builder()
        .uri(format!("/api/v1/status?worldId={}&a=0x123", WORLD))
        .body(Body::empty())
        .unwrap();
    let (status, body) = call(&app, status_request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isBound"], false);
}
