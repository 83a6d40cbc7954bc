//! Router-level tests over the in-memory store.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use organizer_api::{build_router, AppState};
use organizer_core::domain::{MemberRole, Membership, Menu, Severity};
use organizer_core::repositories::{MemoryAuditSink, MemoryLocalStore, SnapshotJournal};
use organizer_core::services::{
    GatewayLimits, GatewayMetrics, GatewayServices, MutationGateway, NetworkState, OfflineQueue,
    RateLimitConfig, RateLimiter, Reconciler, ReconcilerConfig, RetryPolicy, SessionViews,
};
use organizer_infrastructure::InMemoryMenuStore;
use organizer_security::{ContentValidator, JwtService};
use organizer_shared::{new_id, Identity, MenuType};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    store: Arc<InMemoryMenuStore>,
    network: Arc<NetworkState>,
    jwt: Arc<JwtService>,
    audit: Arc<MemoryAuditSink>,
}

fn app_with_limit(max_actions: u32) -> TestApp {
    let store = Arc::new(InMemoryMenuStore::default());
    let network = Arc::new(NetworkState::new());
    let services = GatewayServices {
        network: network.clone(),
        queue: Arc::new(OfflineQueue::new(Arc::new(SnapshotJournal::new(Arc::new(MemoryLocalStore::new()))))),
        limiter: Arc::new(RateLimiter::new(RateLimitConfig {
            max_actions,
            ..RateLimitConfig::default()
        })),
        views: Arc::new(SessionViews::new()),
    };
    let policy = RetryPolicy {
        max_retries: 0,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(1),
        factor: 2,
    };
    let audit = Arc::new(MemoryAuditSink::new());
    let gateway = Arc::new(MutationGateway::new(
        store.clone(),
        services,
        ContentValidator::default(),
        policy,
        audit.clone(),
        Arc::new(GatewayMetrics::new().unwrap()),
        GatewayLimits::default(),
    ));
    let reconciler = Arc::new(Reconciler::new(gateway.clone(), ReconcilerConfig::default()));
    let jwt = Arc::new(JwtService::new("test-secret".into(), 3600));

    let router = build_router(AppState {
        gateway,
        reconciler,
        jwt: jwt.clone(),
    });
    TestApp { router, store, network, jwt, audit }
}

fn app() -> TestApp {
    app_with_limit(30)
}

impl TestApp {
    async fn call(&self, method: Method, uri: &str, identity: Option<Identity>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(identity) = identity {
            let token = self.jwt.issue(&identity).unwrap();
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }
}

fn group_menu(owner: Identity) -> Menu {
    let now = Utc::now();
    Menu {
        id: new_id(),
        owner_id: owner,
        name: "Guild".into(),
        menu_type: MenuType::Group,
        config: json!({}),
        order: 0,
        is_private: false,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn requests_without_token_are_rejected() {
    let app = app();
    let (status, body) = app.call(Method::GET, "/api/v1/menus", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
async fn create_then_list() {
    let app = app();
    let me = new_id();

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/menus",
            Some(me),
            Some(json!({ "name": "Raids", "type": "dashboard", "config": {} })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "applied");
    assert_eq!(body["data"]["result"]["change"], "created");

    let (status, body) = app.call(Method::GET, "/api/v1/menus", Some(me), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["name"], "Raids");
}

#[tokio::test]
async fn invalid_name_is_bad_request() {
    let app = app();
    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/menus",
            Some(new_id()),
            Some(json!({ "name": "   ", "type": "dashboard" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "ValidationError");
    assert!(!body["details"]["issues"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn rejected_bodies_are_audited() {
    let app = app();
    let me = new_id();

    let uri = format!("/api/v1/menus/{}", new_id());
    let (status, body) = app.call(Method::PATCH, &uri, Some(me), Some(json!({ "order": -1 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "ValidationError");

    let (status, body) = app
        .call(Method::PUT, "/api/v1/menus/order", Some(me), Some(json!({ "orders": [] })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "ValidationError");

    let entries = app.audit.entries();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.identity == me && e.severity == Severity::Low));
    assert_eq!(entries[0].action, "menu.update");
    assert_eq!(entries[1].action, "menu.reorder");
}

#[tokio::test]
async fn member_delete_is_forbidden() {
    let app = app();
    let owner = new_id();
    let member = new_id();
    let group = group_menu(owner);
    app.store.seed_menu(group.clone());
    app.store.add_membership(Membership {
        menu_id: group.id,
        member_id: member,
        role: MemberRole::Member,
        joined_at: Utc::now(),
    });

    let uri = format!("/api/v1/menus/{}", group.id);
    let (status, body) = app.call(Method::DELETE, &uri, Some(member), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["details"]["reason"], "insufficient_role");
    assert!(app.store.menu(&group.id).is_some());
}

#[tokio::test]
async fn unknown_menu_is_not_found() {
    let app = app();
    let uri = format!("/api/v1/menus/{}", new_id());
    let (status, _) = app
        .call(Method::PATCH, &uri, Some(new_id()), Some(json!({ "order": 2 })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn offline_mutations_are_accepted_and_listed_as_pending() {
    let app = app();
    let me = new_id();
    let mine = group_menu(me);
    app.store.seed_menu(mine.clone());
    app.call(Method::GET, "/api/v1/menus", Some(me), None).await;

    app.store.set_reachable(false);
    app.network.set_online(false);

    let uri = format!("/api/v1/menus/{}", mine.id);
    let (status, body) = app
        .call(Method::PATCH, &uri, Some(me), Some(json!({ "name": "Renamed" })))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["data"]["status"], "queued");

    let (status, body) = app.call(Method::GET, "/api/v1/sync/pending", Some(me), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["hasPending"], true);
    assert_eq!(body["data"]["count"], 1);

    let (status, _) = app.call(Method::POST, "/api/v1/sync", Some(me), None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    app.store.set_reachable(true);
    app.network.set_online(true);
    app.network.mark_connected();
    let (status, body) = app.call(Method::POST, "/api/v1/sync", Some(me), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["processed"], 1);
    assert_eq!(app.store.menu(&mine.id).unwrap().name, "Renamed");
}

#[tokio::test]
async fn rate_limit_answers_429() {
    let app = app_with_limit(1);
    let me = new_id();
    let create = |name: &str| json!({ "name": name, "type": "dashboard" });

    let (status, _) = app.call(Method::POST, "/api/v1/menus", Some(me), Some(create("One"))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = app.call(Method::POST, "/api/v1/menus", Some(me), Some(create("Two"))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["details"]["resetAt"].is_string());
}

#[tokio::test]
async fn health_and_metrics_are_public() {
    let app = app();
    let (status, body) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["network"]["isOnline"], true);

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&text).contains("organizer_store_retries_total"));
}
