//! RestMenuStore against a mock PostgREST endpoint.

use organizer_core::domain::{MemberRole, Menu, MenuPatch};
use organizer_core::repositories::{ConnectivityProbe, MenuStore};
use organizer_core::StoreError;
use organizer_infrastructure::RestMenuStore;
use organizer_shared::config::StoreSettings;
use organizer_shared::{new_id, MenuType};
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store(server: &MockServer, timeout_ms: u64) -> RestMenuStore {
    RestMenuStore::new(&StoreSettings {
        url: format!("{}/", server.uri()),
        api_key: "anon-key".into(),
        timeout_ms,
    })
    .unwrap()
}

fn menu_row(id: Uuid, owner: Uuid, name: &str) -> Value {
    json!({
        "id": id,
        "owner_id": owner,
        "name": name,
        "type": "group",
        "config": null,
        "order": 4,
        "is_private": true,
        "created_at": "2026-03-01T10:00:00Z",
        "updated_at": null
    })
}

#[tokio::test]
async fn find_menu_decodes_row() {
    let server = MockServer::start().await;
    let (id, owner) = (new_id(), new_id());
    Mock::given(method("GET"))
        .and(path("/rest/v1/menus"))
        .and(query_param("id", format!("eq.{}", id)))
        .and(header("apikey", "anon-key"))
        .and(header("authorization", "Bearer anon-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([menu_row(id, owner, "Guild")])))
        .mount(&server)
        .await;

    let menu = store(&server, 1_000).find_menu(&id).await.unwrap().unwrap();
    assert_eq!(menu.owner_id, owner);
    assert_eq!(menu.menu_type, MenuType::Group);
    assert_eq!(menu.order, 4);
    assert!(menu.is_private);
    assert_eq!(menu.config, json!({}));
    assert_eq!(menu.updated_at, menu.created_at);
}

#[tokio::test]
async fn missing_menu_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/menus"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    assert_eq!(store(&server, 1_000).find_menu(&new_id()).await.unwrap(), None);
}

#[tokio::test]
async fn membership_lookup_filters_both_keys() {
    let server = MockServer::start().await;
    let (menu_id, member) = (new_id(), new_id());
    Mock::given(method("GET"))
        .and(path("/rest/v1/menu_members"))
        .and(query_param("menu_id", format!("eq.{}", menu_id)))
        .and(query_param("member_id", format!("eq.{}", member)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "menu_id": menu_id,
            "member_id": member,
            "role": "admin",
            "joined_at": "2026-03-01T10:00:00Z"
        }])))
        .mount(&server)
        .await;

    let membership = store(&server, 1_000)
        .find_membership(&menu_id, &member)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(membership.role, MemberRole::Admin);
}

#[tokio::test]
async fn list_by_ids_uses_in_filter_and_skips_empty() {
    let server = MockServer::start().await;
    let (a, b, owner) = (new_id(), new_id(), new_id());
    Mock::given(method("GET"))
        .and(path("/rest/v1/menus"))
        .and(query_param("id", format!("in.({},{})", a, b)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([menu_row(a, owner, "A"), menu_row(b, owner, "B")])))
        .expect(1)
        .mount(&server)
        .await;

    let store = store(&server, 1_000);
    assert_eq!(store.list_menus_by_ids(&[a, b]).await.unwrap().len(), 2);
    assert!(store.list_menus_by_ids(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn public_groups_filter_on_type_and_privacy() {
    let server = MockServer::start().await;
    let (id, owner) = (new_id(), new_id());
    let mut row = menu_row(id, owner, "Open guild");
    row["is_private"] = json!(false);
    Mock::given(method("GET"))
        .and(path("/rest/v1/menus"))
        .and(query_param("type", "eq.group"))
        .and(query_param("is_private", "eq.false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .expect(1)
        .mount(&server)
        .await;

    let menus = store(&server, 1_000).list_public_groups().await.unwrap();
    assert_eq!(menus.len(), 1);
    assert!(!menus[0].is_private);
}

#[tokio::test]
async fn update_sends_patch_and_asks_for_representation() {
    let server = MockServer::start().await;
    let (id, owner) = (new_id(), new_id());
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/menus"))
        .and(query_param("id", format!("eq.{}", id)))
        .and(header("prefer", "return=representation"))
        .and(body_partial_json(json!({ "name": "Renamed" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([menu_row(id, owner, "Renamed")])))
        .mount(&server)
        .await;

    let patch = MenuPatch { name: Some("Renamed".into()), ..MenuPatch::default() };
    let menu = store(&server, 1_000).update_menu(&id, &patch).await.unwrap();
    assert_eq!(menu.name, "Renamed");
}

#[tokio::test]
async fn update_of_missing_row_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = store(&server, 1_000).update_menu(&new_id(), &MenuPatch::order_only(1)).await;
    assert_eq!(result, Err(StoreError::NotFound));
}

#[tokio::test]
async fn status_codes_are_classified() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(503).set_body_string("service unavailable"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(409).set_body_string("duplicate key"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_string("permission denied"))
        .mount(&server)
        .await;

    let store = store(&server, 1_000);

    let unavailable = store.delete_menu(&new_id()).await.unwrap_err();
    assert!(matches!(unavailable, StoreError::Status { status: 503, .. }));
    assert!(unavailable.is_retryable());

    let owner = new_id();
    let now = chrono::Utc::now();
    let menu = Menu {
        id: new_id(),
        owner_id: owner,
        name: "Guild".into(),
        menu_type: MenuType::Group,
        config: json!({}),
        order: 0,
        is_private: false,
        created_at: now,
        updated_at: now,
    };
    let conflict = store.insert_menu(&menu).await.unwrap_err();
    assert!(matches!(conflict, StoreError::Conflict(ref body) if body == "duplicate key"));
    assert!(!conflict.is_retryable());

    let forbidden = store.list_owned(&owner).await.unwrap_err();
    assert!(matches!(forbidden, StoreError::Status { status: 403, .. }));
    assert!(!forbidden.is_retryable());
}

#[tokio::test]
async fn slow_store_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let err = store(&server, 50).list_owned(&new_id()).await.unwrap_err();
    assert_eq!(err, StoreError::Timeout);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn ping_hits_rest_root() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    assert!(store(&server, 1_000).ping().await.is_ok());
}

#[tokio::test]
async fn unreachable_store_is_transport_error() {
    let server = MockServer::start().await;
    let store = store(&server, 1_000);
    drop(server);

    let err = store.ping().await.unwrap_err();
    assert!(err.is_transport());
}
