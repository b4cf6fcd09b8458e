use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use futures_util::{SinkExt, StreamExt};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use tokio::sync::broadcast;
use tower::ServiceExt;

use orangeslice_server::catalog::mirror::CatalogMirror;
use orangeslice_server::gateway::models::{Association, Entry, Tag};
use orangeslice_server::gateway::{Gateway, MemoryGateway, SnapshotEvent};
use orangeslice_server::server::config::ServerConfig;
use orangeslice_server::web::models::push_models::{CatalogPush, WsMessage};
use orangeslice_server::web::models::Claims;
use orangeslice_server::web::{create_axum_router, AppState};

const JWT_SECRET: &str = "integration-test-secret";

struct TestApp {
    router: Router,
    gateway: Arc<MemoryGateway>,
    mirror: Arc<CatalogMirror>,
    broadcaster: broadcast::Sender<WsMessage>,
}

fn test_app() -> TestApp {
    let gateway = Arc::new(MemoryGateway::new());
    let mirror = Arc::new(CatalogMirror::new());
    let (catalog_broadcaster_tx, _) = broadcast::channel::<WsMessage>(16);
    let broadcaster = catalog_broadcaster_tx.clone();
    let config = Arc::new(ServerConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        gateway_url: None,
        gateway_ws_url: None,
    });
    let state = Arc::new(AppState {
        gateway: gateway.clone(),
        mirror: mirror.clone(),
        catalog_broadcaster_tx,
        config,
    });
    TestApp {
        router: create_axum_router(state),
        gateway,
        mirror,
        broadcaster,
    }
}

fn admin_token() -> String {
    let claims = Claims {
        sub: "admin@example.com".to_string(),
        name: Some("Admin".to_string()),
        exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_ref()),
    )
    .unwrap()
}

fn entry(id: &str, name: &str) -> Entry {
    let now = Utc::now();
    Entry {
        id: id.to_string(),
        name: name.to_string(),
        source_url: "https://example.com/src".to_string(),
        demo_url: "https://example.com/demo".to_string(),
        image_url: "https://example.com/img.png".to_string(),
        created_at: now,
        updated_at: now,
    }
}

fn tag(id: &str, name: &str) -> Tag {
    Tag {
        id: id.to_string(),
        name: name.to_string(),
        color: "#abc".to_string(),
    }
}

fn association(id: &str, entry_id: &str, tag_id: &str) -> Association {
    Association {
        id: id.to_string(),
        entry_id: entry_id.to_string(),
        tag_id: tag_id.to_string(),
    }
}

async fn prime(mirror: &CatalogMirror, entries: Vec<Entry>, tags: Vec<Tag>, assocs: Vec<Association>) {
    mirror.apply(SnapshotEvent::Tags(tags)).await;
    mirror.apply(SnapshotEvent::Associations(assocs)).await;
    mirror.apply(SnapshotEvent::Entries(entries)).await;
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

fn authed_json(method: &str, path: &str, token: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn catalog_reads_are_unavailable_until_the_mirror_is_primed() {
    let app = test_app();
    let response = app.router.clone().oneshot(get("/api/catalog")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    prime(&app.mirror, vec![], vec![], vec![]).await;
    let response = app.router.clone().oneshot(get("/api/catalog")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["totalEntries"], 0);
    assert_eq!(json["entries"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn search_and_tag_filter_derive_the_visible_subset() {
    let app = test_app();
    prime(
        &app.mirror,
        vec![entry("e1", "OrangeSlice"), entry("e2", "Grapefruit")],
        vec![tag("t1", "web"), tag("t2", "cli")],
        vec![
            association("a1", "e1", "t1"),
            association("a2", "e1", "t2"),
            association("a3", "e2", "t1"),
        ],
    )
    .await;

    // Case-insensitive substring search.
    let response = app
        .router
        .clone()
        .oneshot(get("/api/catalog?search=orange"))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["entries"].as_array().unwrap().len(), 1);
    assert_eq!(json["entries"][0]["name"], "OrangeSlice");
    assert_eq!(json["totalEntries"], 2);

    // AND across selected tags.
    let response = app
        .router
        .clone()
        .oneshot(get("/api/catalog?tags=t1,t2"))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["entries"].as_array().unwrap().len(), 1);
    assert_eq!(json["entries"][0]["id"], "e1");

    // Zero matches over a non-empty catalog keeps the total for the client.
    let response = app
        .router
        .clone()
        .oneshot(get("/api/catalog?search=banana"))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["entries"].as_array().unwrap().len(), 0);
    assert_eq!(json["totalEntries"], 2);
}

#[tokio::test]
async fn entry_detail_includes_denormalized_tags() {
    let app = test_app();
    prime(
        &app.mirror,
        vec![entry("e1", "Demo")],
        vec![tag("t1", "web")],
        vec![association("a1", "e1", "t1")],
    )
    .await;

    let response = app
        .router
        .clone()
        .oneshot(get("/api/catalog/e1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["tags"][0]["name"], "web");

    let response = app
        .router
        .clone()
        .oneshot(get("/api/catalog/missing"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_routes_require_a_valid_token() {
    let app = test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/api/admin/entries")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = authed_json("POST", "/api/admin/entries", "not-a-token", serde_json::json!({}));
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_can_create_update_and_delete_entries() {
    let app = test_app();
    let token = admin_token();
    let web_tag = app
        .gateway
        .create_tag(&orangeslice_server::gateway::models::TagFields {
            name: "web".to_string(),
            color: "#fff".to_string(),
        })
        .await
        .unwrap();

    let request = authed_json(
        "POST",
        "/api/admin/entries",
        &token,
        serde_json::json!({
            "name": "Demo",
            "sourceUrl": "https://example.com/src",
            "demoUrl": "https://example.com/demo",
            "imageUrl": "https://example.com/img.png",
            "tagIds": [web_tag.id],
        }),
    );
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let entry_id = created["id"].as_str().unwrap().to_string();

    let associations = app.gateway.list_associations(Some(&entry_id)).await.unwrap();
    assert_eq!(associations.len(), 1);
    assert_eq!(associations[0].tag_id, web_tag.id);

    let request = authed_json(
        "PUT",
        &format!("/api/admin/entries/{entry_id}"),
        &token,
        serde_json::json!({
            "name": "Demo v2",
            "sourceUrl": "https://example.com/src",
            "demoUrl": "https://example.com/demo",
            "imageUrl": "https://example.com/img.png",
            "tagIds": [],
        }),
    );
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(app
        .gateway
        .list_associations(Some(&entry_id))
        .await
        .unwrap()
        .is_empty());

    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/api/admin/entries/{entry_id}"))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(app.gateway.list_entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn blank_required_fields_are_rejected_with_field_name() {
    let app = test_app();
    let token = admin_token();
    let request = authed_json(
        "POST",
        "/api/admin/entries",
        &token,
        serde_json::json!({
            "name": "  ",
            "sourceUrl": "https://example.com/src",
            "demoUrl": "https://example.com/demo",
            "imageUrl": "https://example.com/img.png",
        }),
    );
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("name"));
    assert!(app.gateway.list_entries().await.unwrap().is_empty());
}

type ClientSocket = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Serves the router on an ephemeral port and connects a websocket client
/// to the catalog feed.
async fn connect_catalog_socket(router: Router) -> ClientSocket {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    let (socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws/catalog"))
        .await
        .unwrap();
    socket
}

async fn next_frame(socket: &mut ClientSocket) -> tokio_tungstenite::tungstenite::Message {
    tokio::time::timeout(std::time::Duration::from_secs(5), socket.next())
        .await
        .expect("timed out waiting for a websocket frame")
        .expect("websocket closed unexpectedly")
        .expect("websocket receive error")
}

async fn next_text(socket: &mut ClientSocket) -> String {
    loop {
        if let tokio_tungstenite::tungstenite::Message::Text(text) = next_frame(socket).await {
            return text.to_string();
        }
    }
}

#[tokio::test]
async fn websocket_sends_initial_snapshot_then_pushes_and_answers_pings() {
    use tokio_tungstenite::tungstenite::Message as ClientMessage;

    let app = test_app();
    prime(
        &app.mirror,
        vec![entry("e1", "Demo")],
        vec![tag("t1", "web")],
        vec![association("a1", "e1", "t1")],
    )
    .await;

    let mut socket = connect_catalog_socket(app.router.clone()).await;

    // A primed mirror greets the client with the full enriched catalog.
    let json: serde_json::Value = serde_json::from_str(&next_text(&mut socket).await).unwrap();
    assert_eq!(json["type"], "full_catalog");
    assert_eq!(json["data"]["entries"].as_array().unwrap().len(), 1);
    assert_eq!(json["data"]["entries"][0]["id"], "e1");
    assert_eq!(json["data"]["entries"][0]["tags"][0]["name"], "web");
    assert_eq!(json["data"]["tags"][0]["id"], "t1");

    // Application-level keepalive: a literal "ping" text gets "pong" back.
    socket
        .send(ClientMessage::Text("ping".into()))
        .await
        .unwrap();
    assert_eq!(next_text(&mut socket).await, "pong");

    // Protocol-level ping is answered with a pong frame.
    socket
        .send(ClientMessage::Ping(vec![0x5a].into()))
        .await
        .unwrap();
    loop {
        if let ClientMessage::Pong(_) = next_frame(&mut socket).await {
            break;
        }
    }

    // Server-side broadcasts reach connected clients as full-state pushes.
    app.broadcaster
        .send(WsMessage::FullCatalog(CatalogPush {
            entries: vec![],
            tags: vec![],
        }))
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&next_text(&mut socket).await).unwrap();
    assert_eq!(json["type"], "full_catalog");
    assert_eq!(json["data"]["entries"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn websocket_on_an_unprimed_mirror_waits_for_the_first_broadcast() {
    let app = test_app();
    let mut socket = connect_catalog_socket(app.router.clone()).await;

    // Nothing is sent until a broadcast lands; the keepalive still works,
    // which also proves no initial snapshot preceded it.
    socket
        .send(tokio_tungstenite::tungstenite::Message::Text("ping".into()))
        .await
        .unwrap();
    assert_eq!(next_text(&mut socket).await, "pong");

    app.broadcaster
        .send(WsMessage::FullCatalog(CatalogPush {
            entries: vec![],
            tags: vec![tag("t1", "web")],
        }))
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&next_text(&mut socket).await).unwrap();
    assert_eq!(json["type"], "full_catalog");
    assert_eq!(json["data"]["tags"][0]["name"], "web");
}

#[tokio::test]
async fn me_returns_the_token_subject() {
    let app = test_app();
    let token = admin_token();
    let request = Request::builder()
        .uri("/api/auth/me")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["subject"], "admin@example.com");
}
