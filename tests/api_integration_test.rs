use anyhow::Result;
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use reclaim_backend::config::AppConfig;
use reclaim_backend::entities::{items, prelude::*};
use reclaim_backend::infrastructure::database;
use reclaim_backend::services::ai_search::AiSearchClient;
use reclaim_backend::services::google::GoogleVerifier;
use reclaim_backend::services::mailer::Mailer;
use reclaim_backend::services::storage::StorageService;
use reclaim_backend::ws::hub::ChatHub;
use reclaim_backend::{AppState, create_app};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

struct MockStorageService {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MockStorageService {
    fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn upload_image(&self, key: &str, data: Vec<u8>, _content_type: &str) -> Result<String> {
        self.files.lock().unwrap().insert(key.to_string(), data);
        Ok(format!("https://cdn.test/{key}"))
    }

    async fn delete_file(&self, key: &str) -> Result<()> {
        self.files.lock().unwrap().remove(key);
        Ok(())
    }

    async fn file_exists(&self, key: &str) -> Result<bool> {
        Ok(self.files.lock().unwrap().contains_key(key))
    }
}

/// Captures outbound mail so notification behavior can be asserted.
#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string()));
        Ok(())
    }
}

async fn setup_test_db() -> DatabaseConnection {
    unsafe {
        std::env::set_var("DATABASE_URL", "sqlite::memory:");
    }
    let db = sea_orm::Database::connect("sqlite::memory:").await.unwrap();
    database::run_migrations(&db).await.unwrap();
    db
}

struct TestApp {
    app: Router,
    db: DatabaseConnection,
    mailer: Arc<RecordingMailer>,
}

async fn setup_app() -> TestApp {
    let db = setup_test_db().await;
    let mailer = Arc::new(RecordingMailer::default());
    let config = AppConfig::default();

    let state = AppState {
        db: db.clone(),
        storage: Arc::new(MockStorageService::new()),
        mailer: mailer.clone(),
        google: Arc::new(GoogleVerifier::new(None)),
        ai: Arc::new(AiSearchClient::new(None, "gemini-flash-latest".to_string())),
        hub: Arc::new(ChatHub::new()),
        config,
    };

    TestApp {
        app: create_app(state),
        db,
        mailer,
    }
}

async fn request(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

/// Register a user and return (token, user_id).
async fn register_user(app: &Router, name: &str, email: &str) -> (String, String) {
    let (status, body) = request(
        app,
        json_request(
            "POST",
            "/auth/register",
            None,
            json!({ "name": name, "email": email, "password": "hunter22" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    (
        body["token"].as_str().unwrap().to_string(),
        body["user"]["id"].as_str().unwrap().to_string(),
    )
}

fn item_payload(item_type: &str, title: &str, category: &str, area: &str) -> Value {
    json!({
        "type": item_type,
        "title": title,
        "category": category,
        "area": area,
        "lat": 52.52,
        "lng": 13.405,
        "images": [],
    })
}

async fn create_item(app: &Router, token: &str, payload: Value) -> Value {
    let (status, body) = request(app, json_request("POST", "/items", Some(token), payload)).await;
    assert_eq!(status, StatusCode::CREATED, "create item failed: {body}");
    body
}

async fn promote_to_role(db: &DatabaseConnection, user_id: &str, role: &str) {
    let user = Users::find_by_id(user_id).one(db).await.unwrap().unwrap();
    let mut active: reclaim_backend::entities::users::ActiveModel = user.into();
    active.role = Set(role.to_string());
    active.update(db).await.unwrap();
}

#[tokio::test]
async fn health_returns_ok() {
    let t = setup_app().await;
    let (status, body) = request(&t.app, get_request("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn register_login_me_roundtrip() {
    let t = setup_app().await;
    let (token, user_id) = register_user(&t.app, "Alice", "alice@example.com").await;

    // Duplicate email is a conflict, not a second account.
    let (status, _) = request(
        &t.app,
        json_request(
            "POST",
            "/auth/register",
            None,
            json!({ "name": "Alice2", "email": "ALICE@example.com", "password": "hunter22" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = request(
        &t.app,
        json_request(
            "POST",
            "/auth/login",
            None,
            json!({ "email": "alice@example.com", "password": "hunter22" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].as_str().is_some());

    let (status, body) = request(&t.app, get_request("/auth/me", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], user_id.as_str());

    let (status, _) = request(
        &t.app,
        json_request(
            "POST",
            "/auth/login",
            None,
            json!({ "email": "alice@example.com", "password": "wrong" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn matching_is_reciprocal_for_identical_point_and_category() {
    let t = setup_app().await;
    let (t1, _) = register_user(&t.app, "Finder", "finder@example.com").await;
    let (t2, _) = register_user(&t.app, "Loser", "loser@example.com").await;

    let found = create_item(
        &t.app,
        &t1,
        item_payload("found", "Black iPhone", "Electronics", "Central Park"),
    )
    .await;
    let lost = create_item(
        &t.app,
        &t2,
        item_payload("lost", "iPhone 13", "Electronics", "Central Park"),
    )
    .await;

    let (status, matches) = request(
        &t.app,
        get_request(&format!("/items/{}/matches", lost["id"].as_str().unwrap()), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = matches
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["item"]["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&found["id"].as_str().unwrap()));

    let (status, matches) = request(
        &t.app,
        get_request(
            &format!("/items/{}/matches", found["id"].as_str().unwrap()),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = matches
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["item"]["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&lost["id"].as_str().unwrap()));
}

#[tokio::test]
async fn different_categories_never_match() {
    let t = setup_app().await;
    let (t1, _) = register_user(&t.app, "Finder", "finder@example.com").await;
    let (t2, _) = register_user(&t.app, "Loser", "loser@example.com").await;

    create_item(
        &t.app,
        &t1,
        item_payload("found", "Black iPhone", "Electronics", "Central Park"),
    )
    .await;
    let lost = create_item(
        &t.app,
        &t2,
        item_payload("lost", "House keys", "Keys", "Central Park"),
    )
    .await;

    let (status, matches) = request(
        &t.app,
        get_request(&format!("/items/{}/matches", lost["id"].as_str().unwrap()), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(matches.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn higher_scoring_match_ranks_first() {
    let t = setup_app().await;
    let (t1, _) = register_user(&t.app, "Owner", "owner@example.com").await;
    let (t2, _) = register_user(&t.app, "Other", "other@example.com").await;

    // Same area: category + locality, score 4.
    let strong = create_item(
        &t.app,
        &t1,
        item_payload("found", "Phone near fountain", "Electronics", "Central Park"),
    )
    .await;
    // Different area but within radius: category only, score 2.
    let mut weak_payload = item_payload("found", "Phone at station", "Electronics", "Midtown");
    weak_payload["lat"] = json!(52.53);
    weak_payload["lng"] = json!(13.405);
    let weak = create_item(&t.app, &t1, weak_payload).await;

    let lost = create_item(
        &t.app,
        &t2,
        item_payload("lost", "My phone", "Electronics", "Central Park"),
    )
    .await;

    let (status, matches) = request(
        &t.app,
        get_request(&format!("/items/{}/matches", lost["id"].as_str().unwrap()), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let matches = matches.as_array().unwrap().clone();
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0]["item"]["id"], strong["id"]);
    assert!(matches[0]["match_score"].as_i64().unwrap() >= 4);
    assert_eq!(matches[1]["item"]["id"], weak["id"]);
}

#[tokio::test]
async fn matches_for_unknown_item_is_not_found() {
    let t = setup_app().await;
    let (status, _) = request(&t.app, get_request("/items/nope/matches", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn duplicate_claim_conflicts() {
    let t = setup_app().await;
    let (t1, _) = register_user(&t.app, "Finder", "finder@example.com").await;
    let (t2, _) = register_user(&t.app, "Claimant", "claimant@example.com").await;

    let item = create_item(
        &t.app,
        &t1,
        item_payload("found", "Wallet", "Accessories", "Downtown"),
    )
    .await;
    let item_id = item["id"].as_str().unwrap();

    let (status, _) = request(
        &t.app,
        json_request(
            "POST",
            "/claims",
            Some(&t2),
            json!({ "item_id": item_id, "message": "It has my id card inside" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Second create for the same (item, claimant): conflict, no second row.
    let (status, body) = request(
        &t.app,
        json_request(
            "POST",
            "/claims",
            Some(&t2),
            json!({ "item_id": item_id, "message": "again" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("already claimed"));

    let count = Claims::find().all(&t.db).await.unwrap().len();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn claim_approval_cascades_and_is_idempotent() {
    let t = setup_app().await;
    let (owner, _) = register_user(&t.app, "Finder", "finder@example.com").await;
    let (c1, _) = register_user(&t.app, "Claimant1", "c1@example.com").await;
    let (c2, _) = register_user(&t.app, "Claimant2", "c2@example.com").await;

    let item = create_item(
        &t.app,
        &owner,
        item_payload("found", "Wallet", "Accessories", "Downtown"),
    )
    .await;
    let item_id = item["id"].as_str().unwrap();

    let (_, claim1) = request(
        &t.app,
        json_request("POST", "/claims", Some(&c1), json!({ "item_id": item_id })),
    )
    .await;
    let (_, claim2) = request(
        &t.app,
        json_request("POST", "/claims", Some(&c2), json!({ "item_id": item_id })),
    )
    .await;

    let claim1_id = claim1["id"].as_str().unwrap();
    let (status, body) = request(
        &t.app,
        json_request(
            "PUT",
            &format!("/claims/{claim1_id}"),
            Some(&owner),
            json!({ "status": "approved" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "approve failed: {body}");
    assert_eq!(body["status"], "approved");
    assert!(body["resolved_at"].as_str().is_some());

    let stored = Items::find_by_id(item_id).one(&t.db).await.unwrap().unwrap();
    assert_eq!(stored.status, "claimed");

    // Re-approving the same claim is a no-op.
    let (status, _) = request(
        &t.app,
        json_request(
            "PUT",
            &format!("/claims/{claim1_id}"),
            Some(&owner),
            json!({ "status": "approved" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Approving another pending claim on the already-claimed item does not
    // error and leaves the item claimed.
    let claim2_id = claim2["id"].as_str().unwrap();
    let (status, _) = request(
        &t.app,
        json_request(
            "PUT",
            &format!("/claims/{claim2_id}"),
            Some(&owner),
            json!({ "status": "approved" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let stored = Items::find_by_id(item_id).one(&t.db).await.unwrap().unwrap();
    assert_eq!(stored.status, "claimed");
}

#[tokio::test]
async fn claim_review_requires_owner_or_admin() {
    let t = setup_app().await;
    let (owner, _) = register_user(&t.app, "Finder", "finder@example.com").await;
    let (claimant, _) = register_user(&t.app, "Claimant", "claimant@example.com").await;
    let (bystander, bystander_id) =
        register_user(&t.app, "Bystander", "bystander@example.com").await;

    let item = create_item(
        &t.app,
        &owner,
        item_payload("found", "Wallet", "Accessories", "Downtown"),
    )
    .await;
    let (_, claim) = request(
        &t.app,
        json_request(
            "POST",
            "/claims",
            Some(&claimant),
            json!({ "item_id": item["id"] }),
        ),
    )
    .await;
    let claim_id = claim["id"].as_str().unwrap();

    // Neither the owner nor an admin: forbidden.
    let (status, _) = request(
        &t.app,
        json_request(
            "PUT",
            &format!("/claims/{claim_id}"),
            Some(&bystander),
            json!({ "status": "approved" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The same user as admin: allowed.
    promote_to_role(&t.db, &bystander_id, "admin").await;
    let (status, _) = request(
        &t.app,
        json_request(
            "PUT",
            &format!("/claims/{claim_id}"),
            Some(&bystander),
            json!({ "status": "rejected" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn claim_message_mutable_only_while_pending() {
    let t = setup_app().await;
    let (owner, _) = register_user(&t.app, "Finder", "finder@example.com").await;
    let (claimant, _) = register_user(&t.app, "Claimant", "claimant@example.com").await;

    let item = create_item(
        &t.app,
        &owner,
        item_payload("found", "Wallet", "Accessories", "Downtown"),
    )
    .await;
    let (_, claim) = request(
        &t.app,
        json_request(
            "POST",
            "/claims",
            Some(&claimant),
            json!({ "item_id": item["id"], "message": "v1" }),
        ),
    )
    .await;
    let claim_id = claim["id"].as_str().unwrap();

    // Pending: edit allowed for the claimant only.
    let (status, body) = request(
        &t.app,
        json_request(
            "PUT",
            &format!("/claims/{claim_id}/message"),
            Some(&claimant),
            json!({ "message": "v2" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "v2");

    let (status, _) = request(
        &t.app,
        json_request(
            "PUT",
            &format!("/claims/{claim_id}/message"),
            Some(&owner),
            json!({ "message": "hijack" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Approve, then edits become policy violations.
    let (status, _) = request(
        &t.app,
        json_request(
            "PUT",
            &format!("/claims/{claim_id}"),
            Some(&owner),
            json!({ "status": "approved" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = request(
        &t.app,
        json_request(
            "PUT",
            &format!("/claims/{claim_id}/message"),
            Some(&claimant),
            json!({ "message": "v3" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Delete is likewise pending-only.
    let (status, _) = request(
        &t.app,
        Request::builder()
            .method("DELETE")
            .uri(format!("/claims/{claim_id}"))
            .header("Authorization", format!("Bearer {claimant}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn claim_listing_is_reviewer_scoped() {
    let t = setup_app().await;
    let (owner, _) = register_user(&t.app, "Finder", "finder@example.com").await;
    let (claimant, _) = register_user(&t.app, "Claimant", "claimant@example.com").await;
    let (other, _) = register_user(&t.app, "Other", "other@example.com").await;

    let item = create_item(
        &t.app,
        &owner,
        item_payload("found", "Wallet", "Accessories", "Downtown"),
    )
    .await;
    request(
        &t.app,
        json_request(
            "POST",
            "/claims",
            Some(&claimant),
            json!({ "item_id": item["id"] }),
        ),
    )
    .await;

    let (_, body) = request(&t.app, get_request("/claims", Some(&owner))).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    // A user with no items under review sees nothing.
    let (_, body) = request(&t.app, get_request("/claims", Some(&other))).await;
    assert!(body.as_array().unwrap().is_empty());

    // The claimant sees it under their own view.
    let (_, body) = request(&t.app, get_request("/claims/user/me", Some(&claimant))).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn chat_find_or_create_is_idempotent() {
    let t = setup_app().await;
    let (owner, _) = register_user(&t.app, "Finder", "finder@example.com").await;
    let (visitor, _) = register_user(&t.app, "Visitor", "visitor@example.com").await;

    let item = create_item(
        &t.app,
        &owner,
        item_payload("found", "Wallet", "Accessories", "Downtown"),
    )
    .await;

    let (status, chat1) = request(
        &t.app,
        json_request("POST", "/chats", Some(&visitor), json!({ "item_id": item["id"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, chat2) = request(
        &t.app,
        json_request("POST", "/chats", Some(&visitor), json!({ "item_id": item["id"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(chat1["id"], chat2["id"]);

    // The owner opening "the same" chat also lands on the existing one.
    let (status, chat3) = request(
        &t.app,
        json_request("POST", "/chats", Some(&owner), json!({ "item_id": item["id"] })),
    )
    .await;
    // The owner cannot chat on their own item, so this is rejected.
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(chat3["error"].as_str().is_some());
}

#[tokio::test]
async fn chat_read_flags_and_access_control() {
    let t = setup_app().await;
    let (owner, _owner_id) = register_user(&t.app, "Finder", "finder@example.com").await;
    let (visitor, visitor_id) = register_user(&t.app, "Visitor", "visitor@example.com").await;
    let (stranger, _) = register_user(&t.app, "Stranger", "stranger@example.com").await;

    let item = create_item(
        &t.app,
        &owner,
        item_payload("found", "Wallet", "Accessories", "Downtown"),
    )
    .await;
    let (_, chat) = request(
        &t.app,
        json_request("POST", "/chats", Some(&visitor), json!({ "item_id": item["id"] })),
    )
    .await;
    let chat_id = chat["id"].as_str().unwrap();

    // Persist a message from the visitor (the websocket path funnels into
    // the same service call).
    reclaim_backend::services::chat::append_message(&t.db, chat_id, &visitor_id, "hi there")
        .await
        .unwrap();

    // Owner has unread mail; visitor does not (own messages don't count).
    let (_, body) = request(&t.app, get_request("/chats/unread", Some(&owner))).await;
    assert_eq!(body["has_unread"], true);
    let (_, body) = request(&t.app, get_request("/chats/unread", Some(&visitor))).await;
    assert_eq!(body["has_unread"], false);

    // A non-participant cannot read the chat.
    let (status, _) = request(
        &t.app,
        get_request(&format!("/chats/{chat_id}"), Some(&stranger)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The owner reads it and marks it read.
    let (status, body) = request(
        &t.app,
        get_request(&format!("/chats/{chat_id}"), Some(&owner)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["messages"].as_array().unwrap().len(), 1);

    let (status, _) = request(
        &t.app,
        json_request(
            "PUT",
            &format!("/chats/{chat_id}/read"),
            Some(&owner),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = request(&t.app, get_request("/chats/unread", Some(&owner))).await;
    assert_eq!(body["has_unread"], false);
}

#[tokio::test]
async fn votes_are_tri_state() {
    let t = setup_app().await;
    let (owner, _) = register_user(&t.app, "Owner", "owner@example.com").await;
    let (voter, _) = register_user(&t.app, "Voter", "voter@example.com").await;

    let item = create_item(
        &t.app,
        &owner,
        item_payload("found", "Wallet", "Accessories", "Downtown"),
    )
    .await;
    let uri = format!("/items/{}/vote", item["id"].as_str().unwrap());

    let (_, body) = request(
        &t.app,
        json_request("POST", &uri, Some(&voter), json!({ "direction": "up" })),
    )
    .await;
    assert_eq!(body["upvotes"], 1);
    assert_eq!(body["downvotes"], 0);
    assert_eq!(body["my_vote"], "up");

    // Switching direction moves the single row, never double-counts.
    let (_, body) = request(
        &t.app,
        json_request("POST", &uri, Some(&voter), json!({ "direction": "down" })),
    )
    .await;
    assert_eq!(body["upvotes"], 0);
    assert_eq!(body["downvotes"], 1);
    assert_eq!(body["my_vote"], "down");

    let (_, body) = request(
        &t.app,
        json_request("POST", &uri, Some(&voter), json!({ "direction": "none" })),
    )
    .await;
    assert_eq!(body["upvotes"], 0);
    assert_eq!(body["downvotes"], 0);
    assert!(body["my_vote"].is_null());

    let (status, _) = request(
        &t.app,
        json_request("POST", &uri, Some(&voter), json!({ "direction": "sideways" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn comments_enforce_length_and_are_listed_newest_first() {
    let t = setup_app().await;
    let (owner, _) = register_user(&t.app, "Owner", "owner@example.com").await;

    let item = create_item(
        &t.app,
        &owner,
        item_payload("found", "Wallet", "Accessories", "Downtown"),
    )
    .await;
    let uri = format!("/items/{}/comments", item["id"].as_str().unwrap());

    let (status, _) = request(
        &t.app,
        json_request("POST", &uri, Some(&owner), json!({ "content": "x".repeat(1001) })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = request(
        &t.app,
        json_request("POST", &uri, Some(&owner), json!({ "content": "Seen near gate 3" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user_name"], "Owner");

    let (status, body) = request(&t.app, get_request(&uri, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn item_listing_filters() {
    let t = setup_app().await;
    let (owner, _) = register_user(&t.app, "Owner", "owner@example.com").await;

    create_item(
        &t.app,
        &owner,
        item_payload("found", "Red umbrella", "Accessories", "Harbor"),
    )
    .await;
    create_item(
        &t.app,
        &owner,
        item_payload("lost", "Blue bicycle", "Other", "Harbor"),
    )
    .await;

    let (_, body) = request(&t.app, get_request("/items?type=lost", None)).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (_, body) = request(&t.app, get_request("/items?search=umbrella", None)).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (_, body) = request(&t.app, get_request("/items?search=UMBRELLA", None)).await;
    assert_eq!(body.as_array().unwrap().len(), 1, "search is case-insensitive");

    let (_, body) = request(&t.app, get_request("/items?location=harbor", None)).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    // Proximity filter keeps both (same point), tight radius elsewhere drops both.
    let (_, body) = request(
        &t.app,
        get_request("/items?lat=52.52&lng=13.405&radius=1", None),
    )
    .await;
    assert_eq!(body.as_array().unwrap().len(), 2);
    let (_, body) = request(
        &t.app,
        get_request("/items?lat=48.1&lng=11.5&radius=1", None),
    )
    .await;
    assert!(body.as_array().unwrap().is_empty());

    let (status, _) = request(&t.app, get_request("/items?box=not-a-box", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn item_creation_notifies_counterpart_owners() {
    let t = setup_app().await;
    let (finder, _) = register_user(&t.app, "Finder", "finder@example.com").await;
    let (loser, _) = register_user(&t.app, "Loser", "loser@example.com").await;

    create_item(
        &t.app,
        &finder,
        item_payload("found", "Black iPhone", "Electronics", "Central Park"),
    )
    .await;

    // Let the found item's (matchless) notification pass drain before the
    // counterpart exists, so it cannot observe the lost item.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    create_item(
        &t.app,
        &loser,
        item_payload("lost", "iPhone 13", "Electronics", "Central Park"),
    )
    .await;

    // The trigger runs detached; give it a moment.
    let mut recipients = Vec::new();
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        recipients = t.mailer.sent.lock().unwrap().clone();
        if !recipients.is_empty() {
            break;
        }
    }

    assert_eq!(recipients.len(), 1, "exactly one counterpart owner notified");
    assert_eq!(recipients[0].0, "finder@example.com");
    assert!(recipients[0].1.contains("possible match"));
}

#[tokio::test]
async fn ai_search_degrades_without_provider() {
    let t = setup_app().await;
    let (owner, _) = register_user(&t.app, "Owner", "owner@example.com").await;
    create_item(
        &t.app,
        &owner,
        item_payload("found", "Red wallet", "Accessories", "Central Park"),
    )
    .await;

    let (status, body) = request(
        &t.app,
        json_request("POST", "/ai/search", None, json!({ "query": "red wallet" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["filters"]["search"], "red wallet");
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert!(body["message"].as_str().is_some());
}

#[tokio::test]
async fn admin_endpoints_require_role() {
    let t = setup_app().await;
    let (user, user_id) = register_user(&t.app, "Plain", "plain@example.com").await;

    let (status, _) = request(&t.app, get_request("/admin/stats", Some(&user))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    promote_to_role(&t.db, &user_id, "admin").await;
    let (status, body) = request(&t.app, get_request("/admin/stats", Some(&user))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_users"], 1);

    // Role management stays with super admins.
    let (_other, other_id) = register_user(&t.app, "Other", "other@example.com").await;
    let (status, _) = request(
        &t.app,
        json_request(
            "PUT",
            &format!("/admin/users/{other_id}/role"),
            Some(&user),
            json!({ "role": "admin" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    promote_to_role(&t.db, &user_id, "super_admin").await;
    let (status, _) = request(
        &t.app,
        json_request(
            "PUT",
            &format!("/admin/users/{other_id}/role"),
            Some(&user),
            json!({ "role": "admin" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn item_status_never_regresses() {
    let t = setup_app().await;
    let (owner, _) = register_user(&t.app, "Owner", "owner@example.com").await;

    let item = create_item(
        &t.app,
        &owner,
        item_payload("found", "Wallet", "Accessories", "Downtown"),
    )
    .await;
    let uri = format!("/items/{}/status", item["id"].as_str().unwrap());

    let (status, body) = request(
        &t.app,
        json_request("PUT", &uri, Some(&owner), json!({ "status": "resolved" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "resolved");

    let (status, _) = request(
        &t.app,
        json_request("PUT", &uri, Some(&owner), json!({ "status": "open" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn items_require_auth_to_create() {
    let t = setup_app().await;
    let (status, _) = request(
        &t.app,
        json_request(
            "POST",
            "/items",
            None,
            item_payload("found", "Wallet", "Accessories", "Downtown"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_item_rejects_unknown_disposition() {
    let t = setup_app().await;
    let (owner, _) = register_user(&t.app, "Owner", "owner@example.com").await;
    let (status, _) = request(
        &t.app,
        json_request(
            "POST",
            "/items",
            Some(&owner),
            item_payload("misplaced", "Wallet", "Accessories", "Downtown"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn claims_on_settled_items_are_rejected() {
    let t = setup_app().await;
    let (owner, _) = register_user(&t.app, "Owner", "owner@example.com").await;
    let (claimant, _) = register_user(&t.app, "Claimant", "claimant@example.com").await;

    let item = create_item(
        &t.app,
        &owner,
        item_payload("found", "Wallet", "Accessories", "Downtown"),
    )
    .await;
    let item_id = item["id"].as_str().unwrap().to_string();

    // Force the item into a terminal state directly.
    let stored = Items::find_by_id(&item_id).one(&t.db).await.unwrap().unwrap();
    let mut active: items::ActiveModel = stored.into();
    active.status = Set("retrieved".to_string());
    active.update(&t.db).await.unwrap();

    let (status, _) = request(
        &t.app,
        json_request("POST", "/claims", Some(&claimant), json!({ "item_id": item_id })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
