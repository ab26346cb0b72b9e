//! End-to-end session behavior against a stub FlexNAS server.

use std::sync::Arc;

use flexnas_core::auth::{Authenticator, FileStorage, MemoryStorage, SessionStorage, StorageKey};
use flexnas_core::{Access, ApiClient, ApiError, LoginError, RouteGuard, SessionStore, LOGIN_PATH};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STATUS_BODY: &str = r#"{"cpuUsage": 5.0, "memoryUsage": 30.0, "storageUsage": 40.0, "totalStorage": "100.00GB", "usedStorage": "40.00GB", "freeStorage": "60.00GB", "systemStatus": "healthy"}"#;

async fn mount_login(server: &MockServer, password: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .and(body_json(json!({ "username": "alice", "password": password })))
        .respond_with(response)
        .mount(server)
        .await;
}

/// System status answers only requests carrying `token`; anything else is 401.
async fn mount_protected_status(server: &MockServer, token: &str) {
    Mock::given(method("GET"))
        .and(path("/api/system-status"))
        .and(header("Authorization", format!("Bearer {}", token).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_raw(STATUS_BODY, "application/json"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/system-status"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "msg": "Missing Authorization Header" })))
        .mount(server)
        .await;
}

fn client(server: &MockServer, storage: Arc<dyn SessionStorage>, target: &str) -> ApiClient {
    let session = Arc::new(SessionStore::initialize(storage, target));
    ApiClient::new(&server.uri(), session).expect("Failed to build client")
}

#[tokio::test]
async fn login_success_authenticates_and_persists() {
    let server = MockServer::start().await;
    mount_login(
        &server,
        "correctpw",
        ResponseTemplate::new(200).set_body_json(json!({ "access_token": "tok1", "user": "alice", "role": "admin" })),
    )
    .await;

    let storage = Arc::new(MemoryStorage::new());
    let api = client(&server, storage.clone(), LOGIN_PATH);

    api.login("alice", "correctpw").await.expect("login should succeed");

    assert!(api.session().is_authenticated());
    assert_eq!(storage.get(StorageKey::Token).unwrap().as_deref(), Some("tok1"));
    assert_eq!(storage.get(StorageKey::User).unwrap().as_deref(), Some("alice"));
    assert_eq!(storage.get(StorageKey::Role).unwrap().as_deref(), Some("admin"));
}

#[tokio::test]
async fn login_rejected_with_401_is_invalid_credentials() {
    let server = MockServer::start().await;
    mount_login(
        &server,
        "wrongpw",
        ResponseTemplate::new(401).set_body_json(json!({ "error": "Invalid username or password" })),
    )
    .await;

    let storage = Arc::new(MemoryStorage::new());
    let api = client(&server, storage.clone(), LOGIN_PATH);

    let err = api.login("alice", "wrongpw").await.unwrap_err();

    assert!(matches!(err, LoginError::InvalidCredentials));
    assert!(!api.session().is_authenticated());
    assert!(storage.is_empty());
}

#[tokio::test]
async fn login_without_token_is_malformed_and_changes_nothing() {
    let server = MockServer::start().await;
    mount_login(
        &server,
        "correctpw",
        ResponseTemplate::new(200).set_body_json(json!({ "user": "alice", "role": "admin" })),
    )
    .await;

    let storage = Arc::new(MemoryStorage::new());
    let api = client(&server, storage.clone(), LOGIN_PATH);
    let before = api.session().state();

    let err = api.login("alice", "correctpw").await.unwrap_err();

    assert!(matches!(err, LoginError::MalformedResponse(_)));
    assert_eq!(api.session().state(), before);
    assert!(storage.is_empty());
}

#[tokio::test]
async fn login_server_error_is_reported_as_rejection() {
    let server = MockServer::start().await;
    mount_login(&server, "correctpw", ResponseTemplate::new(503).set_body_string("maintenance")).await;

    let api = client(&server, Arc::new(MemoryStorage::new()), LOGIN_PATH);

    let err = api.login("alice", "correctpw").await.unwrap_err();
    assert!(matches!(err, LoginError::Rejected(ApiError::ServerError(ref body)) if body == "maintenance"));
}

#[tokio::test]
async fn login_against_unreachable_server_is_network_error() {
    // Bind then drop a listener so the port is known to be closed
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let session = Arc::new(SessionStore::initialize(Arc::new(MemoryStorage::new()), LOGIN_PATH));
    let api = ApiClient::new(&format!("http://{}", addr), session).unwrap();

    let err = api.authenticate("alice", "correctpw").await.unwrap_err();
    assert!(matches!(err, LoginError::Network(_)));
}

#[tokio::test]
async fn requests_carry_token_only_while_logged_in() {
    let server = MockServer::start().await;
    mount_login(
        &server,
        "correctpw",
        ResponseTemplate::new(200).set_body_json(json!({ "access_token": "tok1" })),
    )
    .await;
    mount_protected_status(&server, "tok1").await;

    let api = client(&server, Arc::new(MemoryStorage::new()), LOGIN_PATH);

    let err = api.fetch_system_status().await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));

    api.login("alice", "correctpw").await.unwrap();
    let status = api.fetch_system_status().await.expect("authorized request should succeed");
    assert!(status.is_healthy());

    api.logout();
    let err = api.fetch_system_status().await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
}

#[tokio::test]
async fn restored_token_is_attached_without_login() {
    let server = MockServer::start().await;
    mount_protected_status(&server, "persisted").await;

    let storage = Arc::new(MemoryStorage::new());
    storage.set(StorageKey::Token, "persisted").unwrap();
    let api = client(&server, storage, "/");

    assert!(api.session().is_authenticated());
    api.fetch_system_status().await.expect("restored token should be sent");
}

#[tokio::test]
async fn login_view_discards_persisted_token() {
    let server = MockServer::start().await;
    mount_protected_status(&server, "persisted").await;

    let storage = Arc::new(MemoryStorage::new());
    storage.set(StorageKey::Token, "persisted").unwrap();
    storage.set(StorageKey::Role, "admin").unwrap();
    let api = client(&server, storage.clone(), LOGIN_PATH);

    assert!(!api.session().is_authenticated());
    assert!(storage.is_empty());
    assert!(matches!(api.fetch_system_status().await, Err(ApiError::Unauthorized)));
}

#[tokio::test]
async fn login_then_reload_restores_session_from_disk() {
    let server = MockServer::start().await;
    mount_login(
        &server,
        "correctpw",
        ResponseTemplate::new(200).set_body_json(json!({ "access_token": "tok1", "user": "alice" })),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let api = client(&server, Arc::new(FileStorage::new(dir.path())), LOGIN_PATH);
    api.login("alice", "correctpw").await.unwrap();
    drop(api);

    let reloaded = SessionStore::initialize(Arc::new(FileStorage::new(dir.path())), "/storage");
    assert!(reloaded.is_authenticated());
    assert_eq!(reloaded.token().as_deref(), Some("tok1"));
    assert_eq!(reloaded.username().as_deref(), Some("alice"));
    assert_eq!(reloaded.role(), None);
}

#[tokio::test]
async fn logout_twice_is_a_no_op() {
    let server = MockServer::start().await;
    mount_login(
        &server,
        "correctpw",
        ResponseTemplate::new(200).set_body_json(json!({ "access_token": "tok1", "user": "alice", "role": "admin" })),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(FileStorage::new(dir.path()));
    let api = client(&server, storage.clone(), LOGIN_PATH);
    api.login("alice", "correctpw").await.unwrap();
    assert!(storage.path().exists());

    api.logout();
    assert!(!api.session().is_authenticated());
    assert!(!storage.path().exists());

    api.logout();
    assert!(!api.session().is_authenticated());
    assert_eq!(storage.get(StorageKey::Token).unwrap(), None);
}

#[tokio::test]
async fn guard_admits_after_login() {
    let server = MockServer::start().await;
    mount_login(
        &server,
        "correctpw",
        ResponseTemplate::new(200).set_body_json(json!({ "access_token": "tok1" })),
    )
    .await;

    let api = client(&server, Arc::new(MemoryStorage::new()), LOGIN_PATH);
    let guard = RouteGuard::new(api.session().clone());
    assert_eq!(guard.check("/storage"), Access::Redirect(LOGIN_PATH));

    api.login("alice", "correctpw").await.unwrap();
    assert_eq!(guard.check("/storage"), Access::Allow);
}
