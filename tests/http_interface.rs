use std::sync::Arc;

use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use dbinterface::{
    AppState, AuthManager, ConnectionConfig, ConnectionPool, InterfaceService, build_router,
};
use serde_json::{Value, json};
use tower::ServiceExt;

struct TestApp {
    router: axum::Router,
    alice: String,
    bob: String,
}

async fn app_with_pool(pool: ConnectionPool) -> TestApp {
    app_with_users(pool, &["alice", "bob"]).await
}

/// Builds the app and provisions `users` in the given order; each password is
/// `<name>-password`.
async fn app_with_users(pool: ConnectionPool, users: &[&str]) -> TestApp {
    let service = Arc::new(InterfaceService::open(pool.clone()).await.expect("service should open"));
    let auth = Arc::new(
        AuthManager::open(pool, "admin", "adminpass", 4)
            .await
            .expect("admin account"),
    );

    for name in users {
        auth.ensure_user(name, &format!("{}-password", name))
            .await
            .expect("user account");
    }

    let router = build_router(AppState::new(service, auth));
    let alice = login(&router, "alice", "alice-password").await;
    let bob = login(&router, "bob", "bob-password").await;

    TestApp { router, alice, bob }
}

async fn app() -> TestApp {
    app_with_pool(ConnectionPool::in_memory().expect("in-memory pool")).await
}

async fn login(router: &axum::Router, username: &str, password: &str) -> String {
    let (status, body) = send(
        router,
        Method::POST,
        "/api-auth/token",
        None,
        Some(json!({"username": username, "password": password})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body["token"].as_str().expect("token in body").to_string()
}

async fn send(
    router: &axum::Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    payload: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let body = match payload {
        Some(payload) => {
            builder = builder.header("content-type", "application/json");
            Body::from(payload.to_string())
        }
        None => Body::empty(),
    };
    let request = builder.body(body).expect("request should build");

    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("response expected");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body should be readable");

    if body.is_empty() {
        return (status, Value::Null);
    }

    let json = serde_json::from_slice::<Value>(&body).expect("body should be valid JSON");
    (status, json)
}

async fn create_table(app: &TestApp, token: &str, sql: &str) -> (StatusCode, Value) {
    send(
        &app.router,
        Method::POST,
        "/interface",
        Some(token),
        Some(json!({ "sql": sql })),
    )
    .await
}

#[tokio::test]
async fn health_needs_no_token() {
    let app = app().await;
    let (status, body) = send(&app.router, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn create_adds_identity_column_and_records_owner() {
    let app = app().await;

    let (status, entry) = create_table(&app, &app.alice, "CREATE TABLE t (name varchar(20))").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(entry["tname"], "t");
    assert_eq!(entry["sql"], "CREATE TABLE t (name varchar(20))");
    assert_eq!(entry["owner"], 2);

    let (status, attrs) =
        send(&app.router, Method::GET, "/interface/t/attribute", Some(&app.alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let columns = attrs["columns"].as_array().expect("columns");
    assert_eq!(columns.len(), 2);
    assert_eq!(columns[0]["name"], "id");
    assert_eq!(columns[0]["auto_increment"], true);
    assert_eq!(columns[1]["name"], "name");
    assert_eq!(columns[1]["max_length"], 20);
}

#[tokio::test]
async fn explicit_primary_key_is_kept() {
    let app = app().await;

    let (status, _) = create_table(
        &app,
        &app.alice,
        "CREATE TABLE users (id int primary key, name varchar(20))",
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, attrs) =
        send(&app.router, Method::GET, "/interface/users/attribute", Some(&app.alice), None).await;
    let columns = attrs["columns"].as_array().expect("columns");
    assert_eq!(columns.len(), 2);
    assert_eq!(columns[0]["declared_type"], "int");
    assert_eq!(columns[0]["primary_key"], true);
}

#[tokio::test]
async fn bad_bodies_are_parse_errors_and_record_nothing() {
    let app = app().await;

    for payload in [
        json!({"query": "CREATE TABLE t (a int)"}),
        json!({"sql": 5}),
        json!({}),
        json!(["CREATE TABLE t (a int)"]),
        json!({"sql": "DROP TABLE interface_entries"}),
    ] {
        let (status, body) = send(
            &app.router,
            Method::POST,
            "/interface",
            Some(&app.alice),
            Some(payload),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "parse_error");
    }

    let (status, body) =
        send(&app.router, Method::POST, "/interface", Some(&app.alice), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "parse_error");

    let (_, listing) = send(&app.router, Method::GET, "/interface", Some(&app.alice), None).await;
    assert_eq!(listing["count"], 0);
}

#[tokio::test]
async fn store_rejections_are_table_creation_errors() {
    let app = app().await;

    let (status, body) = create_table(&app, &app.alice, "CREATE TABLE broken (a int").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "table_creation_error");

    // The entry was written before the store refused the statement.
    let (_, listing) = send(&app.router, Method::GET, "/interface", Some(&app.alice), None).await;
    assert_eq!(listing["count"], 1);
    assert_eq!(listing["results"][0]["tname"], "broken");
}

#[tokio::test]
async fn requests_without_valid_token_are_rejected() {
    let app = app().await;

    let (status, body) = send(
        &app.router,
        Method::POST,
        "/interface",
        None,
        Some(json!({"sql": "CREATE TABLE t (a int)"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "not_authenticated");

    let (status, _) = send(&app.router, Method::GET, "/interface/t", Some("nope"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app.router,
        Method::POST,
        "/api-auth/token",
        None,
        Some(json!({"username": "alice", "password": "wrong-password"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn revoked_token_stops_working() {
    let app = app().await;

    let (status, _) =
        send(&app.router, Method::DELETE, "/api-auth/token", Some(&app.bob), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app.router, Method::GET, "/interface", Some(&app.bob), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn push_returns_stored_row() {
    let app = app().await;
    create_table(
        &app,
        &app.alice,
        "CREATE TABLE people (name varchar(10) NOT NULL, age INTEGER, active BOOLEAN DEFAULT 1)",
    )
    .await;

    let (status, row) = send(
        &app.router,
        Method::POST,
        "/interface/people",
        Some(&app.alice),
        Some(json!({"name": "Ann", "age": "41"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(row, json!({"id": 1, "name": "Ann", "age": 41, "active": true}));
}

#[tokio::test]
async fn push_validation_errors_list_every_field() {
    let app = app().await;
    create_table(
        &app,
        &app.alice,
        "CREATE TABLE people (name varchar(3) NOT NULL, age INTEGER)",
    )
    .await;

    let (status, body) = send(
        &app.router,
        Method::POST,
        "/interface/people",
        Some(&app.alice),
        Some(json!({"name": "Annabel", "age": "old", "nickname": "A"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
    assert_eq!(
        body["fields"],
        json!({
            "age": ["A valid integer is required."],
            "name": ["Ensure this field has no more than 3 characters."],
            "nickname": ["Unknown column."]
        })
    );

    let (_, page) = send(&app.router, Method::GET, "/interface/people", Some(&app.alice), None).await;
    assert_eq!(page["count"], 0);
}

#[tokio::test]
async fn unique_violations_are_validation_errors() {
    let app = app().await;
    create_table(&app, &app.alice, "CREATE TABLE mail (email TEXT UNIQUE)").await;

    let push = json!({"email": "a@b.c"});
    let (status, _) = send(
        &app.router,
        Method::POST,
        "/interface/mail",
        Some(&app.alice),
        Some(push.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app.router,
        Method::POST,
        "/interface/mail",
        Some(&app.alice),
        Some(push),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["email"][0].as_str().unwrap().contains("UNIQUE"));
}

#[tokio::test]
async fn non_owner_is_denied() {
    let app = app().await;
    create_table(&app, &app.alice, "CREATE TABLE private (v int)").await;

    let (status, body) = send(
        &app.router,
        Method::POST,
        "/interface/private",
        Some(&app.bob),
        Some(json!({"v": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "permission_denied");

    let (status, _) = send(&app.router, Method::GET, "/interface/private", Some(&app.bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app.router,
        Method::GET,
        "/interface/private/attribute",
        Some(&app.bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, page) = send(&app.router, Method::GET, "/interface/private", Some(&app.alice), None).await;
    assert_eq!(page["count"], 0);
}

#[tokio::test]
async fn unknown_table_is_a_server_error() {
    let app = app().await;
    let (status, body) =
        send(&app.router, Method::GET, "/interface/ghost", Some(&app.alice), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "service_error");
}

#[tokio::test]
async fn pull_pages_by_one_hundred() {
    let app = app().await;
    create_table(&app, &app.alice, "CREATE TABLE events (seq int)").await;

    for seq in 0..150 {
        let (status, _) = send(
            &app.router,
            Method::POST,
            "/interface/events",
            Some(&app.alice),
            Some(json!({"seq": seq})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, first) =
        send(&app.router, Method::GET, "/interface/events", Some(&app.alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["count"], 150);
    assert_eq!(first["results"].as_array().unwrap().len(), 100);
    assert_eq!(first["next"], "/interface/events?page=2");
    assert_eq!(first["previous"], Value::Null);

    let (status, second) = send(
        &app.router,
        Method::GET,
        "/interface/events?page=2",
        Some(&app.alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["results"].as_array().unwrap().len(), 50);
    assert_eq!(second["results"][0]["seq"], 100);
    assert_eq!(second["next"], Value::Null);
    assert_eq!(second["previous"], "/interface/events");

    for page in ["3", "0", "abc"] {
        let (status, body) = send(
            &app.router,
            Method::GET,
            &format!("/interface/events?page={}", page),
            Some(&app.alice),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not found: Invalid page.");
    }
}

#[tokio::test]
async fn concurrent_creates_of_one_table_yield_one_table() {
    let app = app().await;
    let sql = "CREATE TABLE shared (v int)";

    let (first, second) = tokio::join!(
        create_table(&app, &app.alice, sql),
        create_table(&app, &app.bob, sql),
    );
    let mut statuses = [first.0, second.0];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::CREATED, StatusCode::INTERNAL_SERVER_ERROR]);

    // Both creates recorded an entry, so lookups for the table now fail.
    let (_, listing) = send(&app.router, Method::GET, "/interface", Some(&app.alice), None).await;
    assert_eq!(listing["count"], 2);

    let (status, _) =
        send(&app.router, Method::GET, "/interface/shared", Some(&app.alice), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn file_backed_store_is_shared_across_connections() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("tables.db");
    let config = ConnectionConfig::new(path.to_str().expect("utf-8 path")).max_connections(4);
    let app = app_with_pool(ConnectionPool::new(config).expect("file pool")).await;

    create_table(&app, &app.alice, "CREATE TABLE notes (body TEXT)").await;

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let router = app.router.clone();
            let token = app.alice.clone();
            tokio::spawn(async move {
                send(
                    &router,
                    Method::POST,
                    "/interface/notes",
                    Some(&token),
                    Some(json!({"body": format!("note {}", i)})),
                )
                .await
            })
        })
        .collect();
    for handle in handles {
        let (status, _) = handle.await.expect("push task should not panic");
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, page) = send(&app.router, Method::GET, "/interface/notes", Some(&app.alice), None).await;
    assert_eq!(page["count"], 8);
}

#[tokio::test]
async fn ownership_survives_restart_whatever_the_registration_order() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("tables.db");
    let pool = || {
        ConnectionPool::new(ConnectionConfig::new(path.to_str().expect("utf-8 path")))
            .expect("file pool")
    };

    {
        let app = app_with_users(pool(), &["alice", "bob"]).await;
        let (status, _) = create_table(&app, &app.alice, "CREATE TABLE secret (v int)").await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = send(
            &app.router,
            Method::POST,
            "/interface/secret",
            Some(&app.alice),
            Some(json!({"v": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    // Second run provisions bob before alice.
    let app = app_with_users(pool(), &["bob", "alice"]).await;

    let (status, _) = send(&app.router, Method::GET, "/interface/secret", Some(&app.bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, page) =
        send(&app.router, Method::GET, "/interface/secret", Some(&app.alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], 1);
}

#[tokio::test]
async fn store_managed_tables_are_not_handed_out() {
    let app = app().await;

    let (status, _) = send(
        &app.router,
        Method::POST,
        "/interface",
        Some(&app.alice),
        Some(json!({"sql": "CREATE TABLE auth_users (username text)"})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, _) = send(
        &app.router,
        Method::GET,
        "/interface/auth_users",
        Some(&app.alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
