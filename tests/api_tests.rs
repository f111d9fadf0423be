/// End-to-end tests driving the full router against an in-memory database
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempo_api::{config::ServerConfig, context::AppContext, server};
use tower::ServiceExt;

async fn test_app() -> Router {
    let (app, _) = test_app_with_context().await;
    app
}

async fn test_app_with_context() -> (Router, AppContext) {
    let ctx = AppContext::in_memory(ServerConfig::default()).await.unwrap();
    (server::build_router(ctx.clone()), ctx)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    token: Option<&str>,
) -> (StatusCode, Option<String>, Value) {
    let mut builder = Request::builder().method(method).uri(uri);

    if body.is_some() {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
    }
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    let request = builder
        .body(match body {
            Some(value) => Body::from(value.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(
            String::from_utf8_lossy(&bytes).to_string(),
        ))
    };

    (status, cookie, body)
}

fn cookie_token(cookie: &str) -> String {
    let value = cookie.split(';').next().unwrap();
    value.split_once('=').unwrap().1.to_string()
}

async fn signup(app: &Router, email: &str, password: &str) -> String {
    let (status, cookie, _) = send(
        app,
        "POST",
        "/api/account",
        Some(json!({
            "company": "Test Co",
            "email": email,
            "password": password,
            "firstName": "Ada",
            "lastName": "Lovelace",
        })),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    cookie_token(&cookie.expect("signup sets a session cookie"))
}

#[tokio::test]
async fn ping_allows_get_only() {
    let app = test_app().await;

    let (status, _, body) = send(&app, "GET", "/_ping", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".to_string()));

    let (status, _, body) = send(&app, "POST", "/_ping", None, None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["code"], "MethodNotAllowed");
}

#[tokio::test]
async fn unknown_route_renders_envelope() {
    let app = test_app().await;

    let (status, _, body) = send(&app, "GET", "/api/nowhere", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], "NotFound");
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let app = test_app().await;

    let (status, _, body) = send(&app, "GET", "/api/profile", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "MissingToken");
}

#[tokio::test]
async fn login_validation_envelope() {
    let app = test_app().await;

    let (status, _, body) = send(
        &app,
        "POST",
        "/api/auth/login",
        Some(json!({"email": "not-an-email", "password": "password"})),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], "InvalidEmail");
    assert_eq!(body["detail"]["field"], "email");
}

#[tokio::test]
async fn signup_login_and_profile() {
    let app = test_app().await;
    signup(&app, "a@b.com", "password").await;

    let (status, cookie, body) = send(
        &app,
        "POST",
        "/api/auth/login",
        Some(json!({"email": "a@b.com", "password": "password"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["company"], "Test Co");

    let token = cookie_token(&cookie.expect("login sets a session cookie"));

    let (status, _, body) = send(&app, "GET", "/api/profile", None, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "a@b.com");
    assert_eq!(body["data"]["firstName"], "Ada");

    // Logout invalidates the token
    let (status, _, _) = send(&app, "POST", "/api/auth/logout", None, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) = send(&app, "GET", "/api/profile", None, Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "ProfileNotFound");
}

#[tokio::test]
async fn repeated_failures_lock_the_profile() {
    let app = test_app().await;
    signup(&app, "a@b.com", "password").await;

    for _ in 0..5 {
        let (status, _, body) = send(
            &app,
            "POST",
            "/api/auth/login",
            Some(json!({"email": "a@b.com", "password": "wrong-pass"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "IncorrectPassword");
    }

    // Sixth attempt is rejected by the lock, wrong password or not
    let (status, _, body) = send(
        &app,
        "POST",
        "/api/auth/login",
        Some(json!({"email": "a@b.com", "password": "wrong-pass"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "ProfileLocked");

    let (status, _, body) = send(
        &app,
        "POST",
        "/api/auth/login",
        Some(json!({"email": "a@b.com", "password": "password"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "ProfileLocked");
}

#[tokio::test]
async fn add_user_rejects_existing_member() {
    let app = test_app().await;
    let token = signup(&app, "owner@b.com", "password").await;

    let (status, _, body) = send(
        &app,
        "POST",
        "/api/account/user",
        Some(json!({
            "email": "member@b.com",
            "firstName": "Grace",
            "lastName": "Hopper",
            "role": "user",
        })),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "member@b.com");

    let (status, _, body) = send(
        &app,
        "POST",
        "/api/account/user",
        Some(json!({
            "email": "member@b.com",
            "firstName": "Grace",
            "lastName": "Hopper",
            "role": "user",
        })),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "EmailExistsInAccount");
}

#[tokio::test]
async fn timesheet_week_round_trip() {
    let app = test_app().await;
    let token = signup(&app, "a@b.com", "password").await;

    let (status, _, body) = send(
        &app,
        "POST",
        "/api/client",
        Some(json!({"name": "Acme"})),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let client_id = body["data"]["id"].as_i64().unwrap();

    let (status, _, body) = send(
        &app,
        "POST",
        "/api/task",
        Some(json!({"name": "Development", "billable": true, "rate": 100.0})),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let task_id = body["data"]["id"].as_i64().unwrap();

    let (status, _, body) = send(
        &app,
        "POST",
        "/api/client/project",
        Some(json!({
            "clientId": client_id,
            "name": "Website",
            "active": true,
            "tasks": [{"taskId": task_id, "rate": 100.0, "billable": true, "active": true}],
        })),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let project_id = body["data"]["id"].as_i64().unwrap();

    // 2019-01-07 is a Monday; the default week start is Monday
    let (status, _, _) = send(
        &app,
        "PUT",
        "/api/time",
        Some(json!({
            "entries": [
                {"day": "2019-01-07", "hours": 4.0, "projectId": project_id, "taskId": task_id},
                {"day": "2019-01-08", "hours": 2.5, "projectId": project_id, "taskId": task_id},
            ],
        })),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) = send(&app, "GET", "/api/time/week/2019-01-07", None, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["start"], "2019-01-07");
    assert_eq!(body["data"]["end"], "2019-01-13");

    let entries = body["data"]["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["day"], "2019-01-07");
    assert_eq!(entries[0]["hours"], 4.0);
    assert_eq!(entries[0]["clientName"], "Acme");
    assert_eq!(entries[1]["hours"], 2.5);

    // Overwriting a day keeps one row per key
    let (status, _, _) = send(
        &app,
        "PUT",
        "/api/time",
        Some(json!({
            "entries": [
                {"day": "2019-01-07", "hours": 8.0, "projectId": project_id, "taskId": task_id},
            ],
        })),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, _, body) = send(&app, "GET", "/api/time/week/2019-01-07", None, Some(&token)).await;
    let entries = body["data"]["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["hours"], 8.0);
}

#[tokio::test]
async fn delete_project_week_without_entries_is_client_error() {
    let app = test_app().await;
    let token = signup(&app, "a@b.com", "password").await;

    let (status, _, body) = send(
        &app,
        "DELETE",
        "/api/time/project/week",
        Some(json!({
            "startDate": "2019-01-07",
            "endDate": "2019-01-13",
            "projectId": 1,
            "taskId": 1,
        })),
        Some(&token),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "InvalidField");
}

#[tokio::test]
async fn report_requires_from_parameter() {
    let app = test_app().await;
    let token = signup(&app, "a@b.com", "password").await;

    let (status, _, body) = send(&app, "GET", "/api/report/time/client", None, Some(&token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "InvalidField");
    assert_eq!(body["detail"]["field"], "from");

    let (status, _, body) = send(
        &app,
        "GET",
        "/api/report/time/project?from=2019-01-01&to=2019-01-31",
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn csv_export_sets_content_disposition() {
    let app = test_app().await;
    let token = signup(&app, "a@b.com", "password").await;

    let request = Request::builder()
        .method("GET")
        .uri("/api/report/time/export/client?from=2019-01-01&to=2019-01-31")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap();
    assert_eq!(content_type, "text/csv");

    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap();
    assert_eq!(
        disposition,
        "attachment;filename=export_Test-Co_2019-01-01_to_2019-01-31.csv"
    );

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.starts_with("Client Name,Non-Billable Hours,Billable Hours,Billable Total"));
}

#[tokio::test]
async fn invited_member_setup_and_role_gate() {
    let (app, ctx) = test_app_with_context().await;
    let owner_token = signup(&app, "owner@b.com", "password").await;

    let (status, _, _) = send(
        &app,
        "POST",
        "/api/account/user",
        Some(json!({
            "email": "member@b.com",
            "firstName": "Grace",
            "lastName": "Hopper",
            "role": "user",
        })),
        Some(&owner_token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Invited members cannot log in before completing setup
    let (status, _, body) = send(
        &app,
        "POST",
        "/api/auth/login",
        Some(json!({"email": "member@b.com", "password": "password"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "ProfileInactive");

    // The setup token travels by email; read it back the way the link carries it
    let invite_token: String = sqlx::query_scalar(
        "SELECT forgot_password_token FROM profile WHERE email = 'member@b.com'",
    )
    .fetch_one(&ctx.db)
    .await
    .unwrap();

    let (status, _, _) = send(
        &app,
        "PUT",
        "/api/auth/setup",
        Some(json!({"token": invite_token, "password": "chosen-password"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, cookie, _) = send(
        &app,
        "POST",
        "/api/auth/login",
        Some(json!({"email": "member@b.com", "password": "chosen-password"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let member_token = cookie_token(&cookie.unwrap());

    // Plain members are not admins
    let (status, _, body) = send(&app, "GET", "/api/account", None, Some(&member_token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "NotAuthorized");

    // The owner keeps admin access
    let (status, _, _) = send(&app, "GET", "/api/account", None, Some(&owner_token)).await;
    assert_eq!(status, StatusCode::OK);
}
