use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use santa_api::{AppStateInner, router};
use santa_db::Database;
use santa_draw::{DrawConfig, DrawOrchestrator};
use santa_notify::{ChannelNotifier, LogNotifier};

const ADMIN_TOKEN: &str = "test-admin-token";

fn app() -> Router {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let config = DrawConfig {
        budget: "15 EUR".into(),
        ..DrawConfig::default()
    };
    let orchestrator = DrawOrchestrator::new(Arc::clone(&db), ChannelNotifier::Log(LogNotifier), config);
    router(Arc::new(AppStateInner {
        db,
        orchestrator,
        admin_token: ADMIN_TOKEN.into(),
        admin_telegram_id: Some(101),
    }))
}

async fn call(app: &Router, method: &str, uri: &str, admin: bool, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if admin {
        req = req.header(header::AUTHORIZATION, format!("Bearer {}", ADMIN_TOKEN));
    }
    let req = match body {
        Some(body) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()));
    (status, value)
}

async fn register(app: &Router, telegram_id: i64, name: &str) -> (StatusCode, Value) {
    call(
        app,
        "POST",
        "/participants",
        false,
        Some(json!({
            "telegram_id": telegram_id,
            "username": name.to_lowercase(),
            "first_name": name,
            "full_name": format!("{} Example", name),
            "delivery_info": format!("{} Street 1", name),
            "gift_wishes": "-",
        })),
    )
    .await
}

#[tokio::test]
async fn registration_creates_then_updates() {
    let app = app();

    let (status, body) = register(&app, 101, "Ann").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["is_admin"], true);
    assert!(body["gift_wishes"].is_null());

    let (status, body) = register(&app, 101, "Anna").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["full_name"], "Anna Example");

    let (status, body) = call(&app, "GET", "/admin/participants", true, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["complete"], true);
}

#[tokio::test]
async fn registration_requires_delivery_info() {
    let app = app();
    let (status, body) = call(
        &app,
        "POST",
        "/participants",
        false,
        Some(json!({
            "telegram_id": 7,
            "first_name": "Bo",
            "full_name": "Bo Example",
            "delivery_info": "   ",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("delivery_info"));
}

#[tokio::test]
async fn admin_routes_need_the_token() {
    let app = app();
    let (status, _) = call(&app, "POST", "/admin/draw", false, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .method("GET")
        .uri("/admin/participants")
        .header(header::AUTHORIZATION, "Bearer wrong")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn draw_with_one_participant_is_unprocessable() {
    let app = app();
    register(&app, 101, "Ann").await;

    let (status, body) = call(&app, "POST", "/admin/draw", true, None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("at least 2"));

    let (status, body) = call(&app, "GET", "/admin/assignments", true, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn full_draw_flow() {
    let app = app();
    for (id, name) in [(101, "Ann"), (102, "Bob"), (103, "Cid"), (104, "Dee")] {
        register(&app, id, name).await;
    }

    let (status, _) = call(&app, "GET", "/participants/102/recipient", false, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(&app, "POST", "/admin/draw", true, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["pairs_created"], 4);
    assert_eq!(body["summary"]["delivered"], 4);
    assert_eq!(body["summary"]["failed"], 0);
    let draw_id = body["summary"]["draw_id"].as_str().unwrap().to_string();

    let (_, pairs) = call(&app, "GET", "/admin/assignments", true, None).await;
    let pairs = pairs.as_array().unwrap();
    assert_eq!(pairs.len(), 4);
    for pair in pairs {
        assert_ne!(pair["giver"]["id"], pair["receiver"]["id"]);
    }

    // Participant 102 sees exactly the receiver stored for them.
    let stored = pairs
        .iter()
        .find(|p| p["giver"]["telegram_id"] == 102)
        .unwrap();
    let (status, card) = call(&app, "GET", "/participants/102/recipient", false, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(card["full_name"], stored["receiver"]["full_name"]);
    assert_eq!(card["budget"], "15 EUR");

    let giver_id = stored["giver"]["id"].as_i64().unwrap();
    let (status, single) = call(&app, "GET", &format!("/admin/assignments/{}", giver_id), true, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(single["receiver_id"], stored["receiver_id"]);

    let (status, text) = call(&app, "GET", "/admin/pairs", true, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text.as_str().unwrap().lines().count(), 4);

    let (status, ledger) = call(&app, "GET", &format!("/admin/ledger?draw_id={}", draw_id), true, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ledger.as_array().unwrap().len(), 4);

    // Removing someone who is in the draw is refused until the set is cleared.
    let (status, _) = call(&app, "DELETE", "/admin/participants/104", true, None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call(&app, "DELETE", "/admin/assignments", true, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 4);

    let (status, _) = call(&app, "DELETE", "/admin/participants/104", true, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = call(&app, "POST", "/admin/draw/notify", true, None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call(&app, "POST", "/admin/draw/restart", true, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["pairs_created"], 3);

    let (status, body) = call(&app, "POST", "/admin/draw/notify", true, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["delivered"], 3);
}

#[tokio::test]
async fn budget_is_public() {
    let app = app();
    let (status, body) = call(&app, "GET", "/budget", false, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["budget"], "15 EUR");
}
