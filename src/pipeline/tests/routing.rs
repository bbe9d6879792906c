use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::pipeline::router::pipeline_router;

fn app() -> Router {
    let (service, _, _) = build_service();
    pipeline_router(Arc::new(service))
}

fn request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("body is json")
}

fn actor_json() -> Value {
    json!({ "id": "ana", "role": "seller" })
}

async fn create_lead(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/v1/leads",
            json!({
                "name": "Maria Silva",
                "seller_id": "seller-ana",
                "category": "postgraduate",
                "quoted_price_cents": 99_990,
                "actor": actor_json(),
            }),
        ))
        .await
        .expect("request dispatches");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["status"], "pending");
    body["id"].as_str().expect("lead id present").to_string()
}

#[tokio::test]
async fn lead_creation_returns_the_stored_record() {
    let app = app();
    let lead_id = create_lead(&app).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/leads/{lead_id}"))
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("request dispatches");

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["name"], "Maria Silva");
    assert_eq!(body["quoted_price"], 99_990);
}

#[tokio::test]
async fn unknown_leads_return_not_found() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/api/v1/leads/lead-missing")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("request dispatches");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["error"], "lead not found");
}

#[tokio::test]
async fn status_changes_flow_through_the_transition_rules() {
    let app = app();
    let lead_id = create_lead(&app).await;

    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            &format!("/api/v1/leads/{lead_id}/status"),
            json!({ "target": "contacted", "actor": actor_json() }),
        ))
        .await
        .expect("request dispatches");

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "contacted");

    // A bare flip to converted bypasses settlement and is refused.
    let response = app
        .oneshot(request(
            Method::POST,
            &format!("/api/v1/leads/{lead_id}/status"),
            json!({ "target": "converted", "actor": actor_json() }),
        ))
        .await
        .expect("request dispatches");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn conversion_returns_the_settled_records() {
    let app = app();
    let lead_id = create_lead(&app).await;

    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            &format!("/api/v1/leads/{lead_id}/convert"),
            json!({
                "payment_method_id": "pm-credit-card",
                "installments": 3,
                "actor": actor_json(),
            }),
        ))
        .await
        .expect("request dispatches");

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let number = body["enrollment_number"].as_str().expect("number present");
    assert!(number.starts_with("UC-"));
    assert_eq!(body["ledger_entry"]["fee_amount"], 2_990);
    assert_eq!(body["ledger_entry"]["net_amount"], 97_000);

    // The second attempt conflicts instead of double-billing.
    let response = app
        .oneshot(request(
            Method::POST,
            &format!("/api/v1/leads/{lead_id}/convert"),
            json!({
                "payment_method_id": "pm-credit-card",
                "installments": 3,
                "actor": actor_json(),
            }),
        ))
        .await
        .expect("request dispatches");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn limit_checks_report_the_violated_bound() {
    let app = app();

    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/v1/value-limits/check",
            json!({
                "seller_id": "seller-ana",
                "category": "postgraduate",
                "price_cents": 99_990,
            }),
        ))
        .await
        .expect("request dispatches");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "ok": true }));

    let response = app
        .oneshot(request(
            Method::POST,
            "/api/v1/value-limits/check",
            json!({
                "seller_id": "seller-ana",
                "category": "postgraduate",
                "price_cents": 40_000,
            }),
        ))
        .await
        .expect("request dispatches");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["ok"], false);
    assert_eq!(body["violated_bound"], "min");
    assert_eq!(body["limit_cents"], 59_990);
    assert_eq!(body["offered_cents"], 40_000);
}

#[tokio::test]
async fn enrollment_links_issue_and_consume_once() {
    let app = app();
    let lead_id = create_lead(&app).await;

    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            &format!("/api/v1/leads/{lead_id}/enrollment-link"),
            json!({ "seller_id": "seller-ana", "actor": actor_json() }),
        ))
        .await
        .expect("request dispatches");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let path = body["path"].as_str().expect("path present").to_string();
    assert!(path.starts_with("/matricular/"));

    let response = app
        .clone()
        .oneshot(request(Method::POST, &path, json!({})))
        .await
        .expect("request dispatches");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["lead_id"], lead_id);
    assert!(body["used_at"].is_string());

    let response = app
        .oneshot(request(Method::POST, &path, json!({})))
        .await
        .expect("request dispatches");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn notes_return_no_content() {
    let app = app();
    let lead_id = create_lead(&app).await;

    let response = app
        .oneshot(request(
            Method::POST,
            &format!("/api/v1/leads/{lead_id}/notes"),
            json!({ "text": "asked for the evening class", "actor": actor_json() }),
        ))
        .await
        .expect("request dispatches");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn history_lists_the_audit_trail_oldest_first() {
    let app = app();
    let lead_id = create_lead(&app).await;

    app.clone()
        .oneshot(request(
            Method::POST,
            &format!("/api/v1/leads/{lead_id}/status"),
            json!({ "target": "contacted", "actor": actor_json() }),
        ))
        .await
        .expect("request dispatches");

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/leads/{lead_id}/history"))
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("request dispatches");

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let entries = body.as_array().expect("history is an array");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["action"], "lead created");
    assert_eq!(entries[1]["to"], "contacted");
}
