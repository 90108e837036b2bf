use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use datewise_api::{build_offline_app, build_router, ApiSettings, ApiState, DEFAULT_API_KEY};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    build_offline_app().expect("app should build")
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-api-key", DEFAULT_API_KEY)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["status"], "ok");
    assert_eq!(payload["capabilities"]["language_model"], "rules");
    assert_eq!(payload["metrics"]["requests_total"], 0);
}

#[tokio::test]
async fn validate_requires_api_key() {
    let request = Request::builder()
        .method("POST")
        .uri("/v1/validate")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "city": "Mumbai" }).to_string()))
        .unwrap();

    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(response).await["error"], "unauthorized");
}

#[tokio::test]
async fn validate_corrects_low_budget() {
    let response = app()
        .oneshot(post_json(
            "/v1/validate",
            json!({
                "city": "Mumbai",
                "budget": 100,
                "date_type": "romantic",
                "timing": "Feb 14",
                "reference_date": "2026-02-10"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["city"], "Mumbai");
    assert_eq!(payload["budget"], 500);
    assert_eq!(payload["date_type"], "romantic");
    assert_eq!(payload["resolved_date"], "2026-02-14");
    assert_eq!(payload["warnings"].as_array().unwrap().len(), 1);
    assert_eq!(payload["corrections"][0]["kind"], "budget");
}

#[tokio::test]
async fn validate_substitutes_unknown_city() {
    let response = app()
        .oneshot(post_json(
            "/v1/validate",
            json!({
                "city": "Atlantis",
                "budget": "2000",
                "date_type": "casual",
                "timing": "tomorrow",
                "reference_date": "2026-02-10"
            }),
        ))
        .await
        .unwrap();

    let payload = read_json(response).await;
    assert_eq!(payload["city"], "Bangalore");
    assert_eq!(payload["budget"], 2000);
    assert_eq!(payload["resolved_date"], "2026-02-11");
    let warnings = payload["warnings"].as_array().unwrap();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].as_str().unwrap().contains("Atlantis"));
}

#[tokio::test]
async fn plan_runs_offline_end_to_end() {
    let response = app()
        .oneshot(post_json(
            "/v1/plan",
            json!({
                "text": "Plan a romantic dinner in Mumbai on Feb 14 under ₹3,000",
                "reference_date": "2026-02-10"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let payload = read_json(response).await;

    assert_eq!(payload["request"]["city"], "Mumbai");
    assert_eq!(payload["request"]["budget"], 3000);
    assert_eq!(payload["resolved_date"], "2026-02-14");
    assert_eq!(payload["narrative_fallback"], true);
    assert_eq!(payload["source_failures"].as_array().unwrap().len(), 2);
    let narrative = payload["narrative"].as_str().unwrap();
    assert!(narrative.starts_with("Date plan for Mumbai"));
    assert!(narrative.contains("No venues found"));
}

#[tokio::test]
async fn empty_text_is_unprocessable() {
    let response = app()
        .oneshot(post_json("/v1/plan", json!({ "text": "   " })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json(response).await;
    assert_eq!(payload["error"], "extraction_failed");
    assert!(payload["message"].is_string());
}

#[tokio::test]
async fn cities_lists_default() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/v1/cities")
                .header("x-api-key", DEFAULT_API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["default_city"], "Bangalore");
    let cities = payload["cities"].as_array().unwrap();
    assert!(cities.iter().any(|city| city == "Mumbai"));
}

#[tokio::test]
async fn rate_limit_returns_retry_after() {
    let settings = ApiSettings {
        rate_limit_max: 1,
        ..ApiSettings::default()
    };
    let app = build_router(ApiState::offline(settings).expect("state should build"));

    let first = app
        .clone()
        .oneshot(post_json("/v1/validate", json!({ "city": "Pune" })))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(post_json("/v1/validate", json!({ "city": "Pune" })))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(second.headers().contains_key("retry-after"));
}

#[tokio::test]
async fn rejected_keys_do_not_spend_quota() {
    let settings = ApiSettings {
        rate_limit_max: 1,
        ..ApiSettings::default()
    };
    let app = build_router(ApiState::offline(settings).expect("state should build"));

    for _ in 0..3 {
        let request = Request::builder()
            .method("POST")
            .uri("/v1/validate")
            .header("content-type", "application/json")
            .header("x-api-key", "wrong-key")
            .body(Body::from(json!({ "city": "Pune" }).to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = app
        .oneshot(post_json("/v1/validate", json!({ "city": "Pune" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
