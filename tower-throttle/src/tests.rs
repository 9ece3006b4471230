use axum::Router;
use axum::body::Body;
use axum::http::Method;
use axum::http::Request;
use axum::http::StatusCode;
use axum::http::header;
use axum::response::Response;
use tower::ServiceExt;

use super::*;

const FORM: &str = "application/x-www-form-urlencoded";

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Response) {
    let response = app.clone().oneshot(req).await.unwrap();
    (response.status(), response)
}

async fn reply_of(response: Response) -> Reply {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(path: &str) -> Request<Body> {
    Request::get(path).body(Body::empty()).unwrap()
}

fn post_form(path: &str, body: &str) -> Request<Body> {
    Request::post(path)
        .header(header::CONTENT_TYPE, FORM)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn configured(path: &str, body: &str) -> Router {
    let app = router(AppState::default());
    let (status, _) = send(&app, post_form(path, body)).await;
    assert_eq!(status, StatusCode::OK);
    app
}

#[tokio::test]
async fn test_admission_before_configuration() {
    let app = router(AppState::default());

    let (status, response) = send(&app, get("/leaky-bucket")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let reply = reply_of(response).await;
    assert_eq!(reply.status, Status::Error);
    assert_eq!(
        reply.message,
        "Leaky Bucket not configured. Please configure it first."
    );
    assert_eq!(reply.field("currentSize"), Some(0));

    let (status, response) = send(&app, get("/token-bucket")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let reply = reply_of(response).await;
    assert_eq!(
        reply.message,
        "Token Bucket not configured. Please configure it first."
    );
    assert_eq!(reply.field("currentTokens"), Some(0));
}

#[tokio::test]
async fn test_configuration_validation() {
    let app = router(AppState::default());
    let cases = [
        ("", "Missing 'capacity' or 'leakRate' parameters."),
        (
            "capacity=&leakRate=",
            "Missing 'capacity' or 'leakRate' parameters.",
        ),
        (
            "capacity=invalid&leakRate=invalid",
            "Invalid 'capacity' or 'leakRate' format. Must be numbers.",
        ),
        (
            "capacity=0&leakRate=0",
            "Invalid 'capacity' or 'leakRate' value. Must be valid positive numbers.",
        ),
        (
            "capacity=-5&leakRate=2",
            "Invalid 'capacity' or 'leakRate' value. Must be valid positive numbers.",
        ),
    ];

    for (body, message) in cases {
        let (status, response) = send(&app, post_form("/leaky-bucket", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "for {body:?}");
        let reply = reply_of(response).await;
        assert_eq!(reply.status, Status::Error);
        assert_eq!(reply.message, message);
        assert!(reply.fields.is_empty());
    }

    // Nothing was installed by the failed attempts
    let (status, _) = send(&app, get("/leaky-bucket")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_successful_configuration() {
    let app = router(AppState::default());

    let (status, response) = send(&app, post_form("/leaky-bucket", "capacity=10&leakRate=2")).await;
    assert_eq!(status, StatusCode::OK);
    let reply = reply_of(response).await;
    assert_eq!(reply.status, Status::Success);
    assert_eq!(reply.message, "Leaky Bucket configured successfully.");
    assert_eq!(reply.field("capacity"), Some(10));
    assert_eq!(reply.field("leakRate"), Some(2));

    let (status, response) =
        send(&app, post_form("/token-bucket", "capacity=5&refillRate=1")).await;
    assert_eq!(status, StatusCode::OK);
    let reply = reply_of(response).await;
    assert_eq!(reply.message, "Token Bucket configured successfully.");
    assert_eq!(reply.field("refillRate"), Some(1));
}

#[tokio::test]
async fn test_configuration_from_query_string() {
    let app = router(AppState::default());

    let req = Request::post("/token-bucket?capacity=3&refillRate=1")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let (status, response) = send(&app, get("/token-bucket")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply_of(response).await.field("currentTokens"), Some(2));
}

#[tokio::test]
async fn test_token_bucket_admission() {
    let app = configured("/token-bucket", "capacity=2&refillRate=1").await;

    for expected in [1, 0] {
        let (status, response) = send(&app, get("/token-bucket")).await;
        assert_eq!(status, StatusCode::OK);
        let reply = reply_of(response).await;
        assert_eq!(reply.status, Status::Success);
        assert_eq!(reply.message, "Request processed.");
        assert_eq!(reply.field("currentTokens"), Some(expected));
    }

    let (status, response) = send(&app, get("/token-bucket")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[header::RETRY_AFTER], "1");
    let reply = reply_of(response).await;
    assert_eq!(reply.status, Status::Error);
    assert_eq!(reply.message, "Too Many Requests. Please try again later.");
    assert_eq!(reply.field("currentTokens"), Some(0));
}

#[tokio::test]
async fn test_leaky_bucket_admission() {
    let app = configured("/leaky-bucket", "capacity=2&leakRate=1").await;

    for expected in [1, 2] {
        let (status, response) = send(&app, get("/leaky-bucket")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply_of(response).await.field("currentSize"), Some(expected));
    }

    let (status, response) = send(&app, get("/leaky-bucket")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(reply_of(response).await.field("currentSize"), Some(2));
}

#[tokio::test]
async fn test_reconfiguration_replaces_the_bucket() {
    let app = configured("/token-bucket", "capacity=1&refillRate=1").await;

    let (status, _) = send(&app, get("/token-bucket")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, get("/token-bucket")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let (status, _) = send(&app, post_form("/token-bucket", "capacity=3&refillRate=1")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, response) = send(&app, get("/token-bucket")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply_of(response).await.field("currentTokens"), Some(2));
}

#[tokio::test]
async fn test_buckets_are_independent() {
    let app = configured("/leaky-bucket", "capacity=1&leakRate=1").await;

    let (status, _) = send(&app, get("/leaky-bucket")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, get("/token-bucket")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_shared_state_across_clones() {
    let state = AppState::default();
    let first = router(state.clone());
    let second = router(state);

    let (status, _) = send(&first, post_form("/token-bucket", "capacity=1&refillRate=1")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&second, get("/token-bucket")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&first, get("/token-bucket")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_concurrent_hammer() {
    let capacity = 50;
    let app = configured("/leaky-bucket", "capacity=50&leakRate=1").await;

    let mut handles = vec![];
    for _ in 0..100 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            app.oneshot(get("/leaky-bucket")).await.unwrap().status()
        }));
    }

    let mut granted = 0;
    for handle in handles {
        if handle.await.expect("Task panicked") == StatusCode::OK {
            granted += 1;
        }
    }

    // Leaking one unit per second, the burst can let through at most one extra
    assert!(
        (capacity..=capacity + 1).contains(&granted),
        "granted {granted} of 100"
    );
}

#[tokio::test]
async fn test_cors_preflight() {
    let app = router(AppState::default());

    let req = Request::builder()
        .method(Method::OPTIONS)
        .uri("/token-bucket")
        .header(header::ORIGIN, "http://localhost:5500")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();
    let (status, response) = send(&app, req).await;

    assert_eq!(status, StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "3600");
    let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS]
        .to_str()
        .unwrap();
    for method in ["GET", "POST", "OPTIONS", "HEAD"] {
        assert!(methods.contains(method), "{methods} lacks {method}");
    }
}

#[tokio::test]
async fn test_cors_on_simple_requests() {
    let app = router(AppState::default());

    let req = Request::get("/leaky-bucket")
        .header(header::ORIGIN, "http://localhost:5500")
        .body(Body::empty())
        .unwrap();
    let (_, response) = send(&app, req).await;

    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}
