use std::fs;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;
use wind_core::{DispatchOptions, FunctionPath, ProgramCache};
use wind_web_api::{AppState, Config, create_router};

fn app(sources: &[(&str, &str)]) -> (TempDir, Router) {
    let dir = tempfile::tempdir().unwrap();
    let cache = ProgramCache::new(dir.path().join("wind"), dir.path().join("windc"));
    for (path, code) in sources {
        let source = cache.source_path(&FunctionPath::from(*path));
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(source, code).unwrap();
    }

    let router = create_router(
        &Config::default(),
        AppState::new(cache, DispatchOptions::default()),
    );
    (dir, router)
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Option<String>, String) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_get_with_query() {
    let (_dir, router) = app(&[("greet", "(return {hello: (request \"name\")})")]);
    let (status, content_type, body) = send(router, get("/?f=greet&name=wind")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/json; charset=utf-8"));
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!({"response": 200, "hello": "wind"})
    );
}

#[tokio::test]
async fn test_path_alias() {
    let (_dir, router) = app(&[("users.list", "(return [1 2 3])")]);
    let (_, _, body) = send(router, get("/users/list")).await;

    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!({"response": 200, "data": [1, 2, 3]})
    );
}

#[tokio::test]
async fn test_post_body_wins_over_query() {
    let (_dir, router) = app(&[("echo.id", "(request \"id\")")]);
    let request = Request::builder()
        .method("POST")
        .uri("/?f=echo.id&id=query")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("id=body"))
        .unwrap();
    let (_, content_type, body) = send(router, request).await;

    assert_eq!(content_type.as_deref(), Some("text/plain; charset=utf-8"));
    assert_eq!(body, "body");
}

#[tokio::test]
async fn test_headers_from_program() {
    let (_dir, router) = app(&[(
        "cached",
        "(header \"Cache-Control\" \"no-store\") (content-type \"text/csv\") (return \"a,b\")",
    )]);
    let response = router.oneshot(get("/?f=cached")).await.unwrap();

    assert_eq!(response.headers().get("cache-control").unwrap(), "no-store");
    assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "text/csv");
}

#[tokio::test]
async fn test_unknown_function() {
    let (_dir, router) = app(&[]);
    let (status, _, body) = send(router, get("/?f=missing")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!({"response": 400, "error": "Function not found: missing"})
    );
}

#[tokio::test]
async fn test_unhandled_fault_is_problem_details() {
    let (_dir, router) = app(&[("broken", "(undefined-op 1)")]);
    let request = Request::builder()
        .uri("/?f=broken")
        .header(header::ACCEPT, "text/html")
        .body(Body::empty())
        .unwrap();
    let (status, content_type, body) = send(router, request).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(content_type.as_deref(), Some("application/problem+json"));

    let problem = serde_json::from_str::<Value>(&body).unwrap();
    assert_eq!(problem["status"], json!(500));
    assert_eq!(problem["instance"], json!("broken"));
    assert_eq!(problem["detail"], json!("\"undefined-op\" is not defined"));
}
