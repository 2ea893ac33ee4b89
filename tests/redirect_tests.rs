//! End-to-end redirect behavior through the real router, backed by the
//! in-memory store.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use golinks::config::AppConfig;
use golinks::models::Golink;
use golinks::store::memory::MemoryStore;
use golinks::store::GolinkStore;
use golinks::{handlers, AppState};

const CONSOLE_URL: &str = "https://console.test/c/";

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        host: "127.0.0.1".into(),
        port: 0,
        console_url: CONSOLE_URL.into(),
    }
}

fn golink(name: &str, url: &str) -> Golink {
    Golink::new(name.into(), url.into(), vec!["alice@example.com".into()])
}

async fn app_with(golinks: Vec<Golink>) -> (axum::Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    for golink in golinks {
        store.create(&golink).await.expect("seed golink");
    }
    let state = Arc::new(AppState {
        store: store.clone(),
        config: test_config(),
    });
    (handlers::app(state), store)
}

async fn get(app: &axum::Router, uri: &str) -> axum::response::Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

fn location(response: &axum::response::Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("Location header")
        .to_str()
        .unwrap()
}

#[tokio::test]
async fn root_redirects_to_console() {
    let (app, _) = app_with(vec![]).await;

    let response = get(&app, "/").await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(location(&response), CONSOLE_URL);
}

#[tokio::test]
async fn unknown_name_redirects_to_console_create_flow() {
    let (app, _) = app_with(vec![golink("other", "https://x.test")]).await;

    let response = get(&app, "/missing/extra/segments").await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    // Only the first segment names the golink to create.
    assert_eq!(location(&response), "https://console.test/c/missing");
}

#[tokio::test]
async fn resolved_name_redirects_to_target() {
    let (app, _) = app_with(vec![golink("go", "https://example.com/base")]).await;

    let response = get(&app, "/go").await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "https://example.com/base");
}

#[tokio::test]
async fn longest_prefix_wins_over_shorter_names() {
    let (app, _) = app_with(vec![
        golink("a", "https://short.test"),
        golink("a/b/c", "https://long.test"),
    ])
    .await;

    // All three segments of "a/b/c" must match, leaving only "extra".
    let response = get(&app, "/a/b/c/extra").await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "https://long.test/extra");

    // With no longer name available, "a" matches one segment.
    let response = get(&app, "/a/x").await;
    assert_eq!(location(&response), "https://short.test/x");
}

#[tokio::test]
async fn template_expands_remaining_segments() {
    let (app, _) = app_with(vec![golink("go", "https://example.com/{{1}}/{{2}}")]).await;

    let response = get(&app, "/go/foo/bar").await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "https://example.com/foo/bar");
}

#[tokio::test]
async fn template_leaves_unmatched_placeholder_verbatim() {
    let (app, _) = app_with(vec![golink("go", "https://example.com/{{1}}/{{2}}")]).await;

    let response = get(&app, "/go/foo").await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "https://example.com/foo/{{2}}");
}

#[tokio::test]
async fn template_escapes_segment_values() {
    let (app, _) = app_with(vec![golink("go", "https://example.com/{{1}}")]).await;

    let response = get(&app, "/go/foo%20bar").await;
    assert_eq!(location(&response), "https://example.com/foo%20bar");
}

#[tokio::test]
async fn legacy_target_appends_remaining_segments() {
    let (app, _) = app_with(vec![golink("name", "https://example.com/base")]).await;

    let response = get(&app, "/name/extra/seg").await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "https://example.com/base/extra/seg");
}

#[tokio::test]
async fn malformed_stored_target_is_internal_error() {
    // The store can hold a record the validating API would reject, e.g.
    // written before the URL rules tightened.
    let (app, _) = app_with(vec![golink("broken", "not a url at all")]).await;

    let response = get(&app, "/broken").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn redirect_is_counted_in_the_background() {
    let (app, store) = app_with(vec![golink("go", "https://example.com")]).await;

    let response = get(&app, "/go").await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    // The counter task is detached from the request; poll until it lands.
    let mut tries = 0;
    loop {
        let current = store.get("go").await.unwrap().unwrap();
        if current.redirect_count_7days == 1 {
            assert_eq!(current.redirect_count_28days, 1);
            assert_eq!(current.daily_redirect_counts[0], 1);
            break;
        }
        tries += 1;
        assert!(tries < 100, "redirect was never counted");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn health_probe_is_not_a_golink() {
    let (app, _) = app_with(vec![]).await;

    let response = get(&app, "/healthz").await;
    assert_eq!(response.status(), StatusCode::OK);
}
