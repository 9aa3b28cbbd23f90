use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tower::ServiceExt; // for `oneshot`

use streamsign::api::{build_router, state::AppState};
use streamsign::cache::{DEFAULT_CACHE_TTL, MemoryCache, UrlCache};
use streamsign::config::Config;
use streamsign::signer::Signer;
use streamsign::stream::{GatewaySettings, StreamService, signature_param};
use streamsign::upstream::{MediaSourceInfo, PlaybackInfo, PlaybackInfoSource, ResolveError};

/// In-process stand-in for the Emby `PlaybackInfo` endpoint
struct MockEmby {
    paths: HashMap<String, String>,
    delay: Duration,
    calls: AtomicUsize,
}

impl MockEmby {
    fn new(delay: Duration) -> Self {
        let mut paths = HashMap::new();
        paths.insert("42".to_string(), "/mnt/x/movie.mkv".to_string());
        paths.insert("77".to_string(), "/srv/elsewhere/clip.mkv".to_string());
        Self {
            paths,
            delay,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PlaybackInfoSource for MockEmby {
    async fn playback_info(
        &self,
        item_id: &str,
        media_source_id: &str,
    ) -> streamsign::upstream::Result<PlaybackInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;

        let path = self.paths.get(item_id).ok_or(ResolveError::Status(500))?;
        Ok(PlaybackInfo {
            media_sources: vec![MediaSourceInfo {
                id: media_source_id.to_string(),
                path: path.clone(),
            }],
        })
    }
}

/// Creates a minimal config for testing
fn create_test_config() -> Config {
    let config_toml = r#"
encipher = "integration-secret"
play_url_max_alive_secs = 21600

[[backends]]
name = "A"
url = "https://a"
path = "/mnt/x"
    "#;

    toml::from_str(config_toml).expect("Failed to parse test config")
}

struct TestApp {
    router: Router,
    emby: Arc<MockEmby>,
    cache: Arc<MemoryCache>,
}

fn build_test_app(delay: Duration) -> TestApp {
    let config = create_test_config();
    let emby = Arc::new(MockEmby::new(delay));
    let cache = Arc::new(MemoryCache::new(DEFAULT_CACHE_TTL));

    let service = StreamService::builder()
        .settings(GatewaySettings::from_config(&config).unwrap())
        .cache(cache.clone())
        .source(emby.clone())
        .build();

    TestApp {
        router: build_router(AppState::new(Arc::new(service))),
        emby,
        cache,
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("GET")
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

fn location(response: &axum::response::Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("missing Location header")
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_stream_redirects_to_signed_backend_url() {
    let app = build_test_app(Duration::ZERO);
    let before = chrono::Utc::now().timestamp();

    let response = app
        .router
        .oneshot(get("/stream/42?MediaSourceId=s1"))
        .await
        .unwrap();
    let after = chrono::Utc::now().timestamp();

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = location(&response);
    assert!(
        location.starts_with("https://a?path=movie.mkv&signature="),
        "unexpected location: {location}"
    );

    let token = signature_param(&location).unwrap();
    let payload = Signer::new("integration-secret").unwrap().decrypt(&token).unwrap();
    assert_eq!(payload.item_id, "42");
    assert_eq!(payload.media_source_id, "s1");
    assert!((before + 21600..=after + 21600).contains(&payload.expire_at));

    assert_eq!(app.cache.get("42:s1").await, Some(location));
}

#[tokio::test]
async fn test_second_request_uses_cache() {
    let app = build_test_app(Duration::ZERO);

    let first = app
        .router
        .clone()
        .oneshot(get("/stream/42?MediaSourceId=s1"))
        .await
        .unwrap();
    let second = app
        .router
        .oneshot(get("/stream/42?MediaSourceId=s1"))
        .await
        .unwrap();

    assert_eq!(second.status(), StatusCode::FOUND);
    assert_eq!(location(&first), location(&second));
    assert_eq!(app.emby.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_media_source_id_is_bad_request() {
    let app = build_test_app(Duration::ZERO);

    let response = app.router.oneshot(get("/stream/42")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "BAD_REQUEST");
    assert_eq!(body["message"], "Missing itemID or MediaSourceId");
    assert_eq!(app.emby.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_media_source_id_is_bad_request() {
    let app = build_test_app(Duration::ZERO);

    let response = app
        .router
        .oneshot(get("/stream/42?MediaSourceId="))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unrouted_path_is_internal_error_and_not_cached() {
    let app = build_test_app(Duration::ZERO);

    let response = app
        .router
        .oneshot(get("/stream/77?MediaSourceId=s1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["code"], "NO_BACKEND_MATCH");
    assert_eq!(app.cache.len(), 0);
}

#[tokio::test]
async fn test_upstream_failure_is_bad_gateway() {
    let app = build_test_app(Duration::ZERO);

    let response = app
        .router
        .oneshot(get("/stream/404?MediaSourceId=s1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await;
    assert_eq!(body["code"], "UPSTREAM_ERROR");
}

#[tokio::test]
async fn test_concurrent_requests_share_one_upstream_call() {
    let app = build_test_app(Duration::from_millis(100));

    let requests = (0..10).map(|_| {
        let router = app.router.clone();
        tokio::spawn(async move {
            router
                .oneshot(get("/stream/42?MediaSourceId=s1"))
                .await
                .unwrap()
        })
    });

    for handle in requests.collect::<Vec<_>>() {
        let response = handle.await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
    }

    assert_eq!(app.emby.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cors_preflight() {
    let app = build_test_app(Duration::ZERO);

    let request = Request::builder()
        .uri("/stream/42")
        .method("OPTIONS")
        .header(header::ORIGIN, "https://player.example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = build_test_app(Duration::ZERO);

    let response = app.router.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let health = json_body(response).await;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["backends"], 1);
    assert_eq!(health["cached_urls"], 0);
    assert!(health.get("version").is_some());
    assert!(health["metrics"].is_object());
}
