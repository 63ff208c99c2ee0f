//! HTTP server for the release watcher.
//!
//! # Endpoints
//!
//! - `POST /release-webhook` - Accepts signed release deliveries
//! - `GET /api/v1/site-state` - Returns the site cells as JSON for rendering
//! - `GET /health` - Returns 200 if server is running

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::http::StatusCode;
use tower_http::trace::TraceLayer;

use crate::source::ArtifactSource;
use crate::store::KeyedStore;
use crate::watcher::ReleaseWatcher;
use crate::webhooks::WebhookSecret;

pub mod state;
pub mod webhook;

pub use state::site_state_handler;
pub use webhook::webhook_handler;

/// Shared application state, passed to handlers via Axum's `State` extractor.
pub struct AppState<S, A> {
    inner: Arc<AppStateInner<S, A>>,
}

struct AppStateInner<S, A> {
    watcher: ReleaseWatcher<S, A>,

    webhook_secret: WebhookSecret,

    /// File that every verified delivery body is appended to, if any.
    webhook_log: Option<PathBuf>,
}

impl<S, A> Clone for AppState<S, A> {
    fn clone(&self) -> Self {
        AppState {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: KeyedStore, A: ArtifactSource> AppState<S, A> {
    pub fn new(
        watcher: ReleaseWatcher<S, A>,
        webhook_secret: WebhookSecret,
        webhook_log: Option<PathBuf>,
    ) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                watcher,
                webhook_secret,
                webhook_log,
            }),
        }
    }

    pub fn watcher(&self) -> &ReleaseWatcher<S, A> {
        &self.inner.watcher
    }

    pub fn webhook_secret(&self) -> &WebhookSecret {
        &self.inner.webhook_secret
    }

    pub fn webhook_log(&self) -> Option<&Path> {
        self.inner.webhook_log.as_deref()
    }
}

async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// Builds the axum Router with all endpoints.
pub fn build_router<S: KeyedStore, A: ArtifactSource>(app_state: AppState<S, A>) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/release-webhook", post(webhook_handler::<S, A>))
        .route("/api/v1/site-state", get(site_state_handler::<S, A>))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::store::MemoryStore;
    use crate::test_utils::{FakeSource, complete_assets, memory_cells};
    use crate::types::ReleaseId;
    use crate::watcher::{ManualScheduler, WatchConfig};

    const SECRET: &str = "test-secret";

    struct TestApp {
        state: AppState<MemoryStore, FakeSource>,
        store: MemoryStore,
        source: FakeSource,
        scheduler: Arc<ManualScheduler>,
        dir: TempDir,
    }

    fn test_app(webhook_log: bool) -> TestApp {
        let (cells, store, dir) = memory_cells();
        let scheduler = Arc::new(ManualScheduler::new());
        let source = FakeSource::new();
        let watcher = ReleaseWatcher::new(
            cells,
            source.clone(),
            scheduler.clone(),
            WatchConfig::new(),
        );
        let log = webhook_log.then(|| dir.path().join("webhook-requests.log"));
        TestApp {
            state: AppState::new(watcher, WebhookSecret::new(SECRET), log),
            store,
            source,
            scheduler,
            dir,
        }
    }

    impl TestApp {
        async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
            let response = build_router(self.state.clone())
                .oneshot(request)
                .await
                .unwrap();
            let status = response.status();
            let body = response.into_body().collect().await.unwrap().to_bytes();
            (status, body.to_vec())
        }

        async fn pending(&self) -> Vec<ReleaseId> {
            self.state.watcher().pending().await.unwrap()
        }
    }

    fn webhook_request(secret: &str, body: &[u8]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/release-webhook")
            .header("content-type", "application/json")
            .header("x-hub-signature-256", WebhookSecret::new(secret).sign(body))
            .body(Body::from(body.to_vec()))
            .unwrap()
    }

    fn release_body(id: u64) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "action": "published",
            "release": { "id": id, "name": "v6.0.5217-CICD-release" },
            "repository": { "name": "nightly-builds" }
        }))
        .unwrap()
    }

    fn json_body(body: &[u8]) -> Value {
        serde_json::from_slice(body).unwrap()
    }

    // ─── Health endpoint ───

    #[tokio::test]
    async fn health_returns_200() {
        let app = test_app(false);

        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = app.send(request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"OK");
    }

    // ─── Webhook endpoint ───

    #[tokio::test]
    async fn new_release_is_registered_and_watched() {
        let app = test_app(false);

        let (status, body) = app.send(webhook_request(SECRET, &release_body(146))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body), json!({ "success": true }));
        assert_eq!(app.pending().await, vec![ReleaseId(146)]);
        assert_eq!(app.scheduler.delays(), vec![Duration::from_secs(900)]);
    }

    #[tokio::test]
    async fn wrong_secret_is_forbidden() {
        let app = test_app(false);

        let (status, body) = app.send(webhook_request("wrong-secret", &release_body(146))).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json_body(&body), json!({ "success": false }));
        assert!(app.pending().await.is_empty());
        assert_eq!(app.scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn missing_signature_is_forbidden() {
        let app = test_app(false);

        let request = Request::builder()
            .method("POST")
            .uri("/release-webhook")
            .body(Body::from(release_body(146)))
            .unwrap();
        let (status, _) = app.send(request).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(app.store.keys().is_empty());
    }

    #[tokio::test]
    async fn repeated_delivery_is_accepted_once() {
        let app = test_app(false);

        for _ in 0..3 {
            let (status, _) = app.send(webhook_request(SECRET, &release_body(146))).await;
            assert_eq!(status, StatusCode::OK);
        }

        assert_eq!(app.pending().await, vec![ReleaseId(146)]);
        assert_eq!(app.scheduler.pending(), 1);
    }

    #[tokio::test]
    async fn delivery_after_finalization_is_ignored() {
        let app = test_app(false);
        app.source.set_assets(complete_assets("6.0.5217"));
        app.send(webhook_request(SECRET, &release_body(146))).await;
        app.scheduler.run_next().await;
        assert!(app.pending().await.is_empty());

        let (status, _) = app.send(webhook_request(SECRET, &release_body(146))).await;

        assert_eq!(status, StatusCode::OK);
        assert!(app.pending().await.is_empty());
        assert_eq!(app.scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn unparsable_body_still_succeeds() {
        let app = test_app(false);

        let (status, body) = app.send(webhook_request(SECRET, b"this is not json")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body), json!({ "success": true }));
        assert!(app.store.keys().is_empty());
    }

    #[tokio::test]
    async fn delivery_without_release_changes_nothing() {
        let app = test_app(false);

        let (status, _) = app.send(webhook_request(SECRET, br#"{"zen": "hello"}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(app.scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn store_outage_asks_for_redelivery() {
        let app = test_app(false);
        app.store.set_unavailable(true);

        let (status, body) = app.send(webhook_request(SECRET, &release_body(146))).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(&body), json!({ "success": false }));

        app.store.set_unavailable(false);
        let (status, _) = app.send(webhook_request(SECRET, &release_body(146))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(app.pending().await, vec![ReleaseId(146)]);
        assert_eq!(app.scheduler.pending(), 1);
    }

    #[tokio::test]
    async fn verified_bodies_are_logged() {
        let app = test_app(true);
        let body = release_body(146);

        app.send(webhook_request(SECRET, &body)).await;
        app.send(webhook_request("wrong-secret", b"forged")).await;

        let log = std::fs::read(app.dir.path().join("webhook-requests.log")).unwrap();
        let mut expected = body.clone();
        expected.push(b'\n');
        assert_eq!(log, expected);
    }

    // ─── Site state endpoint ───

    #[tokio::test]
    async fn site_state_reports_cells() {
        let app = test_app(false);
        app.state.watcher().cells().bootstrap().await.unwrap();
        app.state.watcher().register(ReleaseId(7)).await.unwrap();

        let request = Request::builder()
            .uri("/api/v1/site-state")
            .body(Body::empty())
            .unwrap();
        let (status, body) = app.send(request).await;

        assert_eq!(status, StatusCode::OK);
        let state = json_body(&body);
        assert_eq!(state["latest"]["version"], json!("6.0.5067"));
        assert_eq!(state["current"]["date"], json!("2024-01-13"));
        assert_eq!(
            state["current"]["links"]["appimage"],
            json!("https://subsurface-divelog.org/downloads/Subsurface-v6.0.5054-CICD-release.AppImage")
        );
        assert_eq!(state["pending_releases"], json!([7]));
    }

    #[tokio::test]
    async fn site_state_unavailable_without_store() {
        let app = test_app(false);
        app.store.set_unavailable(true);

        let request = Request::builder()
            .uri("/api/v1/site-state")
            .body(Body::empty())
            .unwrap();
        let (status, _) = app.send(request).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
