#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use serde_json::Value;
use torre_controle::{
    auth::{AuthService, InMemoryCredentialStore},
    config::AppConfig,
    errors::ServiceError,
    repositories::{InMemoryRecordStore, RecordStore, SectorRepository, UpdateFn},
    AppState,
};
use tower::ServiceExt;

pub const COST_USER: &str = "ana";
pub const COST_PASSWORD: &str = "segredo-custos";

/// Helper harness for driving the full router against a pluggable record store.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub store: Arc<dyn RecordStore>,
    _refresher: tokio::task::JoinHandle<()>,
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::new(
        "sqlite::memory:".to_string(),
        "127.0.0.1".to_string(),
        18_080,
        "test".to_string(),
    );
    cfg.store_backend = "memory".to_string();
    cfg.connect_timeout_ms = 200;
    cfg.data_load_timeout_ms = 300;
    cfg.safety_timeout_ms = 1_000;
    cfg.recent_events_limit = 5;
    cfg
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_store(Arc::new(InMemoryRecordStore::new())).await
    }

    pub async fn with_store(store: Arc<dyn RecordStore>) -> Self {
        let credentials = InMemoryCredentialStore::new();
        credentials
            .insert_user(COST_USER, COST_PASSWORD)
            .expect("seed cost user");

        let state = AppState::new(
            test_config(),
            SectorRepository::new(store.clone()),
            AuthService::new(Arc::new(credentials)),
            false,
        );
        let refresher = state.dashboard.spawn_refresher(&state.events);
        let router = torre_controle::app_router(state.clone());

        Self {
            router,
            state,
            store,
            _refresher: refresher,
        }
    }

    pub async fn seed(&self, key: &str, value: Value) {
        self.store
            .set(key, value.to_string())
            .await
            .expect("seed record");
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

pub async fn response_text(response: Response) -> String {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

/// Store whose every operation fails, as when the backend is down.
pub struct FailingStore;

#[async_trait]
impl RecordStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, ServiceError> {
        Err(ServiceError::storage("connection refused"))
    }

    async fn set(&self, _key: &str, _value: String) -> Result<(), ServiceError> {
        Err(ServiceError::storage("connection refused"))
    }

    async fn remove(&self, _key: &str) -> Result<(), ServiceError> {
        Err(ServiceError::storage("connection refused"))
    }

    async fn list_keys_with_prefix(&self, _prefix: &str) -> Result<Vec<String>, ServiceError> {
        Err(ServiceError::storage("connection refused"))
    }

    async fn update(&self, _key: &str, _f: UpdateFn) -> Result<String, ServiceError> {
        Err(ServiceError::storage("connection refused"))
    }

    async fn ping(&self) -> Result<(), ServiceError> {
        Err(ServiceError::storage("connection refused"))
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

/// In-memory store that stalls every read by `delay`.
pub struct SlowStore {
    inner: InMemoryRecordStore,
    delay: Duration,
}

impl SlowStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: InMemoryRecordStore::new(),
            delay,
        }
    }
}

#[async_trait]
impl RecordStore for SlowStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ServiceError> {
        tokio::time::sleep(self.delay).await;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String) -> Result<(), ServiceError> {
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), ServiceError> {
        self.inner.remove(key).await
    }

    async fn list_keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, ServiceError> {
        tokio::time::sleep(self.delay).await;
        self.inner.list_keys_with_prefix(prefix).await
    }

    async fn update(&self, key: &str, f: UpdateFn) -> Result<String, ServiceError> {
        self.inner.update(key, f).await
    }

    fn backend_name(&self) -> &'static str {
        "slow"
    }
}
