use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use profile_config_server::build_router;
use profile_config_server::config::Config;
use profile_config_server::document::DocumentFragment;
use profile_config_server::state::AppState;
use profile_config_server::storage::{DocumentBackend, DocumentStore, RemoteBackend};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

const BIN_ID: &str = "bin-1";
const MASTER_KEY: &str = "secret";

#[derive(Default)]
struct MockBin {
    record: Mutex<Option<Value>>,
    bin_meta_headers: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

struct MockServer {
    base_url: String,
    bin: Arc<MockBin>,
    handle: JoinHandle<()>,
}

impl MockServer {
    async fn start(bin: MockBin) -> Result<Self> {
        let bin = Arc::new(bin);
        let app = Router::new()
            .route("/v3/b/{id}/latest", get(read_bin))
            .route("/v3/b/{id}", put(write_bin))
            .with_state(bin.clone());
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind mock listener")?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(Self {
            base_url: format!("http://{addr}/v3"),
            bin,
            handle,
        })
    }

    fn backend(&self, master_key: &str, timeout_s: u64) -> Result<RemoteBackend> {
        RemoteBackend::new(&self.base_url, BIN_ID, master_key, timeout_s)
    }

    async fn stored(&self) -> Option<Value> {
        self.bin.record.lock().await.clone()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("x-master-key")
        .and_then(|value| value.to_str().ok())
        == Some(MASTER_KEY)
}

async fn read_bin(
    State(bin): State<Arc<MockBin>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Some(delay) = bin.delay {
        tokio::time::sleep(delay).await;
    }
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "invalid master key").into_response();
    }
    if let Some(value) = headers
        .get("x-bin-meta")
        .and_then(|value| value.to_str().ok())
    {
        bin.bin_meta_headers.lock().await.push(value.to_string());
    }
    if id != BIN_ID {
        return (StatusCode::NOT_FOUND, "bin not found").into_response();
    }
    match bin.record.lock().await.clone() {
        Some(record) => Json(record).into_response(),
        None => (StatusCode::NOT_FOUND, "bin not found").into_response(),
    }
}

async fn write_bin(
    State(bin): State<Arc<MockBin>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "invalid master key").into_response();
    }
    if id != BIN_ID {
        return (StatusCode::NOT_FOUND, "bin not found").into_response();
    }
    *bin.record.lock().await = Some(payload.clone());
    Json(json!({ "record": payload, "metadata": { "parentId": BIN_ID } })).into_response()
}

#[tokio::test]
async fn missing_bin_is_seeded_then_merged() -> Result<()> {
    let server = MockServer::start(MockBin::default()).await?;
    let backend = Arc::new(server.backend(MASTER_KEY, 5)?);
    let store = DocumentStore::new(backend, Default::default());

    assert!(store.ensure_initialized().await?);
    let seeded = server.stored().await.context("seed was not written")?;
    assert_eq!(seeded["global_default"], json!("A"));
    assert_eq!(seeded["profiles"]["B"]["age"], json!(30));

    store
        .write(DocumentFragment::client_default("x", "B"))
        .await
        .map_err(|err| err.to_anyhow())?;
    let document = store.read().await.map_err(|err| err.to_anyhow())?;
    assert_eq!(document.resolve_default(Some("x")), Some("B"));
    assert_eq!(document.resolve_default(None), Some("A"));

    let stored = server.stored().await.context("document missing")?;
    assert_eq!(stored["defaults"], json!({ "x": "B" }));
    assert_eq!(stored["profiles"]["A"]["name"], json!("Анна"));

    let meta = server.bin.bin_meta_headers.lock().await.clone();
    assert!(!meta.is_empty());
    assert!(meta.iter().all(|value| value == "false"));
    Ok(())
}

#[tokio::test]
async fn wrapped_record_is_read_transparently() -> Result<()> {
    let bin = MockBin {
        record: Mutex::new(Some(json!({
            "record": { "global_default": "B", "profiles": { "B": { "name": "Мария" } } },
            "metadata": { "id": BIN_ID }
        }))),
        ..MockBin::default()
    };
    let server = MockServer::start(bin).await?;
    let backend = server.backend(MASTER_KEY, 5)?;
    let loaded = backend.load().await?.context("bin should exist")?;
    assert_eq!(loaded["global_default"], json!("B"));
    Ok(())
}

#[tokio::test]
async fn rejected_key_surfaces_as_store_unavailable() -> Result<()> {
    let bin = MockBin {
        record: Mutex::new(Some(json!({ "global_default": "A", "profiles": {} }))),
        ..MockBin::default()
    };
    let server = MockServer::start(bin).await?;
    let backend = Arc::new(server.backend("wrong", 5)?);
    let store = DocumentStore::new(backend.clone(), Default::default());

    let err = store.read().await.err().context("read should fail")?;
    assert_eq!(err.code, "STORE_UNAVAILABLE");
    assert!(err.message.contains("401"));

    let save = backend.save(&json!({ "global_default": "B" })).await;
    assert!(save.is_err());
    let stored = server.stored().await.context("record missing")?;
    assert_eq!(stored["global_default"], json!("A"));
    Ok(())
}

#[tokio::test]
async fn slow_remote_times_out() -> Result<()> {
    let bin = MockBin {
        record: Mutex::new(Some(json!({ "global_default": "A" }))),
        delay: Some(Duration::from_secs(3)),
        ..MockBin::default()
    };
    let server = MockServer::start(bin).await?;
    let backend = server.backend(MASTER_KEY, 1)?;
    assert!(backend.load().await.is_err());
    Ok(())
}

#[tokio::test]
async fn remote_state_has_no_local_default() -> Result<()> {
    let server = MockServer::start(MockBin::default()).await?;
    let dir = tempfile::tempdir()?;
    let mut config = Config::default();
    config.storage.backend = "remote".to_string();
    config.storage.city_log_path = dir.path().join("cities.txt").to_string_lossy().into_owned();
    let backend: Arc<dyn DocumentBackend> = Arc::new(server.backend(MASTER_KEY, 5)?);
    let state = Arc::new(AppState::with_backend(config, backend).await?);

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = build_router(state);
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let client = reqwest::Client::new();
    let response = client
        .get(format!("http://{addr}/local-default"))
        .send()
        .await?;
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    let response = client.get(format!("http://{addr}/config")).send().await?;
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body = response.json::<Value>().await?;
    assert_eq!(body["default"], json!("A"));

    handle.abort();
    Ok(())
}
