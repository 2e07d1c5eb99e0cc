//! Test helpers for integration tests.
//!
//! Provides an in-process fake of the file API (`FakeFileServer`) and
//! helpers to point a client or browser at it.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use cloudfm::{Config, FileApiClient, FileBrowser, StorageBackend};

/// Modification time reported for every stored file.
pub const FIXED_MOD_TIME: &str = "2024-01-15T10:30:00Z";

/// Uploads whose file name contains this fail with a 500 error envelope.
pub const FAIL_MARKER: &str = "fail";

/// Uploads whose file name contains this get `success: false`.
pub const REJECT_MARKER: &str = "reject";

#[derive(Default)]
struct Inner {
    /// storage -> name -> content
    files: HashMap<String, BTreeMap<String, Vec<u8>>>,
    /// Upload names in arrival order.
    upload_log: Vec<String>,
    fail_list: bool,
    garbage_replies: bool,
    upload_delay: Duration,
}

#[derive(Clone, Default)]
struct AppState {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Deserialize)]
struct StorageQuery {
    storage: Option<String>,
}

/// Resolve the `storage` query parameter the way the real server does.
fn storage_key(query: &StorageQuery) -> Result<String, Response> {
    match query.storage.as_deref().unwrap_or("local") {
        s @ ("local" | "memory") => Ok(s.to_string()),
        other => Err(error_response(
            StatusCode::BAD_REQUEST,
            &format!("invalid storage type: {}", other),
        )),
    }
}

/// A 200 reply whose body is not JSON, as a misconfigured proxy would send.
fn garbage_response() -> Response {
    (
        [(header::CONTENT_TYPE, "text/html")],
        "<html><body>Welcome to nginx!</body></html>",
    )
        .into_response()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({
            "error": status.canonical_reason().unwrap_or("Error"),
            "code": status.as_u16(),
            "message": message,
        })),
    )
        .into_response()
}

async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<StorageQuery>,
) -> Response {
    let storage = match storage_key(&query) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let inner = state.inner.lock().unwrap();
    if inner.fail_list {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "storage unavailable");
    }
    if inner.garbage_replies {
        return garbage_response();
    }

    let files: Vec<Value> = inner
        .files
        .get(&storage)
        .map(|files| {
            files
                .iter()
                .map(|(name, content)| {
                    json!({
                        "Name": name,
                        "size": content.len(),
                        "modTime": FIXED_MOD_TIME,
                        "isDir": false,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    // An empty store encodes as null, like a nil slice.
    if files.is_empty() {
        Json(Value::Null).into_response()
    } else {
        Json(Value::Array(files)).into_response()
    }
}

async fn upload_file(
    State(state): State<AppState>,
    Query(query): Query<StorageQuery>,
    mut multipart: Multipart,
) -> Response {
    let storage = match storage_key(&query) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let mut upload = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        match field.bytes().await {
            Ok(data) => upload = Some((file_name, data.to_vec())),
            Err(_) => {
                return error_response(StatusCode::BAD_REQUEST, "failed to read upload")
            }
        }
    }
    let Some((file_name, data)) = upload else {
        return error_response(StatusCode::BAD_REQUEST, "no file provided");
    };

    let delay = state.inner.lock().unwrap().upload_delay;
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let mut inner = state.inner.lock().unwrap();
    inner.upload_log.push(file_name.clone());
    if inner.garbage_replies {
        return garbage_response();
    }

    if file_name.contains(FAIL_MARKER) {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "disk full");
    }
    if file_name.contains(REJECT_MARKER) {
        return Json(json!({ "success": false, "message": "quota exceeded" })).into_response();
    }

    inner
        .files
        .entry(storage)
        .or_default()
        .insert(file_name.clone(), data);
    Json(json!({
        "success": true,
        "message": "File uploaded successfully",
        "fileName": file_name,
    }))
    .into_response()
}

async fn download_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<StorageQuery>,
) -> Response {
    let storage = match storage_key(&query) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let inner = state.inner.lock().unwrap();
    match inner.files.get(&storage).and_then(|files| files.get(&name)) {
        Some(content) => (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            content.clone(),
        )
            .into_response(),
        None => error_response(StatusCode::NOT_FOUND, "File not found"),
    }
}

async fn delete_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<StorageQuery>,
) -> Response {
    let storage = match storage_key(&query) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let mut inner = state.inner.lock().unwrap();
    let removed = inner
        .files
        .get_mut(&storage)
        .and_then(|files| files.remove(&name));
    match removed {
        Some(_) => Json(json!({ "success": true, "message": "File deleted successfully" }))
            .into_response(),
        None => error_response(StatusCode::NOT_FOUND, "File not found"),
    }
}

/// In-process fake of the file API, bound to an ephemeral port.
pub struct FakeFileServer {
    state: AppState,
    base_url: String,
}

impl FakeFileServer {
    /// Start the server on 127.0.0.1 with an OS-assigned port.
    pub async fn start() -> Self {
        let state = AppState::default();
        let app = Router::new()
            .route("/api/files", get(list_files))
            .route("/api/files/:name", get(download_file).delete(delete_file))
            .route("/api/upload", axum::routing::post(upload_file))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            state,
            base_url: format!("http://{}", addr),
        }
    }

    /// Base URL to configure clients with.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Store a file directly, bypassing the upload route.
    pub fn seed(&self, storage: StorageBackend, name: &str, content: &[u8]) {
        self.state
            .inner
            .lock()
            .unwrap()
            .files
            .entry(storage.as_str().to_string())
            .or_default()
            .insert(name.to_string(), content.to_vec());
    }

    /// Stored file names of a backend, sorted.
    pub fn names(&self, storage: StorageBackend) -> Vec<String> {
        self.state
            .inner
            .lock()
            .unwrap()
            .files
            .get(storage.as_str())
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Stored content of a file.
    pub fn content(&self, storage: StorageBackend, name: &str) -> Option<Vec<u8>> {
        self.state
            .inner
            .lock()
            .unwrap()
            .files
            .get(storage.as_str())
            .and_then(|files| files.get(name).cloned())
    }

    /// Upload names in the order the server received them.
    pub fn upload_log(&self) -> Vec<String> {
        self.state.inner.lock().unwrap().upload_log.clone()
    }

    /// Make `GET /api/files` answer 500.
    pub fn set_fail_list(&self, fail: bool) {
        self.state.inner.lock().unwrap().fail_list = fail;
    }

    /// Make listing and uploading answer 200 with a non-JSON body.
    pub fn set_garbage_replies(&self, garbage: bool) {
        self.state.inner.lock().unwrap().garbage_replies = garbage;
    }

    /// Delay every upload response.
    pub fn set_upload_delay(&self, delay: Duration) {
        self.state.inner.lock().unwrap().upload_delay = delay;
    }
}

/// Create a test configuration pointing at `base_url`.
pub fn test_config(base_url: &str) -> Config {
    let mut config = Config::default();
    config.server.base_url = base_url.to_string();
    config.server.connect_timeout_secs = 2;
    config
}

/// Client for the fake server.
pub fn test_client(server: &FakeFileServer) -> FileApiClient {
    FileApiClient::new(&test_config(server.base_url()).server)
        .expect("Failed to create test client")
}

/// Browser for the fake server.
pub fn test_browser(server: &FakeFileServer) -> FileBrowser {
    FileBrowser::from_config(&test_config(server.base_url()))
        .expect("Failed to create test browser")
}

/// Browser for the fake server with a custom configuration.
pub fn test_browser_with(server: &FakeFileServer, configure: impl FnOnce(&mut Config)) -> FileBrowser {
    let mut config = test_config(server.base_url());
    configure(&mut config);
    FileBrowser::from_config(&config).expect("Failed to create test browser")
}
