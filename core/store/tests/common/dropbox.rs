//! Emulated Dropbox v2 files API.
//!
//! Like the real service, upload and create_folder create missing parent
//! folders, endpoint failures are HTTP 409 with a `.tag` union body, and
//! list_folder rejects `/` as the root path.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::AuthState;

/// Stored nodes keyed by path; `None` marks a folder.
type Nodes = BTreeMap<String, Option<Vec<u8>>>;

pub struct DropboxEmulator {
    pub auth: Arc<AuthState>,
    nodes: Mutex<Nodes>,
    page_size: usize,
    full: AtomicBool,
    /// Number of list_folder and list_folder/continue requests served.
    pub list_calls: AtomicUsize,
}

impl DropboxEmulator {
    pub fn new(auth: Arc<AuthState>, page_size: usize) -> Arc<Self> {
        Arc::new(Self {
            auth,
            nodes: Mutex::new(BTreeMap::new()),
            page_size,
            full: AtomicBool::new(false),
            list_calls: AtomicUsize::new(0),
        })
    }

    /// Report every write as exceeding the account quota.
    pub fn set_full(&self, full: bool) {
        self.full.store(full, Ordering::SeqCst);
    }

    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route("/2/files/download", post(download))
            .route("/2/files/upload", post(upload))
            .route("/2/files/create_folder", post(create_folder))
            .route("/2/files/delete", post(delete))
            .route("/2/files/list_folder", post(list_folder))
            .route("/2/files/list_folder/continue", post(list_folder_continue))
            .with_state(self.clone())
    }
}

fn endpoint_error(error: Value) -> Response {
    let summary = format!("{}/", error[".tag"].as_str().unwrap_or("other"));
    (
        StatusCode::CONFLICT,
        Json(json!({ "error_summary": summary, "error": error })),
    )
        .into_response()
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error_summary": "invalid_access_token/",
            "error": {".tag": "invalid_access_token"}
        })),
    )
        .into_response()
}

fn bad_input(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, message.to_string()).into_response()
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

fn name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn is_folder(nodes: &Nodes, path: &str) -> bool {
    path.is_empty() || matches!(nodes.get(path), Some(None))
}

/// Create the missing ancestors of `path`. Fails if one of them is a file.
fn create_ancestors(nodes: &mut Nodes, path: &str) -> bool {
    let parent = parent_of(path);
    if parent.is_empty() {
        return true;
    }
    match nodes.get(parent) {
        Some(None) => true,
        Some(Some(_)) => false,
        None => {
            if !create_ancestors(nodes, parent) {
                return false;
            }
            nodes.insert(parent.to_string(), None);
            true
        }
    }
}

fn entry_json(path: &str, node: &Option<Vec<u8>>) -> Value {
    match node {
        None => json!({".tag": "folder", "name": name_of(path), "path_display": path}),
        Some(data) => json!({
            ".tag": "file",
            "name": name_of(path),
            "path_display": path,
            "size": data.len(),
        }),
    }
}

fn api_arg(headers: &HeaderMap) -> Option<Value> {
    let raw = headers.get("Dropbox-API-Arg")?.to_str().ok()?;
    serde_json::from_str(raw).ok()
}

async fn download(State(dbx): State<Arc<DropboxEmulator>>, headers: HeaderMap) -> Response {
    if !dbx.auth.check(&headers) {
        return unauthorized();
    }
    let Some(arg) = api_arg(&headers) else {
        return bad_input("Error in call to API function \"files/download\": missing Dropbox-API-Arg");
    };
    let path = arg["path"].as_str().unwrap_or_default();

    let nodes = dbx.nodes.lock().unwrap();
    match nodes.get(path) {
        Some(Some(data)) => (StatusCode::OK, data.clone()).into_response(),
        Some(None) => endpoint_error(json!({".tag": "path", "path": {".tag": "not_file"}})),
        None => endpoint_error(json!({".tag": "path", "path": {".tag": "not_found"}})),
    }
}

async fn upload(State(dbx): State<Arc<DropboxEmulator>>, headers: HeaderMap, body: Bytes) -> Response {
    if !dbx.auth.check(&headers) {
        return unauthorized();
    }
    let Some(arg) = api_arg(&headers) else {
        return bad_input("Error in call to API function \"files/upload\": missing Dropbox-API-Arg");
    };
    if arg["mode"].as_str() != Some("add") {
        return bad_input("Error in call to API function \"files/upload\": unexpected mode");
    }
    let path = arg["path"].as_str().unwrap_or_default().to_string();
    let upload_error = |reason: Value| {
        endpoint_error(json!({".tag": "path", "reason": reason, "upload_session_id": "emulated"}))
    };

    if !path.starts_with('/') {
        return upload_error(json!({".tag": "malformed_path"}));
    }
    if dbx.full.load(Ordering::SeqCst) {
        return upload_error(json!({".tag": "insufficient_space"}));
    }

    let mut nodes = dbx.nodes.lock().unwrap();
    if nodes.contains_key(&path) || !create_ancestors(&mut nodes, &path) {
        return upload_error(json!({".tag": "conflict", "conflict": {".tag": "file"}}));
    }
    let size = body.len();
    nodes.insert(path.clone(), Some(body.to_vec()));

    Json(json!({"name": name_of(&path), "path_display": path, "size": size})).into_response()
}

async fn create_folder(
    State(dbx): State<Arc<DropboxEmulator>>,
    headers: HeaderMap,
    Json(arg): Json<Value>,
) -> Response {
    if !dbx.auth.check(&headers) {
        return unauthorized();
    }
    let path = arg["path"].as_str().unwrap_or_default().to_string();
    if !path.starts_with('/') {
        return endpoint_error(json!({".tag": "path", "path": {".tag": "malformed_path"}}));
    }
    if dbx.full.load(Ordering::SeqCst) {
        return endpoint_error(json!({".tag": "path", "path": {".tag": "insufficient_space"}}));
    }

    let mut nodes = dbx.nodes.lock().unwrap();
    if nodes.contains_key(&path) || !create_ancestors(&mut nodes, &path) {
        return endpoint_error(
            json!({".tag": "path", "path": {".tag": "conflict", "conflict": {".tag": "folder"}}}),
        );
    }
    nodes.insert(path.clone(), None);

    Json(json!({"name": name_of(&path), "path_display": path})).into_response()
}

async fn delete(
    State(dbx): State<Arc<DropboxEmulator>>,
    headers: HeaderMap,
    Json(arg): Json<Value>,
) -> Response {
    if !dbx.auth.check(&headers) {
        return unauthorized();
    }
    let path = arg["path"].as_str().unwrap_or_default().to_string();
    if path.is_empty() {
        return endpoint_error(json!({".tag": "path_write", "path_write": {".tag": "disallowed_name"}}));
    }

    let mut nodes = dbx.nodes.lock().unwrap();
    let Some(node) = nodes.remove(&path) else {
        return endpoint_error(json!({".tag": "path_lookup", "path_lookup": {".tag": "not_found"}}));
    };
    let prefix = format!("{}/", path);
    nodes.retain(|key, _| !key.starts_with(&prefix));

    Json(entry_json(&path, &node)).into_response()
}

fn list_page(dbx: &DropboxEmulator, path: &str, offset: usize, limit: usize) -> Response {
    let nodes = dbx.nodes.lock().unwrap();
    if !is_folder(&nodes, path) {
        let tag = if nodes.contains_key(path) { "not_folder" } else { "not_found" };
        return endpoint_error(json!({".tag": "path", "path": {".tag": tag}}));
    }

    let children: Vec<Value> = nodes
        .iter()
        .filter(|(key, _)| parent_of(key) == path)
        .map(|(key, node)| entry_json(key, node))
        .collect();

    let entries: Vec<Value> = children.iter().skip(offset).take(limit).cloned().collect();
    let next = offset + entries.len();

    Json(json!({
        "entries": entries,
        "cursor": format!("{}\n{}\n{}", path, next, limit),
        "has_more": next < children.len(),
    }))
    .into_response()
}

async fn list_folder(
    State(dbx): State<Arc<DropboxEmulator>>,
    headers: HeaderMap,
    Json(arg): Json<Value>,
) -> Response {
    if !dbx.auth.check(&headers) {
        return unauthorized();
    }
    dbx.list_calls.fetch_add(1, Ordering::SeqCst);

    let path = arg["path"].as_str().unwrap_or_default();
    if path == "/" {
        return bad_input(
            "Error in call to API function \"files/list_folder\": request body: path: \
             Specify the root folder as an empty string rather than as \"/\".",
        );
    }
    let limit = arg["limit"]
        .as_u64()
        .map(|l| l as usize)
        .unwrap_or(dbx.page_size);

    list_page(&dbx, path, 0, limit)
}

async fn list_folder_continue(
    State(dbx): State<Arc<DropboxEmulator>>,
    headers: HeaderMap,
    Json(arg): Json<Value>,
) -> Response {
    if !dbx.auth.check(&headers) {
        return unauthorized();
    }
    dbx.list_calls.fetch_add(1, Ordering::SeqCst);

    let cursor = arg["cursor"].as_str().unwrap_or_default();
    let mut fields = cursor.split('\n');
    let (Some(path), Some(Ok(offset)), Some(Ok(limit))) = (
        fields.next(),
        fields.next().map(str::parse::<usize>),
        fields.next().map(str::parse::<usize>),
    ) else {
        return endpoint_error(json!({".tag": "reset"}));
    };

    list_page(&dbx, path, offset, limit)
}
