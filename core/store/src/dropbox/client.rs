//! Dropbox API v2 client.

use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use cloudstore_common::{Error, Result};

use crate::auth::TokenManager;

use super::error::{ApiError, Operation};

/// OAuth2 authorization endpoint.
const DROPBOX_AUTH_URL: &str = "https://www.dropbox.com/oauth2/authorize";
/// OAuth2 token endpoint.
const DROPBOX_TOKEN_URL: &str = "https://api.dropboxapi.com/oauth2/token";
/// RPC endpoints (delete, create folder, list folder).
const DROPBOX_API_BASE: &str = "https://api.dropboxapi.com/2";
/// Content endpoints (upload, download).
const DROPBOX_CONTENT_BASE: &str = "https://content.dropboxapi.com/2";

const API_ARG_HEADER: &str = "Dropbox-API-Arg";

/// Dropbox endpoint URLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropboxEndpoints {
    pub auth_url: String,
    pub token_url: String,
    pub api_base: String,
    pub content_base: String,
}

impl Default for DropboxEndpoints {
    fn default() -> Self {
        Self {
            auth_url: DROPBOX_AUTH_URL.to_string(),
            token_url: DROPBOX_TOKEN_URL.to_string(),
            api_base: DROPBOX_API_BASE.to_string(),
            content_base: DROPBOX_CONTENT_BASE.to_string(),
        }
    }
}

/// One entry of a folder listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropboxEntry {
    /// `file` or `folder`; listings never request deleted entries.
    #[serde(rename = ".tag")]
    pub tag: String,
    pub name: String,
    /// Size in bytes (files only).
    #[serde(default)]
    pub size: Option<u64>,
}

impl DropboxEntry {
    /// Check if this is a folder.
    pub fn is_folder(&self) -> bool {
        self.tag == "folder"
    }
}

/// Response from list_folder and list_folder/continue.
#[derive(Debug, Deserialize)]
struct ListFolderResponse {
    entries: Vec<DropboxEntry>,
    cursor: String,
    has_more: bool,
}

/// Dropbox API client.
pub struct DropboxClient {
    http: Client,
    token_manager: Arc<TokenManager>,
    endpoints: DropboxEndpoints,
}

impl DropboxClient {
    /// Create a new Dropbox client.
    pub fn new(token_manager: Arc<TokenManager>, endpoints: DropboxEndpoints) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("cloudstore/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            token_manager,
            endpoints,
        })
    }

    fn api_url(&self, route: &str) -> String {
        format!("{}/{}", self.endpoints.api_base.trim_end_matches('/'), route)
    }

    fn content_url(&self, route: &str) -> String {
        format!("{}/{}", self.endpoints.content_base.trim_end_matches('/'), route)
    }

    /// Call an RPC endpoint with a JSON body.
    async fn rpc(&self, op: Operation, route: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        let token = self.token_manager.access_token().await?;

        tracing::debug!("Dropbox {} {}", route, body);

        let response = self
            .http
            .post(self.api_url(route))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("{} request failed: {}", op, e)))?;

        check_status(op, response).await
    }

    /// Download file content.
    pub async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let token = self.token_manager.access_token().await?;

        let response = self
            .http
            .post(self.content_url("files/download"))
            .bearer_auth(token)
            .header(API_ARG_HEADER, header_safe_json(&json!({ "path": path })))
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to download file: {}", e)))?;

        let response = check_status(Operation::Download, response).await?;

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| Error::Network(format!("Failed to read download response: {}", e)))
    }

    /// Upload a new file. Never overwrites or renames.
    pub async fn upload(&self, path: &str, data: Vec<u8>) -> Result<()> {
        let token = self.token_manager.access_token().await?;
        let args = json!({
            "path": path,
            "mode": "add",
            "autorename": false,
        });

        let response = self
            .http
            .post(self.content_url("files/upload"))
            .bearer_auth(token)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .header(API_ARG_HEADER, header_safe_json(&args))
            .body(data)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to upload file: {}", e)))?;

        check_status(Operation::Upload, response).await?;
        Ok(())
    }

    /// Create a folder.
    pub async fn create_folder(&self, path: &str) -> Result<()> {
        self.rpc(
            Operation::CreateFolder,
            "files/create_folder",
            json!({ "path": path, "autorename": false }),
        )
        .await?;
        Ok(())
    }

    /// Delete a file, or a folder with all its descendants.
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.rpc(Operation::Delete, "files/delete", json!({ "path": path }))
            .await?;
        Ok(())
    }

    /// List a folder, following the cursor until every page is consumed.
    pub async fn list_folder(&self, path: &str) -> Result<Vec<DropboxEntry>> {
        let response = self
            .rpc(Operation::ListFolder, "files/list_folder", json!({ "path": path }))
            .await?;
        let mut page: ListFolderResponse = parse_json(response).await?;

        let mut entries = Vec::new();
        loop {
            entries.append(&mut page.entries);
            if !page.has_more {
                break;
            }

            let response = self
                .rpc(
                    Operation::ListFolder,
                    "files/list_folder/continue",
                    json!({ "cursor": page.cursor }),
                )
                .await?;
            page = parse_json(response).await?;
        }

        Ok(entries)
    }

    /// Check that `path` names an existing folder.
    ///
    /// Upload and create-folder implicitly create missing parents on
    /// Dropbox, so the store checks the parent explicitly beforehand.
    pub async fn ensure_folder(&self, path: &str) -> Result<()> {
        self.rpc(
            Operation::CheckParent,
            "files/list_folder",
            json!({ "path": path, "limit": 1 }),
        )
        .await?;
        Ok(())
    }
}

/// Pass successful responses through; decode endpoint errors.
async fn check_status(op: Operation, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();

    match status {
        StatusCode::CONFLICT => Err(ApiError::decode(op, &body).into_error(op)),
        StatusCode::UNAUTHORIZED => Err(Error::Authentication(format!(
            "Dropbox rejected credentials: {}",
            body
        ))),
        _ => Err(Error::Provider(format!("{} fail : {} - {}", op, status, body))),
    }
}

async fn parse_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| Error::Network(format!("Failed to parse response: {}", e)))
}

/// Serialize `value` for the `Dropbox-API-Arg` header.
///
/// Header values must be ASCII, so every non-ASCII character is written
/// as a `\uXXXX` escape (surrogate pairs above the BMP).
pub fn header_safe_json(value: &serde_json::Value) -> String {
    let raw = value.to_string();
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii() && c != '\u{7f}' {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}
