//! Google Drive API client.

use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use cloudstore_common::{Error, Result};

use crate::auth::TokenManager;

/// OAuth2 authorization endpoint.
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// OAuth2 token endpoint.
const GOOGLE_TOKEN_URL: &str = "https://www.googleapis.com/oauth2/v4/token";
/// Files resource: list/query, get, get media, create folder, delete.
const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
/// Multipart upload endpoint.
const DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";

/// Identifier of the application-private folder every path is resolved from.
pub const APP_DATA_FOLDER: &str = "appDataFolder";
/// MIME type Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
/// App property marking a file as an upload chunk.
pub const CHUNK_PROPERTY: &str = "chunk";

const FILE_FIELDS: &str = "id,name,mimeType,size,appProperties";
const LIST_FIELDS: &str = "files(id,name,mimeType,size,appProperties),nextPageToken";

const MULTIPART_BOUNDARY: &str = "cloudstore_separator";

/// Google Drive endpoint URLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveEndpoints {
    pub auth_url: String,
    pub token_url: String,
    pub files_url: String,
    pub upload_url: String,
}

impl Default for DriveEndpoints {
    fn default() -> Self {
        Self {
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            files_url: DRIVE_FILES_URL.to_string(),
            upload_url: DRIVE_UPLOAD_URL.to_string(),
        }
    }
}

/// Google Drive file metadata from API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// File ID.
    pub id: String,
    /// File name.
    pub name: String,
    /// MIME type.
    pub mime_type: String,
    /// File size in bytes, as a decimal string (absent for folders).
    #[serde(default)]
    pub size: Option<String>,
    /// Private application properties.
    #[serde(default)]
    pub app_properties: BTreeMap<String, String>,
}

impl DriveFile {
    /// Check if this is a folder.
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    /// Check if this file was uploaded as a chunk.
    pub fn is_chunk(&self) -> bool {
        self.app_properties.contains_key(CHUNK_PROPERTY)
    }

    /// Get size in bytes.
    pub fn size_bytes(&self) -> Option<i64> {
        self.size.as_ref().and_then(|s| s.parse().ok())
    }
}

/// Metadata for a file or folder being created.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFile {
    pub name: String,
    pub parents: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub app_properties: BTreeMap<String, String>,
}

impl NewFile {
    /// Metadata for a plain file inside `parent_id`.
    pub fn file(name: &str, parent_id: &str) -> Self {
        Self {
            name: name.to_string(),
            parents: vec![parent_id.to_string()],
            mime_type: None,
            app_properties: BTreeMap::new(),
        }
    }

    /// Metadata for a folder inside `parent_id`.
    pub fn folder(name: &str, parent_id: &str) -> Self {
        Self {
            mime_type: Some(FOLDER_MIME_TYPE.to_string()),
            ..Self::file(name, parent_id)
        }
    }

    /// Tag the file as an upload chunk.
    pub fn with_chunk(mut self) -> Self {
        self.app_properties
            .insert(CHUNK_PROPERTY.to_string(), "true".to_string());
        self
    }
}

/// Response from listing files.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Error body returned by the Drive API.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorReason>,
}

#[derive(Debug, Deserialize)]
struct ErrorReason {
    #[serde(default)]
    reason: String,
}

/// Google Drive API client.
pub struct DriveClient {
    http: Client,
    token_manager: Arc<TokenManager>,
    endpoints: DriveEndpoints,
}

impl DriveClient {
    /// Create a new Drive client.
    pub fn new(token_manager: Arc<TokenManager>, endpoints: DriveEndpoints) -> Result<Self> {
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

    fn file_url(&self, file_id: &str) -> String {
        format!("{}/{}", self.endpoints.files_url.trim_end_matches('/'), file_id)
    }

    /// Search the children of `parent_id`, optionally only those named `name`.
    ///
    /// Pages are fetched one after another until the API stops returning a
    /// continuation token.
    pub async fn search_children(
        &self,
        parent_id: &str,
        name: Option<&str>,
    ) -> Result<Vec<DriveFile>> {
        let mut query = format!("'{}' in parents and trashed = false", escape_query(parent_id));
        if let Some(name) = name {
            query.push_str(&format!(" and name = '{}'", escape_query(name)));
        }

        let mut all_files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = self.token_manager.access_token().await?;

            let mut request = self
                .http
                .get(&self.endpoints.files_url)
                .bearer_auth(token)
                .query(&[
                    ("corpora", "user"),
                    ("spaces", APP_DATA_FOLDER),
                    ("pageSize", "1000"),
                    ("q", query.as_str()),
                    ("fields", LIST_FIELDS),
                ]);

            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            tracing::debug!("Drive query: {}", query);

            let response = request
                .send()
                .await
                .map_err(|e| Error::Network(format!("Failed to list files: {}", e)))?;

            let list_response: FileListResponse = handle_response(response).await?;
            all_files.extend(list_response.files);

            match list_response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(all_files)
    }

    /// Download file content.
    pub async fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        let token = self.token_manager.access_token().await?;

        let response = self
            .http
            .get(self.file_url(file_id))
            .bearer_auth(token)
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to download file: {}", e)))?;

        let response = check_status(response).await?;

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| Error::Network(format!("Failed to read download response: {}", e)))
    }

    /// Upload a file with its metadata in one multipart request.
    pub async fn upload_multipart(&self, metadata: &NewFile, data: Vec<u8>) -> Result<DriveFile> {
        let token = self.token_manager.access_token().await?;
        let body = multipart_body(metadata, &data)?;

        let response = self
            .http
            .post(&self.endpoints.upload_url)
            .bearer_auth(token)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", MULTIPART_BOUNDARY),
            )
            .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to upload file: {}", e)))?;

        handle_response(response).await
    }

    /// Create a folder.
    pub async fn create_folder(&self, metadata: &NewFile) -> Result<DriveFile> {
        let token = self.token_manager.access_token().await?;

        let response = self
            .http
            .post(&self.endpoints.files_url)
            .bearer_auth(token)
            .query(&[("fields", FILE_FIELDS)])
            .json(metadata)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to create folder: {}", e)))?;

        handle_response(response).await
    }

    /// Delete a file. Folders are deleted with all their descendants.
    pub async fn delete(&self, file_id: &str) -> Result<()> {
        let token = self.token_manager.access_token().await?;

        let response = self
            .http
            .delete(self.file_url(file_id))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to delete file: {}", e)))?;

        check_status(response).await?;
        Ok(())
    }
}

/// Quote a value for use inside a single-quoted Drive query string.
fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn multipart_body(metadata: &NewFile, data: &[u8]) -> Result<Vec<u8>> {
    let metadata_json = serde_json::to_string(metadata)?;

    let mut body = Vec::with_capacity(data.len() + metadata_json.len() + 256);

    // Metadata part
    body.extend_from_slice(format!("--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata_json.as_bytes());
    body.extend_from_slice(b"\r\n");

    // Data part
    body.extend_from_slice(format!("--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(b"\r\n");

    // End boundary
    body.extend_from_slice(format!("--{}--", MULTIPART_BOUNDARY).as_bytes());

    Ok(body)
}

/// Pass successful responses through; turn failures into errors.
///
/// Missing resources are not classified here: only path resolution decides
/// what counts as a missing entry.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let reason = match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(parsed) => match parsed.error.errors.first() {
            Some(first) if !first.reason.is_empty() => {
                format!("{} ({})", first.reason, parsed.error.message)
            }
            _ => parsed.error.message,
        },
        Err(_) => body,
    };

    if status == StatusCode::UNAUTHORIZED {
        Err(Error::Authentication(format!("Drive rejected credentials: {}", reason)))
    } else {
        Err(Error::Provider(format!("Drive API error: {} - {}", status, reason)))
    }
}

async fn handle_response<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    check_status(response)
        .await?
        .json()
        .await
        .map_err(|e| Error::Network(format!("Failed to parse response: {}", e)))
}
