//! Google Drive store implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use cloudstore_common::{Error, Result, StorePath};

use crate::auth::{AuthConfig, AuthManager, ProviderAuth, TokenManager};
use crate::entry::DirectoryEntry;
use crate::store::Store;
use crate::token::TokenStore;

use super::client::{DriveClient, DriveEndpoints, DriveFile, NewFile, APP_DATA_FOLDER};

/// Base of the local redirect URL registered for the OAuth2 client.
const REDIRECT_BASE_URL: &str = "https://localhost";

const DRIVE_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/drive.appfolder",
    "https://www.googleapis.com/auth/drive",
    "profile",
    "email",
    "openid",
];

/// Google Drive store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GDriveConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Logical instance name; namespaces the persisted token file.
    pub name: String,
    /// Directory holding the token file.
    pub token_dir: PathBuf,
    /// Port appended to the local redirect URL.
    #[serde(default)]
    pub redirect_port: Option<u16>,
    #[serde(default)]
    pub endpoints: DriveEndpoints,
}

impl GDriveConfig {
    /// Redirect URL registered for this client.
    pub fn redirect_url(&self) -> String {
        match self.redirect_port {
            Some(port) => format!("{}:{}", REDIRECT_BASE_URL, port),
            None => REDIRECT_BASE_URL.to_string(),
        }
    }
}

/// Google Drive store.
///
/// Drive addresses files by opaque identifiers, so every operation first
/// walks the path from the application data folder, one child query per
/// segment. Nothing is cached between calls.
pub struct GDriveStore {
    client: DriveClient,
    token_manager: Arc<TokenManager>,
}

impl GDriveStore {
    /// Create a new Google Drive store, resuming from the persisted token
    /// file when one exists.
    ///
    /// # Errors
    /// - Invalid endpoint or redirect configuration
    pub fn new(config: GDriveConfig) -> Result<Self> {
        let auth_config = AuthConfig {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_url: Some(config.redirect_url()),
        };
        let provider = ProviderAuth {
            auth_url: config.endpoints.auth_url.clone(),
            token_url: config.endpoints.token_url.clone(),
            scopes: DRIVE_SCOPES.iter().map(|s| s.to_string()).collect(),
            extra_params: vec![
                ("access_type".to_string(), "offline".to_string()),
                ("prompt".to_string(), "consent".to_string()),
            ],
        };

        let auth_manager = AuthManager::new(auth_config, provider)?;
        let token_store = TokenStore::new(&config.token_dir, "google", &config.name);
        let token_manager = Arc::new(TokenManager::new(auth_manager, token_store));
        let client = DriveClient::new(token_manager.clone(), config.endpoints)?;

        Ok(Self {
            client,
            token_manager,
        })
    }

    /// Resolve a path to a Drive file ID.
    ///
    /// # Errors
    /// - `NoEntry` as soon as one segment has no matching child
    async fn resolve_path(&self, path: &StorePath) -> Result<String> {
        let mut parent_id = APP_DATA_FOLDER.to_string();

        for component in path.components() {
            let file = self
                .client
                .search_children(&parent_id, Some(component))
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| Error::NoEntry(format!("Path is not valid: {}", path)))?;

            tracing::debug!("Resolved {} -> {}", component, file.id);
            parent_id = file.id;
        }

        Ok(parent_id)
    }

    /// Resolve the parent of `path`, failing with `DuplicateEntry` if
    /// `path` itself already exists.
    async fn resolve_vacant_parent(&self, path: &StorePath) -> Result<(String, String)> {
        match self.resolve_path(path).await {
            Ok(_) => return Err(Error::DuplicateEntry(format!("Duplicate path: {}", path))),
            Err(Error::NoEntry(_)) => {}
            Err(e) => return Err(e),
        }

        let parent = path
            .parent()
            .ok_or_else(|| Error::InvalidInput("Cannot get parent of root path".to_string()))?;
        let name = path
            .name()
            .ok_or_else(|| Error::InvalidInput("Path has no name component".to_string()))?
            .to_string();

        let parent_id = self.resolve_path(&parent).await?;
        Ok((parent_id, name))
    }
}

fn to_entry(file: DriveFile) -> DirectoryEntry {
    let mut entry = DirectoryEntry::new(file.name.clone());
    if let Some(size) = file.size_bytes() {
        entry.set_file_size(size);
    }
    if file.is_folder() {
        entry.set_directory(true);
    } else if file.is_chunk() {
        entry.set_chunk(true);
    }
    entry
}

#[async_trait]
impl Store for GDriveStore {
    fn name(&self) -> &str {
        "gdrive"
    }

    async fn authorized(&self) -> bool {
        self.token_manager.is_authorized().await
    }

    fn get_authorization_url(&self) -> String {
        self.token_manager.authorization_url()
    }

    async fn fetch_token(&self, redirect_response: &str) -> Result<()> {
        self.token_manager.fetch_token(redirect_response).await
    }

    async fn download_file(&self, path: &StorePath) -> Result<Vec<u8>> {
        let file_id = self.resolve_path(path).await?;
        self.client.download(&file_id).await
    }

    async fn upload_file(&self, path: &StorePath, data: Vec<u8>, is_chunk: bool) -> Result<()> {
        let (parent_id, name) = self.resolve_vacant_parent(path).await?;

        let mut metadata = NewFile::file(&name, &parent_id);
        if is_chunk {
            metadata = metadata.with_chunk();
        }

        let file = self.client.upload_multipart(&metadata, data).await?;
        tracing::debug!("Uploaded {} as {}", path, file.id);
        Ok(())
    }

    async fn get_list(&self, path: &StorePath) -> Result<Vec<DirectoryEntry>> {
        let folder_id = self.resolve_path(path).await?;
        let files = self.client.search_children(&folder_id, None).await?;
        Ok(files.into_iter().map(to_entry).collect())
    }

    async fn make_dir(&self, path: &StorePath, name: &str) -> Result<()> {
        let target = path.join(name)?;
        let (parent_id, name) = self.resolve_vacant_parent(&target).await?;

        let folder = self
            .client
            .create_folder(&NewFile::folder(&name, &parent_id))
            .await?;
        tracing::debug!("Created folder {} as {}", target, folder.id);
        Ok(())
    }

    async fn remove(&self, path: &StorePath) -> Result<()> {
        if path.is_root() {
            return Err(Error::InvalidInput("Cannot remove the root folder".to_string()));
        }
        let file_id = self.resolve_path(path).await?;
        self.client.delete(&file_id).await
    }
}
