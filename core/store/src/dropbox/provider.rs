//! Dropbox store implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use cloudstore_common::{Error, Result, StorePath};

use crate::auth::{AuthConfig, AuthManager, ProviderAuth, TokenManager};
use crate::entry::DirectoryEntry;
use crate::store::Store;
use crate::token::TokenStore;

use super::client::{DropboxClient, DropboxEndpoints, DropboxEntry};

/// Dropbox store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropboxConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Logical instance name; namespaces the persisted token file.
    pub name: String,
    /// Directory holding the token file.
    pub token_dir: PathBuf,
    /// Redirect URL registered for the app. Without one, Dropbox shows the
    /// authorization code to the user instead of redirecting.
    #[serde(default)]
    pub redirect_url: Option<String>,
    #[serde(default)]
    pub endpoints: DropboxEndpoints,
}

/// Dropbox store.
///
/// Dropbox is path-addressed, so paths are sent as POSIX strings with the
/// root serialized as the empty string.
pub struct DropboxStore {
    client: DropboxClient,
    token_manager: Arc<TokenManager>,
}

impl DropboxStore {
    /// Create a new Dropbox store, resuming from the persisted token file
    /// when one exists.
    ///
    /// # Errors
    /// - Invalid endpoint or redirect configuration
    pub fn new(config: DropboxConfig) -> Result<Self> {
        let auth_config = AuthConfig {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_url: config.redirect_url.clone(),
        };
        let provider = ProviderAuth {
            auth_url: config.endpoints.auth_url.clone(),
            token_url: config.endpoints.token_url.clone(),
            scopes: Vec::new(),
            extra_params: vec![("token_access_type".to_string(), "offline".to_string())],
        };

        let auth_manager = AuthManager::new(auth_config, provider)?;
        let token_store = TokenStore::new(&config.token_dir, "dropbox", &config.name);
        let token_manager = Arc::new(TokenManager::new(auth_manager, token_store));
        let client = DropboxClient::new(token_manager.clone(), config.endpoints)?;

        Ok(Self {
            client,
            token_manager,
        })
    }

    /// Fail with `NoEntry` unless the parent folder of `path` exists.
    async fn ensure_parent(&self, path: &StorePath) -> Result<()> {
        match path.parent() {
            Some(parent) if !parent.is_root() => {
                self.client.ensure_folder(&dropbox_path(&parent)).await
            }
            _ => Ok(()),
        }
    }
}

/// Serialize a path the way the Dropbox API expects it.
pub fn dropbox_path(path: &StorePath) -> String {
    if path.is_root() {
        String::new()
    } else {
        path.to_string_path()
    }
}

fn to_entry(file: DropboxEntry) -> DirectoryEntry {
    let mut entry = DirectoryEntry::new(file.name.clone());
    if file.is_folder() {
        entry.set_directory(true);
    }
    if let Some(size) = file.size {
        entry.set_file_size(i64::try_from(size).unwrap_or(i64::MAX));
    }
    entry
}

#[async_trait]
impl Store for DropboxStore {
    fn name(&self) -> &str {
        "dropbox"
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
        self.client.download(&dropbox_path(path)).await
    }

    async fn upload_file(&self, path: &StorePath, data: Vec<u8>, is_chunk: bool) -> Result<()> {
        if path.is_root() {
            return Err(Error::DuplicateEntry("Root folder already exists".to_string()));
        }
        if is_chunk {
            tracing::debug!("Chunk tagging is not recorded on Dropbox: {}", path);
        }

        self.ensure_parent(path).await?;
        self.client.upload(&dropbox_path(path), data).await
    }

    async fn get_list(&self, path: &StorePath) -> Result<Vec<DirectoryEntry>> {
        let entries = self.client.list_folder(&dropbox_path(path)).await?;
        Ok(entries.into_iter().map(to_entry).collect())
    }

    async fn make_dir(&self, path: &StorePath, name: &str) -> Result<()> {
        let target = path.join(name)?;
        self.ensure_parent(&target).await?;
        self.client.create_folder(&dropbox_path(&target)).await
    }

    async fn remove(&self, path: &StorePath) -> Result<()> {
        if path.is_root() {
            return Err(Error::InvalidInput("Cannot remove the root folder".to_string()));
        }
        self.client.delete(&dropbox_path(path)).await
    }
}
