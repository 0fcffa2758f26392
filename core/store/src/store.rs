//! Store trait definition.

use async_trait::async_trait;

use cloudstore_common::{Result, StorePath};

use crate::entry::DirectoryEntry;

/// Path-addressed operations every cloud backend provides.
///
/// Every operation issues its round-trips sequentially and completes before
/// returning; no adapter retries a failed request. Classified failures are
/// reported as `Error::NoEntry`, `Error::DuplicateEntry` and `Error::DiskFull`;
/// anything else the provider rejects surfaces as an unclassified error
/// carrying the provider's reason.
///
/// Implementations are not internally synchronized against concurrent token
/// refreshes from several tasks; callers that share one instance should
/// serialize access to it.
#[async_trait]
pub trait Store: Send + Sync {
    /// Get the provider name (e.g., "gdrive", "dropbox").
    fn name(&self) -> &str;

    /// Whether a usable, possibly refreshable, token is present.
    ///
    /// Never performs a network call.
    async fn authorized(&self) -> bool;

    /// Build the provider's interactive consent URL.
    fn get_authorization_url(&self) -> String;

    /// Exchange an authorization callback for a token and persist it.
    ///
    /// # Errors
    /// - Exchange rejected or callback malformed (`Error::Authentication`)
    async fn fetch_token(&self, redirect_response: &str) -> Result<()>;

    /// Download the content stored at `path`.
    ///
    /// # Errors
    /// - `NoEntry` if any path segment or the file itself does not exist
    async fn download_file(&self, path: &StorePath) -> Result<Vec<u8>>;

    /// Upload `data` as a new file at `path`.
    ///
    /// `is_chunk` tags the node as a partial-upload fragment; no splitting
    /// is performed.
    ///
    /// # Errors
    /// - `DuplicateEntry` if something already exists at `path`
    /// - `NoEntry` if the parent of `path` does not exist
    /// - `DiskFull` if the provider reports quota exhaustion
    async fn upload_file(&self, path: &StorePath, data: Vec<u8>, is_chunk: bool) -> Result<()>;

    /// List the direct children of the directory at `path`.
    ///
    /// All provider result pages are consumed; ordering is unspecified.
    ///
    /// # Errors
    /// - `NoEntry` if `path` does not exist
    async fn get_list(&self, path: &StorePath) -> Result<Vec<DirectoryEntry>>;

    /// Create the directory `name` inside the existing directory `path`.
    ///
    /// # Errors
    /// - `DuplicateEntry` if `path/name` already exists
    /// - `NoEntry` if `path` does not exist
    /// - `DiskFull` if the provider reports quota exhaustion
    async fn make_dir(&self, path: &StorePath, name: &str) -> Result<()>;

    /// Remove the node at `path`, recursively if it is a directory.
    ///
    /// # Errors
    /// - `NoEntry` if `path` does not exist
    async fn remove(&self, path: &StorePath) -> Result<()>;
}
