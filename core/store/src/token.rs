//! OAuth2 token bundle and its on-disk persistence.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use zeroize::{Zeroize, ZeroizeOnDrop};

use cloudstore_common::Result;

/// OAuth2 tokens with expiration tracking.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Tokens {
    /// Access token for API requests.
    pub access_token: String,
    /// Refresh token for obtaining new access tokens.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// When the access token expires. `None` means it does not expire.
    #[serde(default)]
    #[zeroize(skip)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Scopes granted by the authorization server.
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Tokens {
    /// Check if the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            // Consider expired if less than 5 minutes remaining
            Some(expires_at) => expires_at < Utc::now() + Duration::minutes(5),
            None => false,
        }
    }

    /// Whether these tokens can authenticate a request, possibly after a refresh.
    pub fn is_usable(&self) -> bool {
        !self.is_expired() || self.refresh_token.is_some()
    }
}

impl fmt::Debug for Tokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tokens")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Persists one store instance's tokens as pretty-printed JSON.
///
/// The file name is namespaced by provider and logical instance name so
/// several named stores can share one directory.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Create a token store for `{provider}_token_{name}.json` inside `dir`.
    pub fn new(dir: impl AsRef<Path>, provider: &str, name: &str) -> Self {
        Self {
            path: dir
                .as_ref()
                .join(format!("{}_token_{}.json", provider, name)),
        }
    }

    /// Location of the persisted token file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load persisted tokens.
    ///
    /// A missing or unreadable file yields `None` so the caller falls back
    /// to interactive authorization.
    pub fn load(&self) -> Option<Tokens> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Cannot read token file {}: {}", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_str(&data) {
            Ok(tokens) => Some(tokens),
            Err(e) => {
                tracing::warn!("Ignoring corrupt token file {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Serialize `tokens` to the token file, replacing its previous content.
    pub async fn save(&self, tokens: &Tokens) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let data = serde_json::to_string_pretty(tokens)?;
        tokio::fs::write(&self.path, data).await?;
        tracing::debug!("Saved tokens to {}", self.path.display());
        Ok(())
    }
}
