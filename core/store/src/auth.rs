//! OAuth2 authorization and token lifecycle shared by all store adapters.
//!
//! Each adapter describes its authorization server with a [`ProviderAuth`]
//! and composes an [`AuthManager`] with a [`TokenStore`] into a
//! [`TokenManager`]. The token manager hands out bearer tokens, refreshing
//! and re-persisting them transparently when they expire.

use chrono::{Duration, Utc};
use oauth2::basic::BasicClient;
use oauth2::{
    reqwest, AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    EndpointNotSet, EndpointSet, RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::RwLock;
use url::Url;

use cloudstore_common::{Error, Result};

use crate::token::{TokenStore, Tokens};

type OAuthClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Authorization server description for one provider.
#[derive(Debug, Clone)]
pub struct ProviderAuth {
    /// Interactive consent endpoint.
    pub auth_url: String,
    /// Code exchange and refresh endpoint.
    pub token_url: String,
    /// Scopes requested on the consent URL.
    pub scopes: Vec<String>,
    /// Additional query parameters for the consent URL.
    pub extra_params: Vec<(String, String)>,
}

/// Client credentials for OAuth2 authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Redirect URL for the OAuth2 callback. `None` selects the provider's
    /// no-redirect flow where the code is shown to the user.
    #[serde(default)]
    pub redirect_url: Option<String>,
}

/// OAuth2 authentication manager.
pub struct AuthManager {
    client: OAuthClient,
    http: reqwest::Client,
    provider: ProviderAuth,
    /// CSRF state of the most recent consent URL.
    pending_state: Mutex<Option<String>>,
}

impl AuthManager {
    /// Create a new authentication manager.
    ///
    /// # Errors
    /// - Malformed endpoint or redirect URL
    pub fn new(config: AuthConfig, provider: ProviderAuth) -> Result<Self> {
        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(config.client_secret.clone()))
            .set_auth_type(AuthType::RequestBody)
            .set_auth_uri(
                AuthUrl::new(provider.auth_url.clone())
                    .map_err(|e| Error::InvalidInput(format!("Invalid auth URL: {}", e)))?,
            )
            .set_token_uri(
                TokenUrl::new(provider.token_url.clone())
                    .map_err(|e| Error::InvalidInput(format!("Invalid token URL: {}", e)))?,
            );

        let client = match &config.redirect_url {
            Some(redirect) => client.set_redirect_uri(
                RedirectUrl::new(redirect.clone())
                    .map_err(|e| Error::InvalidInput(format!("Invalid redirect URL: {}", e)))?,
            ),
            None => client,
        };

        let http = reqwest::ClientBuilder::new()
            // Following redirects opens the token exchange up to SSRF.
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            http,
            provider,
            pending_state: Mutex::new(None),
        })
    }

    /// Generate the authorization URL for the user to visit.
    ///
    /// Remembers the CSRF state so the callback can be validated.
    pub fn authorization_url(&self) -> String {
        let mut request = self.client.authorize_url(CsrfToken::new_random);
        for scope in &self.provider.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }
        for (key, value) in &self.provider.extra_params {
            request = request.add_extra_param(key.as_str(), value.as_str());
        }
        let (auth_url, csrf_token) = request.url();

        *self
            .pending_state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(csrf_token.secret().clone());

        auth_url.to_string()
    }

    /// Exchange an authorization callback for tokens.
    ///
    /// `redirect_response` is either the full redirect URL the provider sent
    /// the browser to, or the bare authorization code.
    ///
    /// # Errors
    /// - Callback carries an `error` parameter or no code
    /// - Callback state does not match the last consent URL
    /// - Token endpoint rejected the code
    pub async fn exchange_redirect(&self, redirect_response: &str) -> Result<Tokens> {
        let callback = AuthCallback::parse(redirect_response)?;

        if let Some(state) = &callback.state {
            let pending = self
                .pending_state
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .take();
            if pending.as_deref() != Some(state.as_str()) {
                return Err(Error::Authentication(
                    "Authorization state mismatch".to_string(),
                ));
            }
        }

        let token_result = self
            .client
            .exchange_code(AuthorizationCode::new(callback.code))
            .request_async(&self.http)
            .await
            .map_err(|e| Error::Authentication(format!("Token exchange failed: {}", e)))?;

        let expires_at = token_result
            .expires_in()
            .map(|d| Utc::now() + Duration::from_std(d).unwrap_or_else(|_| Duration::hours(1)));

        let scopes = token_result
            .scopes()
            .map(|s| s.iter().map(|scope| scope.to_string()).collect())
            .unwrap_or_else(|| self.provider.scopes.clone());

        Ok(Tokens {
            access_token: token_result.access_token().secret().clone(),
            refresh_token: token_result.refresh_token().map(|t| t.secret().clone()),
            expires_at,
            scopes,
        })
    }

    /// Refresh an access token.
    ///
    /// Providers may omit the refresh token and scopes from a refresh
    /// response; the previous values are kept in that case.
    ///
    /// # Errors
    /// - `current` has no refresh token
    /// - Invalid or revoked refresh token
    /// - Network errors
    pub async fn refresh(&self, current: &Tokens) -> Result<Tokens> {
        let refresh_token = current.refresh_token.as_ref().ok_or_else(|| {
            Error::Authentication("Access token expired and no refresh token available".to_string())
        })?;

        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.clone()))
            .request_async(&self.http)
            .await
            .map_err(|e| Error::Authentication(format!("Token refresh failed: {}", e)))?;

        let expires_at = token_result
            .expires_in()
            .map(|d| Utc::now() + Duration::from_std(d).unwrap_or_else(|_| Duration::hours(1)));

        let scopes = token_result
            .scopes()
            .map(|s| s.iter().map(|scope| scope.to_string()).collect())
            .unwrap_or_else(|| current.scopes.clone());

        Ok(Tokens {
            access_token: token_result.access_token().secret().clone(),
            refresh_token: token_result
                .refresh_token()
                .map(|t| t.secret().clone())
                .or_else(|| current.refresh_token.clone()),
            expires_at,
            scopes,
        })
    }
}

/// Authorization code and state extracted from a redirect.
#[derive(Debug, PartialEq, Eq)]
struct AuthCallback {
    code: String,
    state: Option<String>,
}

impl AuthCallback {
    fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        let url = match Url::parse(input) {
            Ok(url) => url,
            Err(_) => {
                if input.is_empty() || input.contains(char::is_whitespace) {
                    return Err(Error::Authentication(
                        "Authorization response is neither a URL nor a code".to_string(),
                    ));
                }
                return Ok(Self {
                    code: input.to_string(),
                    state: None,
                });
            }
        };

        let mut code = None;
        let mut state = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                "error" => {
                    return Err(Error::Authentication(format!(
                        "Authorization denied: {}",
                        value
                    )))
                }
                _ => {}
            }
        }

        let code = code.ok_or_else(|| {
            Error::Authentication("Authorization response has no code".to_string())
        })?;

        Ok(Self { code, state })
    }
}

/// Token manager that loads, refreshes and persists one store's tokens.
pub struct TokenManager {
    auth_manager: AuthManager,
    store: TokenStore,
    tokens: RwLock<Option<Tokens>>,
}

impl TokenManager {
    /// Create a token manager, resuming from the persisted token file if
    /// it holds valid tokens.
    pub fn new(auth_manager: AuthManager, store: TokenStore) -> Self {
        let tokens = store.load();
        if tokens.is_some() {
            tracing::debug!("Loaded tokens from {}", store.path().display());
        }

        Self {
            auth_manager,
            store,
            tokens: RwLock::new(tokens),
        }
    }

    /// Whether a usable (possibly refreshable) token is present.
    pub async fn is_authorized(&self) -> bool {
        self.tokens
            .read()
            .await
            .as_ref()
            .is_some_and(Tokens::is_usable)
    }

    /// Consent URL for the interactive flow.
    pub fn authorization_url(&self) -> String {
        self.auth_manager.authorization_url()
    }

    /// Complete the interactive flow and persist the resulting tokens.
    pub async fn fetch_token(&self, redirect_response: &str) -> Result<()> {
        let tokens = self.auth_manager.exchange_redirect(redirect_response).await?;
        self.store.save(&tokens).await?;
        *self.tokens.write().await = Some(tokens);

        tracing::info!("Authorization complete, tokens saved to {}", self.store.path().display());
        Ok(())
    }

    /// Get a valid access token, refreshing if necessary.
    ///
    /// # Postconditions
    /// - Returns a valid (non-expired) access token
    /// - A refreshed token has been written to the token file
    ///
    /// # Errors
    /// - Not authorized
    /// - Token refresh or persistence failed
    pub async fn access_token(&self) -> Result<String> {
        {
            let tokens = self.tokens.read().await;
            match tokens.as_ref() {
                None => {
                    return Err(Error::Authentication(
                        "Not authorized; complete the authorization flow first".to_string(),
                    ))
                }
                Some(t) if !t.is_expired() => return Ok(t.access_token.clone()),
                Some(_) => {}
            }
        }

        let mut tokens = self.tokens.write().await;

        // Double-check after acquiring write lock
        let current = match tokens.as_ref() {
            None => {
                return Err(Error::Authentication(
                    "Not authorized; complete the authorization flow first".to_string(),
                ))
            }
            Some(t) if !t.is_expired() => return Ok(t.access_token.clone()),
            Some(t) => t,
        };

        tracing::info!("Refreshing expired access token");

        let new_tokens = self.auth_manager.refresh(current).await?;
        self.store.save(&new_tokens).await?;

        let access_token = new_tokens.access_token.clone();
        *tokens = Some(new_tokens);

        Ok(access_token)
    }
}
