//! OAuth2 client-credentials token manager.
//!
//! One bearer token is cached in memory and refreshed only when it is absent
//! or within [`REFRESH_MARGIN_SECS`] of expiry. The cache lock is held across
//! the exchange, so concurrent callers share one refresh.

use crate::error::{AuthError, AuthResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const DEFAULT_SCOPE: &str = "api:read";
pub const DEFAULT_AUDIENCE: &str = "titanic-api";
pub const DEFAULT_EXPIRES_IN: i64 = 3600;
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// OAuth2 settings as they appear in `titanic.toml` (`[oauth]`) and the
/// environment. Every field is optional; see [`OAuthConfig::credentials`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    pub domain: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
    pub audience: Option<String>,
    /// Overrides `https://<domain>/oauth/token`.
    pub token_url: Option<String>,
}

impl OAuthConfig {
    pub fn from_env(env: &dyn Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        config.apply_env(env);
        config
    }

    /// Override fields from `OAUTH2_*` variables. Empty values are ignored.
    pub fn apply_env(&mut self, env: &dyn Fn(&str) -> Option<String>) {
        let get = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        let fields = [
            ("OAUTH2_DOMAIN", &mut self.domain),
            ("OAUTH2_CLIENT_ID", &mut self.client_id),
            ("OAUTH2_CLIENT_SECRET", &mut self.client_secret),
            ("OAUTH2_SCOPE", &mut self.scope),
            ("OAUTH2_AUDIENCE", &mut self.audience),
            ("OAUTH2_TOKEN_URL", &mut self.token_url),
        ];
        for (key, field) in fields {
            if let Some(v) = get(key) {
                *field = Some(v);
            }
        }
    }

    /// Resolved credentials, or `None` unless client id, secret and either a
    /// domain or a token URL are all set.
    #[must_use]
    pub fn credentials(&self) -> Option<ClientCredentials> {
        let token_url = match (&self.token_url, &self.domain) {
            (Some(url), _) => url.clone(),
            (None, Some(domain)) => format!("https://{domain}/oauth/token"),
            (None, None) => return None,
        };
        Some(ClientCredentials {
            token_url,
            client_id: self.client_id.clone()?,
            client_secret: self.client_secret.clone()?,
            scope: self.scope.clone().unwrap_or_else(|| DEFAULT_SCOPE.to_string()),
            audience: self.audience.clone().unwrap_or_else(|| DEFAULT_AUDIENCE.to_string()),
        })
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
    pub audience: String,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("token_url", &self.token_url)
            .field("client_id", &mask(&self.client_id))
            .field("scope", &self.scope)
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}

/// Keep only the ends of a secret-ish value for logs.
#[must_use]
pub fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .checked_sub_signed(Duration::seconds(REFRESH_MARGIN_SECS))
            .is_some_and(|refresh_at| now < refresh_at)
    }
}

pub struct TokenManager {
    credentials: Option<ClientCredentials>,
    client: reqwest::Client,
    cache: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager").field("credentials", &self.credentials).finish_non_exhaustive()
    }
}

impl TokenManager {
    pub fn new(config: &OAuthConfig, timeout: std::time::Duration) -> AuthResult<Self> {
        let credentials = config.credentials();
        if credentials.is_none() {
            warn!("OAuth2 credentials not configured, requests will be sent without a token");
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { credentials, client, cache: Mutex::new(None) })
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    /// A valid bearer token, or `None` when no credentials are configured.
    ///
    /// Refreshes at most once per call and never falls back to a stale token.
    pub async fn get_token(&self) -> AuthResult<Option<String>> {
        let Some(credentials) = &self.credentials else {
            return Ok(None);
        };

        let mut cache = self.cache.lock().await;
        if let Some(token) = cache.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            debug!("using cached access token");
            return Ok(Some(token.access_token.clone()));
        }

        *cache = None;
        let fresh = self.exchange(credentials).await?;
        let access_token = fresh.access_token.clone();
        *cache = Some(fresh);
        Ok(Some(access_token))
    }

    /// Forget the cached token, e.g. after the API rejected it.
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }

    async fn exchange(&self, credentials: &ClientCredentials) -> AuthResult<CachedToken> {
        info!(
            token_url = %credentials.token_url,
            client_id = %mask(&credentials.client_id),
            scope = %credentials.scope,
            audience = %credentials.audience,
            "requesting OAuth2 token"
        );
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("scope", credentials.scope.as_str()),
            ("audience", credentials.audience.as_str()),
        ];
        let response = self.client.post(&credentials.token_url).form(&form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), %body, "OAuth2 token request failed");
            return Err(AuthError::CredentialExchange { status: status.as_u16(), body });
        }

        let body = response.text().await?;
        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| AuthError::MalformedResponse(e.to_string()))?;
        if parsed.access_token.is_empty() {
            return Err(AuthError::MalformedResponse("empty access_token".to_string()));
        }
        let expires_in = parsed.expires_in.unwrap_or(DEFAULT_EXPIRES_IN);
        let expires_at = Duration::try_seconds(expires_in)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| AuthError::MalformedResponse(format!("expires_in out of range: {expires_in}")))?;
        info!(expires_in, "OAuth2 token refreshed");
        Ok(CachedToken { access_token: parsed.access_token, expires_at })
    }
}
