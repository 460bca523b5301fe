use serde::Deserialize;
use serde_json::json;
use url::Url;

use notion_sync_core::config::SyncConfig;
use notion_sync_core::error::{SyncError, SyncResult};

const AUTHORIZE_URL: &str = "https://api.notion.com/v1/oauth/authorize";
const TOKEN_URL: &str = "https://api.notion.com/v1/oauth/token";

/// Tokens returned by the Notion OAuth code exchange
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub workspace_name: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
}

/// OAuth 2.0 code flow against the Notion token endpoint.
///
/// Persisting the resulting token (OS keyring or otherwise) is the caller's
/// concern.
#[derive(Debug, Clone)]
pub struct OAuthFlow {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl OAuthFlow {
    /// Build the flow from configured credentials
    pub fn from_config(config: &SyncConfig) -> SyncResult<Self> {
        let client_id = config
            .client_id
            .clone()
            .ok_or_else(|| SyncError::config("NOTION_CLIENT_ID is not set"))?;
        let client_secret = config
            .client_secret
            .clone()
            .ok_or_else(|| SyncError::config("NOTION_CLIENT_SECRET is not set"))?;
        let redirect_uri = config
            .redirect_uri
            .clone()
            .ok_or_else(|| SyncError::config("NOTION_REDIRECT_URI is not set"))?;

        Ok(Self {
            client: reqwest::Client::new(),
            client_id,
            client_secret,
            redirect_uri,
        })
    }

    /// Authorization URL the user visits to grant access. `state` guards
    /// against CSRF and is echoed back on the redirect.
    pub fn authorize_url(&self, state: &str) -> SyncResult<Url> {
        let mut url = Url::parse(AUTHORIZE_URL)
            .map_err(|e| SyncError::config(format!("Invalid authorize URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("response_type", "code")
            .append_pair("owner", "user")
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("state", state);
        Ok(url)
    }

    /// Exchange an authorization code for an access token
    pub async fn exchange_code(&self, code: &str) -> SyncResult<OAuthTokens> {
        let response = self
            .client
            .post(TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .json(&json!({
                "grant_type": "authorization_code",
                "code": code,
                "redirect_uri": self.redirect_uri,
            }))
            .send()
            .await
            .map_err(|e| SyncError::transient(format!("Token exchange failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SyncError::auth(format!(
                "Token exchange rejected ({status}): {detail}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| SyncError::Serialization(format!("Invalid token response: {e}")))
    }
}
