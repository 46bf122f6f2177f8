//! Google identity provider
//!
//! Token endpoint calls (code exchange, refresh), revocation and the OpenID
//! userinfo lookup. Every failure here is an identity-provider failure.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use crate::Result;
use crate::config::{Endpoints, OAuthConfig};
use crate::error::Error;
use super::credentials::{expiry_after, Credentials, GOOGLE_ISSUER};

/// Scopes requested at login
pub const SCOPES: &[&str] = &[
    "openid",
    "email",
    "profile",
    "https://www.googleapis.com/auth/cloud-platform",
    "https://www.googleapis.com/auth/firebase",
];

/// Exchanges a refresh token for a new access token
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Returns the updated record; the caller persists it.
    async fn refresh(&self, credentials: &Credentials) -> Result<Credentials>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
}

impl TryFrom<TokenResponse> for Credentials {
    type Error = Error;

    fn try_from(response: TokenResponse) -> Result<Self> {
        if let Some(secs) = response.expires_in {
            if expiry_after(secs).is_none() {
                return Err(Error::Identity(format!(
                    "Malformed token response: expires_in {} out of range",
                    secs
                )));
            }
        }

        let mut creds = Credentials::new(
            response.access_token,
            response.refresh_token,
            response.expires_in,
        );
        if let Some(token_type) = response.token_type {
            creds.token_type = token_type;
        }
        creds.scope = response.scope;
        creds.id_token = response.id_token;
        creds.issuer = Some(GOOGLE_ISSUER.to_string());
        Ok(creds)
    }
}

#[derive(Debug, Serialize)]
struct RefreshGrant<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    refresh_token: &'a str,
}

#[derive(Debug, Serialize)]
struct CodeGrant<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
    code_verifier: &'a str,
    redirect_uri: &'a str,
}

/// OpenID Connect userinfo claims
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// Google OAuth2 / OpenID client
#[derive(Clone)]
pub struct GoogleIdentity {
    client: OAuthConfig,
    endpoints: Endpoints,
    http: Client,
}

impl GoogleIdentity {
    pub fn new(client: OAuthConfig, endpoints: Endpoints, http: Client) -> Self {
        Self { client, endpoints, http }
    }

    pub fn client_id(&self) -> &str {
        &self.client.client_id
    }

    pub fn authorize_endpoint(&self) -> &str {
        &self.endpoints.authorize
    }

    /// Trade an authorization code (plus PKCE verifier) for tokens
    pub async fn exchange_code(&self, code: &str, verifier: &str, redirect_uri: &str) -> Result<Credentials> {
        let grant = CodeGrant {
            grant_type: "authorization_code",
            client_id: &self.client.client_id,
            client_secret: &self.client.client_secret,
            code,
            code_verifier: verifier,
            redirect_uri,
        };
        let response = self.token_request(&grant).await?;
        if response.refresh_token.is_none() {
            tracing::warn!("Token endpoint returned no refresh token; the session cannot be renewed");
        }
        Credentials::try_from(response)
    }

    /// Revoke a token at the provider
    pub async fn revoke(&self, token: &str) -> Result<()> {
        let response = self.http
            .post(&self.endpoints.revoke)
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|e| Error::Identity(format!("Revocation request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Identity(format!("Revocation rejected ({}): {}", status, body)));
        }
        Ok(())
    }

    /// Claims about the signed-in user
    pub async fn user_info(&self, access_token: &str) -> Result<UserInfo> {
        let response = self.http
            .get(&self.endpoints.userinfo)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| Error::Identity(format!("Userinfo request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Identity(format!("Userinfo rejected ({}): {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Identity(format!("Malformed userinfo response: {}", e)))
    }

    async fn token_request<T: Serialize + ?Sized>(&self, form: &T) -> Result<TokenResponse> {
        let response = self.http
            .post(&self.endpoints.token)
            .form(form)
            .send()
            .await
            .map_err(|e| Error::Identity(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Identity(format!("Token endpoint rejected request ({}): {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Identity(format!("Malformed token response: {}", e)))
    }
}

#[async_trait]
impl TokenRefresher for GoogleIdentity {
    async fn refresh(&self, credentials: &Credentials) -> Result<Credentials> {
        let refresh_token = credentials
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Identity("No refresh token stored".to_string()))?;

        let grant = RefreshGrant {
            grant_type: "refresh_token",
            client_id: &self.client.client_id,
            client_secret: &self.client.client_secret,
            refresh_token,
        };

        let response = self.token_request(&grant).await?;
        tracing::info!("Access token refreshed");
        Ok(credentials.merge_refreshed(Credentials::try_from(response)?))
    }
}
