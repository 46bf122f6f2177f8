//! Interactive sign-in and sign-out

use std::sync::Arc;
use url::Url;
use crate::Result;
use crate::error::Error;
use super::callback_server;
use super::credentials::Credentials;
use super::identity::{GoogleIdentity, SCOPES};
use super::pkce::{generate_state, PkceChallenge};
use super::store::CredentialStore;

/// Browser-based authorization code flow with PKCE
pub struct LoginFlow {
    identity: GoogleIdentity,
    store: Arc<dyn CredentialStore>,
    redirect_port: u16,
}

impl LoginFlow {
    pub fn new(identity: GoogleIdentity, store: Arc<dyn CredentialStore>, redirect_port: u16) -> Self {
        Self { identity, store, redirect_port }
    }

    /// Run the full flow and persist the resulting credential
    pub async fn login(&self) -> Result<Credentials> {
        if self.identity.client_id().is_empty() {
            return Err(Error::Config("No OAuth client configured. Run 'konsol init' first.".to_string()));
        }

        let listener = callback_server::bind(self.redirect_port).await?;
        let port = listener.local_addr()?.port();
        let redirect_uri = callback_server::redirect_uri(port);

        let pkce = PkceChallenge::generate();
        let state = generate_state();
        let auth_url = self.authorization_url(&pkce, &state, &redirect_uri)?;

        println!("\n🔐 Opening browser for Google sign-in...\n");
        println!("If the browser doesn't open, visit this URL:\n{}\n", auth_url);
        if let Err(e) = open::that(auth_url.as_str()) {
            tracing::warn!("Failed to open browser: {}", e);
        }

        println!("⏳ Waiting for authorization...");
        let auth = callback_server::receive_code(listener, &state).await?;

        let creds = self.identity
            .exchange_code(&auth.code, &pkce.verifier, &redirect_uri)
            .await?;
        self.store.save(&creds)?;
        tracing::info!("Signed in; credential stored");
        Ok(creds)
    }

    fn authorization_url(&self, pkce: &PkceChallenge, state: &str, redirect_uri: &str) -> Result<Url> {
        let mut url = Url::parse(self.identity.authorize_endpoint())
            .map_err(|e| Error::Config(format!("Invalid authorization endpoint: {}", e)))?;

        url.query_pairs_mut()
            .append_pair("client_id", self.identity.client_id())
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &SCOPES.join(" "))
            .append_pair("code_challenge", &pkce.challenge)
            .append_pair("code_challenge_method", pkce.method())
            .append_pair("state", state)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");

        Ok(url)
    }
}

/// Revoke the stored token (best effort) and delete the credential record
pub async fn logout(identity: &GoogleIdentity, store: &dyn CredentialStore) -> Result<bool> {
    let Some(creds) = store.load()? else {
        return Ok(false);
    };

    // Revoking the refresh token also invalidates its access tokens.
    let token = creds.refresh_token.as_deref().unwrap_or(&creds.access_token);
    if let Err(e) = identity.revoke(token).await {
        tracing::warn!("Token revocation failed, removing local credential anyway: {}", e);
    }

    store.clear()?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::InMemoryCredentialStore;
    use crate::config::{Endpoints, OAuthConfig};
    use httpmock::prelude::*;

    fn identity(base: &str) -> GoogleIdentity {
        let client = OAuthConfig {
            client_id: "cid".to_string(),
            client_secret: "secret".to_string(),
            redirect_port: 0,
        };
        GoogleIdentity::new(client, Endpoints::all_at(base), reqwest::Client::new())
    }

    #[test]
    fn test_authorization_url_carries_pkce_and_state() {
        let flow = LoginFlow::new(
            identity("http://127.0.0.1:1"),
            Arc::new(InMemoryCredentialStore::new()),
            0,
        );
        let pkce = PkceChallenge::generate();
        let url = flow
            .authorization_url(&pkce, "st", "http://127.0.0.1:8085/callback")
            .unwrap();

        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["client_id"], "cid");
        assert_eq!(pairs["code_challenge"], pkce.challenge);
        assert_eq!(pairs["code_challenge_method"], "S256");
        assert_eq!(pairs["state"], "st");
        assert_eq!(pairs["access_type"], "offline");
        assert!(pairs["scope"].contains("openid"));
    }

    #[tokio::test]
    async fn test_logout_revokes_and_clears() {
        let server = MockServer::start_async().await;
        let revoke = server.mock_async(|when, then| {
            when.method(POST).path("/revoke").body_contains("token=r1");
            then.status(200);
        }).await;

        let store = InMemoryCredentialStore::with(Credentials::new(
            "a".to_string(),
            Some("r1".to_string()),
            None,
        ));

        let removed = logout(&identity(&server.base_url()), &store).await.unwrap();

        assert!(removed);
        revoke.assert_async().await;
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_revoke_fails() {
        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(POST).path("/revoke");
            then.status(400);
        }).await;

        let store = InMemoryCredentialStore::with(Credentials::new("a".to_string(), None, None));

        assert!(logout(&identity(&server.base_url()), &store).await.unwrap());
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logout_when_signed_out() {
        let store = InMemoryCredentialStore::new();
        let removed = logout(&identity("http://127.0.0.1:1"), &store).await.unwrap();
        assert!(!removed);
    }
}
