//! Authorized HTTP access to Google APIs
//!
//! Every request goes through [`ApiClient::send`], which
//! - attaches the stored access token, renewing it first when it is due,
//! - on a 401, refreshes the token, persists it and re-issues the request once.
//!
//! Concurrent requests that hit a 401 each run their own refresh.

use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use url::Url;
use crate::Result;
use crate::auth::{CredentialStore, Credentials, TokenRefresher};
use crate::error::Error;

/// Which error tag a remote failure carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFamily {
    Firebase,
    GoogleCloud,
}

impl ApiFamily {
    pub fn error(self, message: impl Into<String>) -> Error {
        match self {
            ApiFamily::Firebase => Error::FirebaseApi(message.into()),
            ApiFamily::GoogleCloud => Error::GoogleCloudApi(message.into()),
        }
    }
}

/// Build `base/seg1/seg2/...`, percent-encoding each segment on its own.
///
/// A `/` inside a segment is encoded, which Cloud Storage object names need.
pub fn endpoint(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| Error::Config(format!("Invalid endpoint {:?}: {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| Error::Config(format!("Endpoint {:?} cannot take a path", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// A request that can be re-issued after a token refresh
#[derive(Debug, Clone)]
pub struct ApiRequest {
    family: ApiFamily,
    method: Method,
    url: Url,
    body: Option<Value>,
}

impl ApiRequest {
    pub fn new(family: ApiFamily, method: Method, url: Url) -> Self {
        Self { family, method, url, body: None }
    }

    pub fn get(family: ApiFamily, url: Url) -> Self {
        Self::new(family, Method::GET, url)
    }

    pub fn post(family: ApiFamily, url: Url) -> Self {
        Self::new(family, Method::POST, url)
    }

    pub fn delete(family: ApiFamily, url: Url) -> Self {
        Self::new(family, Method::DELETE, url)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.url.query_pairs_mut().append_pair(key, &value.to_string());
        self
    }

    /// Append the parameter only when a value is present (and non-empty for strings)
    pub fn query_opt<V: ToString>(self, key: &str, value: Option<V>) -> Self {
        match value.map(|v| v.to_string()).filter(|v| !v.is_empty()) {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    pub fn json<B: Serialize>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn family(&self) -> ApiFamily {
        self.family
    }

    fn label(&self) -> String {
        format!("{} {}", self.method, self.url.path())
    }
}

/// HTTP client that authenticates every request with the stored credential
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
}

impl ApiClient {
    pub fn new(http: Client, store: Arc<dyn CredentialStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self { http, store, refresher }
    }

    /// Send and decode a JSON response
    pub async fn fetch<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T> {
        let response = self.send(request).await?;
        let body = response
            .text()
            .await
            .map_err(|e| request.family.error(format!("{}: {}", request.label(), e)))?;

        serde_json::from_str(&body).map_err(|e| {
            request.family.error(format!("{}: unexpected response: {}", request.label(), e))
        })
    }

    /// Send and ignore the response body
    pub async fn execute(&self, request: &ApiRequest) -> Result<()> {
        self.send(request).await.map(|_| ())
    }

    /// Send with authentication; non-2xx responses become errors
    pub async fn send(&self, request: &ApiRequest) -> Result<Response> {
        let creds = self.current_credentials().await?;
        let response = self.dispatch(request, &creds).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return into_success(request, response).await;
        }

        let rejection = describe_failure(request, response).await;
        tracing::info!("{} was rejected as unauthorized, refreshing token", request.label());

        let refreshed = match self.refresh_stored().await {
            Ok(creds) => creds,
            Err(Error::Identity(reason)) => {
                tracing::warn!("Token refresh failed: {}", reason);
                return Err(Error::Identity(rejection));
            }
            Err(other) => return Err(other),
        };

        let retried = self.dispatch(request, &refreshed).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            return Err(Error::Identity(describe_failure(request, retried).await));
        }
        into_success(request, retried).await
    }

    /// The credential to attach, renewed first when it is due.
    ///
    /// A failed renewal here is not fatal: the request goes out with the
    /// current token and a 401 falls through to the refresh-and-retry path.
    async fn current_credentials(&self) -> Result<Credentials> {
        let creds = self
            .store
            .load()?
            .ok_or_else(|| Error::Identity("Not signed in. Run 'konsol login' first.".to_string()))?;

        if !(creds.needs_refresh() && creds.can_refresh()) {
            tracing::debug!("Using stored access token");
            return Ok(creds);
        }

        match self.refresher.refresh(&creds).await {
            Ok(fresh) => {
                self.store.save(&fresh)?;
                Ok(fresh)
            }
            Err(e) => {
                tracing::warn!("Proactive token refresh failed, sending current token: {}", e);
                Ok(creds)
            }
        }
    }

    async fn refresh_stored(&self) -> Result<Credentials> {
        let creds = self
            .store
            .load()?
            .ok_or_else(|| Error::Identity("Credential removed while request was in flight".to_string()))?;

        if !creds.can_refresh() {
            return Err(Error::Identity("No refresh token stored".to_string()));
        }

        let fresh = self.refresher.refresh(&creds).await?;
        self.store.save(&fresh)?;
        Ok(fresh)
    }

    async fn dispatch(&self, request: &ApiRequest, creds: &Credentials) -> Result<Response> {
        tracing::debug!("{}", request.label());

        let mut builder = self.http
            .request(request.method.clone(), request.url.clone())
            .bearer_auth(&creds.access_token);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        builder
            .send()
            .await
            .map_err(|e| request.family.error(format!("{}: {}", request.label(), e)))
    }
}

async fn into_success(request: &ApiRequest, response: Response) -> Result<Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(request.family.error(describe_failure(request, response).await))
    }
}

/// "METHOD /path: 403 Forbidden: message" using Google's error envelope when present
async fn describe_failure(request: &ApiRequest, response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    format!("{}: {}: {}", request.label(), status, error_message(&body))
}

fn error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let from_envelope = parsed.as_ref().and_then(|v| {
        let error = v.get("error")?;
        error
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| error.as_str())
            .map(str::to_string)
    });

    from_envelope.unwrap_or_else(|| {
        let trimmed = body.trim();
        if trimmed.len() > 200 {
            let cut = (0..=200).rev().find(|&i| trimmed.is_char_boundary(i)).unwrap_or(0);
            format!("{}…", &trimmed[..cut])
        } else {
            trimmed.to_string()
        }
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::testing::{api_client, signed_in};
    use crate::auth::InMemoryCredentialStore;
    use crate::error::ErrorKind;
    use httpmock::prelude::*;
    use serde_json::json;

    fn thing(server: &MockServer) -> ApiRequest {
        ApiRequest::get(ApiFamily::Firebase, endpoint(&server.base_url(), &["v1", "thing"]).unwrap())
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let url = endpoint("https://storage.googleapis.com", &["storage", "v1", "b", "bk", "o", "dir/a b.txt"]).unwrap();
        assert_eq!(url.as_str(), "https://storage.googleapis.com/storage/v1/b/bk/o/dir%2Fa%20b.txt");
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let url = endpoint("http://localhost:9000/emulator/", &["v1", "x"]).unwrap();
        assert_eq!(url.path(), "/emulator/v1/x");
    }

    #[test]
    fn test_query_opt_skips_empty() {
        let url = endpoint("https://example.com", &["x"]).unwrap();
        let request = ApiRequest::get(ApiFamily::GoogleCloud, url)
            .query_opt("pageToken", None::<String>)
            .query_opt("prefix", Some(""))
            .query_opt("pageSize", Some(10));
        assert_eq!(request.url().query(), Some("pageSize=10"));
    }

    #[test]
    fn test_error_message_prefers_envelope() {
        let body = r#"{"error": {"code": 403, "message": "The caller does not have permission", "status": "PERMISSION_DENIED"}}"#;
        assert_eq!(error_message(body), "The caller does not have permission");
        assert_eq!(error_message(r#"{"error": "Permission denied"}"#), "Permission denied");
        assert_eq!(error_message("plain text"), "plain text");
    }

    #[tokio::test]
    async fn test_attaches_bearer_token() {
        let server = MockServer::start_async().await;
        let mock = server.mock_async(|when, then| {
            when.method(GET).path("/v1/thing").header("authorization", "Bearer t1");
            then.status(200).json_body(json!({"ok": true}));
        }).await;

        let client = api_client(&server.base_url(), signed_in("t1"));
        let value: Value = client.fetch(&thing(&server)).await.unwrap();

        mock.assert_async().await;
        assert_eq!(value["ok"], true);
    }

    #[tokio::test]
    async fn test_unauthorized_refreshes_and_retries_once() {
        let server = MockServer::start_async().await;
        let stale = server.mock_async(|when, then| {
            when.method(GET).path("/v1/thing").header("authorization", "Bearer stale");
            then.status(401).json_body(json!({"error": {"code": 401, "message": "expired"}}));
        }).await;
        let fresh = server.mock_async(|when, then| {
            when.method(GET).path("/v1/thing").header("authorization", "Bearer fresh");
            then.status(200).json_body(json!({"ok": true}));
        }).await;
        let token = server.mock_async(|when, then| {
            when.method(POST).path("/token").body_contains("grant_type=refresh_token");
            then.status(200).json_body(json!({"access_token": "fresh", "expires_in": 3600}));
        }).await;

        let store = signed_in("stale");
        let client = api_client(&server.base_url(), store.clone());
        let value: Value = client.fetch(&thing(&server)).await.unwrap();

        assert_eq!(value["ok"], true);
        stale.assert_hits_async(1).await;
        token.assert_hits_async(1).await;
        fresh.assert_hits_async(1).await;

        let saved = store.load().unwrap().unwrap();
        assert_eq!(saved.access_token, "fresh");
        assert_eq!(saved.refresh_token.as_deref(), Some("refresh"));
    }

    #[tokio::test]
    async fn test_failed_refresh_surfaces_original_rejection() {
        let server = MockServer::start_async().await;
        let api = server.mock_async(|when, then| {
            when.method(GET).path("/v1/thing");
            then.status(401).json_body(json!({"error": {"code": 401, "message": "Request had invalid authentication credentials."}}));
        }).await;
        server.mock_async(|when, then| {
            when.method(POST).path("/token");
            then.status(400).json_body(json!({"error": "invalid_grant"}));
        }).await;

        let client = api_client(&server.base_url(), signed_in("stale"));
        let err = client.fetch::<Value>(&thing(&server)).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::IdentityProvider);
        let message = err.to_string();
        assert!(message.contains("401"));
        assert!(message.contains("invalid authentication credentials"));
        assert!(!message.contains("invalid_grant"));
        api.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_out_of_range_refresh_lifetime_fails_cleanly() {
        let server = MockServer::start_async().await;
        let api = server.mock_async(|when, then| {
            when.method(GET).path("/v1/thing").header("authorization", "Bearer stale");
            then.status(401).json_body(json!({"error": {"code": 401, "message": "expired"}}));
        }).await;
        server.mock_async(|when, then| {
            when.method(POST).path("/token");
            then.status(200).json_body(json!({"access_token": "fresh", "expires_in": i64::MAX}));
        }).await;

        let store = signed_in("stale");
        let client = api_client(&server.base_url(), store.clone());
        let err = client.execute(&thing(&server)).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::IdentityProvider);
        api.assert_hits_async(1).await;
        assert_eq!(store.load().unwrap().unwrap().access_token, "stale");
    }

    #[tokio::test]
    async fn test_second_rejection_is_not_retried() {
        let server = MockServer::start_async().await;
        let api = server.mock_async(|when, then| {
            when.method(GET).path("/v1/thing");
            then.status(401);
        }).await;
        let token = server.mock_async(|when, then| {
            when.method(POST).path("/token");
            then.status(200).json_body(json!({"access_token": "fresh", "expires_in": 3600}));
        }).await;

        let client = api_client(&server.base_url(), signed_in("stale"));
        let err = client.fetch::<Value>(&thing(&server)).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::IdentityProvider);
        api.assert_hits_async(2).await;
        token.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_rejection_without_refresh_token() {
        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(GET).path("/v1/thing");
            then.status(401);
        }).await;
        let token = server.mock_async(|when, then| {
            when.method(POST).path("/token");
            then.status(200);
        }).await;

        let store = Arc::new(InMemoryCredentialStore::with(Credentials::new("only".to_string(), None, None)));
        let client = api_client(&server.base_url(), store);
        let err = client.fetch::<Value>(&thing(&server)).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::IdentityProvider);
        token.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn test_due_token_renewed_before_sending() {
        let server = MockServer::start_async().await;
        let stale = server.mock_async(|when, then| {
            when.method(GET).path("/v1/thing").header("authorization", "Bearer stale");
            then.status(500);
        }).await;
        let fresh = server.mock_async(|when, then| {
            when.method(GET).path("/v1/thing").header("authorization", "Bearer fresh");
            then.status(200).json_body(json!({}));
        }).await;
        let token = server.mock_async(|when, then| {
            when.method(POST).path("/token");
            then.status(200).json_body(json!({"access_token": "fresh", "expires_in": 3600}));
        }).await;

        let store = Arc::new(InMemoryCredentialStore::with(Credentials::new(
            "stale".to_string(),
            Some("refresh".to_string()),
            Some(30),
        )));
        let client = api_client(&server.base_url(), store.clone());
        tokio_test::assert_ok!(client.execute(&thing(&server)).await);

        stale.assert_hits_async(0).await;
        token.assert_hits_async(1).await;
        fresh.assert_hits_async(1).await;
        assert_eq!(store.load().unwrap().unwrap().access_token, "fresh");
    }

    #[tokio::test]
    async fn test_failed_renewal_still_sends_current_token() {
        let server = MockServer::start_async().await;
        let api = server.mock_async(|when, then| {
            when.method(GET).path("/v1/thing").header("authorization", "Bearer stale");
            then.status(200).json_body(json!({}));
        }).await;
        server.mock_async(|when, then| {
            when.method(POST).path("/token");
            then.status(503);
        }).await;

        let store = Arc::new(InMemoryCredentialStore::with(Credentials::new(
            "stale".to_string(),
            Some("refresh".to_string()),
            Some(30),
        )));
        let client = api_client(&server.base_url(), store);
        tokio_test::assert_ok!(client.execute(&thing(&server)).await);
        api.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_signed_out_makes_no_request() {
        let server = MockServer::start_async().await;
        let api = server.mock_async(|when, then| {
            when.method(GET).path("/v1/thing");
            then.status(200);
        }).await;

        let client = api_client(&server.base_url(), Arc::new(InMemoryCredentialStore::new()));
        let err = client.execute(&thing(&server)).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::IdentityProvider);
        api.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn test_other_failures_tagged_by_family() {
        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(GET).path("/v1/thing");
            then.status(403).json_body(json!({"error": {"code": 403, "message": "denied", "status": "PERMISSION_DENIED"}}));
        }).await;

        let client = api_client(&server.base_url(), signed_in("t"));

        let firebase = client.execute(&thing(&server)).await.unwrap_err();
        assert_eq!(firebase.kind(), ErrorKind::FirebaseApi);
        assert!(firebase.to_string().contains("denied"));

        let url = endpoint(&server.base_url(), &["v1", "thing"]).unwrap();
        let cloud = client.execute(&ApiRequest::get(ApiFamily::GoogleCloud, url)).await.unwrap_err();
        assert_eq!(cloud.kind(), ErrorKind::GoogleCloudApi);
    }

    #[tokio::test]
    async fn test_malformed_body_is_api_failure() {
        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(GET).path("/v1/thing");
            then.status(200).body("<html>");
        }).await;

        let client = api_client(&server.base_url(), signed_in("t"));
        let err = client.fetch::<Value>(&thing(&server)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FirebaseApi);
    }
}
