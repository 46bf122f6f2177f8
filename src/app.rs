//! Wiring: one shared HTTP client, credential store and identity provider
//! behind every API client.

use std::sync::Arc;
use std::time::Duration;
use reqwest::Client;
use crate::Result;
use crate::api::{
    CloudBilling, CloudMessaging, CloudStorage, FirebaseManagement, Firestore, RealtimeDatabase, TestLab,
};
use crate::auth::{
    logout, CredentialStore, GoogleIdentity, LoginFlow, SqliteCredentialStore, TokenRefresher, UserInfo,
};
use crate::config::Config;
use crate::error::Error;
use crate::http::ApiClient;

const USER_AGENT: &str = concat!("konsol/", env!("CARGO_PKG_VERSION"));

pub struct Konsol {
    config: Config,
    store: Arc<dyn CredentialStore>,
    identity: GoogleIdentity,
    api: ApiClient,
}

impl Konsol {
    /// Open the on-disk credential store named by `config`
    pub fn open(config: Config) -> Result<Self> {
        let store = SqliteCredentialStore::open(&config.database_path)?;
        Self::with_store(config, Arc::new(store))
    }

    pub fn with_store(config: Config, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        let identity = GoogleIdentity::new(config.oauth.clone(), config.endpoints.clone(), http.clone());
        let api = ApiClient::new(http, store.clone(), Arc::new(identity.clone()));

        Ok(Self { config, store, identity, api })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &dyn CredentialStore {
        self.store.as_ref()
    }

    pub async fn login(&self) -> Result<UserInfo> {
        let flow = LoginFlow::new(self.identity.clone(), self.store.clone(), self.config.oauth.redirect_port);
        let creds = flow.login().await?;
        self.identity.user_info(&creds.access_token).await
    }

    /// Returns false when nobody was signed in
    pub async fn logout(&self) -> Result<bool> {
        logout(&self.identity, self.store.as_ref()).await
    }

    /// The signed-in account, refreshing an expired token first
    pub async fn account(&self) -> Result<Option<UserInfo>> {
        let Some(mut creds) = self.store.load()? else {
            return Ok(None);
        };

        if creds.needs_refresh() && creds.can_refresh() {
            creds = self.identity.refresh(&creds).await?;
            self.store.save(&creds)?;
        }

        self.identity.user_info(&creds.access_token).await.map(Some)
    }

    pub fn firebase(&self) -> FirebaseManagement {
        FirebaseManagement::new(self.api.clone(), &self.config.endpoints.firebase)
    }

    pub fn storage(&self) -> CloudStorage {
        CloudStorage::new(self.api.clone(), &self.config.endpoints.storage)
    }

    pub fn firestore(&self) -> Firestore {
        Firestore::new(self.api.clone(), &self.config.endpoints.firestore)
    }

    pub fn database(&self) -> RealtimeDatabase {
        RealtimeDatabase::new(self.api.clone(), &self.config.endpoints.database)
    }

    pub fn messaging(&self) -> CloudMessaging {
        CloudMessaging::new(self.api.clone(), &self.config.endpoints.messaging)
    }

    pub fn testlab(&self) -> TestLab {
        TestLab::new(
            self.api.clone(),
            &self.config.endpoints.testing,
            &self.config.endpoints.tool_results,
        )
    }

    pub fn billing(&self) -> CloudBilling {
        CloudBilling::new(self.api.clone(), &self.config.endpoints.billing)
    }
}
