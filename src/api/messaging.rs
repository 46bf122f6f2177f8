//! Firebase Cloud Messaging HTTP v1: sending messages

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::Result;
use crate::error::Error;
use crate::http::{endpoint, ApiClient, ApiFamily, ApiRequest};

/// Who receives a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Token(String),
    Topic(String),
    Condition(String),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Notification {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    #[serde(flatten)]
    pub target: Target,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<Notification>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

impl Message {
    pub fn new(target: Target) -> Self {
        Self { target, notification: None, data: BTreeMap::new() }
    }

    pub fn with_notification(mut self, title: Option<String>, body: Option<String>) -> Self {
        self.notification = Some(Notification { title, body, image: None });
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    validate_only: bool,
    message: &'a Message,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    name: String,
}

#[derive(Clone)]
pub struct CloudMessaging {
    api: ApiClient,
    base: String,
}

impl CloudMessaging {
    pub fn new(api: ApiClient, base: impl Into<String>) -> Self {
        Self { api, base: base.into() }
    }

    /// Send `message`; returns the message id (`projects/*/messages/*`).
    ///
    /// With `dry_run` the message is validated but not delivered.
    pub async fn send(&self, project: &str, message: &Message, dry_run: bool) -> Result<String> {
        if message.notification.is_none() && message.data.is_empty() {
            return Err(Error::Config("A message needs a notification or data payload".to_string()));
        }

        let url = endpoint(&self.base, &["v1", "projects", project, "messages:send"])?;
        let request = ApiRequest::post(ApiFamily::Firebase, url)
            .json(&SendRequest { validate_only: dry_run, message })?;

        let response: SendResponse = self.api.fetch(&request).await?;
        tracing::info!("Message accepted: {}", response.name);
        Ok(response.name)
    }
}
