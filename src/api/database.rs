//! Realtime Database: instance management (v1beta) and REST data reads

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::Result;
use crate::http::{endpoint, ApiClient, ApiFamily, ApiRequest};
use crate::paging::{FnSource, Page, Pager};

const VERSION: &str = "v1beta";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseInstance {
    pub name: String,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default, rename = "type")]
    pub instance_type: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

impl DatabaseInstance {
    /// Instance id: the last segment of `name`
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceList {
    #[serde(default)]
    instances: Vec<DatabaseInstance>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Clone)]
pub struct RealtimeDatabase {
    api: ApiClient,
    base: String,
}

impl RealtimeDatabase {
    pub fn new(api: ApiClient, base: impl Into<String>) -> Self {
        Self { api, base: base.into() }
    }

    /// Instances in every location of `project`
    pub async fn list_instances(
        &self,
        project: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<Page<DatabaseInstance>> {
        let url = endpoint(&self.base, &[VERSION, "projects", project, "locations", "-", "instances"])?;
        let request = ApiRequest::get(ApiFamily::Firebase, url)
            .query("pageSize", page_size)
            .query_opt("pageToken", page_token);

        let list: InstanceList = self.api.fetch(&request).await?;
        Ok(Page::new(list.instances, list.next_page_token))
    }

    pub fn instances(&self, project: &str, page_size: u32, page_token: Option<String>) -> Pager<FnSource<DatabaseInstance>> {
        let this = self.clone();
        let project = project.to_string();
        let source = FnSource::new(move |token, size| {
            let this = this.clone();
            let project = project.clone();
            async move { this.list_instances(&project, token.as_deref(), size).await }.boxed()
        });
        Pager::starting_at(source, page_size, page_token)
    }

    /// Read the JSON tree at `path` of the database served from `database_url`.
    ///
    /// `shallow` returns only the keys one level down, with `true` in place of subtrees.
    pub async fn read(&self, database_url: &str, path: &str, shallow: bool) -> Result<Value> {
        let mut segments: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        match segments.last_mut() {
            Some(last) => last.push_str(".json"),
            None => segments.push(".json".to_string()),
        }
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

        let url = endpoint(database_url, &segments)?;
        let mut request = ApiRequest::get(ApiFamily::Firebase, url);
        if shallow {
            request = request.query("shallow", "true");
        }
        self.api.fetch(&request).await
    }
}
