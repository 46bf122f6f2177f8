//! Firebase Management API (v1beta1): projects and registered apps

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use crate::Result;
use crate::http::{endpoint, ApiClient, ApiFamily, ApiRequest};
use crate::paging::{FnSource, Page, Pager};

const VERSION: &str = "v1beta1";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirebaseProject {
    pub name: String,
    pub project_id: String,
    #[serde(default)]
    pub project_number: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub resources: Option<DefaultResources>,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultResources {
    #[serde(default)]
    pub hosting_site: Option<String>,
    #[serde(default)]
    pub realtime_database_instance: Option<String>,
    #[serde(default)]
    pub storage_bucket: Option<String>,
    #[serde(default)]
    pub location_id: Option<String>,
}

/// An Android, iOS or Web app registered in a project
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirebaseApp {
    pub name: String,
    pub app_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    /// Android only
    #[serde(default)]
    pub package_name: Option<String>,
    /// iOS only
    #[serde(default)]
    pub bundle_id: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppPlatform {
    Android,
    Ios,
    Web,
}

impl AppPlatform {
    fn collection(self) -> &'static str {
        match self {
            AppPlatform::Android => "androidApps",
            AppPlatform::Ios => "iosApps",
            AppPlatform::Web => "webApps",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectList {
    #[serde(default)]
    results: Vec<FirebaseProject>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppList {
    #[serde(default)]
    apps: Vec<FirebaseApp>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Clone)]
pub struct FirebaseManagement {
    api: ApiClient,
    base: String,
}

impl FirebaseManagement {
    pub fn new(api: ApiClient, base: impl Into<String>) -> Self {
        Self { api, base: base.into() }
    }

    pub async fn list_projects(&self, page_token: Option<&str>, page_size: u32) -> Result<Page<FirebaseProject>> {
        let url = endpoint(&self.base, &[VERSION, "projects"])?;
        let request = ApiRequest::get(ApiFamily::Firebase, url)
            .query("pageSize", page_size)
            .query_opt("pageToken", page_token);

        let list: ProjectList = self.api.fetch(&request).await?;
        Ok(Page::new(list.results, list.next_page_token))
    }

    pub fn projects(&self, page_size: u32, page_token: Option<String>) -> Pager<FnSource<FirebaseProject>> {
        let this = self.clone();
        let source = FnSource::new(move |token, size| {
            let this = this.clone();
            async move { this.list_projects(token.as_deref(), size).await }.boxed()
        });
        Pager::starting_at(source, page_size, page_token)
    }

    pub async fn get_project(&self, project: &str) -> Result<FirebaseProject> {
        let url = endpoint(&self.base, &[VERSION, "projects", project])?;
        self.api.fetch(&ApiRequest::get(ApiFamily::Firebase, url)).await
    }

    pub async fn list_apps(
        &self,
        project: &str,
        platform: AppPlatform,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<Page<FirebaseApp>> {
        let url = endpoint(&self.base, &[VERSION, "projects", project, platform.collection()])?;
        let request = ApiRequest::get(ApiFamily::Firebase, url)
            .query("pageSize", page_size)
            .query_opt("pageToken", page_token);

        let list: AppList = self.api.fetch(&request).await?;
        Ok(Page::new(list.apps, list.next_page_token))
    }

    pub fn apps(
        &self,
        project: &str,
        platform: AppPlatform,
        page_size: u32,
        page_token: Option<String>,
    ) -> Pager<FnSource<FirebaseApp>> {
        let this = self.clone();
        let project = project.to_string();
        let source = FnSource::new(move |token, size| {
            let this = this.clone();
            let project = project.clone();
            async move { this.list_apps(&project, platform, token.as_deref(), size).await }.boxed()
        });
        Pager::starting_at(source, page_size, page_token)
    }
}
