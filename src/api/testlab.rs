//! Firebase Test Lab: test matrices (Testing API v1) and results (Tool Results v1beta3)

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use crate::Result;
use crate::http::{endpoint, ApiClient, ApiFamily, ApiRequest};
use crate::paging::{FnSource, Page, Pager};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestMatrix {
    pub test_matrix_id: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub outcome_summary: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub invalid_matrix_details: Option<String>,
    #[serde(default)]
    pub result_storage: Option<ResultStorage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultStorage {
    #[serde(default)]
    pub tool_results_history: Option<ToolResultsHistory>,
    #[serde(default)]
    pub results_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultsHistory {
    pub project_id: String,
    pub history_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct History {
    pub history_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub test_platform: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub execution_id: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub outcome: Option<Outcome>,
    #[serde(default)]
    pub creation_time: Option<Timestamp>,
    #[serde(default)]
    pub test_execution_matrix_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    #[serde(default)]
    pub summary: Option<String>,
}

/// Tool Results timestamps are `{seconds, nanos}` objects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timestamp {
    #[serde(default)]
    pub seconds: Option<String>,
    #[serde(default)]
    pub nanos: Option<i32>,
}

impl Timestamp {
    pub fn to_datetime(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        let seconds: i64 = self.seconds.as_deref()?.parse().ok()?;
        let nanos = self.nanos.unwrap_or(0).max(0) as u32;
        chrono::DateTime::from_timestamp(seconds, nanos)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryList {
    #[serde(default)]
    histories: Vec<History>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecutionList {
    #[serde(default)]
    executions: Vec<Execution>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelResponse {
    #[serde(default)]
    test_state: Option<String>,
}

#[derive(Clone)]
pub struct TestLab {
    api: ApiClient,
    testing_base: String,
    results_base: String,
}

impl TestLab {
    pub fn new(api: ApiClient, testing_base: impl Into<String>, results_base: impl Into<String>) -> Self {
        Self { api, testing_base: testing_base.into(), results_base: results_base.into() }
    }

    pub async fn get_matrix(&self, project: &str, matrix_id: &str) -> Result<TestMatrix> {
        let url = endpoint(&self.testing_base, &["v1", "projects", project, "testMatrices", matrix_id])?;
        self.api.fetch(&ApiRequest::get(ApiFamily::GoogleCloud, url)).await
    }

    /// Cancel a running matrix; returns the resulting test state
    pub async fn cancel_matrix(&self, project: &str, matrix_id: &str) -> Result<Option<String>> {
        let cancel = format!("{}:cancel", matrix_id);
        let url = endpoint(&self.testing_base, &["v1", "projects", project, "testMatrices", &cancel])?;
        let response: CancelResponse = self.api.fetch(&ApiRequest::post(ApiFamily::GoogleCloud, url)).await?;
        Ok(response.test_state)
    }

    pub async fn list_histories(&self, project: &str, page_token: Option<&str>, page_size: u32) -> Result<Page<History>> {
        let url = endpoint(&self.results_base, &["toolresults", "v1beta3", "projects", project, "histories"])?;
        let request = ApiRequest::get(ApiFamily::GoogleCloud, url)
            .query("pageSize", page_size)
            .query_opt("pageToken", page_token);

        let list: HistoryList = self.api.fetch(&request).await?;
        Ok(Page::new(list.histories, list.next_page_token))
    }

    pub fn histories(&self, project: &str, page_size: u32, page_token: Option<String>) -> Pager<FnSource<History>> {
        let this = self.clone();
        let project = project.to_string();
        let source = FnSource::new(move |token, size| {
            let this = this.clone();
            let project = project.clone();
            async move { this.list_histories(&project, token.as_deref(), size).await }.boxed()
        });
        Pager::starting_at(source, page_size, page_token)
    }

    pub async fn list_executions(
        &self,
        project: &str,
        history_id: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<Page<Execution>> {
        let url = endpoint(
            &self.results_base,
            &["toolresults", "v1beta3", "projects", project, "histories", history_id, "executions"],
        )?;
        let request = ApiRequest::get(ApiFamily::GoogleCloud, url)
            .query("pageSize", page_size)
            .query_opt("pageToken", page_token);

        let list: ExecutionList = self.api.fetch(&request).await?;
        Ok(Page::new(list.executions, list.next_page_token))
    }

    pub fn executions(
        &self,
        project: &str,
        history_id: &str,
        page_size: u32,
        page_token: Option<String>,
    ) -> Pager<FnSource<Execution>> {
        let this = self.clone();
        let project = project.to_string();
        let history_id = history_id.to_string();
        let source = FnSource::new(move |token, size| {
            let this = this.clone();
            let project = project.clone();
            let history_id = history_id.clone();
            async move {
                this.list_executions(&project, &history_id, token.as_deref(), size).await
            }
            .boxed()
        });
        Pager::starting_at(source, page_size, page_token)
    }
}
