//! Cloud Billing API (v1): billing accounts and per-project billing state

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use crate::Result;
use crate::http::{endpoint, ApiClient, ApiFamily, ApiRequest};
use crate::paging::{FnSource, Page, Pager};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingAccount {
    /// `billingAccounts/XXXXXX-XXXXXX-XXXXXX`
    pub name: String,
    #[serde(default)]
    pub open: bool,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub master_billing_account: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectBillingInfo {
    pub name: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub billing_account_name: Option<String>,
    #[serde(default)]
    pub billing_enabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountList {
    #[serde(default)]
    billing_accounts: Vec<BillingAccount>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Clone)]
pub struct CloudBilling {
    api: ApiClient,
    base: String,
}

impl CloudBilling {
    pub fn new(api: ApiClient, base: impl Into<String>) -> Self {
        Self { api, base: base.into() }
    }

    pub async fn list_billing_accounts(&self, page_token: Option<&str>, page_size: u32) -> Result<Page<BillingAccount>> {
        let url = endpoint(&self.base, &["v1", "billingAccounts"])?;
        let request = ApiRequest::get(ApiFamily::GoogleCloud, url)
            .query("pageSize", page_size)
            .query_opt("pageToken", page_token);

        let list: AccountList = self.api.fetch(&request).await?;
        Ok(Page::new(list.billing_accounts, list.next_page_token))
    }

    pub fn billing_accounts(&self, page_size: u32, page_token: Option<String>) -> Pager<FnSource<BillingAccount>> {
        let this = self.clone();
        let source = FnSource::new(move |token, size| {
            let this = this.clone();
            async move { this.list_billing_accounts(token.as_deref(), size).await }.boxed()
        });
        Pager::starting_at(source, page_size, page_token)
    }

    pub async fn get_project_billing_info(&self, project: &str) -> Result<ProjectBillingInfo> {
        let url = endpoint(&self.base, &["v1", "projects", project, "billingInfo"])?;
        self.api.fetch(&ApiRequest::get(ApiFamily::GoogleCloud, url)).await
    }
}
