//! Cloud Storage JSON API (v1): buckets and objects

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use crate::Result;
use crate::http::{endpoint, ApiClient, ApiFamily, ApiRequest};
use crate::paging::{FnSource, Page, Pager};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub storage_class: Option<String>,
    #[serde(default)]
    pub time_created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageObject {
    pub name: String,
    pub bucket: String,
    /// Decimal string, as the API sends it
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub generation: Option<String>,
    #[serde(default)]
    pub md5_hash: Option<String>,
    #[serde(default)]
    pub time_created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
}

impl StorageObject {
    pub fn size_bytes(&self) -> Option<u64> {
        self.size.as_deref().and_then(|s| s.parse().ok())
    }
}

/// One entry of a bucket level: a sub-"folder" prefix or an object
#[derive(Debug, Clone)]
pub enum ObjectEntry {
    Prefix(String),
    Object(StorageObject),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BucketList {
    #[serde(default)]
    items: Vec<Bucket>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectList {
    #[serde(default)]
    prefixes: Vec<String>,
    #[serde(default)]
    items: Vec<StorageObject>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Clone)]
pub struct CloudStorage {
    api: ApiClient,
    base: String,
}

impl CloudStorage {
    pub fn new(api: ApiClient, base: impl Into<String>) -> Self {
        Self { api, base: base.into() }
    }

    pub async fn list_buckets(&self, project: &str, page_token: Option<&str>, page_size: u32) -> Result<Page<Bucket>> {
        let url = endpoint(&self.base, &["storage", "v1", "b"])?;
        let request = ApiRequest::get(ApiFamily::GoogleCloud, url)
            .query("project", project)
            .query("maxResults", page_size)
            .query_opt("pageToken", page_token);

        let list: BucketList = self.api.fetch(&request).await?;
        Ok(Page::new(list.items, list.next_page_token))
    }

    pub fn buckets(&self, project: &str, page_size: u32, page_token: Option<String>) -> Pager<FnSource<Bucket>> {
        let this = self.clone();
        let project = project.to_string();
        let source = FnSource::new(move |token, size| {
            let this = this.clone();
            let project = project.clone();
            async move { this.list_buckets(&project, token.as_deref(), size).await }.boxed()
        });
        Pager::starting_at(source, page_size, page_token)
    }

    /// List one directory level: prefixes come first on each page, then objects
    pub async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<Page<ObjectEntry>> {
        let url = endpoint(&self.base, &["storage", "v1", "b", bucket, "o"])?;
        let request = ApiRequest::get(ApiFamily::GoogleCloud, url)
            .query("delimiter", "/")
            .query_opt("prefix", prefix)
            .query("maxResults", page_size)
            .query_opt("pageToken", page_token);

        let list: ObjectList = self.api.fetch(&request).await?;

        let entries = list
            .prefixes
            .into_iter()
            .map(ObjectEntry::Prefix)
            .chain(list.items.into_iter().map(ObjectEntry::Object))
            .collect();
        Ok(Page::new(entries, list.next_page_token))
    }

    pub fn objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        page_size: u32,
        page_token: Option<String>,
    ) -> Pager<FnSource<ObjectEntry>> {
        let this = self.clone();
        let bucket = bucket.to_string();
        let prefix = prefix.map(str::to_string);
        let source = FnSource::new(move |token, size| {
            let this = this.clone();
            let bucket = bucket.clone();
            let prefix = prefix.clone();
            async move {
                this.list_objects(&bucket, prefix.as_deref(), token.as_deref(), size).await
            }
            .boxed()
        });
        Pager::starting_at(source, page_size, page_token)
    }

    pub async fn get_object(&self, bucket: &str, object: &str) -> Result<StorageObject> {
        let url = endpoint(&self.base, &["storage", "v1", "b", bucket, "o", object])?;
        self.api.fetch(&ApiRequest::get(ApiFamily::GoogleCloud, url)).await
    }

    pub async fn delete_object(&self, bucket: &str, object: &str) -> Result<()> {
        let url = endpoint(&self.base, &["storage", "v1", "b", bucket, "o", object])?;
        self.api.execute(&ApiRequest::delete(ApiFamily::GoogleCloud, url)).await
    }
}
