//! Cloud Firestore REST API (v1): databases, collections and documents

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use crate::Result;
use crate::http::{endpoint, ApiClient, ApiFamily, ApiRequest};
use crate::paging::{FnSource, Page, Pager};

const VERSION: &str = "v1";

/// Name of a project's default database
pub const DEFAULT_DATABASE: &str = "(default)";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirestoreDatabase {
    pub name: String,
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default, rename = "type")]
    pub database_type: Option<String>,
    #[serde(default)]
    pub concurrency_mode: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    #[serde(default)]
    pub create_time: Option<String>,
    #[serde(default)]
    pub update_time: Option<String>,
}

impl Document {
    /// Last path segment of the document name
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

/// A typed Firestore value, externally tagged the way the REST API encodes it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(Option<String>),
    BooleanValue(bool),
    /// int64 travels as a decimal string
    IntegerValue(String),
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    /// base64
    BytesValue(String),
    ReferenceValue(String),
    GeoPointValue(LatLng),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArrayValue {
    #[serde(default)]
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapValue {
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::NullValue(_) => write!(f, "null"),
            Value::BooleanValue(b) => write!(f, "{}", b),
            Value::IntegerValue(i) => write!(f, "{}", i),
            Value::DoubleValue(d) => write!(f, "{}", d),
            Value::TimestampValue(t) => write!(f, "{}", t),
            Value::StringValue(s) => write!(f, "{:?}", s),
            Value::BytesValue(b) => write!(f, "<{} base64 chars>", b.len()),
            Value::ReferenceValue(r) => write!(f, "ref({})", r),
            Value::GeoPointValue(p) => write!(f, "({}, {})", p.latitude, p.longitude),
            Value::ArrayValue(a) => {
                write!(f, "[")?;
                for (i, v) in a.values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::MapValue(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct DatabaseList {
    #[serde(default)]
    databases: Vec<FirestoreDatabase>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentList {
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListCollectionIdsRequest<'a> {
    page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_token: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectionIdList {
    #[serde(default)]
    collection_ids: Vec<String>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// `projects/{project}/databases/{database}/documents`
pub fn documents_root(project: &str, database: &str) -> String {
    format!("projects/{}/databases/{}/documents", project, database)
}

#[derive(Clone)]
pub struct Firestore {
    api: ApiClient,
    base: String,
}

impl Firestore {
    pub fn new(api: ApiClient, base: impl Into<String>) -> Self {
        Self { api, base: base.into() }
    }

    /// `base/v1/<resource name segments>`, with `suffix` glued onto the last segment
    fn resource_url(&self, name: &str, suffix: &str) -> Result<url::Url> {
        let mut segments: Vec<&str> = std::iter::once(VERSION)
            .chain(name.split('/').filter(|s| !s.is_empty()))
            .collect();
        let last = segments.pop().unwrap_or(VERSION);
        let last = format!("{}{}", last, suffix);
        segments.push(&last);
        endpoint(&self.base, &segments)
    }

    pub async fn list_databases(&self, project: &str) -> Result<Vec<FirestoreDatabase>> {
        let url = self.resource_url(&format!("projects/{}/databases", project), "")?;
        let list: DatabaseList = self.api.fetch(&ApiRequest::get(ApiFamily::Firebase, url)).await?;
        Ok(list.databases)
    }

    /// Collection ids under `parent`, which is a documents root or a document name
    pub async fn list_collection_ids(
        &self,
        parent: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<Page<String>> {
        let url = self.resource_url(parent, ":listCollectionIds")?;
        let request = ApiRequest::post(ApiFamily::Firebase, url)
            .json(&ListCollectionIdsRequest { page_size, page_token })?;

        let list: CollectionIdList = self.api.fetch(&request).await?;
        Ok(Page::new(list.collection_ids, list.next_page_token))
    }

    pub fn collection_ids(&self, parent: &str, page_size: u32, page_token: Option<String>) -> Pager<FnSource<String>> {
        let this = self.clone();
        let parent = parent.to_string();
        let source = FnSource::new(move |token, size| {
            let this = this.clone();
            let parent = parent.clone();
            async move { this.list_collection_ids(&parent, token.as_deref(), size).await }.boxed()
        });
        Pager::starting_at(source, page_size, page_token)
    }

    pub async fn list_documents(
        &self,
        parent: &str,
        collection_id: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<Page<Document>> {
        let url = self.resource_url(&format!("{}/{}", parent, collection_id), "")?;
        let request = ApiRequest::get(ApiFamily::Firebase, url)
            .query("pageSize", page_size)
            .query_opt("pageToken", page_token);

        let list: DocumentList = self.api.fetch(&request).await?;
        Ok(Page::new(list.documents, list.next_page_token))
    }

    pub fn documents(
        &self,
        parent: &str,
        collection_id: &str,
        page_size: u32,
        page_token: Option<String>,
    ) -> Pager<FnSource<Document>> {
        let this = self.clone();
        let parent = parent.to_string();
        let collection_id = collection_id.to_string();
        let source = FnSource::new(move |token, size| {
            let this = this.clone();
            let parent = parent.clone();
            let collection_id = collection_id.clone();
            async move {
                this.list_documents(&parent, &collection_id, token.as_deref(), size).await
            }
            .boxed()
        });
        Pager::starting_at(source, page_size, page_token)
    }

    pub async fn get_document(&self, name: &str) -> Result<Document> {
        let url = self.resource_url(name, "")?;
        self.api.fetch(&ApiRequest::get(ApiFamily::Firebase, url)).await
    }

    pub async fn delete_document(&self, name: &str) -> Result<()> {
        let url = self.resource_url(name, "")?;
        self.api.execute(&ApiRequest::delete(ApiFamily::Firebase, url)).await
    }
}
