//! Clients for the Firebase and Google Cloud REST APIs
//!
//! Every client wraps a shared [`ApiClient`](crate::http::ApiClient), so all of
//! them authenticate, refresh and retry the same way. Listing operations come
//! in two shapes: `list_*` loads one page, the plural form returns a [`Pager`](crate::paging::Pager).

pub mod billing;
pub mod database;
pub mod firebase;
pub mod firestore;
pub mod messaging;
pub mod storage;
pub mod testlab;

pub use billing::{BillingAccount, CloudBilling, ProjectBillingInfo};
pub use database::{DatabaseInstance, RealtimeDatabase};
pub use firebase::{AppPlatform, FirebaseApp, FirebaseManagement, FirebaseProject};
pub use firestore::{Document, Firestore, FirestoreDatabase};
pub use messaging::{CloudMessaging, Message, Target};
pub use storage::{Bucket, CloudStorage, ObjectEntry, StorageObject};
pub use testlab::{Execution, History, TestLab, TestMatrix};
