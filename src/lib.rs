//! Konsol - Firebase and Google Cloud console for the terminal
//!
//! This library provides the signed-in HTTP layer (credential store, token
//! refresh, refresh-and-retry on 401), page-token pagination, and clients for
//! the Firebase and Google Cloud REST APIs.

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod paging;
pub mod ui;

pub use app::Konsol;
pub use error::{Error, Result};
