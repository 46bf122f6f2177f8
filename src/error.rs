//! Error types for Konsol

use thiserror::Error;

/// Result type alias for Konsol operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Konsol
#[derive(Error, Debug)]
pub enum Error {
    #[error("Firebase API error: {0}")]
    FirebaseApi(String),

    #[error("Google Cloud API error: {0}")]
    GoogleCloudApi(String),

    #[error("Identity provider error: {0}")]
    Identity(String),

    #[error("Local storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Fixed tag attached to every failure surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    FirebaseApi,
    GoogleCloudApi,
    IdentityProvider,
    LocalStorage,
    Local,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::FirebaseApi(_) => ErrorKind::FirebaseApi,
            Error::GoogleCloudApi(_) => ErrorKind::GoogleCloudApi,
            Error::Identity(_) => ErrorKind::IdentityProvider,
            Error::Storage(_) => ErrorKind::LocalStorage,
            Error::Config(_) | Error::Io(_) | Error::Json(_) | Error::Other(_) => ErrorKind::Local,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        assert_eq!(Error::FirebaseApi("x".into()).kind(), ErrorKind::FirebaseApi);
        assert_eq!(Error::GoogleCloudApi("x".into()).kind(), ErrorKind::GoogleCloudApi);
        assert_eq!(Error::Identity("x".into()).kind(), ErrorKind::IdentityProvider);
        assert_eq!(Error::Storage("x".into()).kind(), ErrorKind::LocalStorage);
        assert_eq!(Error::Config("x".into()).kind(), ErrorKind::Local);
    }

    #[test]
    fn test_sqlite_errors_are_storage_failures() {
        let err: Error = rusqlite::Error::QueryReturnedNoRows.into();
        assert_eq!(err.kind(), ErrorKind::LocalStorage);
    }
}
