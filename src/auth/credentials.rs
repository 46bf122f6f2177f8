//! The OAuth2 credential record
//!
//! A single record per installation, persisted through a
//! [`CredentialStore`](super::CredentialStore).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Margin before expiry at which a token is considered due for renewal
const RENEWAL_MARGIN_MINUTES: i64 = 5;

/// Google's OpenID issuer
pub const GOOGLE_ISSUER: &str = "https://accounts.google.com";

/// Serialized authorization state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    /// The access token for API requests
    pub access_token: String,

    /// The refresh token for obtaining new access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Token type (usually "Bearer")
    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// When the access token expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Scopes granted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// OpenID Connect id token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// Who issued the tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// `now + secs`, or `None` when that is not a representable instant
pub(crate) fn expiry_after(secs: i64) -> Option<DateTime<Utc>> {
    Utc::now().checked_add_signed(Duration::try_seconds(secs)?)
}

impl Credentials {
    pub fn new(
        access_token: String,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: default_token_type(),
            expires_at: expires_in_secs.and_then(expiry_after),
            scope: None,
            id_token: None,
            issuer: None,
        }
    }

    /// True when the access token has expired or expires within the renewal margin.
    ///
    /// Tokens without an expiry are never due.
    pub fn needs_refresh(&self) -> bool {
        match self.expires_at {
            Some(expires) => Utc::now() + Duration::minutes(RENEWAL_MARGIN_MINUTES) >= expires,
            None => false,
        }
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Fold a refresh result into this record.
    ///
    /// Fields the identity provider omits on refresh (refresh token, id token,
    /// scope, issuer) keep their previous values.
    pub fn merge_refreshed(&self, refreshed: Credentials) -> Credentials {
        Credentials {
            access_token: refreshed.access_token,
            refresh_token: refreshed.refresh_token.or_else(|| self.refresh_token.clone()),
            token_type: refreshed.token_type,
            expires_at: refreshed.expires_at,
            scope: refreshed.scope.or_else(|| self.scope.clone()),
            id_token: refreshed.id_token.or_else(|| self.id_token.clone()),
            issuer: refreshed.issuer.or_else(|| self.issuer.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_token_not_due() {
        let creds = Credentials::new("a".to_string(), Some("r".to_string()), Some(3600));
        assert!(!creds.needs_refresh());
    }

    #[test]
    fn test_expired_token_due() {
        let mut creds = Credentials::new("a".to_string(), Some("r".to_string()), None);
        creds.expires_at = Some(Utc::now() - Duration::hours(1));
        assert!(creds.needs_refresh());
    }

    #[test]
    fn test_token_inside_margin_due() {
        let creds = Credentials::new("a".to_string(), None, Some(120));
        assert!(creds.needs_refresh());
    }

    #[test]
    fn test_unrepresentable_lifetime_has_no_expiry() {
        assert!(expiry_after(i64::MAX).is_none());
        assert!(expiry_after(i64::MIN).is_none());

        let creds = Credentials::new("a".to_string(), None, Some(i64::MAX));
        assert!(creds.expires_at.is_none());
    }

    #[test]
    fn test_no_expiry_never_due() {
        let creds = Credentials::new("a".to_string(), None, None);
        assert!(!creds.needs_refresh());
    }

    #[test]
    fn test_empty_refresh_token_cannot_refresh() {
        let creds = Credentials::new("a".to_string(), Some(String::new()), None);
        assert!(!creds.can_refresh());
    }

    #[test]
    fn test_merge_keeps_missing_fields() {
        let mut old = Credentials::new("old".to_string(), Some("refresh".to_string()), Some(10));
        old.id_token = Some("id".to_string());
        old.issuer = Some(GOOGLE_ISSUER.to_string());
        old.scope = Some("openid".to_string());

        let merged = old.merge_refreshed(Credentials::new("new".to_string(), None, Some(3600)));

        assert_eq!(merged.access_token, "new");
        assert_eq!(merged.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(merged.id_token.as_deref(), Some("id"));
        assert_eq!(merged.issuer.as_deref(), Some(GOOGLE_ISSUER));
        assert_eq!(merged.scope.as_deref(), Some("openid"));
        assert!(!merged.needs_refresh());
    }

    #[test]
    fn test_merge_prefers_rotated_refresh_token() {
        let old = Credentials::new("old".to_string(), Some("r1".to_string()), None);
        let merged = old.merge_refreshed(Credentials::new("new".to_string(), Some("r2".to_string()), None));
        assert_eq!(merged.refresh_token.as_deref(), Some("r2"));
    }
}
