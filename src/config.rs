//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::Result;
use crate::error::Error;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// OAuth client registered for the desktop login flow
    #[serde(default)]
    pub oauth: OAuthConfig,

    /// SQLite database holding the credential record
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Page size used by listing commands
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Project used when a command omits one
    #[serde(default)]
    pub default_project: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// API base URLs, overridable for emulators
    #[serde(default)]
    pub endpoints: Endpoints,
}

/// OAuth client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    /// Loopback port receiving the authorization redirect
    #[serde(default = "default_redirect_port")]
    pub redirect_port: u16,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_port: default_redirect_port(),
        }
    }
}

/// Base URLs of every remote service Konsol talks to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub authorize: String,
    pub token: String,
    pub revoke: String,
    pub userinfo: String,
    pub firebase: String,
    pub storage: String,
    pub firestore: String,
    pub database: String,
    pub messaging: String,
    pub testing: String,
    pub tool_results: String,
    pub billing: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            authorize: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token: "https://oauth2.googleapis.com/token".to_string(),
            revoke: "https://oauth2.googleapis.com/revoke".to_string(),
            userinfo: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
            firebase: "https://firebase.googleapis.com".to_string(),
            storage: "https://storage.googleapis.com".to_string(),
            firestore: "https://firestore.googleapis.com".to_string(),
            database: "https://firebasedatabase.googleapis.com".to_string(),
            messaging: "https://fcm.googleapis.com".to_string(),
            testing: "https://testing.googleapis.com".to_string(),
            tool_results: "https://toolresults.googleapis.com".to_string(),
            billing: "https://cloudbilling.googleapis.com".to_string(),
        }
    }
}

impl Endpoints {
    /// Point every endpoint at a single host, keeping Google's paths.
    ///
    /// Used against local mock servers.
    pub fn all_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            authorize: format!("{}/o/oauth2/v2/auth", base),
            token: format!("{}/token", base),
            revoke: format!("{}/revoke", base),
            userinfo: format!("{}/v1/userinfo", base),
            firebase: base.to_string(),
            storage: base.to_string(),
            firestore: base.to_string(),
            database: base.to_string(),
            messaging: base.to_string(),
            testing: base.to_string(),
            tool_results: base.to_string(),
            billing: base.to_string(),
        }
    }
}

fn default_database_path() -> PathBuf {
    config_dir().join("konsol.db")
}

fn default_page_size() -> u32 {
    25
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_redirect_port() -> u16 {
    8085
}

impl Default for Config {
    fn default() -> Self {
        Self {
            oauth: OAuthConfig::default(),
            database_path: default_database_path(),
            page_size: default_page_size(),
            default_project: None,
            timeout_secs: default_timeout_secs(),
            endpoints: Endpoints::default(),
        }
    }
}

impl Config {
    /// Resolve a project argument, falling back to `default_project`
    pub fn project<'a>(&'a self, explicit: Option<&'a str>) -> Result<&'a str> {
        explicit
            .or(self.default_project.as_deref())
            .ok_or_else(|| Error::Config(
                "No project given and no default_project configured".to_string()
            ))
    }

    /// Apply `KONSOL_CLIENT_ID` / `KONSOL_CLIENT_SECRET` overrides
    fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Empty values do not override
    fn apply_env_with(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(id) = get("KONSOL_CLIENT_ID").filter(|v| !v.is_empty()) {
            self.oauth.client_id = id;
        }
        if let Some(secret) = get("KONSOL_CLIENT_SECRET").filter(|v| !v.is_empty()) {
            self.oauth.client_secret = secret;
        }
    }
}

/// Get the config directory path
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".konsol")
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Load configuration from the default location
pub fn load() -> Result<Config> {
    load_from(&config_path())
}

/// Load configuration from an explicit path
pub fn load_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "Config not found at {:?}. Run 'konsol init' first.",
            path
        )));
    }

    let content = std::fs::read_to_string(path)?;
    let mut config: Config = serde_json::from_str(&content)?;
    config.apply_env();
    Ok(config)
}

/// Save configuration to the default location
pub fn save(config: &Config) -> Result<()> {
    save_to(config, &config_path())
}

/// Save configuration to an explicit path
pub fn save_to(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(config)?;

    // The file holds the client secret
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        file.write_all(content.as_bytes())?;
    }
    #[cfg(not(unix))]
    std::fs::write(path, content)?;

    Ok(())
}

/// Interactive setup: OAuth client and default project
pub fn init() -> Result<()> {
    use crate::ui;
    use inquire::{Text, Password, PasswordDisplayMode};

    ui::print_header("Setup", None);
    println!("  Konsol needs an OAuth client of type \"Desktop app\" from the Google Cloud console.\n");

    let mut config = load().unwrap_or_default();

    let client_id = Text::new("OAuth client ID:")
        .with_default(&config.oauth.client_id)
        .prompt()
        .map_err(|e| Error::Config(format!("Prompt failed: {}", e)))?;

    let client_secret = Password::new("OAuth client secret (Enter keeps the current one):")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .map_err(|e| Error::Config(format!("Prompt failed: {}", e)))?;

    if client_id.trim().is_empty() {
        return Err(Error::Config("Client ID cannot be empty".to_string()));
    }

    let project = Text::new("Default project (optional):")
        .with_default(config.default_project.as_deref().unwrap_or(""))
        .prompt()
        .map_err(|e| Error::Config(format!("Prompt failed: {}", e)))?;

    config.oauth.client_id = client_id.trim().to_string();
    config.oauth.client_secret = keep_unless_empty(&client_secret, &config.oauth.client_secret);
    config.default_project = Some(project.trim().to_string()).filter(|p| !p.is_empty());

    ui::print_thinking("Saving configuration");
    save(&config)?;

    ui::print_success("Setup complete!");
    ui::print_step("Run 'konsol login' to sign in with Google.");

    Ok(())
}

/// Trimmed `input`, or `current` when nothing was typed
fn keep_unless_empty(input: &str, current: &str) -> String {
    match input.trim() {
        "" => current.to_string(),
        typed => typed.to_string(),
    }
}
