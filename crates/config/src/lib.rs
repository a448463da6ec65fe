use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Placeholders ──────────────────────────────────────────────────────────────
//
// A freshly written config file carries these strings so operators can see
// which keys still need a value.  They are treated exactly like empty values.

pub const PLACEHOLDER_DISCORD_TOKEN: &str = "your-discord-token";
pub const PLACEHOLDER_NOTION_TOKEN: &str = "your-notion-token";
pub const PLACEHOLDER_APPLICATION_ID: &str = "discord-application-id";
pub const PLACEHOLDER_PUBLIC_KEY: &str = "discord-public-key";
pub const PLACEHOLDER_REPORTING_CHANNEL: &str = "discord-reporting-channel-id";
pub const PLACEHOLDER_REPORTING_MESSAGE: &str = "discord-reporting-message-id";
pub const PLACEHOLDER_NOTIFICATION_CHANNEL: &str = "discord-notification-channel-id";
pub const PLACEHOLDER_DATABASE_ID: &str = "notion-database-uuid";

const PLACEHOLDERS: &[&str] = &[
    PLACEHOLDER_DISCORD_TOKEN,
    PLACEHOLDER_NOTION_TOKEN,
    PLACEHOLDER_APPLICATION_ID,
    PLACEHOLDER_PUBLIC_KEY,
    PLACEHOLDER_REPORTING_CHANNEL,
    PLACEHOLDER_REPORTING_MESSAGE,
    PLACEHOLDER_NOTIFICATION_CHANNEL,
    PLACEHOLDER_DATABASE_ID,
];

/// `true` when `value` is blank or still one of the shipped placeholder strings.
pub fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || PLACEHOLDERS.contains(&trimmed)
}

fn configured(value: &str) -> Option<String> {
    if is_placeholder(value) {
        None
    } else {
        Some(value.trim().to_string())
    }
}

/// Missing or unusable configuration.  Fatal for the subsystem that needs the
/// value, never for the whole process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("`{key}` is not configured")]
    Unset { key: &'static str },
    #[error("`{key}` must be greater than zero")]
    Zero { key: &'static str },
    #[error("`notion.monitored_databases` is empty; nothing to poll")]
    NoMonitoredDatabases,
}

// ── Sections ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    pub token: String,
    pub application_id: String,
    /// Hex-encoded Ed25519 key from the developer portal, used to verify
    /// requests hitting the interactions endpoint.
    pub public_key: String,
    pub reporting_channel_id: String,
    /// Id of the form message from a previous run.  Rewritten whenever the
    /// bridge has to post a fresh form message.
    pub reporting_message_id: String,
    pub notification_channel_id: String,
    /// Address the interactions endpoint listens on.
    pub interactions_bind: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: PLACEHOLDER_DISCORD_TOKEN.to_string(),
            application_id: PLACEHOLDER_APPLICATION_ID.to_string(),
            public_key: PLACEHOLDER_PUBLIC_KEY.to_string(),
            reporting_channel_id: PLACEHOLDER_REPORTING_CHANNEL.to_string(),
            reporting_message_id: PLACEHOLDER_REPORTING_MESSAGE.to_string(),
            notification_channel_id: PLACEHOLDER_NOTIFICATION_CHANNEL.to_string(),
            interactions_bind: "127.0.0.1:8787".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotionConfig {
    pub token: String,
    /// Database that receives records submitted through the form.
    pub database_id: String,
    /// Databases polled for new and edited pages.
    pub monitored_databases: Vec<String>,
    pub query_interval_secs: u64,
    pub query_page_size: usize,
    pub api_version: String,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            token: PLACEHOLDER_NOTION_TOKEN.to_string(),
            database_id: PLACEHOLDER_DATABASE_ID.to_string(),
            monitored_databases: Vec::new(),
            query_interval_secs: 60,
            query_page_size: 5,
            api_version: "2022-06-28".to_string(),
        }
    }
}

/// User-facing strings used by the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagesConfig {
    pub reporting_text: String,
    pub submitted_text: String,
    pub incomplete_text: String,
    pub not_started_text: String,
    pub failure_text: String,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            reporting_text: "Please use the controls below to report a bug".to_string(),
            submitted_text: "Report submitted!".to_string(),
            incomplete_text: "Not all fields selected yet".to_string(),
            not_started_text: "You have not selected any properties yet".to_string(),
            failure_text: "Something went wrong while submitting your report, please try again later".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Upper bound for every remote call made by the transports.
    pub request_timeout_secs: u64,
    /// How long shutdown waits for an in-flight poll cycle before aborting it.
    pub shutdown_grace_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 15,
            shutdown_grace_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub discord: DiscordConfig,
    pub notion: NotionConfig,
    pub messages: MessagesConfig,
    pub runtime: RuntimeConfig,
    pub telemetry: TelemetryConfig,
}

// ── Validated views ───────────────────────────────────────────────────────────

/// Everything the interactive form needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSettings {
    pub database_id: String,
    pub reporting_channel_id: String,
    pub reporting_message_id: Option<String>,
    pub messages: MessagesConfig,
}

/// Everything the change poller needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerSettings {
    pub monitored_databases: Vec<String>,
    /// Absent channel is not fatal here: each cycle reports it instead.
    pub notification_channel_id: Option<String>,
    pub interval: Duration,
    pub page_size: usize,
}

impl AppConfig {
    /// The file alone, without environment overrides.  Missing file yields
    /// defaults.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(raw) => Ok(toml::from_str(&raw)?),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::load_file(path)?;

        // Tokens from the environment take precedence over the file.
        if let Ok(token) = env::var("DISCORD_TOKEN") {
            if !token.trim().is_empty() {
                config.discord.token = token;
            }
        }
        if let Ok(token) = env::var("NOTION_TOKEN") {
            if !token.trim().is_empty() {
                config.notion.token = token;
            }
        }

        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }

    /// Record a newly posted form message id in the file at `path`.  The
    /// file is re-read so environment tokens never end up on disk.
    pub fn persist_reporting_message_id(path: impl AsRef<Path>, message_id: &str) -> Result<()> {
        let path = path.as_ref();
        let mut on_disk = Self::load_file(path)?;
        on_disk.discord.reporting_message_id = message_id.to_string();
        on_disk.save_to(path)
    }

    pub fn discord_token(&self) -> Result<&str, ConfigError> {
        require(&self.discord.token, "discord.token")
    }

    pub fn notion_token(&self) -> Result<&str, ConfigError> {
        require(&self.notion.token, "notion.token")
    }

    pub fn application_id(&self) -> Result<&str, ConfigError> {
        require(&self.discord.application_id, "discord.application_id")
    }

    pub fn public_key(&self) -> Result<&str, ConfigError> {
        require(&self.discord.public_key, "discord.public_key")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.runtime.request_timeout_secs.max(1))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.runtime.shutdown_grace_secs)
    }

    pub fn form_settings(&self) -> Result<FormSettings, ConfigError> {
        let database_id = require(&self.notion.database_id, "notion.database_id")?;
        let reporting_channel_id =
            require(&self.discord.reporting_channel_id, "discord.reporting_channel_id")?;
        Ok(FormSettings {
            database_id: database_id.to_string(),
            reporting_channel_id: reporting_channel_id.to_string(),
            reporting_message_id: configured(&self.discord.reporting_message_id),
            messages: self.messages.clone(),
        })
    }

    pub fn poller_settings(&self) -> Result<PollerSettings, ConfigError> {
        let monitored_databases = self
            .notion
            .monitored_databases
            .iter()
            .filter_map(|id| configured(id))
            .collect::<Vec<_>>();
        if monitored_databases.is_empty() {
            return Err(ConfigError::NoMonitoredDatabases);
        }
        if self.notion.query_interval_secs == 0 {
            return Err(ConfigError::Zero {
                key: "notion.query_interval_secs",
            });
        }
        if self.notion.query_page_size == 0 {
            return Err(ConfigError::Zero {
                key: "notion.query_page_size",
            });
        }
        Ok(PollerSettings {
            monitored_databases,
            notification_channel_id: configured(&self.discord.notification_channel_id),
            interval: Duration::from_secs(self.notion.query_interval_secs),
            page_size: self.notion.query_page_size,
        })
    }
}

fn require<'a>(value: &'a str, key: &'static str) -> Result<&'a str, ConfigError> {
    if is_placeholder(value) {
        Err(ConfigError::Unset { key })
    } else {
        Ok(value.trim())
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_shipped_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.notion.query_interval_secs, 60);
        assert_eq!(cfg.notion.query_page_size, 5);
        assert_eq!(cfg.notion.api_version, "2022-06-28");
        assert!(cfg.notion.monitored_databases.is_empty());
        assert_eq!(cfg.runtime.request_timeout_secs, 15);
        assert_eq!(cfg.telemetry.log_level, "info");
        assert_eq!(cfg.discord.reporting_channel_id, PLACEHOLDER_REPORTING_CHANNEL);
    }

    #[test]
    fn placeholders_and_blanks_count_as_unset() {
        assert!(is_placeholder(""));
        assert!(is_placeholder("   "));
        assert!(is_placeholder(PLACEHOLDER_DATABASE_ID));
        assert!(is_placeholder(" discord-reporting-message-id "));
        assert!(!is_placeholder("1234567890"));
    }

    #[test]
    fn load_from_missing_file_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = AppConfig::load_from(dir.path().join("nonexistent.toml")).unwrap();
        assert_eq!(cfg.notion.query_page_size, 5);
        assert_eq!(cfg.messages, MessagesConfig::default());
    }

    #[test]
    fn load_from_partial_toml_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.toml");
        fs::write(
            &path,
            r#"
[notion]
database_id = "db-1"
monitored_databases = ["db-1", "db-2"]
query_interval_secs = 30
"#,
        )
        .unwrap();

        let cfg = AppConfig::load_from(&path).unwrap();
        assert_eq!(cfg.notion.database_id, "db-1");
        assert_eq!(cfg.notion.monitored_databases, vec!["db-1", "db-2"]);
        assert_eq!(cfg.notion.query_interval_secs, 30);
        assert_eq!(cfg.notion.query_page_size, 5);
        assert_eq!(cfg.discord.interactions_bind, "127.0.0.1:8787");
    }

    #[test]
    fn load_from_invalid_toml_returns_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "this is not valid toml {{{{").unwrap();
        assert!(AppConfig::load_from(&path).is_err());
    }

    #[test]
    fn save_and_reload_keeps_message_id() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sub/config.toml");

        let mut cfg = AppConfig::default();
        cfg.discord.reporting_message_id = "998877".to_string();
        cfg.notion.monitored_databases = vec!["abc".to_string()];
        cfg.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.discord.reporting_message_id, "998877");
        assert_eq!(loaded.notion.monitored_databases, vec!["abc".to_string()]);
    }

    #[test]
    fn persisting_message_id_keeps_the_rest_of_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[discord]
token = "file-token"
reporting_channel_id = "42"
"#,
        )
        .unwrap();

        AppConfig::persist_reporting_message_id(&path, "555").unwrap();
        let on_disk = AppConfig::load_file(&path).unwrap();
        assert_eq!(on_disk.discord.reporting_message_id, "555");
        assert_eq!(on_disk.discord.token, "file-token");
        assert_eq!(on_disk.discord.reporting_channel_id, "42");
    }

    #[test]
    fn form_settings_require_database_and_channel() {
        let mut cfg = AppConfig::default();
        assert_eq!(
            cfg.form_settings(),
            Err(ConfigError::Unset {
                key: "notion.database_id"
            })
        );

        cfg.notion.database_id = "db-1".to_string();
        assert_eq!(
            cfg.form_settings(),
            Err(ConfigError::Unset {
                key: "discord.reporting_channel_id"
            })
        );

        cfg.discord.reporting_channel_id = "42".to_string();
        let form = cfg.form_settings().unwrap();
        assert_eq!(form.database_id, "db-1");
        assert_eq!(form.reporting_channel_id, "42");
        // Placeholder message id means "post a new one".
        assert_eq!(form.reporting_message_id, None);
    }

    #[test]
    fn poller_settings_skip_blank_entries() {
        let mut cfg = AppConfig::default();
        assert_eq!(cfg.poller_settings(), Err(ConfigError::NoMonitoredDatabases));

        cfg.notion.monitored_databases = vec!["".to_string(), "db-2".to_string()];
        let poller = cfg.poller_settings().unwrap();
        assert_eq!(poller.monitored_databases, vec!["db-2".to_string()]);
        assert_eq!(poller.interval, Duration::from_secs(60));
        assert_eq!(poller.notification_channel_id, None);
    }

    #[test]
    fn poller_settings_reject_zero_page_size() {
        let mut cfg = AppConfig::default();
        cfg.notion.monitored_databases = vec!["db".to_string()];
        cfg.notion.query_page_size = 0;
        assert_eq!(
            cfg.poller_settings(),
            Err(ConfigError::Zero {
                key: "notion.query_page_size"
            })
        );
    }

    #[test]
    fn env_tokens_override_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("env.toml");
        fs::write(
            &path,
            r#"
[notion]
token = "from-file"
"#,
        )
        .unwrap();

        // SAFETY: no other test reads NOTION_TOKEN.
        unsafe { env::set_var("NOTION_TOKEN", "from-env") };
        let cfg = AppConfig::load_from(&path).unwrap();
        assert_eq!(cfg.notion.token, "from-env");
        assert_eq!(cfg.notion_token(), Ok("from-env"));
        unsafe { env::remove_var("NOTION_TOKEN") };
    }
}
