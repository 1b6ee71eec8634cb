//! Runtime configuration, read from the process environment.
//!
//! The binary loads `.env` (or the bundled `assets/config.env`) into the
//! environment before calling [`AppConfig::from_env`].

use std::env;
use std::time::Duration;

pub const DEFAULT_CHANNEL_URL: &str = "http://localhost:5000";
pub const DEFAULT_COLLECTION: &str = "files";
pub const DEFAULT_CHAT_TARGET: &str = "User123";
pub const DEFAULT_FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";
const DEFAULT_ACCEPTED_EXTENSIONS: &[&str] = &["pdf", "ppt", "pptx"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be set when {reason}")]
    Missing { key: &'static str, reason: &'static str },

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Whether remote `newFile` announcements are written back to the store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EchoPolicy {
    /// The uploading client's own write is the only write.
    #[default]
    Skip,
    /// Every client that hears about a file writes it again.
    Persist,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FirestoreConfig {
    pub base_url: String,
    pub project_id: String,
    pub api_key: Option<String>,
    pub token: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Local,
    Memory,
    Firestore(FirestoreConfig),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelConfig {
    pub url: String,
    pub connect_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_CHANNEL_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub channel: ChannelConfig,
    pub store: StoreBackend,
    pub collection: String,
    pub chat_target: String,
    pub accepted_extensions: Vec<String>,
    pub echo_policy: EchoPolicy,
    pub write_attempts: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::default(),
            store: StoreBackend::Local,
            collection: DEFAULT_COLLECTION.to_string(),
            chat_target: DEFAULT_CHAT_TARGET.to_string(),
            accepted_extensions: DEFAULT_ACCEPTED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            echo_policy: EchoPolicy::Skip,
            write_attempts: 3,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(url) = get("GROUPSHARE_CHANNEL_URL") {
            config.channel.url = url;
        }
        if let Some(raw) = get("GROUPSHARE_CONNECT_TIMEOUT_SECS") {
            let secs = raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
                key: "GROUPSHARE_CONNECT_TIMEOUT_SECS",
                value: raw.clone(),
            })?;
            config.channel.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(target) = get("GROUPSHARE_CHAT_TARGET") {
            config.chat_target = target;
        }
        if let Some(collection) = get("GROUPSHARE_COLLECTION") {
            config.collection = collection;
        }
        if let Some(raw) = get("GROUPSHARE_ACCEPTED_EXTENSIONS") {
            config.accepted_extensions = parse_extensions(&raw);
        }
        if let Some(raw) = get("GROUPSHARE_PERSIST_REMOTE_ECHO") {
            config.echo_policy = if parse_flag("GROUPSHARE_PERSIST_REMOTE_ECHO", &raw)? {
                EchoPolicy::Persist
            } else {
                EchoPolicy::Skip
            };
        }
        if let Some(raw) = get("STORE_WRITE_ATTEMPTS") {
            config.write_attempts = match raw.parse::<u32>() {
                Ok(attempts) if attempts > 0 => attempts,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "STORE_WRITE_ATTEMPTS",
                        value: raw,
                    });
                }
            };
        }

        config.store = match get("GROUPSHARE_STORE")
            .unwrap_or_else(|| "local".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "local" => StoreBackend::Local,
            "memory" => StoreBackend::Memory,
            "firestore" => {
                let project_id = get("FIRESTORE_PROJECT_ID").ok_or(ConfigError::Missing {
                    key: "FIRESTORE_PROJECT_ID",
                    reason: "GROUPSHARE_STORE=firestore",
                })?;
                StoreBackend::Firestore(FirestoreConfig {
                    base_url: get("FIRESTORE_BASE_URL")
                        .unwrap_or_else(|| DEFAULT_FIRESTORE_BASE_URL.to_string()),
                    project_id,
                    api_key: get("FIRESTORE_API_KEY"),
                    token: get("FIRESTORE_TOKEN"),
                })
            }
            other => {
                return Err(ConfigError::Invalid {
                    key: "GROUPSHARE_STORE",
                    value: other.to_string(),
                });
            }
        };

        Ok(config)
    }

    /// Whether `name` carries one of the accepted upload extensions.
    pub fn accepts(&self, name: &str) -> bool {
        if self.accepted_extensions.is_empty() {
            return true;
        }
        let Some((_, ext)) = name.rsplit_once('.') else {
            return false;
        };
        self.accepted_extensions
            .iter()
            .any(|accepted| accepted.eq_ignore_ascii_case(ext))
    }

    /// Value for the file input's `accept` attribute, e.g. `.pdf,.ppt,.pptx`.
    pub fn accept_attribute(&self) -> String {
        self.accepted_extensions
            .iter()
            .map(|ext| format!(".{ext}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
        }),
    }
}

/// `KEY=value` pairs from a dotenv-style file. Blank lines and `#`
/// comments are skipped.
pub fn env_pairs(text: &str) -> impl Iterator<Item = (&str, &str)> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim()))
}
