//! `babyconnect.toml` loading and environment overrides.
//!
//! Every section and field is optional; a missing file yields the defaults.
//! Environment variables (after `.env` is loaded) win over the file, and
//! command-line flags win over both.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use babyconnect_ai::{AiPolicy, DEFAULT_AI_TIMEOUT, DEFAULT_MODEL};
use babyconnect_auth::DEFAULT_SESSION_TTL_HOURS;
use babyconnect_store::DEFAULT_DAILY_LIMIT;
use babyconnect_sync::{DEFAULT_TIMEOUT, RemoteConfig, SyncPolicy};
use serde::Deserialize;
use tracing::{debug, info};

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "babyconnect.toml";

/// Database used when neither file, env nor flag names one.
pub const DEFAULT_DB_PATH: &str = "data/babyconnect.db";

/// Longest accepted `[auth] session_ttl_hours` (about ten years).
pub const MAX_SESSION_TTL_HOURS: i64 = 10 * 366 * 24;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub storage: StorageSection,
    pub remote: RemoteSection,
    pub ai: AiSection,
    pub auth: AuthSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub path: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DB_PATH),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RemoteSection {
    pub url: String,
    pub anon_key: String,
    /// 0 disables the timeout.
    pub timeout_secs: u64,
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AiSection {
    pub model: String,
    pub daily_limit: u32,
    /// 0 disables the timeout.
    pub timeout_secs: u64,
    /// Overrides the key stored in the app config.
    pub api_key: Option<String>,
}

impl Default for AiSection {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            daily_limit: DEFAULT_DAILY_LIMIT,
            timeout_secs: DEFAULT_AI_TIMEOUT.as_secs(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    pub session_ttl_hours: i64,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
        }
    }
}

impl CliConfig {
    /// Parse a config document.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("invalid configuration")?;
        config.session_ttl()?;
        Ok(config)
    }

    /// Read `path`, or [`DEFAULT_CONFIG_FILE`] when `None`. Only an explicitly
    /// named file is required to exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p, true),
            None => (Path::new(DEFAULT_CONFIG_FILE), false),
        };
        if !path.exists() {
            if required {
                anyhow::bail!("config file {} not found", path.display());
            }
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Apply overrides from `lookup` (normally `std::env::var`). Blank values
    /// are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(db) = get("BABYCONNECT_DB") {
            self.storage.path = PathBuf::from(db);
        }
        if let Some(url) = get("SUPABASE_URL") {
            self.remote.url = url;
        }
        if let Some(key) = get("SUPABASE_ANON_KEY") {
            self.remote.anon_key = key;
        }
        if let Some(key) = get("GEMINI_API_KEY") {
            self.ai.api_key = Some(key);
        }
    }

    pub fn remote_config(&self) -> RemoteConfig {
        RemoteConfig::new(self.remote.url.trim(), self.remote.anon_key.trim())
    }

    pub fn sync_policy(&self) -> SyncPolicy {
        SyncPolicy {
            timeout: timeout(self.remote.timeout_secs),
        }
    }

    pub fn ai_policy(&self) -> AiPolicy {
        AiPolicy {
            timeout: timeout(self.ai.timeout_secs),
        }
    }

    /// `[auth] session_ttl_hours` as a duration, within 1..=[`MAX_SESSION_TTL_HOURS`].
    pub fn session_ttl(&self) -> Result<chrono::Duration> {
        let hours = self.auth.session_ttl_hours;
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&hours) {
            anyhow::bail!(
                "[auth] session_ttl_hours must be between 1 and {MAX_SESSION_TTL_HOURS}, got {hours}"
            );
        }
        chrono::Duration::try_hours(hours)
            .with_context(|| format!("[auth] session_ttl_hours {hours} is out of range"))
    }

    /// Where the remote session of this database is kept between runs.
    pub fn remote_session_file(&self) -> PathBuf {
        let mut name = self
            .storage
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "babyconnect.db".into());
        name.push(".remote-session.json");
        self.storage.path.with_file_name(name)
    }
}

fn timeout(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
