//! Remote endpoint credentials and call policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default bound on a single remote call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Anon keys at or below this length are treated as placeholders.
const MIN_KEY_LEN: usize = 20;

/// Values shipped in template configs that must never be used as-is.
const URL_PLACEHOLDER: &str = "COLE_SUA_URL";
const KEY_PLACEHOLDER: &str = "COLE_SUA_CHAVE";

/// Credential pair for the remote backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`.
    #[serde(default)]
    pub url: String,
    /// Public (anon) API key.
    #[serde(default)]
    pub anon_key: String,
}

impl RemoteConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
        }
    }

    /// Whether both values look real: an http(s) URL and a key longer than
    /// [`MIN_KEY_LEN`], neither being a template placeholder.
    pub fn is_configured(&self) -> bool {
        let url = self.url.trim();
        let key = self.anon_key.trim();
        url.starts_with("http")
            && !url.contains(URL_PLACEHOLDER)
            && key.len() > MIN_KEY_LEN
            && !key.contains(KEY_PLACEHOLDER)
    }
}

/// How remote calls are bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPolicy {
    /// Per-call timeout; `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}
