//! Client configuration and its defaults.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// User agent sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/68.0.3440.84 Safari/537.36";

/// Per-attempt timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Constructor options for a [`Client`](crate::Client).
///
/// Keys are camelCase so a config file written for other tooling can be
/// loaded as is.
///
/// # Examples
///
/// ```
/// use fetchwell::Config;
/// use std::time::Duration;
///
/// let config: Config = serde_json::from_str(r#"{
///     "userAgent": "crawler/1.0",
///     "proxy": "socks5://127.0.0.1:1080",
///     "headers": { "Referer": "https://example.com/" },
///     "timeoutMs": 5000
/// }"#).unwrap();
///
/// assert_eq!(config.user_agent(), "crawler/1.0");
/// assert_eq!(config.timeout(), Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Overrides [`DEFAULT_USER_AGENT`].
    pub user_agent: Option<String>,
    /// Proxy specification, see [`Transport::from_proxy_spec`](crate::Transport::from_proxy_spec).
    pub proxy: Option<String>,
    /// Base headers sent with every request.
    pub headers: HashMap<String, String>,
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl Config {
    /// The configured user agent, or the default.
    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }

    /// The configured per-attempt timeout, or the default.
    pub fn timeout(&self) -> Duration {
        self.timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TIMEOUT)
    }
}
