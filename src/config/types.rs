use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShellConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub timers: TimerConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// Settings for the http capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Total request timeout in seconds (default: 30).
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
    /// Connection timeout in seconds (default: 5).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u32,
    /// User agent sent when the core's request carries none.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.timeout_seconds))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.connect_timeout_seconds))
    }
}

/// How interval timers share timer slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerSlots {
    /// At most one interval is armed; a new interval replaces it and any
    /// clear disarms it.
    #[default]
    Single,
    /// Intervals are independent and keyed by timer id.
    PerTimer,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default)]
    pub slots: TimerSlots,
}

/// Settings for the key-value capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store file. Defaults to `<data dir>/effect-shell/store.json`.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Keys returned per `ListKeys` page (default: 100).
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// How long an operation waits for the store lock before failing
    /// (default: 500).
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_ms: u64,
}

impl StoreConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            let data_dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
            data_dir.join("effect-shell").join("store.json")
        })
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

fn default_timeout() -> u32 {
    30
}

fn default_connect_timeout() -> u32 {
    5
}

fn default_user_agent() -> String {
    format!("effect-shell/{}", env!("CARGO_PKG_VERSION"))
}

fn default_page_size() -> u32 {
    100
}

fn default_lock_timeout() -> u64 {
    500
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            page_size: default_page_size(),
            lock_timeout_ms: default_lock_timeout(),
        }
    }
}
