use serde::{Deserialize, Serialize};

use crate::domain::availability::OverlapPolicy;
use crate::domain::calendar_view::WeekStart;
use crate::domain::selection::SelectionPolicy;

/// Environment variable that overrides `backend.api_token`.
pub const API_TOKEN_ENV: &str = "UILET_API_TOKEN";

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
}

impl Config {
    /// Apply overrides from the environment. `lookup` is usually `std::env::var(..).ok()`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(API_TOKEN_ENV).filter(|t| !t.trim().is_empty()) {
            self.backend.api_token = Some(token);
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub max_retries: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_token: None,
            user_agent: default_user_agent(),
            request_timeout_secs: default_timeout(),
            max_retries: default_retries(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_availability_ttl")]
    pub availability_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            availability_ttl_secs: default_availability_ttl(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct CalendarConfig {
    #[serde(default)]
    pub week_start: WeekStart,
    #[serde(default)]
    pub overlap_policy: OverlapPolicy,
    #[serde(default)]
    pub selection_policy: SelectionPolicy,
    /// Open calendars in read-only (client-facing) mode unless a tool call says otherwise.
    #[serde(default)]
    pub read_only: bool,
}

fn default_base_url() -> String {
    "http://localhost:8080".into()
}

fn default_user_agent() -> String {
    concat!("uilet-calendar/", env!("CARGO_PKG_VERSION")).into()
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> u32 {
    2
}

fn default_max_entries() -> usize {
    500
}

fn default_availability_ttl() -> u64 {
    60
}
