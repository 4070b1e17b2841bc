//! Client and dashboard configuration

use std::time::Duration;

use crate::query::Page;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_REFRESH_SECS: u64 = 30;

pub const API_URL_ENV: &str = "FEEDBACK_API_URL";
pub const TIMEOUT_ENV: &str = "FEEDBACK_TIMEOUT_SECS";

/// Configuration for the feedback HTTP client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
  /// Base URL of the feedback backend (e.g., "http://localhost:8000")
  pub base_url: String,
  /// Request timeout in seconds
  pub timeout_secs: u64,
}

impl Default for ClientConfig {
  fn default() -> Self {
    Self { base_url: DEFAULT_API_URL.to_string(), timeout_secs: DEFAULT_TIMEOUT_SECS }
  }
}

impl ClientConfig {
  /// Read `FEEDBACK_API_URL` and `FEEDBACK_TIMEOUT_SECS`, falling back to defaults
  pub fn from_env() -> Self {
    Self::from_lookup(|name| std::env::var(name).ok())
  }

  fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
    let base_url = lookup(API_URL_ENV)
      .filter(|url| !url.trim().is_empty())
      .unwrap_or_else(|| DEFAULT_API_URL.to_string());

    let timeout_secs =
      lookup(TIMEOUT_ENV).and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_TIMEOUT_SECS);

    Self { base_url, timeout_secs }
  }
}

/// Settings for a mounted dashboard's sync engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
  pub refresh_interval: Duration,
  /// The dashboard mounts with auto-refresh on
  pub auto_refresh: bool,
  pub page: Option<Page>,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      refresh_interval: Duration::from_secs(DEFAULT_REFRESH_SECS),
      auto_refresh: true,
      page: None,
    }
  }
}
