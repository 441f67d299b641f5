// src/config.rs
//
// Store configuration.
//
// Every struct has a Default matching production behavior and can be loaded
// from a JSON settings blob where missing fields fall back to those defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum time a request stays in the loading state, so fast answers don't flash
pub const DEFAULT_MIN_LOADING_MS: u64 = 800;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// `None` disables the loading floor
    pub min_loading_ms: Option<u64>,
}

impl RequestConfig {
    /// No loading floor; results are delivered as soon as the service answers
    pub fn immediate() -> Self {
        Self {
            min_loading_ms: None,
        }
    }

    pub fn min_loading(&self) -> Option<Duration> {
        self.min_loading_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            min_loading_ms: Some(DEFAULT_MIN_LOADING_MS),
        }
    }
}

/// How a list walks through its pages. Fixed for the lifetime of a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageMode {
    /// page / page_size / total
    #[default]
    Offset,
    /// opaque next_marker token
    Cursor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListConfig {
    pub page_size: u32,
    pub mode: PageMode,
    pub request: RequestConfig,
}

impl ListConfig {
    pub fn offset(page_size: u32) -> Self {
        Self {
            page_size,
            mode: PageMode::Offset,
            request: RequestConfig::default(),
        }
    }

    pub fn cursor(page_size: u32) -> Self {
        Self {
            page_size,
            mode: PageMode::Cursor,
            request: RequestConfig::default(),
        }
    }

    pub fn with_request(mut self, request: RequestConfig) -> Self {
        self.request = request;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be at least 1".to_string()));
        }
        Ok(())
    }
}

impl Default for ListConfig {
    fn default() -> Self {
        Self::offset(DEFAULT_PAGE_SIZE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: u64,
    /// Consecutive failed polls tolerated before the poller gives up
    pub max_consecutive_failures: u32,
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_ms == 0 {
            return Err(ConfigError::Invalid("interval_ms must be positive".to_string()));
        }
        if self.max_consecutive_failures == 0 {
            return Err(ConfigError::Invalid(
                "max_consecutive_failures must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            max_consecutive_failures: 3,
        }
    }
}

/// Settings for every store a page builds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub request: RequestConfig,
    pub list: ListConfig,
    pub poll: PollConfig,
}

impl StoreConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: StoreConfig = serde_json::from_str(raw)?;
        config.list.validate()?;
        config.poll.validate()?;
        Ok(config)
    }
}
