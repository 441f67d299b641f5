// src/events/types.rs
//
// Event contracts shared by every domain object.
//
// CRITICAL RULES:
// - Each object declares a closed event enum and a companion topic enum
// - The topic is derived from the event, never passed separately
// - Tips are one-shot user-facing notices on a side channel every bus carries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ServiceError;

/// Trait that every event enum published on an `EventBus` implements
pub trait DomainEvent: std::fmt::Debug + Clone + Send + Sync + 'static {
    /// Discriminant used to route the event to its subscribers
    type Topic: Copy + Eq + std::fmt::Debug + Send + Sync + 'static;

    fn topic(&self) -> Self::Topic;

    /// Human-readable event type name
    fn event_type(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TipLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A one-shot notice meant for the user (toast, banner, status line)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tip {
    pub tip_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub level: TipLevel,
    pub message: String,
}

impl Tip {
    pub fn new(level: TipLevel, message: impl Into<String>) -> Self {
        Self {
            tip_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(TipLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(TipLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(TipLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(TipLevel::Error, message)
    }

    /// Validation failures are warnings the user can fix; everything else is an error
    pub fn from_error(error: &ServiceError) -> Self {
        if error.is_validation() {
            Self::warning(error.message.clone())
        } else {
            Self::error(error.message.clone())
        }
    }
}

impl From<&str> for Tip {
    fn from(message: &str) -> Self {
        Tip::info(message)
    }
}

impl From<String> for Tip {
    fn from(message: String) -> Self {
        Tip::info(message)
    }
}

impl From<&ServiceError> for Tip {
    fn from(error: &ServiceError) -> Self {
        Tip::from_error(error)
    }
}
