// src/lib.rs
// LibraryHub - reactive store core for the media library admin console
//
// Architecture:
// - Event-driven: every store embeds one EventBus over its own event enum
// - Service boundary: stores reach the backend only through Service
// - Explicit: loading, errors and pagination are plain snapshot data
// - Tips: user-facing notices travel on a side channel, never as errors

// ============================================================================
// FOUNDATION
// ============================================================================

pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod services;

// ============================================================================
// STORES
// ============================================================================

pub mod store;

// ============================================================================
// PUBLIC API - Configuration
// ============================================================================

pub use config::{ConfigError, ListConfig, PageMode, PollConfig, RequestConfig, StoreConfig};

// ============================================================================
// PUBLIC API - Domain & Events
// ============================================================================

pub use domain::Domain;
pub use events::{DomainEvent, EventBus, Listener, ListenerId, Tip, TipLevel};

// ============================================================================
// PUBLIC API - Error Types
// ============================================================================

pub use error::{ApiEnvelope, ErrorKind, NormalizeErr, ServiceError, ServiceResult};

// ============================================================================
// PUBLIC API - Services
// ============================================================================

pub use services::{service_fn, FetchParams, Filters, ListPayload, ListService, Service, ServiceFn};

// ============================================================================
// PUBLIC API - Stores
// ============================================================================

pub use store::{
    // Async request
    AsyncRequest,
    InsertPosition,
    // Job poller
    JobPoller,
    ListEvent,
    // Paginated list
    ListResponse,
    ListTopic,
    PaginatedList,
    PollHandle,
    PollOutcome,
    PollStatus,
    RequestEvent,
    RequestPhase,
    RequestState,
    RequestTopic,
};
