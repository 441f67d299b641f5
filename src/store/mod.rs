// src/store/mod.rs
//
// Stores - stateful domain objects built on the service boundary.
//
// RULES:
// - Every store implements Domain and owns exactly one EventBus
// - Stores talk to the backend only through a Service
// - Snapshots handed out are never mutated afterwards

pub mod async_request;
pub mod job_poller;
pub mod list_response;
pub mod paginated_list;

mod async_request_tests;

pub use async_request::{AsyncRequest, RequestEvent, RequestPhase, RequestState, RequestTopic};
pub use job_poller::{JobPoller, PollHandle, PollOutcome, PollStatus};
pub use list_response::{InsertPosition, ListResponse};
pub use paginated_list::{ListEvent, ListTopic, PaginatedList};
