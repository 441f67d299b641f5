// src/error/mod.rs

pub mod envelope;
pub mod types;

pub use envelope::{ApiEnvelope, SUCCESS_CODE};
pub use types::{ErrorKind, NormalizeErr, ServiceError, ServiceResult};
