// src/services/mod.rs
//
// Service boundary - the contract every collaborator satisfies.
//
// CRITICAL RULES:
// - A service returns ServiceResult, it never panics for expected failures
// - Transport, validation and business failures arrive as Err(ServiceError)
// - Timeouts are the service's responsibility, not the store's

use std::future::Future;

use async_trait::async_trait;

use crate::error::ServiceResult;

pub mod list_service;

pub use list_service::{FetchParams, Filters, ListPayload, ListService};

/// A fallible async operation wrapped by an `AsyncRequest`
#[async_trait]
pub trait Service<A, T>: Send + Sync
where
    A: Send + 'static,
    T: Send + 'static,
{
    async fn call(&self, args: A) -> ServiceResult<T>;
}

/// Adapts a closure returning a future into a `Service`
#[derive(Clone)]
pub struct ServiceFn<F> {
    f: F,
}

pub fn service_fn<F>(f: F) -> ServiceFn<F> {
    ServiceFn { f }
}

#[async_trait]
impl<A, T, F, Fut> Service<A, T> for ServiceFn<F>
where
    A: Send + 'static,
    T: Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ServiceResult<T>> + Send + 'static,
{
    async fn call(&self, args: A) -> ServiceResult<T> {
        (self.f)(args).await
    }
}

impl<F> std::fmt::Debug for ServiceFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ServiceFn")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;

    #[tokio::test]
    async fn test_service_fn_forwards_args() {
        let double = service_fn(|n: u32| async move { Ok::<_, ServiceError>(n * 2) });
        assert_eq!(double.call(21).await, Ok(42));
    }

    #[tokio::test]
    async fn test_service_fn_forwards_errors() {
        let offline = service_fn(|_: ()| async { Err::<u32, _>(ServiceError::transport("offline")) });
        assert!(offline.call(()).await.unwrap_err().is_transport());
    }
}
