// src/store/job_poller.rs
//
// Job Poller - repeats a status request until a long-running job settles.
//
// CRITICAL RULES:
// - Polls through an AsyncRequest, so status listeners see every poll
// - Stops on the first status the caller's predicate calls finished
// - Stops immediately when cancelled, including mid-sleep
// - Gives up only after max_consecutive_failures failed polls in a row
// - Does NOT retry inside a poll; the next interval is the retry

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::PollConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::store::async_request::AsyncRequest;

type FinishedFn<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Result of a single poll
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus<T> {
    Pending(T),
    Finished(T),
    Failed(ServiceError),
    Cancelled,
}

/// How a polling loop ended without error
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    Finished(T),
    Cancelled,
}

pub struct JobPoller<A, T>
where
    A: Clone + Send + Sync + 'static,
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    request: AsyncRequest<A, T>,
    args: A,
    is_finished: FinishedFn<T>,
    config: PollConfig,
    token: CancellationToken,
    failures: Arc<AtomicU32>,
}

impl<A, T> JobPoller<A, T>
where
    A: Clone + Send + Sync + 'static,
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    pub fn new<F>(request: AsyncRequest<A, T>, args: A, is_finished: F, config: PollConfig) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            request,
            args,
            is_finished: Arc::new(is_finished),
            config,
            token: CancellationToken::new(),
            failures: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Poll once
    pub async fn step(&self) -> PollStatus<T> {
        if self.token.is_cancelled() {
            return PollStatus::Cancelled;
        }

        match self.request.run(self.args.clone()).await {
            Ok(status) => {
                self.failures.store(0, Ordering::SeqCst);
                if (self.is_finished)(&status) {
                    PollStatus::Finished(status)
                } else {
                    PollStatus::Pending(status)
                }
            }
            Err(error) => {
                let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
                log::warn!(
                    "[POLLER] poll failed ({}/{}): {}",
                    failures,
                    self.config.max_consecutive_failures,
                    error
                );
                PollStatus::Failed(error)
            }
        }
    }

    /// Poll now, then every `interval`, until the job finishes or polling stops
    pub async fn run(&self) -> ServiceResult<PollOutcome<T>> {
        let interval = self.config.interval();

        loop {
            match self.step().await {
                PollStatus::Finished(status) => return Ok(PollOutcome::Finished(status)),
                PollStatus::Cancelled => return Ok(PollOutcome::Cancelled),
                PollStatus::Failed(error) => {
                    if self.consecutive_failures() >= self.config.max_consecutive_failures {
                        log::error!("[POLLER] giving up: {}", error);
                        return Err(error);
                    }
                }
                PollStatus::Pending(_) => {}
            }

            tokio::select! {
                _ = self.token.cancelled() => {
                    log::debug!("[POLLER] cancelled while waiting");
                    return Ok(PollOutcome::Cancelled);
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    /// Run the loop on a background task
    pub fn spawn(&self) -> PollHandle<T> {
        let poller = self.clone();
        let task = tokio::spawn(async move { poller.run().await });
        PollHandle {
            token: self.token.clone(),
            task: Some(task),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token tied to this poller, for cancelling from elsewhere
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    pub fn request(&self) -> &AsyncRequest<A, T> {
        &self.request
    }
}

impl<A, T> Clone for JobPoller<A, T>
where
    A: Clone + Send + Sync + 'static,
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            request: self.request.clone(),
            args: self.args.clone(),
            is_finished: Arc::clone(&self.is_finished),
            config: self.config.clone(),
            token: self.token.clone(),
            failures: Arc::clone(&self.failures),
        }
    }
}

impl<A, T> fmt::Debug for JobPoller<A, T>
where
    A: Clone + Send + Sync + 'static,
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobPoller")
            .field("config", &self.config)
            .field("cancelled", &self.token.is_cancelled())
            .field("failures", &self.consecutive_failures())
            .finish()
    }
}

/// Handle to a spawned polling loop
pub struct PollHandle<T> {
    token: CancellationToken,
    task: Option<JoinHandle<ServiceResult<PollOutcome<T>>>>,
}

impl<T> PollHandle<T> {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the loop to end. Dropping the returned future before it
    /// completes cancels the loop.
    pub async fn join(mut self) -> ServiceResult<PollOutcome<T>> {
        let task = match self.task.take() {
            Some(task) => task,
            None => return Ok(PollOutcome::Cancelled),
        };
        let guard = self.token.clone().drop_guard();
        let joined = task.await;
        guard.disarm();

        match joined {
            Ok(outcome) => outcome,
            Err(error) if error.is_cancelled() => Ok(PollOutcome::Cancelled),
            Err(error) => Err(ServiceError::transport(format!(
                "Polling task failed: {}",
                error
            ))),
        }
    }
}

impl<T> Drop for PollHandle<T> {
    fn drop(&mut self) {
        // Dropping the handle without join() stops the loop
        if self.task.is_some() {
            self.token.cancel();
        }
    }
}
