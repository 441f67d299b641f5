// src/store/async_request.rs
//
// AsyncRequest - one fallible service call with loading state.
//
// CRITICAL RULES:
// - At most one execution of the wrapped service per instance at a time
// - A caller arriving while a call is in flight joins that call and gets its result
// - A call stays in flight until the last event of its run has been emitted
// - A failed run never clears the last good response
// - Event order per run: LoadingChanged(true) → BeforeRequest → Success|Failed
//   → Completed → LoadingChanged(false) → StateChanged → ResponseChanged (success only)
// - No lock is held while events are emitted

use std::fmt;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::Serialize;

use crate::config::RequestConfig;
use crate::domain::Domain;
use crate::error::{ServiceError, ServiceResult};
use crate::events::{DomainEvent, EventBus, Listener};
use crate::services::Service;

type SharedCall<T> = Shared<BoxFuture<'static, ServiceResult<T>>>;

/// Plain snapshot handed to rendering layers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestState<T> {
    pub loading: bool,
    pub response: Option<T>,
}

#[derive(Debug, Clone)]
pub enum RequestEvent<T> {
    LoadingChanged(bool),
    BeforeRequest,
    Success(T),
    Failed(ServiceError),
    Completed,
    StateChanged(RequestState<T>),
    ResponseChanged(Option<T>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestTopic {
    LoadingChanged,
    BeforeRequest,
    Success,
    Failed,
    Completed,
    StateChanged,
    ResponseChanged,
}

impl<T> DomainEvent for RequestEvent<T>
where
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    type Topic = RequestTopic;

    fn topic(&self) -> RequestTopic {
        match self {
            RequestEvent::LoadingChanged(_) => RequestTopic::LoadingChanged,
            RequestEvent::BeforeRequest => RequestTopic::BeforeRequest,
            RequestEvent::Success(_) => RequestTopic::Success,
            RequestEvent::Failed(_) => RequestTopic::Failed,
            RequestEvent::Completed => RequestTopic::Completed,
            RequestEvent::StateChanged(_) => RequestTopic::StateChanged,
            RequestEvent::ResponseChanged(_) => RequestTopic::ResponseChanged,
        }
    }

    fn event_type(&self) -> &'static str {
        match self {
            RequestEvent::LoadingChanged(_) => "LoadingChanged",
            RequestEvent::BeforeRequest => "BeforeRequest",
            RequestEvent::Success(_) => "Success",
            RequestEvent::Failed(_) => "Failed",
            RequestEvent::Completed => "Completed",
            RequestEvent::StateChanged(_) => "StateChanged",
            RequestEvent::ResponseChanged(_) => "ResponseChanged",
        }
    }
}

/// Observable phase of the request state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Idle,
    Pending,
    Settled,
}

enum Phase<T> {
    Idle,
    Pending(SharedCall<T>),
    Settled,
}

struct RequestCore<A, T> {
    phase: Phase<T>,
    loading: bool,
    args: Option<A>,
    response: Option<T>,
    default_response: Option<T>,
}

impl<A, T: Clone> RequestCore<A, T> {
    fn pending_call(&self) -> Option<SharedCall<T>> {
        match &self.phase {
            Phase::Pending(call) => Some(call.clone()),
            Phase::Idle | Phase::Settled => None,
        }
    }

    fn snapshot(&self) -> RequestState<T> {
        RequestState {
            loading: self.loading,
            response: self.response.clone(),
        }
    }
}

struct Inner<A, T>
where
    A: Send + 'static,
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    service: Arc<dyn Service<A, T>>,
    config: RequestConfig,
    core: Mutex<RequestCore<A, T>>,
    bus: EventBus<RequestEvent<T>>,
}

enum Dispatch<T> {
    Started(SharedCall<T>),
    Joined(SharedCall<T>),
}

/// Wraps one service. Cloning yields another handle to the same request.
pub struct AsyncRequest<A, T>
where
    A: Send + 'static,
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    inner: Arc<Inner<A, T>>,
}

impl<A, T> AsyncRequest<A, T>
where
    A: Clone + Send + 'static,
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    pub fn new<S>(service: S, config: RequestConfig) -> Self
    where
        S: Service<A, T> + 'static,
    {
        Self::from_service(Arc::new(service), config)
    }

    pub fn from_service(service: Arc<dyn Service<A, T>>, config: RequestConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                service,
                config,
                core: Mutex::new(RequestCore {
                    phase: Phase::Idle,
                    loading: false,
                    args: None,
                    response: None,
                    default_response: None,
                }),
                bus: EventBus::new("request"),
            }),
        }
    }

    /// Response reported before the first success and restored by `clear`
    pub fn with_default(self, default: T) -> Self {
        {
            let mut core = self.inner.core.lock();
            core.response = Some(default.clone());
            core.default_response = Some(default);
        }
        self
    }

    /// Run the service, or join the call already in flight.
    pub async fn run(&self, args: A) -> ServiceResult<T> {
        let dispatch = {
            let mut core = self.inner.core.lock();
            match core.pending_call() {
                Some(call) => Dispatch::Joined(call),
                None => Dispatch::Started(self.start(&mut core, args)),
            }
        };

        match dispatch {
            Dispatch::Started(call) => call.await,
            Dispatch::Joined(call) => {
                log::debug!("[REQUEST] call already in flight, joining it");
                call.await
            }
        }
    }

    /// Wait for any call in flight, then start a fresh one with `args`.
    ///
    /// Still one execution at a time; unlike `run`, the caller always gets
    /// the result of a call made with its own arguments.
    pub async fn run_exclusive(&self, args: A) -> ServiceResult<T> {
        loop {
            let dispatch = {
                let mut core = self.inner.core.lock();
                match core.pending_call() {
                    Some(call) => Dispatch::Joined(call),
                    None => Dispatch::Started(self.start(&mut core, args.clone())),
                }
            };

            match dispatch {
                Dispatch::Started(call) => return call.await,
                Dispatch::Joined(call) => {
                    let _ = call.await;
                }
            }
        }
    }

    /// Run again with the last arguments. `None` if `run` was never called.
    pub async fn reload(&self) -> Option<ServiceResult<T>> {
        let args = self.inner.core.lock().args.clone();
        match args {
            Some(args) => Some(self.run(args).await),
            None => {
                log::debug!("[REQUEST] reload before first run ignored");
                None
            }
        }
    }

    /// Wait for the call in flight, if any
    pub async fn settled(&self) -> Option<ServiceResult<T>> {
        let call = self.inner.core.lock().pending_call();
        match call {
            Some(call) => Some(call.await),
            None => None,
        }
    }

    /// Reset the response to its default. In-flight calls are unaffected.
    pub fn clear(&self) {
        let state = {
            let mut core = self.inner.core.lock();
            core.response = core.default_response.clone();
            core.snapshot()
        };
        self.publish_state(state);
    }

    /// Edit the cached response in place. Returns false (and emits nothing) when there is none.
    pub fn modify_response<F>(&self, modify: F) -> bool
    where
        F: FnOnce(&mut T),
    {
        let state = {
            let mut core = self.inner.core.lock();
            match core.response.as_mut() {
                Some(response) => modify(response),
                None => return false,
            }
            core.snapshot()
        };
        self.publish_state(state);
        true
    }

    pub fn loading(&self) -> bool {
        self.inner.core.lock().loading
    }

    pub fn response(&self) -> Option<T> {
        self.inner.core.lock().response.clone()
    }

    pub fn last_args(&self) -> Option<A> {
        self.inner.core.lock().args.clone()
    }

    pub fn phase(&self) -> RequestPhase {
        match self.inner.core.lock().phase {
            Phase::Idle => RequestPhase::Idle,
            Phase::Pending(_) => RequestPhase::Pending,
            Phase::Settled => RequestPhase::Settled,
        }
    }

    pub fn config(&self) -> &RequestConfig {
        &self.inner.config
    }

    pub fn on_loading_change<F>(&self, handler: F) -> Listener
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.inner.bus.on(RequestTopic::LoadingChanged, move |event| {
            if let RequestEvent::LoadingChanged(loading) = event {
                handler(*loading);
            }
        })
    }

    pub fn on_before_request<F>(&self, handler: F) -> Listener
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner
            .bus
            .on(RequestTopic::BeforeRequest, move |_| handler())
    }

    pub fn on_success<F>(&self, handler: F) -> Listener
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.inner.bus.on(RequestTopic::Success, move |event| {
            if let RequestEvent::Success(data) = event {
                handler(data);
            }
        })
    }

    pub fn on_failed<F>(&self, handler: F) -> Listener
    where
        F: Fn(&ServiceError) + Send + Sync + 'static,
    {
        self.inner.bus.on(RequestTopic::Failed, move |event| {
            if let RequestEvent::Failed(error) = event {
                handler(error);
            }
        })
    }

    pub fn on_completed<F>(&self, handler: F) -> Listener
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.bus.on(RequestTopic::Completed, move |_| handler())
    }

    pub fn on_response_change<F>(&self, handler: F) -> Listener
    where
        F: Fn(Option<&T>) + Send + Sync + 'static,
    {
        self.inner.bus.on(RequestTopic::ResponseChanged, move |event| {
            if let RequestEvent::ResponseChanged(response) = event {
                handler(response.as_ref());
            }
        })
    }

    /// Idle|Settled → Pending. Caller holds the core lock.
    fn start(&self, core: &mut RequestCore<A, T>, args: A) -> SharedCall<T> {
        core.args = Some(args.clone());
        core.loading = true;

        let call = Self::execute(Arc::clone(&self.inner), args).boxed().shared();
        core.phase = Phase::Pending(call.clone());

        // The call finishes even if every caller stops waiting for it
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(call.clone());
        }
        call
    }

    async fn execute(inner: Arc<Inner<A, T>>, args: A) -> ServiceResult<T> {
        inner.bus.emit(RequestEvent::LoadingChanged(true));
        inner.bus.emit(RequestEvent::BeforeRequest);

        let floor = inner.config.min_loading();
        let (result, ()) = tokio::join!(inner.service.call(args), async move {
            if let Some(floor) = floor {
                tokio::time::sleep(floor).await;
            }
        });

        // Still Pending: callers arriving while the events go out join this call
        let state = {
            let mut core = inner.core.lock();
            core.loading = false;
            if let Ok(data) = &result {
                core.response = Some(data.clone());
            }
            core.snapshot()
        };

        match &result {
            Ok(data) => inner.bus.emit(RequestEvent::Success(data.clone())),
            Err(error) => {
                log::warn!("[REQUEST] service failed: {}", error);
                inner.bus.emit(RequestEvent::Failed(error.clone()));
            }
        }
        inner.bus.emit(RequestEvent::Completed);
        inner.bus.emit(RequestEvent::LoadingChanged(false));

        let response = state.response.clone();
        inner.bus.emit(RequestEvent::StateChanged(state));
        if result.is_ok() {
            inner.bus.emit(RequestEvent::ResponseChanged(response));
        }

        let finished = std::mem::replace(&mut inner.core.lock().phase, Phase::Settled);
        drop(finished);

        result
    }

    fn publish_state(&self, state: RequestState<T>) {
        let response = state.response.clone();
        self.inner.bus.emit(RequestEvent::StateChanged(state));
        self.inner.bus.emit(RequestEvent::ResponseChanged(response));
    }
}

impl<A, T> Domain for AsyncRequest<A, T>
where
    A: Clone + Send + 'static,
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    type Event = RequestEvent<T>;
    type State = RequestState<T>;

    fn bus(&self) -> &EventBus<RequestEvent<T>> {
        &self.inner.bus
    }

    fn state(&self) -> RequestState<T> {
        self.inner.core.lock().snapshot()
    }

    fn on_state_change<F>(&self, handler: F) -> Listener
    where
        F: Fn(&RequestState<T>) + Send + Sync + 'static,
    {
        self.inner.bus.on(RequestTopic::StateChanged, move |event| {
            if let RequestEvent::StateChanged(state) = event {
                handler(state);
            }
        })
    }
}

impl<A, T> Clone for AsyncRequest<A, T>
where
    A: Send + 'static,
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, T> fmt::Debug for AsyncRequest<A, T>
where
    A: Send + 'static,
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.inner.core.lock();
        f.debug_struct("AsyncRequest")
            .field("loading", &core.loading)
            .field("response", &core.response)
            .finish()
    }
}
