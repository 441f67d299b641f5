// src/store/paginated_list.rs
//
// PaginatedList - page or cursor driven list over one AsyncRequest.
//
// CRITICAL RULES:
// - Offset or cursor mode is fixed at construction and never mixed
// - search() and reset() start a new generation; results from older
//   generations are dropped when they arrive
// - load_more() and refresh() never overlap another fetch; load_more() never runs past the end
// - no_more is cleared only by search() and reset()
// - Replacing fetches (init, search, refresh) always get the answer to their own params
// - A failed fetch keeps the items already shown
// - Optimistic edits touch the first match only and never hit the network

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::config::{ListConfig, PageMode};
use crate::domain::Domain;
use crate::error::{ServiceError, ServiceResult};
use crate::events::{DomainEvent, EventBus, Listener};
use crate::services::{FetchParams, Filters, ListPayload, ListService, Service};
use crate::store::async_request::AsyncRequest;
use crate::store::list_response::{
    inserted, is_empty_view, reached_end, spliced, with_first_modified, without_first,
    InsertPosition, ListResponse,
};

#[derive(Debug, Clone)]
pub enum ListEvent<T> {
    /// true when the first fetch starts, false once no fetch is left running
    LoadingChanged(bool),
    /// Items of the page that was just applied
    Success(Vec<T>),
    Failed(ServiceError),
    StateChanged(ListResponse<T>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListTopic {
    LoadingChanged,
    Success,
    Failed,
    StateChanged,
}

impl<T> DomainEvent for ListEvent<T>
where
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    type Topic = ListTopic;

    fn topic(&self) -> ListTopic {
        match self {
            ListEvent::LoadingChanged(_) => ListTopic::LoadingChanged,
            ListEvent::Success(_) => ListTopic::Success,
            ListEvent::Failed(_) => ListTopic::Failed,
            ListEvent::StateChanged(_) => ListTopic::StateChanged,
        }
    }

    fn event_type(&self) -> &'static str {
        match self {
            ListEvent::LoadingChanged(_) => "ListLoadingChanged",
            ListEvent::Success(_) => "ListSuccess",
            ListEvent::Failed(_) => "ListFailed",
            ListEvent::StateChanged(_) => "ListStateChanged",
        }
    }
}

/// Params and item offset of the last page applied, for refresh()
#[derive(Debug, Clone)]
struct LastFetch {
    params: FetchParams,
    start: usize,
}

struct FetchPlan {
    params: FetchParams,
    generation: u64,
    /// Item offset the page replaces from; `None` appends
    start: Option<usize>,
    /// No other fetch was running when this one was planned
    first: bool,
}

struct ListCore<T> {
    data: Arc<Vec<T>>,
    page: u32,
    total: Option<u64>,
    no_more: bool,
    next_marker: Option<String>,
    initial: bool,
    /// init() already issued for this generation
    started: bool,
    error: Option<ServiceError>,
    filters: Filters,
    default_filters: Filters,
    generation: u64,
    in_flight: usize,
    last_fetch: Option<LastFetch>,
}

struct ListInner<T>
where
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    request: AsyncRequest<FetchParams, ListPayload<T>>,
    mode: PageMode,
    page_size: u32,
    core: Mutex<ListCore<T>>,
    bus: EventBus<ListEvent<T>>,
}

enum LoadMore<T> {
    Init,
    Skip(ListResponse<T>),
    Fetch(FetchPlan),
}

/// Paginated list. Cloning yields another handle to the same list.
pub struct PaginatedList<T>
where
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    inner: Arc<ListInner<T>>,
}

impl<T> PaginatedList<T>
where
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    pub fn new<S>(service: S, config: ListConfig) -> Self
    where
        S: Service<FetchParams, ListPayload<T>> + 'static,
    {
        Self::from_service(Arc::new(service), config)
    }

    pub fn from_service(service: Arc<ListService<T>>, config: ListConfig) -> Self {
        let request = AsyncRequest::from_service(service, config.request.clone());
        let bus = EventBus::new("list");

        Self {
            inner: Arc::new(ListInner {
                request,
                mode: config.mode,
                page_size: config.page_size.max(1),
                core: Mutex::new(ListCore {
                    data: Arc::new(Vec::new()),
                    page: 0,
                    total: None,
                    no_more: false,
                    next_marker: None,
                    initial: true,
                    started: false,
                    error: None,
                    filters: Filters::new(),
                    default_filters: Filters::new(),
                    generation: 0,
                    in_flight: 0,
                    last_fetch: None,
                }),
                bus,
            }),
        }
    }

    /// Filters applied from construction on, and restored by reset()
    pub fn with_filters(self, filters: Filters) -> Self {
        {
            let mut core = self.inner.core.lock();
            core.filters = filters.clone();
            core.default_filters = filters;
        }
        self
    }

    /// Fetch the first page once. No-op until reset() after the first call.
    pub async fn init(&self) -> ServiceResult<ListResponse<T>> {
        let plan = {
            let mut core = self.inner.core.lock();
            if core.started {
                return Ok(self.snapshot(&core));
            }
            core.started = true;
            self.first_page_plan(&mut core)
        };
        self.fetch(plan).await
    }

    /// Merge `filters` into the current set and reload from the first page.
    ///
    /// A `null` value removes that filter.
    pub async fn search(&self, filters: Filters) -> ServiceResult<ListResponse<T>> {
        let plan = {
            let mut core = self.inner.core.lock();
            for (key, value) in filters {
                if value.is_null() {
                    core.filters.remove(&key);
                } else {
                    core.filters.insert(key, value);
                }
            }
            core.generation += 1;
            core.started = true;
            core.data = Arc::new(Vec::new());
            core.page = 0;
            core.total = None;
            core.no_more = false;
            core.next_marker = None;
            core.error = None;
            core.last_fetch = None;
            self.first_page_plan(&mut core)
        };
        self.fetch(plan).await
    }

    /// Append the next page. No-op at the end of the list or while a fetch is running.
    pub async fn load_more(&self) -> ServiceResult<ListResponse<T>> {
        let action = {
            let mut core = self.inner.core.lock();
            if core.initial {
                LoadMore::Init
            } else if core.no_more || core.in_flight > 0 || self.inner.request.loading() {
                LoadMore::Skip(self.snapshot(&core))
            } else {
                let params = FetchParams {
                    page: core.page + 1,
                    page_size: self.inner.page_size,
                    next_marker: match self.inner.mode {
                        PageMode::Cursor => core.next_marker.clone(),
                        PageMode::Offset => None,
                    },
                    filters: core.filters.clone(),
                };
                LoadMore::Fetch(FetchPlan {
                    params,
                    generation: core.generation,
                    start: None,
                    first: begin_fetch(&mut core),
                })
            }
        };

        match action {
            LoadMore::Init => self.init().await,
            LoadMore::Skip(snapshot) => {
                log::debug!("[LIST] load_more skipped (no_more or fetch in flight)");
                Ok(snapshot)
            }
            LoadMore::Fetch(plan) => self.fetch(plan).await,
        }
    }

    /// Fetch the last page position again and replace its items.
    /// Items of earlier pages stay; before any page loaded this fetches the first page.
    /// No-op while another fetch is running, since the last page may still move.
    pub async fn refresh(&self) -> ServiceResult<ListResponse<T>> {
        let plan = {
            let mut core = self.inner.core.lock();
            if core.in_flight > 0 {
                log::debug!("[LIST] refresh skipped (fetch in flight)");
                return Ok(self.snapshot(&core));
            }
            match core.last_fetch.clone() {
                Some(last) => FetchPlan {
                    params: FetchParams {
                        filters: core.filters.clone(),
                        ..last.params
                    },
                    generation: core.generation,
                    start: Some(last.start),
                    first: begin_fetch(&mut core),
                },
                None => {
                    core.started = true;
                    self.first_page_plan(&mut core)
                }
            }
        };
        self.fetch(plan).await
    }

    /// Back to the unsearched state with default filters. Does not fetch.
    pub fn reset(&self) {
        let snapshot = {
            let mut core = self.inner.core.lock();
            core.generation += 1;
            core.filters = core.default_filters.clone();
            core.data = Arc::new(Vec::new());
            core.page = 0;
            core.total = None;
            core.no_more = false;
            core.next_marker = None;
            core.initial = true;
            core.started = false;
            core.error = None;
            core.last_fetch = None;
            self.snapshot(&core)
        };
        self.inner.bus.emit(ListEvent::StateChanged(snapshot));
    }

    /// Show an item the server just created, without refetching
    pub fn insert_item(&self, item: T, position: InsertPosition) {
        let snapshot = {
            let mut core = self.inner.core.lock();
            core.data = Arc::new(inserted(&core.data, item, position));
            if let Some(total) = core.total.as_mut() {
                *total += 1;
            }
            self.snapshot(&core)
        };
        self.inner.bus.emit(ListEvent::StateChanged(snapshot));
    }

    /// Drop the first item matching `predicate`. Emits nothing when none matches.
    pub fn delete_item<P>(&self, predicate: P) -> Option<T>
    where
        P: Fn(&T) -> bool,
    {
        let (removed, snapshot) = {
            let mut core = self.inner.core.lock();
            let (next, removed) = without_first(&core.data, predicate)?;
            core.data = Arc::new(next);
            if let Some(total) = core.total.as_mut() {
                *total = total.saturating_sub(1);
            }
            (removed, self.snapshot(&core))
        };
        self.inner.bus.emit(ListEvent::StateChanged(snapshot));
        Some(removed)
    }

    /// Replace the first item matching `predicate` with `updater(item)`.
    /// Returns false and emits nothing when none matches.
    pub fn modify_item<P, U>(&self, predicate: P, updater: U) -> bool
    where
        P: Fn(&T) -> bool,
        U: FnOnce(&T) -> T,
    {
        let snapshot = {
            let mut core = self.inner.core.lock();
            match with_first_modified(&core.data, predicate, updater) {
                Some(next) => core.data = Arc::new(next),
                None => return false,
            }
            self.snapshot(&core)
        };
        self.inner.bus.emit(ListEvent::StateChanged(snapshot));
        true
    }

    /// Current snapshot
    pub fn response(&self) -> ListResponse<T> {
        let core = self.inner.core.lock();
        self.snapshot(&core)
    }

    pub fn filters(&self) -> Filters {
        self.inner.core.lock().filters.clone()
    }

    pub fn set_filter(&self, key: impl Into<String>, value: Value) {
        self.inner.core.lock().filters.insert(key.into(), value);
    }

    pub fn mode(&self) -> PageMode {
        self.inner.mode
    }

    pub fn page_size(&self) -> u32 {
        self.inner.page_size
    }

    pub fn on_success<F>(&self, handler: F) -> Listener
    where
        F: Fn(&[T]) + Send + Sync + 'static,
    {
        self.inner.bus.on(ListTopic::Success, move |event| {
            if let ListEvent::Success(items) = event {
                handler(items);
            }
        })
    }

    pub fn on_failed<F>(&self, handler: F) -> Listener
    where
        F: Fn(&ServiceError) + Send + Sync + 'static,
    {
        self.inner.bus.on(ListTopic::Failed, move |event| {
            if let ListEvent::Failed(error) = event {
                handler(error);
            }
        })
    }

    pub fn on_loading_change<F>(&self, handler: F) -> Listener
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.inner.bus.on(ListTopic::LoadingChanged, move |event| {
            if let ListEvent::LoadingChanged(loading) = event {
                handler(*loading);
            }
        })
    }

    /// Caller holds the core lock
    fn first_page_plan(&self, core: &mut ListCore<T>) -> FetchPlan {
        FetchPlan {
            params: FetchParams::first_page(self.inner.page_size, core.filters.clone()),
            generation: core.generation,
            start: Some(0),
            first: begin_fetch(core),
        }
    }

    async fn fetch(&self, plan: FetchPlan) -> ServiceResult<ListResponse<T>> {
        // in_flight was raised when the plan was made
        if plan.first {
            self.inner.bus.emit(ListEvent::LoadingChanged(true));
        }
        let loading = self.response();
        self.inner.bus.emit(ListEvent::StateChanged(loading));

        let result = match plan.start {
            None => self.inner.request.run(plan.params.clone()).await,
            Some(_) => self.inner.request.run_exclusive(plan.params.clone()).await,
        };

        let (snapshot, applied, idle) = {
            let mut core = self.inner.core.lock();
            core.in_flight = core.in_flight.saturating_sub(1);
            let idle = core.in_flight == 0;
            let applied = core.generation == plan.generation;
            if applied {
                match &result {
                    Ok(payload) => self.apply_page(&mut core, &plan, payload),
                    Err(error) => {
                        core.error = Some(error.clone());
                        core.initial = false;
                    }
                }
            } else {
                log::debug!(
                    "[LIST] dropping page {} from generation {} (now {})",
                    plan.params.page,
                    plan.generation,
                    core.generation
                );
            }
            (self.snapshot(&core), applied, idle)
        };

        if applied {
            match &result {
                Ok(payload) => self.inner.bus.emit(ListEvent::Success(payload.list.clone())),
                Err(error) => self.inner.bus.emit(ListEvent::Failed(error.clone())),
            }
        }
        if idle {
            self.inner.bus.emit(ListEvent::LoadingChanged(false));
        }
        self.inner.bus.emit(ListEvent::StateChanged(snapshot.clone()));

        result.map(|_| snapshot)
    }

    fn apply_page(&self, core: &mut ListCore<T>, plan: &FetchPlan, payload: &ListPayload<T>) {
        let start = plan.start.unwrap_or(core.data.len());
        let appending = plan.start.is_none();

        core.data = Arc::new(spliced(&core.data, start, payload.list.clone()));
        core.page = plan.params.page;
        core.total = match (payload.total, appending) {
            (Some(total), _) => Some(total),
            (None, true) => core.total,
            (None, false) => None,
        };
        core.next_marker = match self.inner.mode {
            PageMode::Cursor => payload.next_marker.clone().filter(|marker| !marker.is_empty()),
            PageMode::Offset => None,
        };
        // Sticky until search() or reset(); a refreshed page never reopens the list
        core.no_more = core.no_more
            || reached_end(self.inner.mode, self.inner.page_size, payload, core.data.len());
        core.initial = false;
        core.error = None;
        core.last_fetch = Some(LastFetch {
            params: plan.params.clone(),
            start,
        });
    }

    fn snapshot(&self, core: &ListCore<T>) -> ListResponse<T> {
        let loading = core.in_flight > 0;
        ListResponse {
            data_source: Arc::clone(&core.data),
            page: core.page,
            page_size: self.inner.page_size,
            total: core.total,
            no_more: core.no_more,
            next_marker: core.next_marker.clone(),
            initial: core.initial,
            empty: is_empty_view(core.data.len(), core.initial, loading),
            error: core.error.clone(),
            loading,
        }
    }
}

/// Raises the in-flight count. True when no other fetch was running.
fn begin_fetch<T>(core: &mut ListCore<T>) -> bool {
    core.in_flight += 1;
    core.in_flight == 1
}

impl<T> Domain for PaginatedList<T>
where
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    type Event = ListEvent<T>;
    type State = ListResponse<T>;

    fn bus(&self) -> &EventBus<ListEvent<T>> {
        &self.inner.bus
    }

    fn state(&self) -> ListResponse<T> {
        self.response()
    }

    fn on_state_change<F>(&self, handler: F) -> Listener
    where
        F: Fn(&ListResponse<T>) + Send + Sync + 'static,
    {
        self.inner.bus.on(ListTopic::StateChanged, move |event| {
            if let ListEvent::StateChanged(state) = event {
                handler(state);
            }
        })
    }

    /// Also tears down the owned request
    fn destroy(&self) {
        self.inner.bus.destroy();
        self.inner.request.destroy();
    }
}

impl<T> Clone for PaginatedList<T>
where
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for PaginatedList<T>
where
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaginatedList")
            .field("mode", &self.inner.mode)
            .field("page_size", &self.inner.page_size)
            .field("response", &self.response())
            .finish()
    }
}
