// src/store/list_response.rs
//
// List snapshot and the pure rules behind it.
//
// RULES:
// - Mutations build a new item vector; published snapshots are never touched again
// - empty is derived (no items, not initial, not loading), never stored
// - Terminal detection depends on the list's page mode only

use std::sync::Arc;

use serde::Serialize;

use crate::config::PageMode;
use crate::error::ServiceError;
use crate::services::ListPayload;

/// Snapshot of a paginated list, handed to rendering layers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListResponse<T> {
    pub data_source: Arc<Vec<T>>,
    /// Last page applied; 0 before anything loaded
    pub page: u32,
    pub page_size: u32,
    pub total: Option<u64>,
    pub no_more: bool,
    pub next_marker: Option<String>,
    pub initial: bool,
    pub empty: bool,
    pub error: Option<ServiceError>,
    pub loading: bool,
}

impl<T> ListResponse<T> {
    pub fn len(&self) -> usize {
        self.data_source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data_source.is_empty()
    }

    pub fn items(&self) -> &[T] {
        &self.data_source
    }
}

/// Where an optimistic insert lands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertPosition {
    #[default]
    Start,
    End,
    /// Clamped to the list length
    At(usize),
}

pub(crate) fn is_empty_view(len: usize, initial: bool, loading: bool) -> bool {
    len == 0 && !initial && !loading
}

/// True once the list has nothing left to fetch after applying `payload`
pub(crate) fn reached_end<T>(
    mode: PageMode,
    page_size: u32,
    payload: &ListPayload<T>,
    loaded: usize,
) -> bool {
    if payload.no_more == Some(true) {
        return true;
    }
    match mode {
        // An absent marker and an empty marker both end the list
        PageMode::Cursor => payload.next_marker.as_deref().map_or(true, str::is_empty),
        PageMode::Offset => {
            payload.list.len() < page_size as usize
                || payload.total.map_or(false, |total| loaded as u64 >= total)
        }
    }
}

/// Keeps `items[..start]` and appends `page`
pub(crate) fn spliced<T: Clone>(items: &[T], start: usize, page: Vec<T>) -> Vec<T> {
    let keep = start.min(items.len());
    let mut next = Vec::with_capacity(keep + page.len());
    next.extend_from_slice(&items[..keep]);
    next.extend(page);
    next
}

pub(crate) fn inserted<T: Clone>(items: &[T], item: T, position: InsertPosition) -> Vec<T> {
    let index = match position {
        InsertPosition::Start => 0,
        InsertPosition::End => items.len(),
        InsertPosition::At(index) => index.min(items.len()),
    };
    let mut next = Vec::with_capacity(items.len() + 1);
    next.extend_from_slice(&items[..index]);
    next.push(item);
    next.extend_from_slice(&items[index..]);
    next
}

/// Removes the first match. `None` when nothing matched.
pub(crate) fn without_first<T, P>(items: &[T], predicate: P) -> Option<(Vec<T>, T)>
where
    T: Clone,
    P: Fn(&T) -> bool,
{
    let index = items.iter().position(predicate)?;
    let mut next = items.to_vec();
    let removed = next.remove(index);
    Some((next, removed))
}

/// Replaces the first match with `updater(match)`. `None` when nothing matched.
pub(crate) fn with_first_modified<T, P, U>(items: &[T], predicate: P, updater: U) -> Option<Vec<T>>
where
    T: Clone,
    P: Fn(&T) -> bool,
    U: FnOnce(&T) -> T,
{
    let index = items.iter().position(predicate)?;
    let mut next = items.to_vec();
    next[index] = updater(&items[index]);
    Some(next)
}
