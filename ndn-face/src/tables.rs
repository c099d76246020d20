//! Generic record container backing the three face tables.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identifier of a record, unique within one container for the lifetime
/// of the face. Ids are never reused after erasure.
pub type RecordId = u64;

/// Hands out strictly increasing record ids, starting at 1.
///
/// Cloned handles share the same sequence, so ids can be allocated off
/// the driver loop (e.g. by a public method that posts the insertion).
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: Arc<AtomicU64>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            next: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn allocate(&self) -> RecordId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Map from record id to record with an "emptied" signal.
///
/// `on_empty` fires after each removal that leaves the container empty,
/// exactly once per transition from non-empty to empty.
pub struct RecordContainer<R> {
    records: BTreeMap<RecordId, R>,
    ids: IdAllocator,
    on_empty: Option<Box<dyn FnMut() + Send>>,
}

impl<R> RecordContainer<R> {
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            ids: IdAllocator::new(),
            on_empty: None,
        }
    }

    /// Shared handle to this container's id sequence.
    pub fn id_allocator(&self) -> IdAllocator {
        self.ids.clone()
    }

    /// Allocates the next record id.
    pub fn allocate_id(&self) -> RecordId {
        self.ids.allocate()
    }

    /// Registers the emptied signal.
    pub fn set_on_empty(&mut self, f: impl FnMut() + Send + 'static) {
        self.on_empty = Some(Box::new(f));
    }

    /// Stores `record` under a previously allocated id.
    pub fn put(&mut self, id: RecordId, record: R) {
        self.records.insert(id, record);
    }

    /// Stores `record` under a freshly allocated id.
    pub fn insert(&mut self, record: R) -> RecordId {
        let id = self.allocate_id();
        self.records.insert(id, record);
        id
    }

    pub fn get(&self, id: RecordId) -> Option<&R> {
        self.records.get(&id)
    }

    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut R> {
        self.records.get_mut(&id)
    }

    /// Removes and returns the record under `id`.
    pub fn erase(&mut self, id: RecordId) -> Option<R> {
        let removed = self.records.remove(&id);
        if removed.is_some() && self.records.is_empty() {
            self.notify_empty();
        }
        removed
    }

    /// Removes every record.
    pub fn clear(&mut self) {
        if self.records.is_empty() {
            return;
        }
        self.records.clear();
        self.notify_empty();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Snapshot of the current record ids, in insertion (id) order.
    pub fn ids(&self) -> Vec<RecordId> {
        self.records.keys().copied().collect()
    }

    /// Visits every record.
    pub fn for_each(&mut self, mut f: impl FnMut(RecordId, &mut R)) {
        for (id, record) in self.records.iter_mut() {
            f(*id, record);
        }
    }

    /// Removes the records selected by `pred` and returns them in id
    /// order. Iteration is stable against removal of the visited entry:
    /// ids are collected first and erased afterwards.
    pub fn remove_if(&mut self, mut pred: impl FnMut(RecordId, &R) -> bool) -> Vec<R> {
        let selected: Vec<RecordId> = self
            .records
            .iter()
            .filter(|(id, record)| pred(**id, record))
            .map(|(id, _)| *id)
            .collect();

        let was_empty = self.records.is_empty();
        let mut removed = Vec::with_capacity(selected.len());
        for id in selected {
            if let Some(record) = self.records.remove(&id) {
                removed.push(record);
            }
        }
        if !was_empty && self.records.is_empty() && !removed.is_empty() {
            self.notify_empty();
        }
        removed
    }

    fn notify_empty(&mut self) {
        if let Some(on_empty) = &mut self.on_empty {
            on_empty();
        }
    }
}

impl<R> Default for RecordContainer<R> {
    fn default() -> Self {
        Self::new()
    }
}
