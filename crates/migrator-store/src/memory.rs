//! In-memory store.
//!
//! Backs local runs without a database and every engine test. Rows live in a
//! `BTreeMap` so scans come back in primary-key order, mirroring
//! `ORDER BY id` on a relational store.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use migrator_core::Entity;
use parking_lot::{Mutex, RwLock};

use crate::error::{StoreError, StoreResult};
use crate::traits::Store;

#[derive(Debug, Default)]
struct Faults {
    scans: VecDeque<StoreError>,
    lookups: VecDeque<StoreError>,
    writes: VecDeque<StoreError>,
    scan_delay: Option<Duration>,
    lookup_delay: Option<Duration>,
}

/// `BTreeMap` backed store with fault injection.
#[derive(Debug)]
pub struct MemoryStore<T: Entity> {
    name: String,
    rows: RwLock<BTreeMap<i64, T>>,
    faults: Mutex<Faults>,
    scan_calls: AtomicUsize,
    lookup_calls: AtomicUsize,
    write_calls: AtomicUsize,
}

impl<T: Entity> MemoryStore<T> {
    /// Create an empty store.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: RwLock::new(BTreeMap::new()),
            faults: Mutex::new(Faults::default()),
            scan_calls: AtomicUsize::new(0),
            lookup_calls: AtomicUsize::new(0),
            write_calls: AtomicUsize::new(0),
        }
    }

    /// Create a store pre-populated with `rows`.
    pub fn with_rows(name: impl Into<String>, rows: impl IntoIterator<Item = T>) -> Self {
        let store = Self::new(name);
        store.insert_all(rows);
        store
    }

    /// Insert or replace rows directly, bypassing fault injection.
    pub fn insert_all(&self, rows: impl IntoIterator<Item = T>) {
        let mut guard = self.rows.write();
        for row in rows {
            guard.insert(row.id(), row);
        }
    }

    /// Remove a row directly, bypassing fault injection.
    pub fn remove(&self, id: i64) -> Option<T> {
        self.rows.write().remove(&id)
    }

    /// Read a row directly.
    pub fn get(&self, id: i64) -> Option<T> {
        self.rows.read().get(&id).cloned()
    }

    /// All rows in ID order.
    pub fn snapshot(&self) -> Vec<T> {
        self.rows.read().values().cloned().collect()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Whether the store holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Fail the next `n` range scans with `error`.
    pub fn fail_next_scans(&self, n: usize, error: StoreError) {
        let mut faults = self.faults.lock();
        faults.scans.extend(std::iter::repeat(error).take(n));
    }

    /// Fail the next `n` point/batch lookups with `error`.
    pub fn fail_next_lookups(&self, n: usize, error: StoreError) {
        let mut faults = self.faults.lock();
        faults.lookups.extend(std::iter::repeat(error).take(n));
    }

    /// Fail the next `n` upserts/deletes with `error`.
    pub fn fail_next_writes(&self, n: usize, error: StoreError) {
        let mut faults = self.faults.lock();
        faults.writes.extend(std::iter::repeat(error).take(n));
    }

    /// Delay every range scan by `delay`.
    pub fn set_scan_delay(&self, delay: Option<Duration>) {
        self.faults.lock().scan_delay = delay;
    }

    /// Delay every batch lookup by `delay`.
    pub fn set_lookup_delay(&self, delay: Option<Duration>) {
        self.faults.lock().lookup_delay = delay;
    }

    /// Number of range scans issued so far.
    pub fn scan_calls(&self) -> usize {
        self.scan_calls.load(Ordering::SeqCst)
    }

    /// Number of batch/point lookups issued so far.
    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    /// Number of upserts/deletes issued so far.
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    fn take_scan_fault(&self) -> (Option<StoreError>, Option<Duration>) {
        let mut faults = self.faults.lock();
        (faults.scans.pop_front(), faults.scan_delay)
    }

    fn take_lookup_fault(&self) -> (Option<StoreError>, Option<Duration>) {
        let mut faults = self.faults.lock();
        (faults.lookups.pop_front(), faults.lookup_delay)
    }

    fn take_write_fault(&self) -> Option<StoreError> {
        self.faults.lock().writes.pop_front()
    }
}

async fn pause(delay: Option<Duration>) {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl<T: Entity> Store<T> for MemoryStore<T> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn range_scan(&self, min_utime: i64, offset: usize, limit: usize) -> StoreResult<Vec<T>> {
        self.scan_calls.fetch_add(1, Ordering::SeqCst);
        let (fault, delay) = self.take_scan_fault();
        pause(delay).await;
        if let Some(err) = fault {
            return Err(err);
        }

        let rows = self.rows.read();
        Ok(rows
            .values()
            .filter(|row| row.utime() >= min_utime)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn batch_get(&self, ids: &[i64]) -> StoreResult<Vec<T>> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        let (fault, delay) = self.take_lookup_fault();
        pause(delay).await;
        if let Some(err) = fault {
            return Err(err);
        }

        let wanted: HashSet<i64> = ids.iter().copied().collect();
        let rows = self.rows.read();
        Ok(wanted
            .into_iter()
            .filter_map(|id| rows.get(&id).cloned())
            .collect())
    }

    async fn find(&self, id: i64) -> StoreResult<Option<T>> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        let (fault, delay) = self.take_lookup_fault();
        pause(delay).await;
        if let Some(err) = fault {
            return Err(err);
        }
        Ok(self.rows.read().get(&id).cloned())
    }

    async fn upsert(&self, entity: &T) -> StoreResult<()> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.take_write_fault() {
            return Err(err);
        }
        self.rows.write().insert(entity.id(), entity.clone());
        Ok(())
    }

    async fn delete(&self, id: i64) -> StoreResult<()> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.take_write_fault() {
            return Err(err);
        }
        self.rows.write().remove(&id);
        Ok(())
    }
}
