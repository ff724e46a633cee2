//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use migrator_core::Entity;
use migrator_store::MemoryStore;

/// Minimal migratable record: an ID, one payload column and a modification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: i64,
    pub value: String,
    pub utime: i64,
}

impl Record {
    pub fn new(id: i64, value: &str) -> Self {
        Self {
            id,
            value: value.to_string(),
            utime: 1_000 + id,
        }
    }

    pub fn at(mut self, utime: i64) -> Self {
        self.utime = utime;
        self
    }
}

impl Entity for Record {
    fn id(&self) -> i64 {
        self.id
    }

    fn utime(&self) -> i64 {
        self.utime
    }

    fn equals(&self, other: &Self) -> bool {
        self.id == other.id && self.value == other.value
    }
}

pub fn store(name: &str, rows: &[(i64, &str)]) -> Arc<MemoryStore<Record>> {
    Arc::new(MemoryStore::with_rows(
        name,
        rows.iter().map(|(id, value)| Record::new(*id, value)),
    ))
}

/// `(id, value)` pairs of a store, in ID order.
pub fn contents(store: &MemoryStore<Record>) -> Vec<(i64, String)> {
    store
        .snapshot()
        .into_iter()
        .map(|r| (r.id, r.value))
        .collect()
}

/// Poll `check` on the paused clock until it holds or ten simulated seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..1_000 {
        if check() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    check()
}
