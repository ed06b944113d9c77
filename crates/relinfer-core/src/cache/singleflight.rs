//! Per-key slots with at most one fill in flight

use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::{FetchError, FetchResult};

/// State of one cache key
#[derive(Debug, Clone)]
pub(crate) enum Slot<V> {
    Empty,
    Ready {
        value: V,
        fetched_at: Instant,
        fetched_wall: DateTime<Utc>,
    },
    Failed {
        error: FetchError,
        failed_at: Instant,
        generation: u64,
    },
}

/// How a lookup was served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Served {
    /// Ready entry, no fetch
    Hit,
    /// Recent failure of the current query replayed, no fetch
    NegativeHit,
    /// The fill closure ran
    Filled,
}

/// Freshness rules applied when reading a slot
#[derive(Debug, Clone, Copy)]
pub(crate) struct Freshness {
    pub expiry: Option<Duration>,
    pub negative_ttl: Duration,
    pub generation: u64,
}

impl Freshness {
    fn ready_usable(&self, fetched_at: Instant) -> bool {
        self.expiry.is_none_or(|expiry| fetched_at.elapsed() < expiry)
    }

    fn failure_usable(&self, failed_at: Instant, generation: u64) -> bool {
        generation == self.generation && failed_at.elapsed() < self.negative_ttl
    }
}

/// Snapshot of a slot for inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Absent,
    /// A fill is in flight
    Pending,
    Ready,
    Failed,
}

/// One key's slot plus a count of completed fills
struct Cell<V> {
    fills: AtomicU64,
    slot: Mutex<Slot<V>>,
}

impl<V> Cell<V> {
    fn new(slot: Slot<V>) -> Arc<Self> {
        Arc::new(Self {
            fills: AtomicU64::new(0),
            slot: Mutex::new(slot),
        })
    }
}

/// Map of independently locked slots
///
/// The map itself is sharded; each slot has its own async mutex held for
/// the duration of a fill, so concurrent callers for one key queue behind
/// the first and read its result, while distinct keys never contend.
/// A caller that waited through a fill takes that fill's outcome, success
/// or failure, without checking expiry or the negative window.
pub(crate) struct SingleFlight<K, V> {
    slots: DashMap<K, Arc<Cell<V>>>,
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    fn cell(&self, key: &K) -> Arc<Cell<V>> {
        // Clone the Arc out so no shard guard is held across an await
        self.slots
            .entry(key.clone())
            .or_insert_with(|| Cell::new(Slot::Empty))
            .clone()
    }

    /// Return the cached value or run `fill` while holding the key's lock
    ///
    /// If the returned future is dropped mid-fill the slot keeps its previous
    /// state and the next waiter fills it instead.
    pub async fn get_or_fill<F, Fut>(
        &self,
        key: &K,
        freshness: Freshness,
        fill: F,
    ) -> (FetchResult<V>, Served)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult<V>>,
    {
        let cell = self.cell(key);
        let seen = cell.fills.load(Ordering::Acquire);
        let mut guard = cell.slot.lock().await;

        if cell.fills.load(Ordering::Acquire) != seen {
            match &*guard {
                Slot::Ready { value, .. } => return (Ok(value.clone()), Served::Hit),
                Slot::Failed { error, .. } => return (Err(error.clone()), Served::NegativeHit),
                Slot::Empty => {}
            }
        }

        match &*guard {
            Slot::Ready {
                value, fetched_at, ..
            } if freshness.ready_usable(*fetched_at) => {
                return (Ok(value.clone()), Served::Hit);
            }
            Slot::Failed {
                error,
                failed_at,
                generation,
            } if freshness.failure_usable(*failed_at, *generation) => {
                return (Err(error.clone()), Served::NegativeHit);
            }
            _ => {}
        }

        let result = fill().await;
        *guard = match &result {
            Ok(value) => Slot::Ready {
                value: value.clone(),
                fetched_at: Instant::now(),
                fetched_wall: Utc::now(),
            },
            Err(error) => Slot::Failed {
                error: error.clone(),
                failed_at: Instant::now(),
                generation: freshness.generation,
            },
        };
        cell.fills.fetch_add(1, Ordering::Release);

        (result, Served::Filled)
    }

    /// Store a ready value fetched at `fetched_wall`
    pub fn insert_ready(&self, key: K, value: V, fetched_wall: DateTime<Utc>) {
        let age = (Utc::now() - fetched_wall).to_std().unwrap_or_default();
        let fetched_at = Instant::now().checked_sub(age).unwrap_or_else(Instant::now);
        self.slots.insert(
            key,
            Cell::new(Slot::Ready {
                value,
                fetched_at,
                fetched_wall,
            }),
        );
    }

    pub fn state(&self, key: &K) -> EntryState {
        let Some(cell) = self.slots.get(key).map(|s| Arc::clone(s.value())) else {
            return EntryState::Absent;
        };
        match cell.slot.try_lock() {
            Err(_) => EntryState::Pending,
            Ok(guard) => match &*guard {
                Slot::Empty => EntryState::Absent,
                Slot::Ready { .. } => EntryState::Ready,
                Slot::Failed { .. } => EntryState::Failed,
            },
        }
    }

    /// Ready values with their fetch time; slots being filled are skipped
    pub fn ready_entries(&self) -> Vec<(K, V, DateTime<Utc>)> {
        let cells: Vec<(K, Arc<Cell<V>>)> = self
            .slots
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        cells
            .into_iter()
            .filter_map(|(key, cell)| {
                let guard = cell.slot.try_lock().ok()?;
                match &*guard {
                    Slot::Ready {
                        value,
                        fetched_wall,
                        ..
                    } => Some((key, value.clone(), *fetched_wall)),
                    _ => None,
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
}
