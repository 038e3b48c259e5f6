//! Counter storage for quota windows.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::quota::{ClientKey, RouteClass};

/// Identifies one quota window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuotaKey {
    pub client: ClientKey,
    pub class: RouteClass,
}

impl QuotaKey {
    pub fn new(client: ClientKey, class: RouteClass) -> Self {
        Self { client, class }
    }
}

/// Window state right after a hit was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    /// Hits in the current window, including this one.
    pub count: u64,
    /// Time until the window closes. Always positive.
    pub resets_in: Duration,
}

#[derive(Debug, Error)]
pub enum QuotaStoreError {
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
}

/// Keyed fixed-window counters.
///
/// `hit` is a single read-modify-write per key: implementations must not let
/// two concurrent hits on the same key observe the same count.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Record one hit, opening a fresh window when none is open or the
    /// current one has elapsed.
    async fn hit(&self, key: &QuotaKey, window: Duration) -> Result<WindowState, QuotaStoreError>;

    /// Forget the window for `key`.
    async fn reset(&self, key: &QuotaKey) -> Result<(), QuotaStoreError>;
}

#[derive(Debug, Clone, Copy)]
struct QuotaWindow {
    count: u64,
    window_start: Instant,
    window: Duration,
}

impl QuotaWindow {
    fn open(now: Instant, window: Duration) -> Self {
        Self {
            count: 1,
            window_start: now,
            window,
        }
    }

    fn has_elapsed(&self, now: Instant) -> bool {
        now >= self.window_start + self.window
    }

    fn state(&self, now: Instant) -> WindowState {
        WindowState {
            count: self.count,
            resets_in: (self.window_start + self.window).saturating_duration_since(now),
        }
    }
}

/// Per-process counter store. Each key's update runs under its shard lock.
#[derive(Clone, Default)]
pub struct InMemoryCounterStore {
    windows: Arc<DashMap<QuotaKey, QuotaWindow>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a hit as of `now`.
    pub fn hit_at(&self, key: &QuotaKey, window: Duration, now: Instant) -> WindowState {
        match self.windows.entry(key.clone()) {
            Entry::Occupied(mut entry) if !entry.get().has_elapsed(now) => {
                let current = entry.get_mut();
                current.count = current.count.saturating_add(1);
                current.state(now)
            }
            Entry::Occupied(mut entry) => {
                let fresh = QuotaWindow::open(now, window);
                entry.insert(fresh);
                fresh.state(now)
            }
            Entry::Vacant(entry) => {
                let fresh = QuotaWindow::open(now, window);
                entry.insert(fresh);
                fresh.state(now)
            }
        }
    }

    /// Drop every window that has elapsed. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows.retain(|_, w| !w.has_elapsed(now));
        before.saturating_sub(self.windows.len())
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Periodically purge elapsed windows until shutdown.
    pub fn spawn_sweeper(
        &self,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = store.purge_expired();
                        if removed > 0 {
                            tracing::debug!(removed, remaining = store.len(), "Purged elapsed quota windows");
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }
        })
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn hit(&self, key: &QuotaKey, window: Duration) -> Result<WindowState, QuotaStoreError> {
        Ok(self.hit_at(key, window, Instant::now()))
    }

    async fn reset(&self, key: &QuotaKey) -> Result<(), QuotaStoreError> {
        self.windows.remove(key);
        Ok(())
    }
}
