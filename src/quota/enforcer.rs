//! Admission decisions per (client, route class).

use std::sync::Arc;

use crate::quota::{ClientKey, CounterStore, Decision, InMemoryCounterStore, QuotaKey, RouteClass};

/// Admits or rejects requests against the fixed route-class policies.
#[derive(Clone)]
pub struct QuotaEnforcer {
    store: Arc<dyn CounterStore>,
    enabled: bool,
}

impl QuotaEnforcer {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self {
            store,
            enabled: true,
        }
    }

    /// Enforcer backed by a fresh per-process store.
    pub fn in_memory() -> (Self, InMemoryCounterStore) {
        let store = InMemoryCounterStore::new();
        (Self::new(Arc::new(store.clone())), store)
    }

    /// Enforcer that admits everything without counting.
    pub fn disabled() -> Self {
        Self {
            store: Arc::new(InMemoryCounterStore::new()),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Count this request and decide whether it may proceed.
    ///
    /// A failing counter store admits the request: quota is best-effort and
    /// must not take the API down with it.
    pub async fn admit(&self, client: &ClientKey, class: RouteClass) -> Decision {
        let policy = class.policy();
        if !self.enabled {
            return Decision::unmetered(policy);
        }

        let key = QuotaKey::new(client.clone(), class);
        match self.store.hit(&key, policy.window).await {
            Ok(window) => Decision::from_window(policy, window),
            Err(e) => {
                tracing::warn!(client = %client, class = %class, error = %e, "Quota store failed, admitting request");
                Decision::unmetered(policy)
            }
        }
    }
}

impl std::fmt::Debug for QuotaEnforcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaEnforcer")
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}
