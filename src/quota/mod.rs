//! Quota enforcement subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → client.rs (derive client key from peer address)
//!     → enforcer.rs (admit: look up the route class policy)
//!     → store.rs (atomic hit on the (client, class) window)
//!     → Decision (allowed, remaining, retry delay)
//! ```
//!
//! # Design Decisions
//! - Fixed windows, one counter per (client, route class)
//! - Route classes and their limits are part of the public contract, not config
//! - Counter storage sits behind a trait so a shared store can replace the
//!   in-process map without touching callers
//! - Counting is best-effort: increments are never rolled back

pub mod client;
pub mod enforcer;
pub mod store;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use client::{ClientAddressPolicy, ClientKey};
pub use enforcer::QuotaEnforcer;
pub use store::{CounterStore, InMemoryCounterStore, QuotaKey, QuotaStoreError, WindowState};

const FIFTEEN_MINUTES: Duration = Duration::from_secs(15 * 60);

/// Named bucket of endpoints sharing one quota policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteClass {
    /// Registration and login.
    Auth,
    /// Health data uploads.
    Sync,
    /// Dashboard, workouts, trends.
    Read,
    /// Everything else.
    Default,
}

impl RouteClass {
    pub const ALL: [RouteClass; 4] = [Self::Auth, Self::Sync, Self::Read, Self::Default];

    pub const fn policy(self) -> QuotaPolicy {
        match self {
            Self::Auth => QuotaPolicy::new(5, FIFTEEN_MINUTES),
            Self::Sync => QuotaPolicy::new(100, FIFTEEN_MINUTES),
            Self::Read => QuotaPolicy::new(200, FIFTEEN_MINUTES),
            Self::Default => QuotaPolicy::new(100, FIFTEEN_MINUTES),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Sync => "sync",
            Self::Read => "read",
            Self::Default => "default",
        }
    }

    /// Message shown to a client that exhausted this class.
    pub const fn rejection_message(self) -> &'static str {
        match self {
            Self::Auth => "Too many authentication attempts. Please try again in 15 minutes.",
            Self::Sync => "Too many sync requests. Please try again in 15 minutes.",
            Self::Read => "Too many read requests. Please try again in 15 minutes.",
            Self::Default => "Too many requests. Please try again later.",
        }
    }
}

impl fmt::Display for RouteClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request limit per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPolicy {
    pub limit: u64,
    pub window: Duration,
}

impl QuotaPolicy {
    pub const fn new(limit: u64, window: Duration) -> Self {
        Self { limit, window }
    }
}

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    /// Time until the current window closes.
    pub reset_after: Duration,
    /// Set only on rejection.
    pub retry_after: Option<Duration>,
}

impl Decision {
    /// Fold a window snapshot against a policy.
    pub fn from_window(policy: QuotaPolicy, window: WindowState) -> Self {
        let allowed = window.count <= policy.limit;
        Self {
            allowed,
            limit: policy.limit,
            remaining: policy.limit.saturating_sub(window.count),
            reset_after: window.resets_in,
            retry_after: (!allowed).then_some(window.resets_in),
        }
    }

    /// Admission granted without consulting a counter.
    pub fn unmetered(policy: QuotaPolicy) -> Self {
        Self {
            allowed: true,
            limit: policy.limit,
            remaining: policy.limit,
            reset_after: policy.window,
            retry_after: None,
        }
    }
}
