// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sticky host selection for internal-engine calls.
//!
//! Each channel owns a [`HostPin`] naming the engine node that accepted its
//! conversation. Calls prefer that node while it is alive; otherwise they
//! fall back to a shared [`RoundRobin`]. The pin follows whichever node
//! actually served the last successful call and is cleared on failure.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

/// Recorded host value meaning "no preference, look one up".
pub const LOOKUP_HOST: &str = "lookup";

/// Round-robin choice over the live host set.
#[derive(Debug, Default)]
pub struct RoundRobin {
    next: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pick<'a>(&self, hosts: &'a [String]) -> Option<&'a str> {
        if hosts.is_empty() {
            return None;
        }
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        Some(hosts[n % hosts.len()].as_str())
    }
}

/// Per-channel engine host preference. Last writer wins.
#[derive(Debug, Default)]
pub struct HostPin {
    host: Mutex<Option<String>>,
}

impl HostPin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin pre-set to `host`.
    pub fn pinned(host: impl Into<String>) -> Self {
        let pin = Self::new();
        pin.set(Some(host.into()));
        pin
    }

    fn slot(&self) -> MutexGuard<'_, Option<String>> {
        self.host.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, host: Option<String>) {
        *self.slot() = host.filter(|h| !h.is_empty() && h != LOOKUP_HOST);
    }

    /// Currently preferred host, if any.
    pub fn host(&self) -> Option<String> {
        self.slot().clone()
    }

    /// Chooses the host for the next call.
    ///
    /// A preference missing from `hosts` is cleared and the call falls back
    /// to round-robin.
    pub fn select(&self, hosts: &[String], fallback: &RoundRobin) -> Option<String> {
        let mut slot = self.slot();
        if let Some(preferred) = slot.as_deref() {
            if hosts.iter().any(|h| h == preferred) {
                return Some(preferred.to_string());
            }
            warn!(host = preferred, "preferred engine host is gone, falling back to round-robin");
            *slot = None;
        }
        fallback.pick(hosts).map(str::to_string)
    }

    /// Records the host that served a successful call.
    pub fn record_success(&self, served_by: &str) {
        let mut slot = self.slot();
        match slot.as_deref() {
            Some(current) if current == served_by => {}
            Some(current) => {
                info!(from = current, to = served_by, "chat rehosted");
                *slot = Some(served_by.to_string());
            }
            None => {
                debug!(host = served_by, "chat hosted");
                *slot = Some(served_by.to_string());
            }
        }
    }

    /// Drops the preference after a failed call.
    pub fn record_failure(&self) {
        if let Some(lost) = self.slot().take() {
            warn!(host = %lost, "chat lost its engine host");
        }
    }
}
