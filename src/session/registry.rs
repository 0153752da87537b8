// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Process-wide registry of live sessions.
//!
//! The registry is the single source of truth for "is this host busy". A
//! host is busy while it has an entry in a non-terminal state; at most one
//! such entry exists per host. Reservation and release are serialized under
//! one mutex, which is the only lock shared between concurrent sessions.
//!
//! # Example
//!
//! ```
//! use rlaunch::session::registry::SessionRegistry;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(SessionRegistry::new());
//! let reservation = registry.reserve("web-1").unwrap();
//! assert!(registry.is_busy("web-1"));
//! assert!(registry.reserve("web-1").is_none());
//!
//! drop(reservation);
//! assert!(!registry.is_busy("web-1"));
//! ```

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::state::SessionState;

/// Unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Registry entry for one host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryEntry {
    pub session_id: SessionId,
    pub state: SessionState,
}

static GLOBAL_REGISTRY: Lazy<Arc<SessionRegistry>> = Lazy::new(|| Arc::new(SessionRegistry::new()));

#[derive(Debug, Default)]
pub struct SessionRegistry {
    entries: Mutex<HashMap<String, RegistryEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by the whole process.
    pub fn global() -> Arc<SessionRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    // Every mutation leaves the map consistent, so a poisoned lock is safe to reuse.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, RegistryEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn reserve_id(&self, host: &str) -> Option<SessionId> {
        let mut entries = self.lock();
        if entries.get(host).is_some_and(|e| !e.state.is_terminal()) {
            return None;
        }
        let session_id = SessionId::new();
        entries.insert(
            host.to_string(),
            RegistryEntry {
                session_id,
                state: SessionState::Idle,
            },
        );
        tracing::trace!("Reserved {} for {}", host, session_id);
        Some(session_id)
    }

    /// Atomically mark `host` busy. Returns false if it already is.
    pub fn try_reserve(&self, host: &str) -> bool {
        self.reserve_id(host).is_some()
    }

    /// Like [`try_reserve`](Self::try_reserve), but returns a guard that
    /// releases the entry when it is released explicitly or dropped.
    pub fn reserve(self: &Arc<Self>, host: &str) -> Option<Reservation> {
        self.reserve_id(host).map(|session_id| Reservation {
            registry: Arc::clone(self),
            host: host.to_string(),
            session_id,
            released: false,
        })
    }

    /// Clear the entry for `host`. Releasing a host that is not reserved is a no-op.
    pub fn release(&self, host: &str) {
        if self.lock().remove(host).is_some() {
            tracing::trace!("Released {}", host);
        }
    }

    /// Remove the entry only if it still belongs to `session_id`.
    fn release_session(&self, host: &str, session_id: SessionId) -> bool {
        let mut entries = self.lock();
        match entries.get(host) {
            Some(entry) if entry.session_id == session_id => {
                entries.remove(host);
                tracing::trace!("Released {} ({})", host, session_id);
                true
            }
            _ => false,
        }
    }

    pub fn is_busy(&self, host: &str) -> bool {
        self.lock()
            .get(host)
            .is_some_and(|entry| !entry.state.is_terminal())
    }

    pub fn state(&self, host: &str) -> Option<SessionState> {
        self.lock().get(host).map(|entry| entry.state)
    }

    pub fn entry(&self, host: &str) -> Option<RegistryEntry> {
        self.lock().get(host).copied()
    }

    /// Record the current state of a session. Ignored if the entry has
    /// since been released or taken over by another session.
    pub fn update_state(&self, host: &str, session_id: SessionId, state: SessionState) {
        if let Some(entry) = self.lock().get_mut(host) {
            if entry.session_id == session_id {
                entry.state = state;
            }
        }
    }

    /// Hosts with a live session, sorted.
    pub fn busy_hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = self
            .lock()
            .iter()
            .filter(|(_, entry)| !entry.state.is_terminal())
            .map(|(host, _)| host.clone())
            .collect();
        hosts.sort();
        hosts
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Exclusive hold on one host's registry entry.
///
/// The entry is released exactly once: by [`release`](Self::release) or,
/// failing that, on drop. A session that panics or is aborted therefore
/// cannot leave its host busy.
#[derive(Debug)]
pub struct Reservation {
    registry: Arc<SessionRegistry>,
    host: String,
    session_id: SessionId,
    released: bool,
}

impl Reservation {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn set_state(&self, state: SessionState) {
        self.registry
            .update_state(&self.host, self.session_id, state);
    }

    /// Release the entry. Returns false if it was already released.
    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;
        self.registry.release_session(&self.host, self.session_id)
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.released {
            tracing::debug!("Releasing {} on drop", self.host);
            self.release();
        }
    }
}
