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

//! Batch orchestrator: fan one command out to many hosts.

use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;

use super::result_types::{BatchStart, SessionOutcome};
use crate::node::Host;
use crate::security::Credentials;
use crate::session::{spawn_session, SessionHandle, SessionOptions, SessionParams, SessionRegistry};
use crate::shared::error::AlreadyBusyError;
use crate::ssh::connector::Connector;

/// Starts one interactive session per selected host that is not already busy.
///
/// Sessions run concurrently on their own tasks and never wait on each
/// other; a failure on one host is reported on that host's session only.
pub struct BatchOrchestrator {
    registry: Arc<SessionRegistry>,
    connector: Arc<dyn Connector>,
    options: SessionOptions,
}

impl BatchOrchestrator {
    pub fn new(registry: Arc<SessionRegistry>, connector: Arc<dyn Connector>) -> Self {
        Self {
            registry,
            connector,
            options: SessionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Reserve and start every host, returning as soon as the sessions are spawned.
    ///
    /// Hosts that fail reservation are reported in [`BatchStart::skipped`]
    /// and get no session. Repeated entries for the same host are started
    /// once. Must be called from within a tokio runtime.
    pub fn start(&self, hosts: &[Host], command: &str, credentials: Arc<Credentials>) -> BatchStart {
        let command: Arc<str> = Arc::from(command);
        let mut batch = BatchStart::default();
        let mut seen = HashSet::new();

        for host in hosts {
            if !seen.insert(host.id().to_string()) {
                tracing::debug!("Ignoring repeated host entry {}", host);
                continue;
            }

            let Some(reservation) = self.registry.reserve(host.id()) else {
                tracing::warn!("Skipping {}: a session is already live", host);
                batch.skipped.push(AlreadyBusyError {
                    host: host.id().to_string(),
                });
                continue;
            };

            let params = SessionParams {
                host: host.clone(),
                command: Arc::clone(&command),
                credentials: Arc::clone(&credentials),
                connector: Arc::clone(&self.connector),
                options: self.options.clone(),
            };
            let handle = spawn_session(params, reservation);
            batch.sessions.insert(host.id().to_string(), handle);
        }

        tracing::info!(
            "Batch started: {} session(s), {} skipped",
            batch.started_count(),
            batch.skipped_count()
        );
        batch
    }
}

/// Wait for every session to terminate.
pub async fn wait_all(sessions: impl IntoIterator<Item = SessionHandle>) -> Vec<SessionOutcome> {
    join_all(sessions.into_iter().map(SessionHandle::wait)).await
}
