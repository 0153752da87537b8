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

//! Interactive sessions: one PTY per host, driven by an explicit state machine.
//!
//! # Types
//!
//! - [`SessionRegistry`]: process-wide "is this host busy" map
//! - [`SessionState`]: lifecycle states and legal transitions
//! - [`PromptDetector`]: single-shot escalation prompt matcher
//! - [`SessionHandle`]: what the presentation layer holds for a running session
//! - [`SessionEvent`]: lifecycle and output events, one ordered stream per session

pub mod interactive;
pub mod prompt;
pub mod registry;
pub mod state;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

pub use interactive::{spawn_session, SessionOptions, SessionParams};
pub use prompt::{Detection, PromptDetector};
pub use registry::{RegistryEntry, Reservation, SessionId, SessionRegistry};
pub use state::{CloseReason, SessionState};

use crate::executor::result_types::SessionOutcome;
use crate::node::Host;
use crate::shared::error::{ConnectError, ErrorKind, RemoteExitError};

/// Events emitted by one session, in the order they happened.
///
/// `Failed` and `Closed` are terminal: exactly one of them is emitted, last,
/// and only after the host's registry entry has been released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Started {
        host: String,
    },
    Transition {
        from: SessionState,
        to: SessionState,
    },
    Authenticated {
        host: String,
    },
    /// Raw PTY output, forwarded verbatim.
    Output(Vec<u8>),
    /// The escalation password was written to the channel.
    PasswordInjected,
    /// The remote side printed an escalation failure after the password was sent.
    EscalationRejected,
    /// The remote command reported a nonzero exit status.
    RemoteExit {
        host: String,
        status: u32,
    },
    Failed {
        host: String,
        kind: ErrorKind,
        message: String,
    },
    Closed {
        host: String,
        reason: CloseReason,
        exit_status: Option<u32>,
    },
}

impl SessionEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionEvent::Failed { .. } | SessionEvent::Closed { .. })
    }

    pub fn failed(error: &ConnectError) -> Self {
        SessionEvent::Failed {
            host: error.host.clone(),
            kind: error.kind,
            message: error.message.clone(),
        }
    }

    pub fn remote_exit(error: &RemoteExitError) -> Self {
        SessionEvent::RemoteExit {
            host: error.host.clone(),
            status: error.status,
        }
    }
}

/// The presentation layer's grip on one running session.
///
/// Dropping the handle is a close action: the session tears down and
/// releases its host.
#[derive(Debug)]
pub struct SessionHandle {
    host: Host,
    session_id: SessionId,
    input_tx: mpsc::UnboundedSender<Vec<u8>>,
    close_tx: watch::Sender<bool>,
    state_rx: watch::Receiver<SessionState>,
    events: Option<mpsc::UnboundedReceiver<SessionEvent>>,
    task: Option<JoinHandle<SessionOutcome>>,
}

impl SessionHandle {
    pub(crate) fn new(
        host: Host,
        session_id: SessionId,
        input_tx: mpsc::UnboundedSender<Vec<u8>>,
        close_tx: watch::Sender<bool>,
        state_rx: watch::Receiver<SessionState>,
        events: mpsc::UnboundedReceiver<SessionEvent>,
        task: JoinHandle<SessionOutcome>,
    ) -> Self {
        Self {
            host,
            session_id,
            input_tx,
            close_tx,
            state_rx,
            events: Some(events),
            task: Some(task),
        }
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// A receiver that follows the session's state.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    /// Forward operator keystrokes verbatim. Returns false once the session
    /// no longer accepts input.
    pub fn send_input(&self, bytes: impl Into<Vec<u8>>) -> bool {
        if self.state().is_terminal() {
            return false;
        }
        self.input_tx.send(bytes.into()).is_ok()
    }

    /// Explicit close action. Idempotent.
    pub fn close(&self) {
        self.close_tx.send_replace(true);
    }

    /// Take the event stream, e.g. to consume it on another task.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        self.events.take()
    }

    /// Next event, or `None` once the stream ended or was taken.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        match self.events.as_mut() {
            Some(events) => events.recv().await,
            None => None,
        }
    }

    /// Wait for the session to terminate.
    ///
    /// The handle stays alive while waiting, so this does not close the session.
    pub async fn wait(mut self) -> SessionOutcome {
        let task = match self.task.take() {
            Some(task) => task,
            None => return SessionOutcome::lost(self.host.id(), "session already awaited"),
        };
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Session task for {} ended abnormally: {}", self.host, e);
                SessionOutcome::lost(self.host.id(), e.to_string())
            }
        }
    }
}
