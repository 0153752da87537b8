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

//! The per-host session driver.
//!
//! One tokio task per session runs the whole lifecycle: connect, open the
//! PTY, submit the command, then pump output, operator input and the one
//! password injection until the channel closes or the operator closes it.
//! Reads and writes for one session are strictly sequential inside that task.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use super::prompt::{Detection, PromptDetector};
use super::registry::Reservation;
use super::state::{CloseReason, SessionState};
use super::{SessionEvent, SessionHandle};
use crate::executor::result_types::SessionOutcome;
use crate::node::Host;
use crate::security::{Credentials, SUDO_PROMPT_PATTERNS};
use crate::shared::error::{ConnectError, RemoteExitError};
use crate::ssh::connector::{ChannelEvent, Connector, PtyChannel, PtyConfig, Transport};

/// Upper bound on channel/transport teardown so a dead peer cannot stall release.
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-batch session settings.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub pty: PtyConfig,
    /// Escalation prompt phrases, matched case-insensitively.
    pub prompt_patterns: Vec<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            pty: PtyConfig::default(),
            prompt_patterns: SUDO_PROMPT_PATTERNS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Everything one session needs.
pub struct SessionParams {
    pub host: Host,
    pub command: Arc<str>,
    pub credentials: Arc<Credentials>,
    pub connector: Arc<dyn Connector>,
    pub options: SessionOptions,
}

/// Start a session on its own task.
///
/// The host must already be reserved; `reservation` is released exactly
/// once when the session reaches `Closed` or `Failed` (or if the task dies).
pub fn spawn_session(params: SessionParams, reservation: Reservation) -> SessionHandle {
    let (input_tx, input_rx) = mpsc::unbounded_channel();
    let (close_tx, close_rx) = watch::channel(false);
    let (state_tx, state_rx) = watch::channel(SessionState::Idle);
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let host = params.host.clone();
    let session_id = reservation.session_id();
    let detector = PromptDetector::new(&params.options.prompt_patterns);

    let session = InteractiveSession {
        host: params.host,
        command: params.command,
        credentials: params.credentials,
        connector: params.connector,
        pty: params.options.pty,
        detector,
        reservation,
        state: SessionState::Idle,
        state_tx,
        events: events_tx,
        password_injected: false,
        exit_status: None,
    };
    let task = tokio::spawn(session.run(input_rx, close_rx));

    SessionHandle::new(host, session_id, input_tx, close_tx, state_rx, events_rx, task)
}

enum Ending {
    Closed(CloseReason),
    Failed(ConnectError),
}

enum Step {
    Close(CloseReason),
    Channel(ChannelEvent),
    Input(Vec<u8>),
}

struct InteractiveSession {
    host: Host,
    command: Arc<str>,
    credentials: Arc<Credentials>,
    connector: Arc<dyn Connector>,
    pty: PtyConfig,
    detector: PromptDetector,
    reservation: Reservation,
    state: SessionState,
    state_tx: watch::Sender<SessionState>,
    events: mpsc::UnboundedSender<SessionEvent>,
    password_injected: bool,
    exit_status: Option<u32>,
}

impl InteractiveSession {
    async fn run(
        mut self,
        mut input_rx: mpsc::UnboundedReceiver<Vec<u8>>,
        mut close_rx: watch::Receiver<bool>,
    ) -> SessionOutcome {
        self.emit(SessionEvent::Started {
            host: self.host.id().to_string(),
        });
        self.transition(SessionState::Connecting);

        let connected = {
            let connector = Arc::clone(&self.connector);
            let credentials = Arc::clone(&self.credentials);
            let connect =
                connector.connect(&self.host, credentials.username(), credentials.key_path());
            tokio::select! {
                biased;
                reason = close_signal(&mut close_rx) => Err(Ending::Closed(reason)),
                result = connect => result.map_err(Ending::Failed),
            }
        };
        let mut transport = match connected {
            Ok(transport) => transport,
            Err(ending) => return self.finish(ending, None, None).await,
        };

        self.transition(SessionState::Authenticated);
        self.emit(SessionEvent::Authenticated {
            host: self.host.id().to_string(),
        });

        let opened = {
            let pty = self.pty.clone();
            let open = transport.open_pty(&pty);
            tokio::select! {
                biased;
                reason = close_signal(&mut close_rx) => Err(Ending::Closed(reason)),
                result = open => result.map_err(Ending::Failed),
            }
        };
        let mut channel = match opened {
            Ok(channel) => channel,
            Err(ending) => return self.finish(ending, None, Some(transport)).await,
        };

        let mut line = self.command.as_bytes().to_vec();
        line.push(b'\n');
        if let Err(e) = channel.write(&line).await {
            return self
                .finish(Ending::Failed(e), Some(channel), Some(transport))
                .await;
        }
        tracing::info!("Command submitted on {}", self.host);
        self.transition(SessionState::Running);

        let ending = loop {
            let step = tokio::select! {
                biased;
                reason = close_signal(&mut close_rx) => Step::Close(reason),
                event = channel.next_event() => Step::Channel(event),
                Some(input) = input_rx.recv() => Step::Input(input),
            };

            match step {
                Step::Close(reason) => break Ending::Closed(reason),
                Step::Channel(ChannelEvent::Data(bytes)) => {
                    if let Err(e) = self.handle_output(channel.as_mut(), bytes).await {
                        break Ending::Failed(e);
                    }
                }
                Step::Channel(ChannelEvent::ExitStatus(status)) => {
                    tracing::debug!("{} exited with status {}", self.host, status);
                    self.exit_status = Some(status);
                    if status != 0 {
                        let err = RemoteExitError {
                            host: self.host.id().to_string(),
                            status,
                        };
                        tracing::warn!("{}", err);
                        self.emit(SessionEvent::remote_exit(&err));
                    }
                }
                // Exit status may still follow EOF; the channel close ends the session.
                Step::Channel(ChannelEvent::Eof) => {
                    tracing::trace!("EOF from {}", self.host);
                }
                Step::Channel(ChannelEvent::Closed) => break Ending::Closed(CloseReason::RemoteClosed),
                Step::Input(bytes) => {
                    if let Err(e) = channel.write(&bytes).await {
                        break Ending::Failed(e);
                    }
                }
            }
        };

        self.finish(ending, Some(channel), Some(transport)).await
    }

    /// Forward one output chunk, then answer the escalation prompt if it
    /// just appeared.
    async fn handle_output(
        &mut self,
        channel: &mut dyn PtyChannel,
        bytes: Vec<u8>,
    ) -> Result<(), ConnectError> {
        let detection = self.detector.observe(&bytes);
        self.emit(SessionEvent::Output(bytes));

        match detection {
            Detection::Prompt if !self.password_injected => {
                self.transition(SessionState::AwaitingInput);
                let secret = self.credentials.password().with_newline();
                channel.write(&secret).await?;
                self.password_injected = true;
                tracing::info!("Escalation password injected on {}", self.host);
                self.emit(SessionEvent::PasswordInjected);
                self.transition(SessionState::Running);
            }
            Detection::Rejected => {
                tracing::warn!("Escalation password rejected on {}", self.host);
                self.emit(SessionEvent::EscalationRejected);
            }
            _ => {}
        }
        Ok(())
    }

    async fn finish(
        mut self,
        ending: Ending,
        channel: Option<Box<dyn PtyChannel>>,
        transport: Option<Box<dyn Transport>>,
    ) -> SessionOutcome {
        if let Some(mut channel) = channel {
            if tokio::time::timeout(TEARDOWN_TIMEOUT, channel.close())
                .await
                .is_err()
            {
                tracing::debug!("Channel teardown on {} timed out", self.host);
            }
        }
        if let Some(mut transport) = transport {
            if tokio::time::timeout(TEARDOWN_TIMEOUT, transport.close())
                .await
                .is_err()
            {
                tracing::debug!("Transport teardown on {} timed out", self.host);
            }
        }

        let host = self.host.id().to_string();
        let (state, event, close_reason, error) = match ending {
            Ending::Closed(reason) => {
                tracing::info!("Session on {} closed ({})", host, reason);
                let event = SessionEvent::Closed {
                    host: host.clone(),
                    reason,
                    exit_status: self.exit_status,
                };
                (SessionState::Closed, event, Some(reason), None)
            }
            Ending::Failed(err) => {
                tracing::error!("Session failed: {}", err);
                (SessionState::Failed, SessionEvent::failed(&err), None, Some(err))
            }
        };

        self.transition(state);
        self.reservation.release();
        self.emit(event);

        SessionOutcome {
            host,
            session_id: Some(self.reservation.session_id()),
            final_state: state,
            close_reason,
            exit_status: self.exit_status,
            error,
            password_injected: self.password_injected,
        }
    }

    fn transition(&mut self, to: SessionState) {
        let from = self.state;
        if !from.can_transition(to) {
            tracing::warn!("Ignoring illegal transition {} -> {} on {}", from, to, self.host);
            return;
        }
        tracing::debug!("{}: {} -> {}", self.host, from, to);
        self.state = to;
        self.reservation.set_state(to);
        self.state_tx.send_replace(to);
        self.emit(SessionEvent::Transition { from, to });
    }

    fn emit(&self, event: SessionEvent) {
        // The receiver may be gone; the session still runs to completion.
        let _ = self.events.send(event);
    }
}

/// Resolves when the operator asks to close or the handle is dropped.
async fn close_signal(close_rx: &mut watch::Receiver<bool>) -> CloseReason {
    loop {
        if *close_rx.borrow_and_update() {
            return CloseReason::Operator;
        }
        if close_rx.changed().await.is_err() {
            return if *close_rx.borrow() {
                CloseReason::Operator
            } else {
                CloseReason::HandleDropped
            };
        }
    }
}
