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

//! Scripted in-memory connector for driving sessions without a network.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

use rlaunch::node::Host;
use rlaunch::security::{Credentials, SudoPassword};
use rlaunch::session::{SessionEvent, SessionHandle, SessionState};
use rlaunch::shared::{ConnectError, ErrorKind};
use rlaunch::ssh::{ChannelEvent, Connector, PtyChannel, PtyConfig, Transport};

pub const PASSWORD: &str = "s3cret-pass";
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// One step of what the fake remote side does.
#[derive(Debug, Clone)]
pub enum Step {
    Emit(&'static [u8]),
    ExitStatus(u32),
    Eof,
    Close,
    /// Block until the session has written at least this many times.
    WaitForWrites(usize),
}

#[derive(Debug, Clone)]
pub enum HostScript {
    /// Connect fails with this kind.
    Fail(ErrorKind),
    /// Connect never completes.
    Hang,
    /// Connect succeeds, PTY allocation fails.
    PtyFail,
    /// Connect succeeds and the PTY plays these steps, then stays open.
    Session(Vec<Step>),
}

/// What a scripted host saw.
#[derive(Debug, Default)]
pub struct Recording {
    pub writes: Mutex<Vec<Vec<u8>>>,
    pub channel_closed: AtomicBool,
    pub transport_closed: AtomicBool,
}

impl Recording {
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().unwrap().clone()
    }

    pub fn count_writes(&self, needle: &[u8]) -> usize {
        self.writes().iter().filter(|w| w.as_slice() == needle).count()
    }
}

#[derive(Default)]
pub struct ScriptedConnector {
    scripts: Mutex<HashMap<String, HostScript>>,
    recordings: Mutex<HashMap<String, Arc<Recording>>>,
    pub connect_calls: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, host: &str, script: HostScript) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(host.to_string(), script);
        self
    }

    pub fn recording(&self, host: &str) -> Arc<Recording> {
        Arc::clone(
            self.recordings
                .lock()
                .unwrap()
                .entry(host.to_string())
                .or_default(),
        )
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(
        &self,
        host: &Host,
        _username: &str,
        _key_path: &Path,
    ) -> Result<Box<dyn Transport>, ConnectError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(host.id())
            .cloned()
            .unwrap_or(HostScript::Session(Vec::new()));
        let recording = self.recording(host.id());

        match script {
            HostScript::Fail(kind) => Err(ConnectError::new(host.id(), kind, "scripted failure")),
            HostScript::Hang => std::future::pending().await,
            HostScript::PtyFail => Ok(Box::new(ScriptedTransport {
                host: host.id().to_string(),
                steps: None,
                recording,
            })),
            HostScript::Session(steps) => Ok(Box::new(ScriptedTransport {
                host: host.id().to_string(),
                steps: Some(steps),
                recording,
            })),
        }
    }
}

struct ScriptedTransport {
    host: String,
    steps: Option<Vec<Step>>,
    recording: Arc<Recording>,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open_pty(&mut self, _pty: &PtyConfig) -> Result<Box<dyn PtyChannel>, ConnectError> {
        let steps = self
            .steps
            .take()
            .ok_or_else(|| ConnectError::protocol(&self.host, "PTY allocation refused"))?;
        let (write_count, write_rx) = watch::channel(0usize);
        Ok(Box::new(ScriptedChannel {
            steps: steps.into(),
            recording: Arc::clone(&self.recording),
            write_count,
            write_rx,
        }))
    }

    async fn close(&mut self) {
        self.recording.transport_closed.store(true, Ordering::SeqCst);
    }
}

struct ScriptedChannel {
    steps: VecDeque<Step>,
    recording: Arc<Recording>,
    write_count: watch::Sender<usize>,
    write_rx: watch::Receiver<usize>,
}

#[async_trait]
impl PtyChannel for ScriptedChannel {
    async fn write(&mut self, data: &[u8]) -> Result<(), ConnectError> {
        let count = {
            let mut writes = self.recording.writes.lock().unwrap();
            writes.push(data.to_vec());
            writes.len()
        };
        self.write_count.send_replace(count);
        Ok(())
    }

    async fn next_event(&mut self) -> ChannelEvent {
        loop {
            let Some(step) = self.steps.front().cloned() else {
                return std::future::pending().await;
            };
            if let Step::WaitForWrites(target) = step {
                let _ = self.write_rx.wait_for(|count| *count >= target).await;
                self.steps.pop_front();
                continue;
            }
            self.steps.pop_front();
            return match step {
                Step::Emit(bytes) => ChannelEvent::Data(bytes.to_vec()),
                Step::ExitStatus(status) => ChannelEvent::ExitStatus(status),
                Step::Eof => ChannelEvent::Eof,
                Step::Close => ChannelEvent::Closed,
                Step::WaitForWrites(_) => unreachable!(),
            };
        }
    }

    async fn close(&mut self) {
        self.recording.channel_closed.store(true, Ordering::SeqCst);
    }
}

pub fn credentials() -> Arc<Credentials> {
    let password = SudoPassword::new(PASSWORD.to_string()).unwrap();
    Arc::new(Credentials::new("deploy", "/nonexistent/id_rsa", password).unwrap())
}

pub fn password_line() -> Vec<u8> {
    format!("{PASSWORD}\n").into_bytes()
}

/// Read events until `stop` matches (inclusive). Panics on timeout.
pub async fn events_until(
    handle: &mut SessionHandle,
    stop: impl Fn(&SessionEvent) -> bool,
) -> Vec<SessionEvent> {
    let mut seen = Vec::new();
    loop {
        let event = tokio::time::timeout(EVENT_TIMEOUT, handle.next_event())
            .await
            .expect("timed out waiting for session event")
            .expect("event stream ended early");
        let done = stop(&event);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

pub async fn events_until_terminal(handle: &mut SessionHandle) -> Vec<SessionEvent> {
    events_until(handle, SessionEvent::is_terminal).await
}

/// The state sequence implied by the transition events, starting at `Idle`.
pub fn state_path(events: &[SessionEvent]) -> Vec<SessionState> {
    let mut path = vec![SessionState::Idle];
    for event in events {
        if let SessionEvent::Transition { from, to } = event {
            assert_eq!(path.last(), Some(from), "transition chain broken");
            path.push(*to);
        }
    }
    path
}

pub fn outputs(events: &[SessionEvent]) -> Vec<Vec<u8>> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Output(bytes) => Some(bytes.clone()),
            _ => None,
        })
        .collect()
}
