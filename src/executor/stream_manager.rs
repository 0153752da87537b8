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

//! Per-host output streams for the presentation layer.
//!
//! Each host's [`SessionEvent`] stream is drained without blocking into its
//! own buffers: PTY output is assembled into lines, lifecycle events are
//! kept in order for rendering, and the host's last known state is tracked.

use std::collections::VecDeque;
use tokio::sync::mpsc;

use crate::session::{SessionEvent, SessionState};
use crate::shared::error::ErrorKind;

/// Maximum bytes held for an unterminated line (1MB).
/// A remote program that never prints a newline cannot exhaust memory.
const MAX_PARTIAL_LINE: usize = 1024 * 1024;

/// Maximum completed lines kept before the oldest are discarded.
const MAX_PENDING_LINES: usize = 10_000;

/// A rolling buffer that keeps at most `limit` bytes, dropping the oldest.
#[derive(Debug)]
struct RollingBuffer {
    data: Vec<u8>,
    limit: usize,
    bytes_dropped: usize,
}

impl RollingBuffer {
    fn new(limit: usize) -> Self {
        Self {
            data: Vec::new(),
            limit,
            bytes_dropped: 0,
        }
    }

    /// Append, returning how many of the oldest bytes were dropped.
    fn append(&mut self, new_data: &[u8]) -> usize {
        self.data.extend_from_slice(new_data);
        if self.data.len() <= self.limit {
            return 0;
        }
        let overflow = self.data.len() - self.limit;
        self.bytes_dropped += overflow;
        self.data.drain(0..overflow);
        tracing::warn!(
            "Buffer overflow: dropped {} bytes (total dropped: {})",
            overflow,
            self.bytes_dropped
        );
        overflow
    }

    /// Remove and return everything up to and including the first `\n`.
    fn take_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.data.iter().position(|&b| b == b'\n')?;
        let rest = self.data.split_off(pos + 1);
        Some(std::mem::replace(&mut self.data, rest))
    }

    fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.data)
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

fn to_display_line(mut raw: Vec<u8>) -> String {
    while matches!(raw.last(), Some(b'\n') | Some(b'\r')) {
        raw.pop();
    }
    String::from_utf8_lossy(&raw).into_owned()
}

/// One host's view of its session.
#[derive(Debug)]
pub struct HostStream {
    pub host: String,
    receiver: mpsc::UnboundedReceiver<SessionEvent>,
    partial: RollingBuffer,
    /// Bytes at the front of `partial` already handed out by `take_partial`.
    partial_shown: usize,
    lines: VecDeque<String>,
    lifecycle: VecDeque<SessionEvent>,
    state: SessionState,
    exit_status: Option<u32>,
    failure: Option<(ErrorKind, String)>,
    closed: bool,
}

impl HostStream {
    pub fn new(host: impl Into<String>, receiver: mpsc::UnboundedReceiver<SessionEvent>) -> Self {
        Self {
            host: host.into(),
            receiver,
            partial: RollingBuffer::new(MAX_PARTIAL_LINE),
            partial_shown: 0,
            lines: VecDeque::new(),
            lifecycle: VecDeque::new(),
            state: SessionState::Idle,
            exit_status: None,
            failure: None,
            closed: false,
        }
    }

    /// Drain whatever events are ready. Returns true if anything arrived.
    pub fn poll(&mut self) -> bool {
        let mut received = false;
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    received = true;
                    self.apply(event);
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    if !self.closed {
                        tracing::debug!("Event stream for {} ended", self.host);
                        self.finish();
                    }
                    break;
                }
            }
        }
        received
    }

    fn apply(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Output(bytes) => {
                let dropped = self.partial.append(&bytes);
                self.partial_shown = self.partial_shown.saturating_sub(dropped);
                while let Some(line) = self.partial.take_line() {
                    self.complete_line(line);
                }
                return;
            }
            SessionEvent::Transition { to, .. } => self.state = to,
            SessionEvent::RemoteExit { status, .. } => self.exit_status = Some(status),
            SessionEvent::Failed {
                kind, ref message, ..
            } => {
                self.failure = Some((kind, message.clone()));
                self.state = SessionState::Failed;
            }
            SessionEvent::Closed { exit_status, .. } => {
                self.exit_status = exit_status.or(self.exit_status);
                self.state = SessionState::Closed;
            }
            _ => {}
        }
        let terminal = event.is_terminal();
        self.lifecycle.push_back(event);
        if terminal {
            self.finish();
        }
    }

    /// Queue a finished line, minus whatever part of it was already shown
    /// as a partial line.
    fn complete_line(&mut self, mut raw: Vec<u8>) {
        let shown = std::mem::take(&mut self.partial_shown).min(raw.len());
        if shown > 0 {
            raw.drain(..shown);
            let line = to_display_line(raw);
            if !line.is_empty() {
                self.push_line(line);
            }
        } else {
            self.push_line(to_display_line(raw));
        }
    }

    fn push_line(&mut self, line: String) {
        if self.lines.len() >= MAX_PENDING_LINES {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    fn finish(&mut self) {
        if !self.partial.is_empty() {
            let rest = self.partial.take();
            self.complete_line(rest);
        }
        self.closed = true;
    }

    /// Completed output lines since the last call, CR/LF stripped.
    pub fn take_lines(&mut self) -> Vec<String> {
        self.lines.drain(..).collect()
    }

    /// The current unterminated line, e.g. a prompt waiting for input.
    pub fn partial_line(&self) -> String {
        String::from_utf8_lossy(&self.partial.data).into_owned()
    }

    /// Unterminated output not handed out before, such as a prompt that
    /// waits for an answer on the same line.
    ///
    /// Call after [`take_lines`](Self::take_lines). When the line is later
    /// completed, `take_lines` yields only the part that follows what was
    /// returned here. A trailing incomplete UTF-8 sequence is held back.
    pub fn take_partial(&mut self) -> Option<String> {
        let pending = self.partial.data.get(self.partial_shown..)?;
        let ready = match std::str::from_utf8(pending) {
            Ok(_) => pending.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => pending.len(),
        };
        if ready == 0 {
            return None;
        }
        let text = to_display_line(pending[..ready].to_vec());
        self.partial_shown += ready;
        (!text.is_empty()).then_some(text)
    }

    /// Lifecycle events (everything except output) since the last call.
    pub fn take_lifecycle(&mut self) -> Vec<SessionEvent> {
        self.lifecycle.drain(..).collect()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn exit_status(&self) -> Option<u32> {
        self.exit_status
    }

    pub fn failure(&self) -> Option<&(ErrorKind, String)> {
        self.failure.as_ref()
    }

    /// True once the terminal event arrived or the stream ended.
    pub fn is_complete(&self) -> bool {
        self.closed
    }
}

/// All host streams of one batch.
#[derive(Debug, Default)]
pub struct MultiHostStreamManager {
    streams: Vec<HostStream>,
}

impl MultiHostStreamManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stream(&mut self, host: impl Into<String>, receiver: mpsc::UnboundedReceiver<SessionEvent>) {
        self.streams.push(HostStream::new(host, receiver));
    }

    /// Poll every stream. Returns true if any received events.
    pub fn poll_all(&mut self) -> bool {
        let mut any_received = false;
        for stream in &mut self.streams {
            if stream.poll() {
                any_received = true;
            }
        }
        any_received
    }

    pub fn streams(&self) -> &[HostStream] {
        &self.streams
    }

    pub fn streams_mut(&mut self) -> &mut [HostStream] {
        &mut self.streams
    }

    pub fn get(&self, host: &str) -> Option<&HostStream> {
        self.streams.iter().find(|s| s.host == host)
    }

    pub fn all_complete(&self) -> bool {
        self.streams.iter().all(|s| s.is_complete())
    }

    pub fn completed_count(&self) -> usize {
        self.streams.iter().filter(|s| s.is_complete()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.streams
            .iter()
            .filter(|s| s.state() == SessionState::Failed)
            .count()
    }

    pub fn total_count(&self) -> usize {
        self.streams.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::CloseReason;

    fn output(bytes: &[u8]) -> SessionEvent {
        SessionEvent::Output(bytes.to_vec())
    }

    #[test]
    fn test_line_assembly_across_chunks() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut stream = HostStream::new("web-1", rx);

        tx.send(output(b"hel")).unwrap();
        tx.send(output(b"lo\r\nwor")).unwrap();
        assert!(stream.poll());
        assert_eq!(stream.take_lines(), vec!["hello".to_string()]);
        assert_eq!(stream.partial_line(), "wor");

        tx.send(output(b"ld\n")).unwrap();
        stream.poll();
        assert_eq!(stream.take_lines(), vec!["world".to_string()]);
        assert!(stream.take_lines().is_empty());
    }

    #[test]
    fn test_unterminated_prompt_is_shown_once() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut stream = HostStream::new("web-1", rx);

        tx.send(output(b"Do you want to continue? [Y/n] ")).unwrap();
        stream.poll();
        assert!(stream.take_lines().is_empty());
        assert_eq!(
            stream.take_partial().as_deref(),
            Some("Do you want to continue? [Y/n] ")
        );
        assert_eq!(stream.take_partial(), None);

        // the echoed answer completes the line; only the new part is emitted
        tx.send(output(b"y\r\nSetting up nginx\r\n")).unwrap();
        stream.poll();
        assert_eq!(
            stream.take_lines(),
            vec!["y".to_string(), "Setting up nginx".to_string()]
        );
        assert_eq!(stream.take_partial(), None);
    }

    #[test]
    fn test_shown_prompt_completed_by_bare_newline() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut stream = HostStream::new("web-1", rx);

        tx.send(output(b"[sudo] password for deploy: ")).unwrap();
        stream.poll();
        assert!(stream.take_partial().is_some());

        tx.send(output(b"\r\nok\r\n")).unwrap();
        stream.poll();
        assert_eq!(stream.take_lines(), vec!["ok".to_string()]);
    }

    #[test]
    fn test_partial_grows_across_chunks() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut stream = HostStream::new("web-1", rx);

        tx.send(output(b"Continue")).unwrap();
        stream.poll();
        assert_eq!(stream.take_partial().as_deref(), Some("Continue"));

        tx.send(output(b"? [y/N] ")).unwrap();
        stream.poll();
        assert_eq!(stream.take_partial().as_deref(), Some("? [y/N] "));
        assert_eq!(stream.partial_line(), "Continue? [y/N] ");
    }

    #[test]
    fn test_partial_holds_back_split_utf8() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut stream = HostStream::new("web-1", rx);

        // "é" is 0xC3 0xA9
        tx.send(output(b"caf\xC3")).unwrap();
        stream.poll();
        assert_eq!(stream.take_partial().as_deref(), Some("caf"));

        tx.send(output(b"\xA9 ")).unwrap();
        stream.poll();
        assert_eq!(stream.take_partial().as_deref(), Some("\u{e9} "));
    }

    #[test]
    fn test_terminal_event_flushes_partial_line() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut stream = HostStream::new("web-1", rx);

        tx.send(output(b"[sudo] password for deploy: ")).unwrap();
        tx.send(SessionEvent::Closed {
            host: "web-1".to_string(),
            reason: CloseReason::Operator,
            exit_status: Some(0),
        })
        .unwrap();
        stream.poll();

        assert!(stream.is_complete());
        assert_eq!(stream.state(), SessionState::Closed);
        assert_eq!(stream.exit_status(), Some(0));
        assert_eq!(stream.take_lines(), vec!["[sudo] password for deploy: ".to_string()]);
        assert_eq!(stream.take_lifecycle().len(), 1);
    }

    #[test]
    fn test_failure_recorded() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut stream = HostStream::new("db-2", rx);
        tx.send(SessionEvent::Failed {
            host: "db-2".to_string(),
            kind: ErrorKind::Auth,
            message: "key rejected".to_string(),
        })
        .unwrap();
        stream.poll();
        assert_eq!(stream.state(), SessionState::Failed);
        assert_eq!(stream.failure().map(|f| f.0), Some(ErrorKind::Auth));
    }

    #[test]
    fn test_disconnect_marks_complete() {
        let (tx, rx) = mpsc::unbounded_channel::<SessionEvent>();
        let mut stream = HostStream::new("web-1", rx);
        drop(tx);
        assert!(!stream.poll());
        assert!(stream.is_complete());
    }

    #[test]
    fn test_rolling_buffer_caps_size() {
        let mut buffer = RollingBuffer::new(4);
        buffer.append(b"abcdef");
        assert_eq!(buffer.data, b"cdef");
        assert_eq!(buffer.bytes_dropped, 2);
    }

    #[test]
    fn test_manager_counts() {
        let mut manager = MultiHostStreamManager::new();
        let (tx1, rx1) = mpsc::unbounded_channel();
        let (_tx2, rx2) = mpsc::unbounded_channel();
        manager.add_stream("a", rx1);
        manager.add_stream("b", rx2);

        tx1.send(SessionEvent::Failed {
            host: "a".to_string(),
            kind: ErrorKind::Connect,
            message: "unreachable".to_string(),
        })
        .unwrap();
        assert!(manager.poll_all());
        assert_eq!(manager.total_count(), 2);
        assert_eq!(manager.completed_count(), 1);
        assert_eq!(manager.failed_count(), 1);
        assert!(!manager.all_complete());
        assert!(manager.get("b").is_some());
    }
}
