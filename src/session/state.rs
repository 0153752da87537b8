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

//! Session lifecycle states and the legal transitions between them.

use std::fmt;

/// Lifecycle of one interactive session.
///
/// ```text
/// Idle -> Connecting -> Authenticated -> Running <-> AwaitingInput
///                                          |
///                                          v
///                                        Closed
/// ```
///
/// `Failed` is reachable from every non-terminal state. `Closed` is also
/// reachable from `Connecting` and `Authenticated` when the operator closes
/// the session before the command was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Connecting,
    Authenticated,
    Running,
    /// Transient: the escalation prompt was seen and the password is being written.
    AwaitingInput,
    Closed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }

    pub fn can_transition(&self, to: SessionState) -> bool {
        use SessionState::*;

        if self.is_terminal() {
            return false;
        }
        match (self, to) {
            (_, Failed) => true,
            (Idle, Connecting) => true,
            (Connecting, Authenticated) | (Connecting, Closed) => true,
            (Authenticated, Running) | (Authenticated, Closed) => true,
            (Running, AwaitingInput) | (Running, Closed) => true,
            (AwaitingInput, Running) | (AwaitingInput, Closed) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Authenticated => "authenticated",
            SessionState::Running => "running",
            SessionState::AwaitingInput => "awaiting-input",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a session reached `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseReason {
    /// The remote side closed the channel (command finished).
    RemoteClosed,
    /// Explicit close action.
    Operator,
    /// The session handle was dropped without an explicit close.
    HandleDropped,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CloseReason::RemoteClosed => "remote closed",
            CloseReason::Operator => "closed by operator",
            CloseReason::HandleDropped => "view dismissed",
        };
        f.write_str(text)
    }
}
