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

//! Error taxonomy for remote sessions.
//!
//! # Error Categories
//!
//! - [`ConnectError`]: connection manager failures, classified by [`ErrorKind`]
//! - [`AlreadyBusyError`]: a registry reservation was denied at batch start
//! - [`RemoteExitError`]: the remote command exited nonzero (informational)
//! - [`CredentialsError`]: credentials rejected before any connection is made
//!
//! Connection and protocol failures are always attributed to the host they
//! happened on and are reported per session; they never abort a batch.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Classification of a failed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Host unreachable, DNS failure, refused or timed-out connection.
    Connect,
    /// The server rejected the key (or the key could not be used).
    Auth,
    /// Handshake, host key, channel allocation or channel I/O failure.
    Protocol,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Connect => "ConnectError",
            ErrorKind::Auth => "AuthError",
            ErrorKind::Protocol => "ProtocolError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by the connection manager or by a channel operation.
///
/// The originating host is always attached.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} on {host}: {message}")]
pub struct ConnectError {
    pub host: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl ConnectError {
    pub fn new(host: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn unreachable(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(host, ErrorKind::Connect, message)
    }

    pub fn auth(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(host, ErrorKind::Auth, message)
    }

    pub fn protocol(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(host, ErrorKind::Protocol, message)
    }
}

/// A host was skipped because a live session already holds it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("host {host} already has a live session")]
pub struct AlreadyBusyError {
    pub host: String,
}

/// The remote command finished with a nonzero status.
///
/// This is informational: the session itself still ends in `Closed`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("command on {host} exited with status {status}")]
pub struct RemoteExitError {
    pub host: String,
    pub status: u32,
}

/// Credentials that cannot be used for a batch.
#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("remote username cannot be empty")]
    EmptyUsername,

    #[error("invalid remote username: {0}")]
    InvalidUsername(String),

    #[error("privilege-escalation password cannot be empty")]
    EmptyPassword,

    #[error("SSH key not found at: {}", .0.display())]
    KeyNotFound(PathBuf),
}
