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

//! Connection manager contract and its russh implementation.
//!
//! The session driver only ever talks to these traits. [`SshConnector`] is
//! the real network implementation; tests plug in scripted ones.

use async_trait::async_trait;
use russh::client::Msg;
use russh::{Channel, ChannelMsg};
use std::path::Path;
use std::time::Duration;

use super::tokio_client::{self, AuthMethod, Client, ServerCheckMethod};
use crate::node::Host;
use crate::shared::error::ConnectError;

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TERM_TYPE: &str = "xterm-256color";

/// Pseudo-terminal parameters used for every session of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtyConfig {
    pub term_type: String,
    pub cols: u32,
    pub rows: u32,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            term_type: DEFAULT_TERM_TYPE.to_string(),
            cols: 120,
            rows: 40,
        }
    }
}

/// What a PTY channel delivers, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Output bytes (stdout and stderr are merged on a PTY).
    Data(Vec<u8>),
    ExitStatus(u32),
    /// The remote side will send no more data.
    Eof,
    /// The channel is gone; nothing follows.
    Closed,
}

/// One duplex PTY channel.
#[async_trait]
pub trait PtyChannel: Send {
    async fn write(&mut self, data: &[u8]) -> Result<(), ConnectError>;

    /// Wait for the next event. Must be cancel-safe: dropping the future
    /// before it resolves loses nothing.
    async fn next_event(&mut self) -> ChannelEvent;

    async fn close(&mut self);
}

/// An authenticated connection to one host.
#[async_trait]
pub trait Transport: Send {
    async fn open_pty(&mut self, pty: &PtyConfig) -> Result<Box<dyn PtyChannel>, ConnectError>;

    async fn close(&mut self);
}

/// Establishes authenticated transports. Shared by every session of a batch.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        host: &Host,
        username: &str,
        key_path: &Path,
    ) -> Result<Box<dyn Transport>, ConnectError>;
}

/// Connects over the network with russh, authenticating with a key file.
#[derive(Debug, Clone)]
pub struct SshConnector {
    connect_timeout: Duration,
    server_check: ServerCheckMethod,
}

impl SshConnector {
    pub fn new(connect_timeout: Duration, server_check: ServerCheckMethod) -> Self {
        Self {
            connect_timeout,
            server_check,
        }
    }
}

impl Default for SshConnector {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            ServerCheckMethod::NoCheck,
        )
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(
        &self,
        host: &Host,
        username: &str,
        key_path: &Path,
    ) -> Result<Box<dyn Transport>, ConnectError> {
        let login = host.login(username);
        tracing::debug!("Connecting to {} as {} ({})", host, login, host.address());

        let attempt = Client::connect(
            &host.hostname,
            host.port,
            login,
            AuthMethod::with_key_file(key_path, None),
            self.server_check.clone(),
            tokio_client::Config::default(),
        );
        let result = match tokio::time::timeout(self.connect_timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(tokio_client::Error::ConnectTimeout(
                self.connect_timeout.as_secs(),
            )),
        };

        match result {
            Ok(client) => {
                tracing::debug!("Authenticated to {} as {}", host, login);
                Ok(Box::new(SshTransport {
                    host: host.id().to_string(),
                    client,
                }))
            }
            Err(e) => Err(classify_error(host.id(), e)),
        }
    }
}

/// Map a client error onto the connect/auth/protocol taxonomy.
pub fn classify_error(host: &str, err: tokio_client::Error) -> ConnectError {
    use tokio_client::Error;

    let message = err.to_string();
    match err {
        Error::AddressInvalid(_) | Error::ConnectTimeout(_) => {
            ConnectError::unreachable(host, message)
        }
        Error::SshError(russh::Error::IO(_)) | Error::SshError(russh::Error::ConnectionTimeout) => {
            ConnectError::unreachable(host, message)
        }
        Error::KeyInvalid(_) | Error::KeyAuthFailed => ConnectError::auth(host, message),
        Error::ServerCheckFailed | Error::SshError(_) => ConnectError::protocol(host, message),
    }
}

struct SshTransport {
    host: String,
    client: Client,
}

#[async_trait]
impl Transport for SshTransport {
    async fn open_pty(&mut self, pty: &PtyConfig) -> Result<Box<dyn PtyChannel>, ConnectError> {
        let channel = self
            .client
            .open_interactive_pty(&pty.term_type, pty.cols, pty.rows)
            .await
            .map_err(|e| ConnectError::protocol(&self.host, format!("PTY allocation failed: {e}")))?;
        Ok(Box::new(RusshPtyChannel {
            host: self.host.clone(),
            channel,
            closed: false,
        }))
    }

    async fn close(&mut self) {
        if self.client.is_closed() {
            return;
        }
        if let Err(e) = self.client.disconnect().await {
            tracing::debug!("Disconnect from {} failed: {}", self.host, e);
        }
    }
}

struct RusshPtyChannel {
    host: String,
    channel: Channel<Msg>,
    closed: bool,
}

#[async_trait]
impl PtyChannel for RusshPtyChannel {
    async fn write(&mut self, data: &[u8]) -> Result<(), ConnectError> {
        self.channel
            .data(data)
            .await
            .map_err(|e| ConnectError::protocol(&self.host, format!("channel write failed: {e}")))
    }

    async fn next_event(&mut self) -> ChannelEvent {
        if self.closed {
            return ChannelEvent::Closed;
        }
        loop {
            match self.channel.wait().await {
                Some(ChannelMsg::Data { data }) => return ChannelEvent::Data(data.to_vec()),
                Some(ChannelMsg::ExtendedData { data, .. }) => {
                    return ChannelEvent::Data(data.to_vec())
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    return ChannelEvent::ExitStatus(exit_status)
                }
                Some(ChannelMsg::Eof) => return ChannelEvent::Eof,
                Some(ChannelMsg::Close) | None => {
                    self.closed = true;
                    return ChannelEvent::Closed;
                }
                Some(other) => {
                    tracing::trace!("Ignoring channel message on {}: {:?}", self.host, other);
                }
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.channel.eof().await;
        if let Err(e) = self.channel.close().await {
            tracing::trace!("Channel close on {} failed: {}", self.host, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_classify_unreachable() {
        let err = tokio_client::Error::AddressInvalid(io::Error::new(
            io::ErrorKind::NotFound,
            "no such host",
        ));
        let classified = classify_error("web-1", err);
        assert_eq!(classified.kind, crate::shared::ErrorKind::Connect);
        assert_eq!(classified.host, "web-1");

        let err = tokio_client::Error::ConnectTimeout(30);
        assert_eq!(
            classify_error("web-1", err).kind,
            crate::shared::ErrorKind::Connect
        );

        let err = tokio_client::Error::SshError(russh::Error::IO(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "refused",
        )));
        assert_eq!(
            classify_error("web-1", err).kind,
            crate::shared::ErrorKind::Connect
        );
    }

    #[test]
    fn test_classify_auth_and_protocol() {
        let auth = classify_error("db-2", tokio_client::Error::KeyAuthFailed);
        assert_eq!(auth.kind, crate::shared::ErrorKind::Auth);
        assert!(auth.to_string().contains("db-2"));

        let proto = classify_error("db-2", tokio_client::Error::ServerCheckFailed);
        assert_eq!(proto.kind, crate::shared::ErrorKind::Protocol);
    }

    #[test]
    fn test_default_pty_config() {
        let pty = PtyConfig::default();
        assert_eq!(pty.term_type, "xterm-256color");
        assert!(pty.cols > 0 && pty.rows > 0);
    }
}
