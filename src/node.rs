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

use anyhow::{Context, Result};
use std::fmt;

use crate::shared::validation::{validate_hostname, validate_username};

const DEFAULT_SSH_PORT: u16 = 22;

/// A remote host selected for execution.
///
/// The identity is the entry exactly as written in the hosts file; it keys
/// the session registry and labels every event, so two entries that differ
/// only in formatting are distinct hosts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Host {
    id: String,
    pub hostname: String,
    pub port: u16,
    /// Per-host login override (`user@host`); the batch username applies otherwise.
    pub user: Option<String>,
}

impl Host {
    pub fn new(hostname: impl Into<String>) -> Self {
        let hostname = hostname.into();
        Self {
            id: hostname.clone(),
            hostname,
            port: DEFAULT_SSH_PORT,
            user: None,
        }
    }

    pub fn parse(entry: &str) -> Result<Self> {
        // Parse formats:
        // - host
        // - host:port
        // - [v6addr]:port
        // - user@host[:port]
        let entry = entry.trim();

        let (user_part, host_part) = match entry.find('@') {
            Some(at_pos) => (Some(&entry[..at_pos]), &entry[at_pos + 1..]),
            None => (None, entry),
        };

        let (hostname, port) = if let Some(rest) = host_part.strip_prefix('[') {
            let close = rest
                .find(']')
                .with_context(|| format!("Unclosed '[' in host entry '{entry}'"))?;
            let addr = &rest[..close];
            let port = match rest[close + 1..].strip_prefix(':') {
                Some(port_str) => port_str.parse::<u16>().context("Invalid port number")?,
                None => DEFAULT_SSH_PORT,
            };
            (addr, port)
        } else {
            match host_part.split_once(':') {
                Some((name, port_str)) if !port_str.contains(':') => {
                    let port = port_str.parse::<u16>().context("Invalid port number")?;
                    (name, port)
                }
                // bare hostname, IPv4, or unbracketed IPv6
                _ => (host_part, DEFAULT_SSH_PORT),
            }
        };

        let hostname = validate_hostname(hostname)
            .with_context(|| format!("Invalid host entry '{entry}'"))?;
        let user = user_part
            .map(validate_username)
            .transpose()
            .with_context(|| format!("Invalid user in host entry '{entry}'"))?;

        Ok(Host {
            id: entry.to_string(),
            hostname,
            port,
            user,
        })
    }

    /// Registry key and display label.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn address(&self) -> String {
        if self.hostname.contains(':') {
            format!("[{}]:{}", self.hostname, self.port)
        } else {
            format!("{}:{}", self.hostname, self.port)
        }
    }

    /// Login name for this host given the batch-wide username.
    pub fn login<'a>(&'a self, batch_user: &'a str) -> &'a str {
        self.user.as_deref().unwrap_or(batch_user)
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}
