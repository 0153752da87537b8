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

//! Host and command list files.
//!
//! One entry per line. Surrounding whitespace is trimmed; blank lines and
//! lines starting with `#` are ignored.

use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

use super::types::DEFAULT_COMMAND;
use crate::node::Host;

/// Non-empty, non-comment lines of `content`, trimmed, in order.
pub fn parse_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

async fn read_list(path: &Path) -> Result<Option<Vec<String>>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read list file {}", path.display()))?;
    Ok(Some(parse_list(&content)))
}

/// Load the host list. A missing file is an empty list.
///
/// An entry that does not parse is skipped with a warning; the rest of the
/// file still loads.
pub async fn load_host_list(path: &Path) -> Result<Vec<Host>> {
    let Some(entries) = read_list(path).await? else {
        tracing::warn!("Hosts file not found at {}", path.display());
        return Ok(Vec::new());
    };

    let hosts = entries
        .iter()
        .filter_map(|entry| match Host::parse(entry) {
            Ok(host) => Some(host),
            Err(e) => {
                tracing::warn!("Skipping entry in hosts file {}: {:#}", path.display(), e);
                None
            }
        })
        .collect();
    Ok(hosts)
}

/// Load the command list. A missing or empty file yields the default command.
pub async fn load_command_list(path: &Path) -> Result<Vec<String>> {
    match read_list(path).await? {
        Some(commands) if !commands.is_empty() => Ok(commands),
        _ => {
            tracing::debug!(
                "No commands in {}, using default command",
                path.display()
            );
            Ok(vec![DEFAULT_COMMAND.to_string()])
        }
    }
}
