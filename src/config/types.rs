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

//! Settings type definitions.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::utils::{expand_tilde, get_current_username};
use crate::security::SUDO_PROMPT_PATTERNS;
use crate::session::SessionOptions;
use crate::ssh::connector::{PtyConfig, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_TERM_TYPE};

pub const DEFAULT_HOST_FILE: &str = "rlaunch_hosts.txt";
pub const DEFAULT_COMMAND_FILE: &str = "rlaunch_commands.txt";
pub const DEFAULT_SSH_KEY: &str = "~/.ssh/id_rsa";
pub const DEFAULT_COMMAND: &str = "~/bin/upg_1.01";

/// Persisted operator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub host_file_path: PathBuf,
    pub command_file_path: PathBuf,
    pub remote_user: String,
    pub ssh_key_path: PathBuf,
    pub selected_command: String,
    pub prompt_patterns: Vec<String>,
    /// Seconds allowed for connect + authentication.
    pub connect_timeout: u64,
    pub strict_host_key_checking: bool,
    pub term_type: String,
}

/// On-disk form: every key optional, missing keys take defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct SettingsFile {
    pub host_file_path: Option<PathBuf>,
    pub command_file_path: Option<PathBuf>,
    pub remote_user: Option<String>,
    pub ssh_key_path: Option<PathBuf>,
    pub selected_command: Option<String>,
    pub prompt_patterns: Option<Vec<String>>,
    pub connect_timeout: Option<u64>,
    pub strict_host_key_checking: Option<bool>,
    pub term_type: Option<String>,
}

impl SettingsFile {
    pub(super) fn merge_onto(self, defaults: Settings) -> Settings {
        Settings {
            host_file_path: self.host_file_path.unwrap_or(defaults.host_file_path),
            command_file_path: self.command_file_path.unwrap_or(defaults.command_file_path),
            remote_user: self
                .remote_user
                .filter(|u| !u.trim().is_empty())
                .unwrap_or(defaults.remote_user),
            ssh_key_path: self.ssh_key_path.unwrap_or(defaults.ssh_key_path),
            selected_command: self.selected_command.unwrap_or(defaults.selected_command),
            prompt_patterns: self
                .prompt_patterns
                .filter(|p| !p.is_empty())
                .unwrap_or(defaults.prompt_patterns),
            connect_timeout: self
                .connect_timeout
                .filter(|t| *t > 0)
                .unwrap_or(defaults.connect_timeout),
            strict_host_key_checking: self
                .strict_host_key_checking
                .unwrap_or(defaults.strict_host_key_checking),
            term_type: self
                .term_type
                .filter(|t| !t.is_empty())
                .unwrap_or(defaults.term_type),
        }
    }
}

impl Settings {
    /// Defaults with the list files placed in `dir`.
    pub fn defaults_in(dir: &Path) -> Self {
        Self {
            host_file_path: dir.join(DEFAULT_HOST_FILE),
            command_file_path: dir.join(DEFAULT_COMMAND_FILE),
            remote_user: get_current_username(),
            ssh_key_path: PathBuf::from(DEFAULT_SSH_KEY),
            selected_command: DEFAULT_COMMAND.to_string(),
            prompt_patterns: SUDO_PROMPT_PATTERNS.iter().map(|p| p.to_string()).collect(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            strict_host_key_checking: false,
            term_type: DEFAULT_TERM_TYPE.to_string(),
        }
    }

    pub fn host_file(&self) -> PathBuf {
        expand_tilde(&self.host_file_path)
    }

    pub fn command_file(&self) -> PathBuf {
        expand_tilde(&self.command_file_path)
    }

    pub fn ssh_key(&self) -> PathBuf {
        expand_tilde(&self.ssh_key_path)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            pty: PtyConfig {
                term_type: self.term_type.clone(),
                ..PtyConfig::default()
            },
            prompt_patterns: self.prompt_patterns.clone(),
        }
    }
}
