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

//! Settings loading and saving.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::env;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::types::{Settings, SettingsFile};
use super::utils::expand_tilde;

const SETTINGS_FILE: &str = "settings.json";

/// Default settings location: `<config dir>/rlaunch/settings.json`.
pub fn default_settings_path() -> Result<PathBuf> {
    if let Ok(xdg_config_home) = env::var("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(xdg_config_home)
            .join("rlaunch")
            .join(SETTINGS_FILE));
    }
    if let Some(proj_dirs) = ProjectDirs::from("", "", "rlaunch") {
        return Ok(proj_dirs.config_dir().join(SETTINGS_FILE));
    }

    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .context("Unable to determine home directory")?;
    Ok(PathBuf::from(home).join(".rlaunch").join(SETTINGS_FILE))
}

impl Settings {
    /// Load settings from `path`.
    ///
    /// Never fails: a missing file yields defaults, and an unreadable or
    /// malformed file is logged and replaced by defaults. List files
    /// default to the directory holding the settings file.
    pub async fn load(path: &Path) -> Self {
        let expanded_path = expand_tilde(path);
        let dir = expanded_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let defaults = Settings::defaults_in(&dir);

        if !expanded_path.exists() {
            tracing::debug!(
                "Settings file not found at {:?}, using defaults",
                expanded_path
            );
            return defaults;
        }

        let content = match fs::read_to_string(&expanded_path).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(
                    "Failed to read settings file {}: {}. Using defaults.",
                    expanded_path.display(),
                    e
                );
                return defaults;
            }
        };

        match serde_json::from_str::<SettingsFile>(&content) {
            Ok(file) => file.merge_onto(defaults),
            Err(e) => {
                tracing::warn!(
                    "Settings file {} is not valid JSON ({}). Using defaults.",
                    expanded_path.display(),
                    e
                );
                defaults
            }
        }
    }

    /// Write the settings as pretty JSON, creating the parent directory.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let expanded_path = expand_tilde(path);

        if let Some(parent) = expanded_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create directory {parent:?}"))?;
            }
        }

        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize settings to JSON")?;

        fs::write(&expanded_path, json)
            .await
            .with_context(|| format!("Failed to write settings to {expanded_path:?}"))?;

        tracing::debug!("Settings saved to {:?}", expanded_path);
        Ok(())
    }
}
