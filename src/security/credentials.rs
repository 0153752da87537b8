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

//! The per-batch credentials bundle.

use std::path::{Path, PathBuf};

use super::sudo::SudoPassword;
use crate::shared::error::CredentialsError;
use crate::shared::validation::validate_username;

/// Remote username, private key path and escalation password for one batch.
///
/// Built once per batch and handed to every session behind an `Arc`; no
/// session mutates it. The password is cleared when the last `Arc` drops,
/// i.e. once every session of the batch has terminated.
#[derive(Debug)]
pub struct Credentials {
    username: String,
    key_path: PathBuf,
    password: SudoPassword,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        key_path: impl Into<PathBuf>,
        password: SudoPassword,
    ) -> Result<Self, CredentialsError> {
        let username = username.into();
        check_username(&username)?;
        if password.is_empty() {
            return Err(CredentialsError::EmptyPassword);
        }

        Ok(Self {
            username,
            key_path: key_path.into(),
            password,
        })
    }

    /// Validate the login half of the credentials, before a password is asked for.
    pub fn check_login(username: &str, key_path: &Path) -> Result<(), CredentialsError> {
        check_username(username)?;
        if key_path.exists() {
            Ok(())
        } else {
            Err(CredentialsError::KeyNotFound(key_path.to_path_buf()))
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    pub fn password(&self) -> &SudoPassword {
        &self.password
    }
}

fn check_username(username: &str) -> Result<(), CredentialsError> {
    if username.is_empty() {
        return Err(CredentialsError::EmptyUsername);
    }
    validate_username(username)
        .map(|_| ())
        .map_err(|e| CredentialsError::InvalidUsername(e.to_string()))
}
