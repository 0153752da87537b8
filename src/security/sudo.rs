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

//! Privilege-escalation password handling with automatic memory clearing.
//!
//! This module provides:
//! - `SudoPassword`: the batch secret, zeroized when the last holder drops it
//! - Phrase tables for escalation prompts and escalation failures
//! - Password acquisition from the environment or an interactive prompt
//!
//! # Security Considerations
//! - Never log or print the password; `Debug` is redacted
//! - The environment variable path exists for automation and is warned about

use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use zeroize::Zeroizing;

/// Environment variable consulted before prompting.
pub const SUDO_PASSWORD_ENV_VAR: &str = "RLAUNCH_SUDO_PASSWORD";

/// Escalation prompt phrasings, matched case-insensitively as literal substrings.
///
/// Covers `[sudo] password for user:`, `Password:`, `user's password:` and
/// the common vendor variations.
pub const SUDO_PROMPT_PATTERNS: &[&str] = &[
    "[sudo] password for ",
    "password for ",
    "password:",
    "'s password:",
    "sudo password",
    "enter password",
    "[sudo]",
];

/// Phrases sudo prints when the injected password was not accepted.
///
/// Kept to sudo's own wording: generic phrases such as "permission denied"
/// also appear in the output of commands that escalated fine.
pub const SUDO_FAILURE_PATTERNS: &[&str] = &[
    "sorry, try again",
    "incorrect password attempt",
    "sudo: no password was provided",
    "sudo: a password is required",
];

/// The privilege-escalation password for one batch.
///
/// Backed by `secrecy::SecretString`, so the heap copy is cleared on drop.
/// Sessions receive it behind an `Arc` and only ever read it. It is not
/// `Clone`: the secret exists exactly once.
///
/// ```compile_fail
/// let password = rlaunch::security::SudoPassword::new("pw".to_string()).unwrap();
/// let _copy = password.clone();
/// ```
pub struct SudoPassword {
    inner: SecretString,
}

impl SudoPassword {
    /// Wrap a password. Empty passwords are rejected.
    pub fn new(password: String) -> Result<Self> {
        if password.is_empty() {
            anyhow::bail!("Password cannot be empty");
        }
        Ok(Self {
            inner: SecretString::new(password.into_boxed_str()),
        })
    }

    /// Raw password bytes. Use immediately; do not store.
    pub fn as_bytes(&self) -> &[u8] {
        self.inner.expose_secret().as_bytes()
    }

    /// Password followed by the line terminator the remote prompt expects.
    ///
    /// The copy is itself zeroizing.
    pub fn with_terminator(&self, terminator: &[u8]) -> Zeroizing<Vec<u8>> {
        let secret = self.inner.expose_secret().as_bytes();
        let mut bytes = Vec::with_capacity(secret.len() + terminator.len());
        bytes.extend_from_slice(secret);
        bytes.extend_from_slice(terminator);
        Zeroizing::new(bytes)
    }

    /// Password followed by `\n`.
    pub fn with_newline(&self) -> Zeroizing<Vec<u8>> {
        self.with_terminator(b"\n")
    }

    pub fn is_empty(&self) -> bool {
        self.inner.expose_secret().is_empty()
    }
}

impl fmt::Debug for SudoPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SudoPassword")
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Case-insensitive literal substring match of `output` against `patterns`.
///
/// Patterns are expected in lowercase.
pub fn contains_any_pattern<S: AsRef<str>>(output: &str, patterns: &[S]) -> bool {
    let lower = output.to_lowercase();
    patterns
        .iter()
        .any(|pattern| lower.contains(pattern.as_ref()))
}

/// Prompt the operator for the password without echo.
pub fn prompt_sudo_password(username: &str) -> Result<SudoPassword> {
    eprintln!(
        "Enter the sudo password for user {username} on remote hosts (will be injected once): "
    );
    let password = rpassword::read_password()
        .map_err(|e| anyhow::anyhow!("Failed to read sudo password: {}", e))?;

    if password.is_empty() {
        anyhow::bail!("Empty password not allowed. Launch cancelled.");
    }

    SudoPassword::new(password)
}

/// Read the password from `RLAUNCH_SUDO_PASSWORD`, if set.
///
/// # Returns
/// * `Some(SudoPassword)` if the variable is set and non-empty
/// * `None` if it is not set
/// * `Err` if it is set but empty
pub fn get_sudo_password_from_env() -> Result<Option<SudoPassword>> {
    match std::env::var(SUDO_PASSWORD_ENV_VAR) {
        Ok(password) if !password.is_empty() => Ok(Some(SudoPassword::new(password)?)),
        Ok(_) => {
            anyhow::bail!(
                "{SUDO_PASSWORD_ENV_VAR} is set but empty. Empty passwords are not allowed."
            );
        }
        Err(_) => Ok(None),
    }
}

/// Environment first, then the interactive prompt.
pub fn get_sudo_password(username: &str, warn_env: bool) -> Result<SudoPassword> {
    match get_sudo_password_from_env()? {
        Some(password) => {
            if warn_env {
                eprintln!(
                    "Warning: Using sudo password from {SUDO_PASSWORD_ENV_VAR} environment variable. \
                     This is not recommended for security reasons."
                );
            }
            Ok(password)
        }
        None => prompt_sudo_password(username),
    }
}
