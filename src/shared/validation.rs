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

//! Validation of configured host and user identities.
//!
//! Host lists and usernames come from operator-edited text files, so they are
//! checked before they reach the SSH layer or any log line.

use anyhow::Result;

/// Validate a hostname or IP literal.
///
/// Allows alphanumerics, dots, hyphens, underscores, colons and brackets
/// (IPv6). Punycode labels (`xn--`) and `/etc/hosts` style names with
/// underscores pass; whitespace, shell metacharacters and a leading `-` do not.
///
/// # Examples
///
/// ```
/// use rlaunch::shared::validation::validate_hostname;
///
/// assert!(validate_hostname("web-1.example.com").is_ok());
/// assert!(validate_hostname("192.168.1.1").is_ok());
/// assert!(validate_hostname("[::1]").is_ok());
/// assert!(validate_hostname("web_01").is_ok());
/// assert!(validate_hostname("xn--bcher-kva.example").is_ok());
///
/// assert!(validate_hostname("example..com").is_err());
/// assert!(validate_hostname("example.com; ls").is_err());
/// ```
pub fn validate_hostname(hostname: &str) -> Result<String> {
    if hostname.is_empty() {
        anyhow::bail!("Hostname cannot be empty");
    }

    // RFC 1123
    const MAX_HOSTNAME_LENGTH: usize = 253;
    if hostname.len() > MAX_HOSTNAME_LENGTH {
        anyhow::bail!("Hostname too long (max {MAX_HOSTNAME_LENGTH} characters)");
    }

    let valid_chars = hostname.chars().all(|c| {
        c.is_ascii_alphanumeric()
            || matches!(c, '.' | '-' | '_' | ':' | '[' | ']')
    });

    if !valid_chars {
        anyhow::bail!("Hostname contains invalid characters");
    }

    // would be taken as an option by anything downstream
    if hostname.starts_with('-') {
        anyhow::bail!("Hostname cannot start with a hyphen");
    }

    if hostname.contains("..") {
        anyhow::bail!("Hostname contains an empty label");
    }

    Ok(hostname.to_string())
}

/// Validate a POSIX username.
///
/// # Examples
///
/// ```
/// use rlaunch::shared::validation::validate_username;
///
/// assert!(validate_username("deploy").is_ok());
/// assert!(validate_username("john_doe").is_ok());
///
/// assert!(validate_username("-user").is_err());
/// assert!(validate_username("user@domain").is_err());
/// ```
pub fn validate_username(username: &str) -> Result<String> {
    if username.is_empty() {
        anyhow::bail!("Username cannot be empty");
    }

    const MAX_USERNAME_LENGTH: usize = 32;
    if username.len() > MAX_USERNAME_LENGTH {
        anyhow::bail!("Username too long (max {MAX_USERNAME_LENGTH} characters)");
    }

    let valid_chars = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');

    if !valid_chars {
        anyhow::bail!("Username contains invalid characters");
    }

    if username.starts_with('-') {
        anyhow::bail!("Username cannot start with a hyphen");
    }

    Ok(username.to_string())
}
