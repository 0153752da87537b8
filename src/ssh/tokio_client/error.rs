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

//! Errors raised by the russh-backed client.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Address resolution failed: {0}")]
    AddressInvalid(#[source] io::Error),

    #[error("Connection timed out after {0} seconds")]
    ConnectTimeout(u64),

    #[error("Unable to load the private key: {0}")]
    KeyInvalid(#[source] russh::keys::Error),

    #[error("The server rejected the private key")]
    KeyAuthFailed,

    #[error("Server host key verification failed")]
    ServerCheckFailed,

    #[error("SSH error: {0}")]
    SshError(#[from] russh::Error),
}
