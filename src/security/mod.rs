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

//! Handling of the privilege-escalation secret and the credentials bundle
//! shared by every session of a batch.

mod credentials;
mod sudo;

pub use credentials::Credentials;
pub use sudo::{
    contains_any_pattern, get_sudo_password, get_sudo_password_from_env, prompt_sudo_password,
    SudoPassword, SUDO_FAILURE_PATTERNS, SUDO_PASSWORD_ENV_VAR, SUDO_PROMPT_PATTERNS,
};
