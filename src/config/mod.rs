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

//! Operator settings and the host/command list files.

mod lists;
mod loader;
mod types;
mod utils;

pub use lists::{load_command_list, load_host_list, parse_list};
pub use loader::default_settings_path;
pub use types::{
    Settings, DEFAULT_COMMAND, DEFAULT_COMMAND_FILE, DEFAULT_HOST_FILE, DEFAULT_SSH_KEY,
};
pub use utils::{expand_tilde, get_current_username};
