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

//! PTY shell channels.

use russh::client::Msg;
use russh::{Channel, Pty};

use super::connection::Client;

/// Terminal modes sent with the PTY request.
///
/// Canonical mode with echo on, the way a login shell expects it. Programs
/// that read a secret (sudo, su) turn echo off themselves.
pub fn interactive_terminal_modes() -> Vec<(Pty, u32)> {
    vec![
        (Pty::VINTR, 0x03),
        (Pty::VQUIT, 0x1C),
        (Pty::VERASE, 0x7F),
        (Pty::VKILL, 0x15),
        (Pty::VEOF, 0x04),
        (Pty::VSUSP, 0x1A),
        (Pty::ICRNL, 1),
        (Pty::IXON, 0),
        (Pty::ISIG, 1),
        (Pty::ICANON, 1),
        (Pty::ECHO, 1),
        (Pty::ECHOE, 1),
        (Pty::ECHOK, 1),
        (Pty::IEXTEN, 1),
        (Pty::OPOST, 1),
        (Pty::ONLCR, 1),
        (Pty::CS8, 1),
        (Pty::TTY_OP_ISPEED, 38400),
        (Pty::TTY_OP_OSPEED, 38400),
    ]
}

impl Client {
    /// Open a session channel with a PTY and a login shell on it.
    ///
    /// The PTY is requested once, with the full set of terminal modes,
    /// before the shell is started.
    pub async fn open_interactive_pty(
        &self,
        term_type: &str,
        cols: u32,
        rows: u32,
    ) -> Result<Channel<Msg>, super::Error> {
        let channel = self.connection_handle.channel_open_session().await?;
        channel
            .request_pty(
                false,
                term_type,
                cols,
                rows,
                0,
                0,
                &interactive_terminal_modes(),
            )
            .await?;
        channel.request_shell(false).await?;
        tracing::trace!("Opened {term_type} PTY ({cols}x{rows}) on {}", self.address());
        Ok(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find_mode(modes: &[(Pty, u32)], target: Pty) -> Option<u32> {
        modes.iter().find(|(m, _)| *m == target).map(|(_, v)| *v)
    }

    #[test]
    fn test_echo_and_canonical_mode_enabled() {
        let modes = interactive_terminal_modes();
        assert_eq!(find_mode(&modes, Pty::ECHO), Some(1));
        assert_eq!(find_mode(&modes, Pty::ICANON), Some(1));
        assert_eq!(find_mode(&modes, Pty::ONLCR), Some(1));
    }

    #[test]
    fn test_control_characters() {
        let modes = interactive_terminal_modes();
        assert_eq!(find_mode(&modes, Pty::VINTR), Some(0x03));
        assert_eq!(find_mode(&modes, Pty::VEOF), Some(0x04));
    }
}
