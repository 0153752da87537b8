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

use anyhow::{bail, Result};

const MAX_COMMAND_LENGTH: usize = 16384;

/// Check that a command can be submitted as one line of PTY input.
///
/// The command itself is never rewritten; this only rejects input that
/// could not be typed at a shell prompt as a single line.
pub fn sanitize_command(command: &str) -> Result<String> {
    if command.trim().is_empty() {
        bail!("Empty command not allowed");
    }
    if command.len() > MAX_COMMAND_LENGTH {
        bail!(
            "Command too long: {} bytes (max: {} bytes)",
            command.len(),
            MAX_COMMAND_LENGTH
        );
    }
    if command.contains('\0') {
        bail!("Command contains null bytes");
    }
    if command.contains(['\n', '\r']) {
        bail!("Command must be a single line");
    }
    Ok(command.to_string())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum AnsiState {
    Normal,
    Escape,
    Csi,
    /// OSC/DCS string, ended by BEL or ESC \
    Str,
    StrEscape,
}

/// Remove terminal escape sequences and stray control characters from one
/// line of PTY output, for display.
pub fn strip_ansi(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut state = AnsiState::Normal;

    for ch in input.chars() {
        state = match state {
            AnsiState::Normal => match ch {
                '\x1b' => AnsiState::Escape,
                '\t' => {
                    output.push(ch);
                    AnsiState::Normal
                }
                c if c.is_control() => AnsiState::Normal,
                c => {
                    output.push(c);
                    AnsiState::Normal
                }
            },
            AnsiState::Escape => match ch {
                '[' => AnsiState::Csi,
                ']' | 'P' | '_' | '^' => AnsiState::Str,
                // two-character sequences (ESC =, ESC >, ESC ( B ...)
                _ => AnsiState::Normal,
            },
            AnsiState::Csi => {
                if ('\x40'..='\x7e').contains(&ch) {
                    AnsiState::Normal
                } else {
                    AnsiState::Csi
                }
            }
            AnsiState::Str => match ch {
                '\x07' => AnsiState::Normal,
                '\x1b' => AnsiState::StrEscape,
                _ => AnsiState::Str,
            },
            AnsiState::StrEscape => match ch {
                '\\' => AnsiState::Normal,
                _ => AnsiState::Str,
            },
        };
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_command() {
        assert_eq!(sanitize_command("~/bin/upg_1.01").unwrap(), "~/bin/upg_1.01");
        assert!(sanitize_command("sudo -i").is_ok());
        assert!(sanitize_command("").is_err());
        assert!(sanitize_command("   ").is_err());
        assert!(sanitize_command("echo\0x").is_err());
        assert!(sanitize_command("a\nb").is_err());
        assert!(sanitize_command(&"x".repeat(MAX_COMMAND_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_strip_ansi_colors() {
        assert_eq!(strip_ansi("\x1b[31mRed Text\x1b[0m"), "Red Text");
        assert_eq!(strip_ansi("\x1b[1;32mok\x1b[m done"), "ok done");
    }

    #[test]
    fn test_strip_ansi_osc_title_and_bell() {
        assert_eq!(strip_ansi("\x1b]0;user@web-1: ~\x07$ ls"), "$ ls");
        assert_eq!(strip_ansi("\x1b]2;title\x1b\\prompt"), "prompt");
        assert_eq!(strip_ansi("beep\x07"), "beep");
    }

    #[test]
    fn test_strip_ansi_keeps_plain_text() {
        assert_eq!(strip_ansi("[sudo] password for deploy: "), "[sudo] password for deploy: ");
        assert_eq!(strip_ansi("a\tb"), "a\tb");
        assert_eq!(strip_ansi("\x1b[?2004hbracketed"), "bracketed");
    }
}
