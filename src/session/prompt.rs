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

//! Escalation prompt detection over a session's output stream.

use crate::security::{contains_any_pattern, SUDO_FAILURE_PATTERNS, SUDO_PROMPT_PATTERNS};

/// Bytes of trailing output kept for matching. Large enough to hold a
/// prompt split across several reads.
pub const DEFAULT_TAIL_WINDOW: usize = 256;

/// What [`PromptDetector::observe`] found in the latest chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    Nothing,
    /// The escalation prompt appeared. Reported at most once per detector.
    Prompt,
    /// A failure phrase appeared after the prompt was answered. Reported at most once.
    Rejected,
}

/// Single-shot escalation prompt detector.
///
/// Output is matched on a bounded tail of everything seen so far, with a
/// case-insensitive literal substring test. Once the prompt has been
/// reported the detector disarms and only watches for failure phrases.
#[derive(Debug, Clone)]
pub struct PromptDetector {
    prompt_patterns: Vec<String>,
    failure_patterns: Vec<String>,
    tail: Vec<u8>,
    window: usize,
    prompt_seen: bool,
    rejection_seen: bool,
}

impl Default for PromptDetector {
    fn default() -> Self {
        Self::new(SUDO_PROMPT_PATTERNS)
    }
}

impl PromptDetector {
    pub fn new<S: AsRef<str>>(prompt_patterns: &[S]) -> Self {
        Self {
            prompt_patterns: lowercase_all(prompt_patterns),
            failure_patterns: lowercase_all(SUDO_FAILURE_PATTERNS),
            tail: Vec::with_capacity(DEFAULT_TAIL_WINDOW),
            window: DEFAULT_TAIL_WINDOW,
            prompt_seen: false,
            rejection_seen: false,
        }
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    /// Feed the next output chunk.
    pub fn observe(&mut self, chunk: &[u8]) -> Detection {
        if self.rejection_seen {
            return Detection::Nothing;
        }

        self.tail.extend_from_slice(chunk);
        if self.tail.len() > self.window {
            let excess = self.tail.len() - self.window;
            self.tail.drain(..excess);
        }

        let matched = {
            let text = String::from_utf8_lossy(&self.tail);
            if self.prompt_seen {
                contains_any_pattern(&text, &self.failure_patterns)
            } else {
                contains_any_pattern(&text, &self.prompt_patterns)
            }
        };
        if !matched {
            return Detection::Nothing;
        }

        // each phrase is looked for only in output that follows the previous match
        self.tail.clear();
        if self.prompt_seen {
            self.rejection_seen = true;
            Detection::Rejected
        } else {
            self.prompt_seen = true;
            Detection::Prompt
        }
    }

    pub fn prompt_seen(&self) -> bool {
        self.prompt_seen
    }
}

fn lowercase_all<S: AsRef<str>>(patterns: &[S]) -> Vec<String> {
    patterns
        .iter()
        .map(|p| p.as_ref().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_sudo_prompt_once() {
        let mut detector = PromptDetector::default();
        assert_eq!(detector.observe(b"Last login: Mon\r\n$ "), Detection::Nothing);
        assert_eq!(
            detector.observe(b"[sudo] password for deploy: "),
            Detection::Prompt
        );
        assert!(detector.prompt_seen());
        assert_eq!(detector.observe(b"Password: "), Detection::Nothing);
    }

    #[test]
    fn test_case_insensitive() {
        let mut detector = PromptDetector::new(&["password"]);
        assert_eq!(detector.observe(b"PASSWORD please"), Detection::Prompt);
    }

    #[test]
    fn test_prompt_split_across_chunks() {
        let mut detector = PromptDetector::new(&["password:"]);
        assert_eq!(detector.observe(b"Pass"), Detection::Nothing);
        assert_eq!(detector.observe(b"wo"), Detection::Nothing);
        assert_eq!(detector.observe(b"rd: "), Detection::Prompt);
    }

    #[test]
    fn test_tail_window_forgets_old_output() {
        let mut detector = PromptDetector::new(&["password:"]).with_window(8);
        assert_eq!(detector.observe(b"Pass"), Detection::Nothing);
        assert_eq!(detector.observe(b"0123456789"), Detection::Nothing);
        assert_eq!(detector.observe(b"word:"), Detection::Nothing);
    }

    #[test]
    fn test_rejection_only_after_prompt() {
        let mut detector = PromptDetector::default();
        assert_eq!(detector.observe(b"sorry, try again"), Detection::Nothing);
        assert_eq!(detector.observe(b"Password:"), Detection::Prompt);
        assert_eq!(
            detector.observe(b"\r\nSorry, try again.\r\n"),
            Detection::Rejected
        );
        assert_eq!(detector.observe(b"Sorry, try again."), Detection::Nothing);
    }

    #[test]
    fn test_command_errors_after_injection_are_not_rejection() {
        let mut detector = PromptDetector::default();
        assert_eq!(detector.observe(b"[sudo] password for deploy: "), Detection::Prompt);
        assert_eq!(
            detector.observe(b"\r\nls: cannot open directory '/root': Permission denied\r\n"),
            Detection::Nothing
        );
        assert_eq!(
            detector.observe(b"su: Authentication failure\r\n"),
            Detection::Nothing
        );
        assert_eq!(
            detector.observe(b"sudo: 3 incorrect password attempts\r\n"),
            Detection::Rejected
        );
    }

    #[test]
    fn test_empty_pattern_list_never_matches() {
        let mut detector = PromptDetector::new::<&str>(&[]);
        assert_eq!(detector.observe(b"Password:"), Detection::Nothing);
        assert!(!detector.prompt_seen());
    }
}
