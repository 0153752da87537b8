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

//! Result types for batch execution.

use owo_colors::OwoColorize;
use std::collections::HashMap;

use crate::session::{CloseReason, SessionHandle, SessionId, SessionState};
use crate::shared::error::{AlreadyBusyError, ConnectError};

/// What [`BatchOrchestrator::start`](super::BatchOrchestrator::start) returns.
#[derive(Debug, Default)]
pub struct BatchStart {
    /// One live session per started host, keyed by host identity.
    pub sessions: HashMap<String, SessionHandle>,
    /// Hosts that were not started because they already had a live session.
    pub skipped: Vec<AlreadyBusyError>,
}

impl BatchStart {
    pub fn started_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn get(&self, host: &str) -> Option<&SessionHandle> {
        self.sessions.get(host)
    }
}

/// How one session ended.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub host: String,
    pub session_id: Option<SessionId>,
    /// `Closed` or `Failed`.
    pub final_state: SessionState,
    pub close_reason: Option<CloseReason>,
    /// Exit status reported by the remote command, if any.
    pub exit_status: Option<u32>,
    pub error: Option<ConnectError>,
    pub password_injected: bool,
}

impl SessionOutcome {
    /// Outcome for a session whose task could not report one.
    pub fn lost(host: &str, message: impl Into<String>) -> Self {
        Self {
            host: host.to_string(),
            session_id: None,
            final_state: SessionState::Failed,
            close_reason: None,
            exit_status: None,
            error: Some(ConnectError::protocol(host, message)),
            password_injected: false,
        }
    }

    /// Closed, with no nonzero exit status reported.
    pub fn is_success(&self) -> bool {
        self.final_state == SessionState::Closed && self.exit_status.unwrap_or(0) == 0
    }

    /// Exit code for this host: the remote status, or 1 for a failed session.
    pub fn get_exit_code(&self) -> i32 {
        match self.final_state {
            SessionState::Failed => 1,
            _ => self.exit_status.map(|s| s as i32).unwrap_or(0),
        }
    }

    pub fn print_summary(&self) {
        match (&self.error, self.final_state) {
            (Some(err), _) => {
                println!(
                    "{} {}: {}",
                    "●".red(),
                    self.host.bold(),
                    err.kind.as_str().red()
                );
                println!("    {}", err.message.dimmed());
            }
            (None, SessionState::Closed) => {
                let reason = self
                    .close_reason
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "closed".to_string());
                match self.exit_status {
                    Some(status) if status != 0 => println!(
                        "{} {}: {} (exit status {})",
                        "●".yellow(),
                        self.host.bold(),
                        reason,
                        status
                    ),
                    _ => println!("{} {}: {}", "●".green(), self.host.bold(), reason.green()),
                }
            }
            (None, state) => println!("{} {}: {}", "○".dimmed(), self.host.bold(), state),
        }
    }
}

/// Totals for a finished batch.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub outcomes: Vec<SessionOutcome>,
    pub skipped: Vec<AlreadyBusyError>,
}

impl BatchSummary {
    pub fn new(mut outcomes: Vec<SessionOutcome>, skipped: Vec<AlreadyBusyError>) -> Self {
        outcomes.sort_by(|a, b| a.host.cmp(&b.host));
        Self { outcomes, skipped }
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.final_state == SessionState::Failed)
            .count()
    }

    /// 0 when every started session closed cleanly, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.outcomes.iter().all(|o| o.is_success()) {
            0
        } else {
            1
        }
    }

    pub fn print(&self) {
        println!();
        for outcome in &self.outcomes {
            outcome.print_summary();
        }
        for skipped in &self.skipped {
            println!("{} {}: {}", "○".dimmed(), skipped.host.bold(), "skipped (busy)".dimmed());
        }
        println!(
            "\n{} started, {} succeeded, {} failed, {} skipped",
            self.outcomes.len(),
            self.succeeded().to_string().green(),
            self.failed().to_string().red(),
            self.skipped.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed(host: &str, exit_status: Option<u32>) -> SessionOutcome {
        SessionOutcome {
            host: host.to_string(),
            session_id: None,
            final_state: SessionState::Closed,
            close_reason: Some(CloseReason::RemoteClosed),
            exit_status,
            error: None,
            password_injected: true,
        }
    }

    #[test]
    fn test_outcome_success_rules() {
        assert!(closed("a", None).is_success());
        assert!(closed("a", Some(0)).is_success());
        assert!(!closed("a", Some(3)).is_success());
        assert_eq!(closed("a", Some(3)).get_exit_code(), 3);

        let lost = SessionOutcome::lost("b", "panicked");
        assert!(!lost.is_success());
        assert_eq!(lost.get_exit_code(), 1);
        assert_eq!(lost.error.map(|e| e.host), Some("b".to_string()));
    }

    #[test]
    fn test_summary_exit_code() {
        let ok = BatchSummary::new(vec![closed("b", Some(0)), closed("a", None)], vec![]);
        assert_eq!(ok.exit_code(), 0);
        assert_eq!(ok.outcomes[0].host, "a");

        let mixed = BatchSummary::new(
            vec![closed("a", None), SessionOutcome::lost("b", "x")],
            vec![],
        );
        assert_eq!(mixed.exit_code(), 1);
        assert_eq!(mixed.succeeded(), 1);
        assert_eq!(mixed.failed(), 1);
    }
}
