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

//! Console rendering: per-host output lines and lifecycle notices.

use owo_colors::OwoColorize;
use std::io::{IsTerminal, Write};

use crate::executor::HostStream;
use crate::node::Host;
use crate::session::{SessionEvent, SessionState};
use crate::utils::strip_ansi;

pub struct ConsoleRenderer {
    tag_width: usize,
    colors: bool,
}

impl ConsoleRenderer {
    pub fn new<S: AsRef<str>>(hosts: &[S]) -> Self {
        let tag_width = hosts.iter().map(|h| h.as_ref().len()).max().unwrap_or(0);
        Self {
            tag_width,
            colors: std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
        }
    }

    pub fn with_colors(mut self, colors: bool) -> Self {
        self.colors = colors;
        self
    }

    fn tag(&self, host: &str) -> String {
        let padded = format!("[{host:<width$}]", width = self.tag_width);
        if !self.colors {
            return padded;
        }
        // Stable color per host name
        let index = host.bytes().fold(0usize, |acc, b| acc.wrapping_add(b as usize)) % 5;
        match index {
            0 => padded.cyan().to_string(),
            1 => padded.magenta().to_string(),
            2 => padded.yellow().to_string(),
            3 => padded.blue().to_string(),
            _ => padded.green().to_string(),
        }
    }

    /// One output line, escape sequences removed.
    pub fn format_line(&self, host: &str, line: &str) -> String {
        format!("{} {}", self.tag(host), strip_ansi(line))
    }

    /// Notice for a lifecycle event, or `None` for events not shown.
    pub fn format_event(&self, host: &str, event: &SessionEvent) -> Option<String> {
        let text = match event {
            SessionEvent::Started { .. } => "connecting".to_string(),
            SessionEvent::Authenticated { .. } => "authenticated".to_string(),
            SessionEvent::PasswordInjected => "password sent".to_string(),
            SessionEvent::EscalationRejected => {
                self.paint_warn("password rejected by the remote host")
            }
            SessionEvent::RemoteExit { status, .. } => {
                self.paint_warn(&format!("command exited with status {status}"))
            }
            SessionEvent::Failed { kind, message, .. } => {
                self.paint_error(&format!("failed: {kind}: {message}"))
            }
            SessionEvent::Closed {
                reason,
                exit_status,
                ..
            } => match exit_status {
                Some(status) => format!("closed ({reason}, exit status {status})"),
                None => format!("closed ({reason})"),
            },
            SessionEvent::Transition { .. } | SessionEvent::Output(_) => return None,
        };
        Some(format!("{} {} {}", self.tag(host), self.paint_marker(), text))
    }

    fn paint_marker(&self) -> String {
        if self.colors {
            "●".dimmed().to_string()
        } else {
            "*".to_string()
        }
    }

    fn paint_warn(&self, text: &str) -> String {
        if self.colors {
            text.yellow().to_string()
        } else {
            text.to_string()
        }
    }

    fn paint_error(&self, text: &str) -> String {
        if self.colors {
            text.red().to_string()
        } else {
            text.to_string()
        }
    }

    /// Everything `stream` has produced since the last call, formatted:
    /// completed lines, then an unterminated tail (a prompt waiting on the
    /// same line), then lifecycle notices.
    pub fn render_stream(&self, stream: &mut HostStream) -> Vec<String> {
        let host = stream.host.clone();
        let mut out: Vec<String> = stream
            .take_lines()
            .iter()
            .map(|line| self.format_line(&host, line))
            .collect();
        if let Some(tail) = stream.take_partial() {
            out.push(self.format_line(&host, &tail));
        }
        out.extend(
            stream
                .take_lifecycle()
                .iter()
                .filter_map(|event| self.format_event(&host, event)),
        );
        out
    }

    /// Print what [`render_stream`](Self::render_stream) returns.
    pub fn print_stream(&self, stream: &mut HostStream) {
        let rendered = self.render_stream(stream);
        if rendered.is_empty() {
            return;
        }
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for text in rendered {
            let _ = writeln!(out, "{text}");
        }
        let _ = out.flush();
    }

    /// `:status` table.
    pub fn print_status(&self, rows: &[(String, Option<SessionState>, bool)]) {
        for (host, state, busy) in rows {
            let state = state.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string());
            let busy = if *busy { "busy" } else { "free" };
            println!("{} {:<14} {}", self.tag(host), state, busy);
        }
    }
}

/// A line typed on the console while sessions run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Send { host: String, text: String },
    Close(String),
    CloseAll,
    Status,
    Quit,
    /// Anything that is not a `:` command goes to every running session.
    Broadcast(String),
    /// A `:` command that could not be understood.
    Invalid(String),
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Self {
        let Some(rest) = line.strip_prefix(':') else {
            return ConsoleCommand::Broadcast(line.to_string());
        };
        let mut parts = rest.splitn(3, ' ');
        let verb = parts.next().unwrap_or_default();
        let host = parts.next().map(str::trim).filter(|h| !h.is_empty());
        match (verb, host) {
            ("send", Some(host)) => ConsoleCommand::Send {
                host: host.to_string(),
                text: parts.next().unwrap_or_default().to_string(),
            },
            ("close", Some(host)) => ConsoleCommand::Close(host.to_string()),
            ("close-all", None) => ConsoleCommand::CloseAll,
            ("status", None) => ConsoleCommand::Status,
            ("quit", None) => ConsoleCommand::Quit,
            _ => ConsoleCommand::Invalid(line.to_string()),
        }
    }
}

/// `--list` output.
pub fn print_inventory(hosts: &[(Host, bool)], commands: &[String], selected: Option<usize>) {
    println!("{}", "Hosts:".bold());
    if hosts.is_empty() {
        println!("  (none)");
    }
    for (host, busy) in hosts {
        let marker = if *busy { "busy".yellow().to_string() } else { String::new() };
        println!("  {} {}", host, marker);
    }
    println!("{}", "Commands:".bold());
    for (index, command) in commands.iter().enumerate() {
        let marker = if Some(index) == selected { "*" } else { " " };
        println!(" {marker}{index:>3}  {command}");
    }
}
