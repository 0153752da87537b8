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

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "rlaunch",
    version,
    about = "Launch one command on many SSH hosts, one interactive session per host",
    long_about = "rlaunch runs the selected command concurrently on every selected host.\nEach host gets its own PTY session; when the remote side asks for the sudo\npassword it is injected once, and the session then stays interactive.\nHosts that already have a live session are skipped.",
    after_help = "CONSOLE COMMANDS (read from stdin while sessions run):\n  :send HOST TEXT   Send TEXT and a newline to HOST\n  :close HOST       Close HOST's session\n  :close-all        Close every session\n  :status           Show each host's state\n  :quit             Close every session and exit\n  anything else     Sent to every running session\n\nEXAMPLES:\n  rlaunch                              # all hosts, saved command\n  rlaunch --only web-1,web-2 -n 2      # two hosts, third command in the list\n  rlaunch --command 'sudo apt update'  # ad-hoc command\n  rlaunch --list                       # show hosts and commands"
)]
pub struct Cli {
    #[arg(
        long,
        help = "Settings file path [default: <config dir>/rlaunch/settings.json]"
    )]
    pub settings: Option<PathBuf>,

    #[arg(long, help = "Hosts file, one host per line ([user@]host[:port])")]
    pub hosts_file: Option<PathBuf>,

    #[arg(long, help = "Commands file, one command per line")]
    pub commands_file: Option<PathBuf>,

    #[arg(
        long,
        value_delimiter = ',',
        help = "Comma-separated subset of hosts from the hosts file (default: all)"
    )]
    pub only: Option<Vec<String>>,

    #[arg(
        long,
        conflicts_with = "command_index",
        help = "Command to run instead of one from the commands file"
    )]
    pub command: Option<String>,

    #[arg(short = 'n', long, help = "Zero-based index into the commands file")]
    pub command_index: Option<usize>,

    #[arg(short = 'u', long, help = "Remote username")]
    pub user: Option<String>,

    #[arg(short = 'i', long, help = "SSH private key file path")]
    pub identity: Option<PathBuf>,

    #[arg(long, help = "Connect and authentication timeout in seconds")]
    pub connect_timeout: Option<u64>,

    #[arg(
        long,
        help = "Verify host keys against ~/.ssh/known_hosts instead of accepting any key"
    )]
    pub strict_host_key_checking: bool,

    #[arg(long, help = "Print hosts (with busy state) and commands, then exit")]
    pub list: bool,

    #[arg(
        short = 'v',
        long,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,
}

impl Cli {
    /// Host identities selected with `--only`, trimmed, empty entries dropped.
    pub fn selected_hosts(&self) -> Option<Vec<String>> {
        self.only.as_ref().map(|hosts| {
            hosts
                .iter()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::try_parse_from(["rlaunch"]).unwrap();
        assert!(cli.only.is_none());
        assert!(cli.command.is_none());
        assert!(!cli.list);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_parse_selection() {
        let cli = Cli::try_parse_from(["rlaunch", "--only", "web-1, web-2,", "-n", "1", "-vv"])
            .unwrap();
        assert_eq!(
            cli.selected_hosts(),
            Some(vec!["web-1".to_string(), "web-2".to_string()])
        );
        assert_eq!(cli.command_index, Some(1));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_command_conflicts_with_index() {
        assert!(Cli::try_parse_from(["rlaunch", "--command", "uptime", "-n", "0"]).is_err());
    }
}
