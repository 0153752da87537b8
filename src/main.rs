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

use anyhow::{Context, Result};
use clap::Parser;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use rlaunch::{
    cli::Cli,
    config::{default_settings_path, load_command_list, load_host_list, Settings},
    executor::{wait_all, BatchOrchestrator, BatchSummary, MultiHostStreamManager},
    node::Host,
    security::{get_sudo_password, Credentials},
    session::{SessionHandle, SessionRegistry},
    ssh::{known_hosts::get_check_method, SshConnector},
    ui::{print_inventory, ConsoleCommand, ConsoleRenderer},
    utils::{init_logging, sanitize_command},
};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings_path = match &cli.settings {
        Some(path) => path.clone(),
        None => default_settings_path()?,
    };
    let mut settings = Settings::load(&settings_path).await;
    apply_overrides(&mut settings, &cli);

    let hosts = load_host_list(&settings.host_file()).await?;
    let commands = load_command_list(&settings.command_file()).await?;
    let registry = SessionRegistry::global();

    if cli.list {
        let inventory: Vec<(Host, bool)> = hosts
            .iter()
            .map(|h| (h.clone(), registry.is_busy(h.id())))
            .collect();
        let selected = commands.iter().position(|c| *c == settings.selected_command);
        print_inventory(&inventory, &commands, selected);
        return Ok(());
    }

    let selected_hosts = select_hosts(&hosts, cli.selected_hosts())?;
    let command = select_command(&cli, &settings, &commands)?;

    // A bad user or a missing key is reported before the password prompt.
    Credentials::check_login(&settings.remote_user, &settings.ssh_key())?;

    let password = get_sudo_password(&settings.remote_user, true)?;
    let credentials = Arc::new(Credentials::new(
        settings.remote_user.clone(),
        settings.ssh_key(),
        password,
    )?);

    let connector = SshConnector::new(
        settings.connect_timeout(),
        get_check_method(settings.strict_host_key_checking),
    );
    let orchestrator = BatchOrchestrator::new(Arc::clone(&registry), Arc::new(connector))
        .with_options(settings.session_options());

    let batch = orchestrator.start(&selected_hosts, &command, credentials);

    settings.selected_command = command.clone();
    if let Err(e) = settings.save(&settings_path).await {
        tracing::warn!("Could not save settings: {:#}", e);
    }

    let order: Vec<String> = selected_hosts.iter().map(|h| h.id().to_string()).collect();
    let renderer = ConsoleRenderer::new(&order);
    for skipped in &batch.skipped {
        eprintln!("Skipping {}: already has a live session", skipped.host);
    }

    let skipped = batch.skipped;
    let mut sessions = batch.sessions;
    if !sessions.is_empty() {
        run_console(&renderer, &order, &mut sessions, &registry).await;
    }

    let outcomes = wait_all(sessions.into_values()).await;
    let summary = BatchSummary::new(outcomes, skipped);
    summary.print();
    std::process::exit(summary.exit_code());
}

fn apply_overrides(settings: &mut Settings, cli: &Cli) {
    if let Some(path) = &cli.hosts_file {
        settings.host_file_path = path.clone();
    }
    if let Some(path) = &cli.commands_file {
        settings.command_file_path = path.clone();
    }
    if let Some(user) = &cli.user {
        settings.remote_user = user.clone();
    }
    if let Some(key) = &cli.identity {
        settings.ssh_key_path = key.clone();
    }
    if let Some(timeout) = cli.connect_timeout.filter(|t| *t > 0) {
        settings.connect_timeout = timeout;
    }
    if cli.strict_host_key_checking {
        settings.strict_host_key_checking = true;
    }
}

fn select_hosts(hosts: &[Host], only: Option<Vec<String>>) -> Result<Vec<Host>> {
    let selected: Vec<Host> = match only {
        None => hosts.to_vec(),
        Some(names) => {
            let mut selected = Vec::with_capacity(names.len());
            for name in names {
                let host = hosts
                    .iter()
                    .find(|h| h.id() == name || h.hostname == name)
                    .with_context(|| format!("Host '{name}' is not in the hosts file"))?;
                selected.push(host.clone());
            }
            selected
        }
    };
    if selected.is_empty() {
        anyhow::bail!("No hosts selected. Add hosts to the hosts file or check --only.");
    }
    Ok(selected)
}

fn select_command(cli: &Cli, settings: &Settings, commands: &[String]) -> Result<String> {
    let command = if let Some(command) = &cli.command {
        command.clone()
    } else if let Some(index) = cli.command_index {
        commands.get(index).cloned().with_context(|| {
            format!(
                "Command index {index} out of range (commands file has {})",
                commands.len()
            )
        })?
    } else if commands.contains(&settings.selected_command) {
        settings.selected_command.clone()
    } else {
        commands
            .first()
            .cloned()
            .context("The commands file has no commands")?
    };
    sanitize_command(&command)
}

/// Render session output and dispatch operator input until every session ends.
async fn run_console(
    renderer: &ConsoleRenderer,
    order: &[String],
    sessions: &mut HashMap<String, SessionHandle>,
    registry: &SessionRegistry,
) {
    let mut streams = MultiHostStreamManager::new();
    for host in order {
        if let Some(handle) = sessions.get_mut(host) {
            if let Some(events) = handle.take_events() {
                streams.add_stream(host.clone(), events);
            }
        }
    }

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut tick = tokio::time::interval(POLL_INTERVAL);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                if streams.poll_all() {
                    for stream in streams.streams_mut() {
                        renderer.print_stream(stream);
                    }
                }
                if streams.all_complete() {
                    break;
                }
            }
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) => dispatch(&line, renderer, order, sessions, registry),
                Ok(None) => {
                    tracing::debug!("stdin closed; sessions keep running until closed remotely or interrupted");
                    stdin_open = false;
                }
                Err(e) => {
                    tracing::warn!("Failed to read stdin: {}", e);
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                eprintln!("Interrupted, closing all sessions");
                sessions.values().for_each(SessionHandle::close);
            }
        }
    }
}

fn dispatch(
    line: &str,
    renderer: &ConsoleRenderer,
    order: &[String],
    sessions: &HashMap<String, SessionHandle>,
    registry: &SessionRegistry,
) {
    match ConsoleCommand::parse(line) {
        ConsoleCommand::Send { host, text } => match sessions.get(&host) {
            Some(handle) => {
                if !handle.send_input(format!("{text}\n")) {
                    eprintln!("{host}: session is no longer running");
                }
            }
            None => eprintln!("No session for {host}"),
        },
        ConsoleCommand::Close(host) => match sessions.get(&host) {
            Some(handle) => handle.close(),
            None => eprintln!("No session for {host}"),
        },
        ConsoleCommand::CloseAll | ConsoleCommand::Quit => {
            sessions.values().for_each(SessionHandle::close);
        }
        ConsoleCommand::Status => {
            let rows: Vec<_> = order
                .iter()
                .map(|host| (host.clone(), registry.state(host), registry.is_busy(host)))
                .collect();
            renderer.print_status(&rows);
        }
        ConsoleCommand::Broadcast(text) => {
            let mut sent = 0;
            for handle in sessions.values() {
                if handle.send_input(format!("{text}\n")) {
                    sent += 1;
                }
            }
            if sent == 0 {
                eprintln!("No running sessions");
            }
        }
        ConsoleCommand::Invalid(line) => {
            eprintln!("Unknown console command: {line} (try :send, :close, :close-all, :status, :quit)");
        }
    }
}
