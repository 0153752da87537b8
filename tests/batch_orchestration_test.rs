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

//! Batch orchestration tests: reservation, skipping, concurrency and
//! aggregation of outcomes across hosts.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::*;
use rlaunch::executor::{wait_all, BatchOrchestrator, BatchSummary, MultiHostStreamManager};
use rlaunch::node::Host;
use rlaunch::session::{SessionEvent, SessionRegistry, SessionState};
use rlaunch::shared::ErrorKind;
use rlaunch::ui::ConsoleRenderer;

const COMMAND: &str = "sudo ~/bin/upg_1.01";

fn hosts(ids: &[&str]) -> Vec<Host> {
    ids.iter().map(|id| Host::new(*id)).collect()
}

fn finishing_session() -> HostScript {
    HostScript::Session(vec![
        Step::Emit(b"[sudo] password for deploy: "),
        Step::WaitForWrites(2),
        Step::Emit(b"\r\ndone\r\n"),
        Step::ExitStatus(0),
        Step::Eof,
        Step::Close,
    ])
}

#[tokio::test]
async fn test_busy_host_is_skipped() {
    let registry = Arc::new(SessionRegistry::new());
    let connector = Arc::new(ScriptedConnector::new().script("b", finishing_session()));
    let orchestrator = BatchOrchestrator::new(Arc::clone(&registry), connector.clone());

    assert!(registry.try_reserve("a"));
    let batch = orchestrator.start(&hosts(&["a", "b"]), COMMAND, credentials());

    assert_eq!(batch.started_count(), 1);
    assert_eq!(batch.skipped_count(), 1);
    assert_eq!(batch.skipped[0].host, "a");
    assert!(batch.get("b").is_some());
    assert!(batch.get("a").is_none());

    let outcomes = wait_all(batch.sessions.into_values()).await;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].host, "b");
    assert!(outcomes[0].is_success());

    // The skipped host was never touched and is still held by its owner.
    assert_eq!(connector.connect_calls.load(Ordering::SeqCst), 1);
    assert!(registry.is_busy("a"));
    assert!(!registry.is_busy("b"));
}

#[tokio::test]
async fn test_all_hosts_busy_starts_nothing() {
    let registry = Arc::new(SessionRegistry::new());
    let connector = Arc::new(ScriptedConnector::new());
    let orchestrator = BatchOrchestrator::new(Arc::clone(&registry), connector.clone());

    assert!(registry.try_reserve("a"));
    assert!(registry.try_reserve("b"));
    let batch = orchestrator.start(&hosts(&["a", "b"]), COMMAND, credentials());

    assert!(batch.is_empty());
    assert_eq!(batch.skipped_count(), 2);
    assert_eq!(connector.connect_calls.load(Ordering::SeqCst), 0);

    let summary = BatchSummary::new(Vec::new(), batch.skipped);
    assert_eq!(summary.exit_code(), 0);
}

#[tokio::test]
async fn test_repeated_host_started_once() {
    let registry = Arc::new(SessionRegistry::new());
    let connector = Arc::new(ScriptedConnector::new().script("web-1", finishing_session()));
    let orchestrator = BatchOrchestrator::new(Arc::clone(&registry), connector.clone());

    let batch = orchestrator.start(&hosts(&["web-1", "web-1"]), COMMAND, credentials());
    assert_eq!(batch.started_count(), 1);
    assert_eq!(batch.skipped_count(), 0);

    wait_all(batch.sessions.into_values()).await;
    assert_eq!(connector.connect_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_batches_on_same_host() {
    let registry = Arc::new(SessionRegistry::new());
    let connector = Arc::new(
        ScriptedConnector::new().script("web-1", HostScript::Session(vec![Step::Emit(b"$ ")])),
    );
    let first = Arc::new(BatchOrchestrator::new(Arc::clone(&registry), connector.clone()));
    let second = Arc::new(BatchOrchestrator::new(Arc::clone(&registry), connector.clone()));

    let a = {
        let first = Arc::clone(&first);
        tokio::spawn(async move { first.start(&hosts(&["web-1"]), COMMAND, credentials()) })
    };
    let b = {
        let second = Arc::clone(&second);
        tokio::spawn(async move { second.start(&hosts(&["web-1"]), COMMAND, credentials()) })
    };
    let (a, b) = (a.await.unwrap(), b.await.unwrap());

    assert_eq!(a.started_count() + b.started_count(), 1);
    assert_eq!(a.skipped_count() + b.skipped_count(), 1);

    let mut sessions: Vec<_> = a.sessions.into_values().chain(b.sessions.into_values()).collect();
    let mut handle = sessions.pop().unwrap();
    events_until(&mut handle, |e| matches!(e, SessionEvent::Output(_))).await;
    handle.close();
    events_until_terminal(&mut handle).await;
    assert!(!registry.is_busy("web-1"));
}

#[tokio::test]
async fn test_new_batch_after_close() {
    let registry = Arc::new(SessionRegistry::new());
    let connector = Arc::new(
        ScriptedConnector::new().script("web-1", HostScript::Session(vec![Step::Emit(b"$ ")])),
    );
    let orchestrator = BatchOrchestrator::new(Arc::clone(&registry), connector.clone());

    let mut batch = orchestrator.start(&hosts(&["web-1"]), COMMAND, credentials());
    let mut handle = batch.sessions.remove("web-1").unwrap();
    let first_id = handle.session_id();

    // While the first session lives, a second batch skips the host.
    let blocked = orchestrator.start(&hosts(&["web-1"]), COMMAND, credentials());
    assert_eq!(blocked.skipped_count(), 1);

    handle.close();
    events_until_terminal(&mut handle).await;

    let mut again = orchestrator.start(&hosts(&["web-1"]), COMMAND, credentials());
    assert_eq!(again.started_count(), 1);
    let mut second = again.sessions.remove("web-1").unwrap();
    assert_ne!(second.session_id(), first_id);
    events_until(&mut second, |e| matches!(e, SessionEvent::Output(_))).await;
    assert_eq!(
        registry.entry("web-1").map(|e| e.session_id),
        Some(second.session_id())
    );

    second.close();
    events_until_terminal(&mut second).await;
    assert_eq!(connector.connect_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_sessions_progress_independently() {
    let registry = Arc::new(SessionRegistry::new());
    let connector = Arc::new(
        ScriptedConnector::new()
            .script("slow-1", HostScript::Hang)
            .script("web-1", finishing_session())
            .script("db-2", HostScript::Fail(ErrorKind::Auth)),
    );
    let orchestrator = BatchOrchestrator::new(Arc::clone(&registry), connector.clone());

    let mut batch = orchestrator.start(&hosts(&["slow-1", "web-1", "db-2"]), COMMAND, credentials());
    assert_eq!(batch.started_count(), 3);

    // A hanging host does not hold up the others.
    let mut web = batch.sessions.remove("web-1").unwrap();
    let mut db = batch.sessions.remove("db-2").unwrap();
    events_until_terminal(&mut web).await;
    events_until_terminal(&mut db).await;
    assert!(registry.is_busy("slow-1"));
    assert!(!registry.is_busy("web-1"));
    assert!(!registry.is_busy("db-2"));

    let slow = batch.sessions.remove("slow-1").unwrap();
    assert_eq!(slow.state(), SessionState::Connecting);
    slow.close();

    let outcomes = wait_all(vec![slow, web, db]).await;
    let summary = BatchSummary::new(outcomes, Vec::new());
    assert_eq!(summary.outcomes[0].host, "db-2");
    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.exit_code(), 1);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_stream_manager_follows_batch() {
    let registry = Arc::new(SessionRegistry::new());
    let connector = Arc::new(
        ScriptedConnector::new()
            .script("web-1", finishing_session())
            .script("db-2", HostScript::Fail(ErrorKind::Auth)),
    );
    let orchestrator = BatchOrchestrator::new(Arc::clone(&registry), connector);

    let mut batch = orchestrator.start(&hosts(&["web-1", "db-2"]), COMMAND, credentials());
    let mut manager = MultiHostStreamManager::new();
    for (host, handle) in batch.sessions.iter_mut() {
        manager.add_stream(host.clone(), handle.take_events().unwrap());
    }

    let mut lines = Vec::new();
    tokio::time::timeout(EVENT_TIMEOUT, async {
        while !manager.all_complete() {
            manager.poll_all();
            for stream in manager.streams_mut() {
                lines.extend(stream.take_lines());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(manager.total_count(), 2);
    assert_eq!(manager.completed_count(), 2);
    assert_eq!(manager.failed_count(), 1);
    assert!(lines.iter().any(|line| line == "done"));

    let web = manager.get("web-1").unwrap();
    assert_eq!(web.state(), SessionState::Closed);
    let db = manager.get("db-2").unwrap();
    assert_eq!(db.failure().map(|(kind, _)| *kind), Some(ErrorKind::Auth));

    wait_all(batch.sessions.into_values()).await;
}

#[tokio::test]
async fn test_console_shows_prompt_without_newline() {
    let registry = Arc::new(SessionRegistry::new());
    let connector = Arc::new(ScriptedConnector::new().script(
        "web-1",
        HostScript::Session(vec![Step::Emit(b"Do you want to continue? [Y/n] ")]),
    ));
    let orchestrator = BatchOrchestrator::new(Arc::clone(&registry), connector);

    let mut batch = orchestrator.start(&hosts(&["web-1"]), "apt-get upgrade", credentials());
    let mut manager = MultiHostStreamManager::new();
    for (host, handle) in batch.sessions.iter_mut() {
        manager.add_stream(host.clone(), handle.take_events().unwrap());
    }
    let renderer = ConsoleRenderer::new(&["web-1"]).with_colors(false);

    let mut rendered = Vec::new();
    tokio::time::timeout(EVENT_TIMEOUT, async {
        while !rendered.iter().any(|l: &String| l.contains("[Y/n]")) {
            manager.poll_all();
            for stream in manager.streams_mut() {
                rendered.extend(renderer.render_stream(stream));
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("prompt never reached the console");

    assert!(rendered.contains(&"[web-1] Do you want to continue? [Y/n] ".to_string()));

    let handle = batch.sessions.remove("web-1").unwrap();
    handle.close();
    handle.wait().await;
    assert!(!registry.is_busy("web-1"));
}
