//! Relay integration tests.
//!
//! These run real `/bin/sh` shells with short timeouts and cooldowns.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use shell_relay::{
    ExecutionError, FsTicketStore, MemoryTicketStore, SessionId, SessionRegistry,
    ShellOptions, ShellRelay, ShellRelayError, TicketStore,
};
use tempfile::TempDir;

fn options() -> ShellOptions {
    ShellOptions::default()
        .with_program("/bin/sh")
        .with_command_timeout(Duration::from_secs(10))
}

fn memory_relay(options: ShellOptions) -> ShellRelay {
    ShellRelay::new(
        SessionRegistry::new(options),
        Arc::new(MemoryTicketStore::new()),
    )
}

fn canonical(path: impl AsRef<Path>) -> PathBuf {
    path.as_ref().canonicalize().unwrap()
}

// ============================================================================
// Duplicate-Submission Cache
// ============================================================================

#[tokio::test]
async fn test_duplicate_within_cooldown_is_not_reexecuted() {
    let relay = memory_relay(options().with_duplicate_cooldown(Duration::from_millis(400)));
    let bump = "n=$((n+1)); echo $n";

    let first = relay.execute("counter", bump).await.unwrap();
    let second = relay.execute("counter", bump).await.unwrap();
    assert_eq!(first.output, "1");
    assert!(!first.cached);
    assert_eq!(second.output, "1");
    assert!(second.cached);

    tokio::time::sleep(Duration::from_millis(500)).await;

    let third = relay.execute("counter", bump).await.unwrap();
    assert_eq!(third.output, "2");
    assert!(!third.cached);
}

#[tokio::test]
async fn test_cached_output_ignores_outside_changes() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("value.txt");
    std::fs::write(&file, "one").unwrap();

    let relay = memory_relay(options());
    let cmd = format!("cat '{}'", file.display());

    assert_eq!(relay.execute("reader", &cmd).await.unwrap().output, "one");
    std::fs::write(&file, "two").unwrap();

    let again = relay.execute("reader", &cmd).await.unwrap();
    assert!(again.cached);
    assert_eq!(again.output, "one");
}

#[tokio::test]
async fn test_different_command_is_not_a_duplicate() {
    let relay = memory_relay(options());
    relay.execute("s", "echo a").await.unwrap();
    let b = relay.execute("s", "echo b").await.unwrap();
    let a = relay.execute("s", "echo a").await.unwrap();

    assert!(!b.cached);
    assert!(!a.cached);
}

// ============================================================================
// Sessions
// ============================================================================

#[tokio::test]
async fn test_state_persists_within_session_and_is_isolated() {
    let dir = TempDir::new().unwrap();
    let relay = memory_relay(options());

    relay
        .execute("alpha", &format!("cd '{}'", dir.path().display()))
        .await
        .unwrap();
    relay.execute("alpha", "export MARK=alpha").await.unwrap();

    let alpha_pwd = relay.execute("alpha", "pwd").await.unwrap();
    assert_eq!(canonical(&alpha_pwd.output), canonical(dir.path()));
    assert_eq!(
        relay.execute("alpha", "echo $MARK").await.unwrap().output,
        "alpha"
    );

    let beta_pwd = relay.execute("beta", "pwd").await.unwrap();
    assert_ne!(canonical(&beta_pwd.output), canonical(dir.path()));
    assert_eq!(relay.execute("beta", "echo \"[$MARK]\"").await.unwrap().output, "[]");

    assert_eq!(relay.registry().len(), 2);
}

#[tokio::test]
async fn test_concurrent_first_use_shares_one_shell() {
    let relay = Arc::new(memory_relay(options()));
    let mut handles = Vec::new();
    for i in 0..6 {
        let relay = Arc::clone(&relay);
        handles.push(tokio::spawn(async move {
            relay
                .execute("shared", &format!("echo $$ # {}", i))
                .await
                .unwrap()
                .output
        }));
    }

    let mut pids = Vec::new();
    for handle in handles {
        pids.push(handle.await.unwrap());
    }
    pids.dedup();
    assert_eq!(pids.len(), 1, "commands ran in different shells: {:?}", pids);
    assert_eq!(relay.registry().len(), 1);
}

#[tokio::test]
async fn test_commands_in_one_session_do_not_interleave() {
    let relay = Arc::new(memory_relay(options()));
    relay.execute("serial", "true").await.unwrap();

    let slow = {
        let relay = Arc::clone(&relay);
        tokio::spawn(async move { relay.execute("serial", "sleep 1; echo A").await.unwrap() })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let fast_started = Instant::now();
    let fast = relay.execute("serial", "echo B").await.unwrap();

    // The second command waited for the first to release the shell.
    assert!(fast_started.elapsed() >= Duration::from_millis(700));
    assert_eq!(fast.output, "B");
    assert_eq!(slow.await.unwrap().output, "A");
}

#[tokio::test]
async fn test_exited_shell_is_recycled() {
    let relay = memory_relay(options());
    relay.execute("phoenix", "export GONE=yes").await.unwrap();

    let err = relay.execute("phoenix", "exit 3").await.unwrap_err();
    assert!(matches!(
        err,
        ShellRelayError::Execution(ExecutionError::ReadFailed(_))
    ));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let out = relay.execute("phoenix", "echo \"[$GONE]\"").await.unwrap();
    assert_eq!(out.output, "[]");
}

// ============================================================================
// Output
// ============================================================================

#[tokio::test]
async fn test_output_shapes() {
    let relay = memory_relay(options());

    assert_eq!(relay.execute("o", "printf abc").await.unwrap().output, "abc");
    assert_eq!(
        relay.execute("o", "printf 'a\\nb\\n\\n'").await.unwrap().output,
        "a\nb"
    );
    assert_eq!(relay.execute("o", "true").await.unwrap().output, "");

    let merged = relay.execute("o", "echo out; echo err >&2").await.unwrap();
    assert!(merged.output.contains("out"));
    assert!(merged.output.contains("err"));

    let commented = relay.execute("o", "echo kept # trailing comment").await.unwrap();
    assert_eq!(commented.output, "kept");
}

#[tokio::test]
async fn test_failing_command_still_returns_output() {
    let relay = memory_relay(options());
    let out = relay
        .execute("f", "ls /definitely/not/here")
        .await
        .unwrap();
    assert!(!out.output.is_empty());

    assert_eq!(relay.execute("f", "echo after").await.unwrap().output, "after");
}

// ============================================================================
// Timeouts
// ============================================================================

#[tokio::test]
async fn test_timeout_is_reported_and_replayed() {
    let relay = memory_relay(options().with_command_timeout(Duration::from_millis(500)));

    let started = Instant::now();
    let err = relay.execute("slow", "sleep 5").await.unwrap_err();
    assert!(matches!(
        err,
        ShellRelayError::Execution(ExecutionError::Timeout(_))
    ));
    assert!(started.elapsed() < Duration::from_secs(3));

    // The repeat is answered from cache instead of queueing behind the sleep.
    let started = Instant::now();
    let err = relay.execute("slow", "sleep 5").await.unwrap_err();
    assert!(matches!(
        err,
        ShellRelayError::Execution(ExecutionError::Timeout(_))
    ));
    assert!(started.elapsed() < Duration::from_millis(200));

    let record = relay.ticket("slow", 1).await.unwrap();
    assert!(record.output.is_empty());
    assert!(record.error.unwrap().contains("timed out"));
}

// ============================================================================
// Tickets
// ============================================================================

#[tokio::test]
async fn test_tickets_are_numbered_and_persisted() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FsTicketStore::init(dir.path().join("sessions")).unwrap());
    let relay = ShellRelay::new(SessionRegistry::new(options()), store.clone());

    let mut tickets = Vec::new();
    for cmd in ["echo one", "echo two", "echo three"] {
        tickets.push(relay.execute("numbered", cmd).await.unwrap().ticket);
    }
    assert_eq!(tickets, vec![Some(1), Some(2), Some(3)]);

    let cached = relay.execute("numbered", "echo three").await.unwrap();
    assert_eq!(cached.ticket, None);

    let session_dir = dir.path().join("sessions").join("numbered");
    for name in ["01.ticket", "02.ticket", "03.ticket"] {
        assert!(session_dir.join(name).is_file(), "missing {}", name);
    }
    assert!(!session_dir.join("04.ticket").exists());

    let history = relay.history("numbered").await.unwrap();
    let outputs: Vec<_> = history.iter().map(|r| r.output.as_str()).collect();
    assert_eq!(outputs, vec!["one", "two", "three"]);

    let id = SessionId::new("numbered").unwrap();
    assert_eq!(store.next_ticket(&id).unwrap(), 4);
}

#[tokio::test]
async fn test_ticket_order_matches_execution_order() {
    let relay = Arc::new(memory_relay(options()));
    let mut handles = Vec::new();
    for i in 0..20 {
        let relay = Arc::clone(&relay);
        handles.push(tokio::spawn(async move {
            relay
                .execute("ordered", &format!("n=$((n+1)); echo $n # {}", i))
                .await
                .unwrap()
        }));
    }

    for handle in handles {
        let out = handle.await.unwrap();
        assert_eq!(out.ticket.map(|t| t.to_string()), Some(out.output));
    }
}

#[tokio::test]
async fn test_numbering_continues_after_restart() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("sessions");

    {
        let store = Arc::new(FsTicketStore::init(&root).unwrap());
        let relay = ShellRelay::new(SessionRegistry::new(options()), store);
        relay.execute("durable", "echo first").await.unwrap();
    }

    let store = Arc::new(FsTicketStore::init(&root).unwrap());
    let relay = ShellRelay::new(SessionRegistry::new(options()), store);
    let out = relay.execute("durable", "echo second").await.unwrap();
    assert_eq!(out.ticket, Some(2));
}

#[tokio::test]
async fn test_unknown_session_without_auto_create() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FsTicketStore::init(dir.path()).unwrap());
    let relay =
        ShellRelay::new(SessionRegistry::new(options()), store).with_auto_create(false);

    let err = relay.execute("stranger", "echo hi").await.unwrap_err();
    assert!(matches!(err, ShellRelayError::SessionUnknown(_)));
    assert!(relay.registry().is_empty());

    std::fs::create_dir(dir.path().join("stranger")).unwrap();
    assert_eq!(relay.execute("stranger", "echo hi").await.unwrap().output, "hi");
}
