//! Command launch integration tests
//!
//! Sockets become the child's stdin/stdout; the parent only waits.

use std::path::Path;
use std::time::Duration;

use mync::error::MyncError;
use mync::launcher::ChildStatus;
use mync::session::{Outcome, SessionConfig};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

async fn connect_when_ready(path: &Path) -> UnixStream {
    for _ in 0..200 {
        if let Ok(stream) = UnixStream::connect(path).await {
            return stream;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("socket {} never became ready", path.display());
}

async fn run_session(config: &SessionConfig) -> mync::Result<Outcome> {
    let plan = config.plan()?;
    let governor = plan.governor();
    let session = plan.open(&governor).await?;
    session.run_with(&governor, tokio::io::empty(), tokio::io::sink()).await
}

/// Integration test: a bidirectional Unix stream socket drives `cat` as stdin and stdout
#[tokio::test]
async fn test_cat_over_shared_unix_socket() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("both.sock");
    let config = SessionConfig {
        both: Some(format!("UDSSS{}", path.display())),
        command: Some("cat".to_string()),
        timeout_secs: 10,
        ..Default::default()
    };

    let peer = async {
        let mut stream = connect_when_ready(&path).await;
        stream.write_all(b"round trip through a child").await.unwrap();
        stream.shutdown().await.unwrap();
        let mut echoed = Vec::new();
        stream.read_to_end(&mut echoed).await.unwrap();
        echoed
    };

    let (outcome, echoed) = tokio::join!(run_session(&config), peer);
    assert_eq!(echoed, b"round trip through a child");
    assert_eq!(outcome.unwrap(), Outcome::Launched(ChildStatus::Exited(0)));
}

/// Integration test: split input and output sockets feed `tr` and collect its output
#[tokio::test]
async fn test_split_sockets_as_child_stdio() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.sock");
    let output = dir.path().join("out.sock");
    let config = SessionConfig {
        input: Some(format!("UDSSS{}", input.display())),
        output: Some(format!("UDSSS{}", output.display())),
        command: Some("tr a-z A-Z".to_string()),
        timeout_secs: 10,
        ..Default::default()
    };

    let peers = async {
        // Input is opened first, so the output server exists only after this connect
        let mut writer = connect_when_ready(&input).await;
        let mut reader = connect_when_ready(&output).await;
        writer.write_all(b"shout this").await.unwrap();
        drop(writer);
        let mut got = Vec::new();
        reader.read_to_end(&mut got).await.unwrap();
        got
    };

    let (outcome, got) = tokio::join!(run_session(&config), peers);
    assert_eq!(got, b"SHOUT THIS");
    assert!(matches!(outcome.unwrap(), Outcome::Launched(status) if status.success()));
}

/// Integration test: a missing program is reported as the child's failure, not the session's
#[tokio::test]
async fn test_missing_program_is_not_fatal() {
    let config = SessionConfig {
        command: Some("/nonexistent/program --flag".to_string()),
        ..Default::default()
    };
    let outcome = run_session(&config).await.unwrap();
    assert!(matches!(outcome, Outcome::Launched(ChildStatus::FailedToStart(_))));
}

/// Integration test: the deadline kills a long-running child
#[tokio::test]
async fn test_timeout_kills_child() {
    let config = SessionConfig {
        command: Some("sleep 30".to_string()),
        timeout_secs: 1,
        ..Default::default()
    };
    let started = tokio::time::Instant::now();
    let err = run_session(&config).await.unwrap_err();
    assert!(matches!(err, MyncError::TimedOut));
    assert!(started.elapsed() < Duration::from_secs(10));
}

/// Integration test: a timeout too large to schedule behaves as no timeout
#[tokio::test]
async fn test_huge_timeout_does_not_abort_session() {
    let config = SessionConfig {
        command: Some("true".to_string()),
        timeout_secs: u64::MAX,
        ..Default::default()
    };
    let outcome = run_session(&config).await.unwrap();
    assert_eq!(outcome, Outcome::Launched(ChildStatus::Exited(0)));
}
