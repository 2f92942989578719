//! Process launcher - runs a command with the session's descriptors as its stdio.
//!
//! A configured input endpoint becomes the child's stdin and a configured
//! output endpoint its stdout; unconfigured sides are inherited. The parent's
//! copies of the socket descriptors are closed as soon as the child is
//! spawned, and the parent waits for the child under the timeout governor.

use std::fmt;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};

use crate::command::Command;
use crate::error::{MyncError, Result};
use crate::governor::TimeoutGovernor;
use crate::session::DescriptorPair;

/// How the launched command ended. Advisory only: it never changes the
/// parent's own exit status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildStatus {
    Exited(i32),
    Signaled(i32),
    FailedToStart(String),
}

impl ChildStatus {
    pub fn success(&self) -> bool {
        matches!(self, ChildStatus::Exited(0))
    }
}

impl From<ExitStatus> for ChildStatus {
    fn from(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(code), _) => ChildStatus::Exited(code),
            (None, Some(signal)) => ChildStatus::Signaled(signal),
            (None, None) => ChildStatus::Exited(-1),
        }
    }
}

impl fmt::Display for ChildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildStatus::Exited(code) => write!(f, "child exited with status {}", code),
            ChildStatus::Signaled(signal) => write!(f, "child killed by signal {}", signal),
            ChildStatus::FailedToStart(reason) => write!(f, "command failed to start: {}", reason),
        }
    }
}

/// Convert the pair into the child's stdin/stdout. On failure every
/// descriptor converted so far is dropped, and so closed.
pub fn redirect(pair: DescriptorPair) -> Result<(Stdio, Stdio)> {
    match pair {
        DescriptorPair::Split { input, output } => {
            let stdin = match input {
                Some(endpoint) => Stdio::from(
                    endpoint
                        .into_owned_fd()
                        .map_err(MyncError::io("duplicate input descriptor"))?,
                ),
                None => Stdio::inherit(),
            };
            let stdout = match output {
                Some(endpoint) => Stdio::from(
                    endpoint
                        .into_owned_fd()
                        .map_err(MyncError::io("duplicate output descriptor"))?,
                ),
                None => Stdio::inherit(),
            };
            Ok((stdin, stdout))
        }
        DescriptorPair::Shared(endpoint) => {
            let fd = endpoint
                .into_owned_fd()
                .map_err(MyncError::io("duplicate input descriptor"))?;
            let copy = fd.try_clone().map_err(MyncError::io("duplicate output descriptor"))?;
            Ok((Stdio::from(fd), Stdio::from(copy)))
        }
    }
}

/// Spawn `command` on the pair and wait for it.
///
/// A command that cannot be started is reported, not propagated. If the
/// governor's deadline passes first the child is killed and `TimedOut` is
/// returned.
pub async fn launch(command: &Command, pair: DescriptorPair, governor: &TimeoutGovernor) -> Result<ChildStatus> {
    let (stdin, stdout) = redirect(pair)?;

    let mut process = command.to_process();
    process.stdin(stdin).stdout(stdout).kill_on_drop(true);

    log::info!("Executing command: {}", command);
    let spawned = process.spawn();
    // Closes the parent's copies of the redirected descriptors
    drop(process);

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            log::error!("Error executing command '{}': {}", command, e);
            return Ok(ChildStatus::FailedToStart(e.to_string()));
        }
    };

    let status = governor
        .guard(child.wait())
        .await?
        .map_err(MyncError::io("wait for child"))?;
    let status = ChildStatus::from(status);
    log::info!("{}", status);
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Endpoint;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixStream;

    #[test]
    fn test_child_status_display() {
        assert_eq!(ChildStatus::Exited(0).to_string(), "child exited with status 0");
        assert_eq!(ChildStatus::Signaled(9).to_string(), "child killed by signal 9");
        assert!(ChildStatus::Exited(0).success());
        assert!(!ChildStatus::Exited(2).success());
    }

    #[tokio::test]
    async fn test_launch_shared_socket_as_stdio() {
        let (local, mut peer) = UnixStream::pair().unwrap();
        let governor = TimeoutGovernor::with_timeout(10);
        let command = Command::parse("cat").unwrap();

        peer.write_all(b"echo through cat").await.unwrap();
        peer.shutdown().await.unwrap();

        let pair = DescriptorPair::shared(Endpoint::UnixStream(local));
        let status = launch(&command, pair, &governor).await.unwrap();
        assert_eq!(status, ChildStatus::Exited(0));

        let mut echoed = Vec::new();
        peer.read_to_end(&mut echoed).await.unwrap();
        assert_eq!(echoed, b"echo through cat");
    }

    #[tokio::test]
    async fn test_missing_program_is_reported_not_fatal() {
        let governor = TimeoutGovernor::new();
        let command = Command::parse("/nonexistent/mync-no-such-program").unwrap();
        let status = launch(&command, DescriptorPair::stdio(), &governor).await.unwrap();
        assert!(matches!(status, ChildStatus::FailedToStart(_)));
    }

    #[tokio::test]
    async fn test_nonzero_exit_reported() {
        let governor = TimeoutGovernor::new();
        let command = Command::parse("false").unwrap();
        let status = launch(&command, DescriptorPair::stdio(), &governor).await.unwrap();
        assert_eq!(status, ChildStatus::Exited(1));
    }

    #[tokio::test]
    async fn test_deadline_kills_child() {
        let governor = TimeoutGovernor::new();
        governor.arm_after(Duration::from_millis(100));
        let command = Command::parse("sleep 30").unwrap();
        let err = launch(&command, DescriptorPair::stdio(), &governor).await.unwrap_err();
        assert!(err.is_timeout());
    }
}
