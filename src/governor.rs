//! Timeout governor - the process-wide deadline
//!
//! A single deadline observed at every blocking call site (accept, connect,
//! resolution, receive, the relay wait and the child wait). Expiry surfaces
//! as [`MyncError::TimedOut`], which the binary maps to a success exit.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{MyncError, Result};

const DISARMED: u64 = u64::MAX;

/// Cancellation token carrying an optional wall-clock deadline.
///
/// The deadline is stored as milliseconds past a fixed origin so it can be
/// re-armed through a shared reference, the way a process alarm is reset.
#[derive(Debug)]
pub struct TimeoutGovernor {
    origin: Instant,
    deadline_ms: AtomicU64,
}

impl TimeoutGovernor {
    /// Create a governor with no deadline
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            deadline_ms: AtomicU64::new(DISARMED),
        }
    }

    /// Create a governor armed `secs` seconds from now (0 = disabled)
    pub fn with_timeout(secs: u64) -> Self {
        let governor = Self::new();
        governor.arm(secs);
        governor
    }

    /// Replace the deadline with one `secs` seconds from now. Zero disarms.
    pub fn arm(&self, secs: u64) {
        if secs == 0 {
            self.disarm();
            return;
        }
        self.arm_after(Duration::from_secs(secs));
    }

    /// Replace the deadline with one `after` from now.
    ///
    /// A deadline too far out to represent leaves the governor disarmed.
    pub fn arm_after(&self, after: Duration) {
        let offset = Instant::now()
            .checked_add(after)
            .map(|at| at.saturating_duration_since(self.origin).as_millis())
            .and_then(|ms| u64::try_from(ms).ok())
            .filter(|&ms| self.origin.checked_add(Duration::from_millis(ms)).is_some());
        match offset {
            Some(ms) if ms != DISARMED => {
                self.deadline_ms.store(ms, Ordering::SeqCst);
                log::debug!("Deadline armed {}ms from now", after.as_millis());
            }
            _ => {
                self.disarm();
                log::debug!("Deadline {}s out is unrepresentable, running without one", after.as_secs());
            }
        }
    }

    /// Remove any pending deadline
    pub fn disarm(&self) {
        self.deadline_ms.store(DISARMED, Ordering::SeqCst);
    }

    /// Current deadline, if armed
    pub fn deadline(&self) -> Option<Instant> {
        match self.deadline_ms.load(Ordering::SeqCst) {
            DISARMED => None,
            ms => self.origin.checked_add(Duration::from_millis(ms)),
        }
    }

    /// Whether a deadline is pending
    pub fn is_armed(&self) -> bool {
        self.deadline().is_some()
    }

    /// Run `fut` to completion unless the current deadline passes first
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output> {
        match self.deadline() {
            Some(at) => tokio::time::timeout_at(at, fut).await.map_err(|_| {
                log::info!("Deadline expired");
                MyncError::TimedOut
            }),
            None => Ok(fut.await),
        }
    }
}

impl Default for TimeoutGovernor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_disarmed() {
        let governor = TimeoutGovernor::new();
        assert!(!governor.is_armed());
        assert!(governor.deadline().is_none());
    }

    #[test]
    fn test_zero_timeout_is_disabled() {
        let governor = TimeoutGovernor::with_timeout(0);
        assert!(!governor.is_armed());
    }

    #[test]
    fn test_arm_and_disarm() {
        let governor = TimeoutGovernor::with_timeout(5);
        assert!(governor.is_armed());
        governor.arm(0);
        assert!(!governor.is_armed());
    }

    #[test]
    fn test_rearm_replaces_deadline() {
        let governor = TimeoutGovernor::with_timeout(100);
        let first = governor.deadline().unwrap();
        governor.arm(1);
        let second = governor.deadline().unwrap();
        assert!(second < first);
    }

    #[tokio::test]
    async fn test_huge_timeout_runs_without_deadline() {
        let governor = TimeoutGovernor::with_timeout(u64::MAX);
        assert!(!governor.is_armed());

        governor.arm(5);
        governor.arm(u64::MAX);
        assert!(governor.deadline().is_none());

        let value = governor.guard(async { "done" }).await.unwrap();
        assert_eq!(value, "done");
    }

    #[test]
    fn test_large_but_representable_timeout_arms() {
        let governor = TimeoutGovernor::with_timeout(365 * 24 * 3600);
        assert!(governor.is_armed());
    }

    #[tokio::test]
    async fn test_guard_without_deadline_completes() {
        let governor = TimeoutGovernor::new();
        let value = governor.guard(async { 7 }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_guard_expires_pending_future() {
        let governor = TimeoutGovernor::new();
        governor.arm_after(Duration::from_millis(50));
        let result = governor.guard(std::future::pending::<()>()).await;
        assert!(matches!(result, Err(MyncError::TimedOut)));
    }

    #[tokio::test]
    async fn test_guard_finishes_before_deadline() {
        let governor = TimeoutGovernor::with_timeout(10);
        let result = governor
            .guard(tokio::time::sleep(Duration::from_millis(10)))
            .await;
        assert!(result.is_ok());
    }
}
