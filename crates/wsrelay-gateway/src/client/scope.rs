//! Per-write cancellation scope.
//!
//! A `WriteScope` ends when its parent token is cancelled or its deadline
//! passes, whichever comes first. Both end its child token, so nested work
//! holding [`WriteScope::token`] sees the deadline too. Dropping the scope
//! cancels the child token and stops the deadline timer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use wsrelay_core::error::RelayError;

/// Why a scope ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeEnd {
    /// The parent token (or the scope itself) was cancelled.
    Cancelled,
    /// The deadline elapsed.
    DeadlineElapsed,
}

#[derive(Debug)]
pub struct WriteScope {
    token: CancellationToken,
    deadline: Instant,
    timeout: Duration,
    expired: Arc<AtomicBool>,
    timer: JoinHandle<()>,
}

impl WriteScope {
    /// Derive a scope from `parent` that also ends after `timeout`.
    ///
    /// Must be called inside a tokio runtime: the deadline is enforced by a
    /// timer task that cancels the child token.
    pub fn new(parent: &CancellationToken, timeout: Duration) -> Self {
        let token = parent.child_token();
        let deadline = Instant::now() + timeout;
        let expired = Arc::new(AtomicBool::new(false));

        let timer = tokio::spawn({
            let token = token.clone();
            let expired = Arc::clone(&expired);
            async move {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {}
                    _ = sleep_until(deadline) => {
                        expired.store(true, Ordering::Release);
                        token.cancel();
                    }
                }
            }
        });

        Self {
            token,
            deadline,
            timeout,
            expired,
            timer,
        }
    }

    /// Token endpoints can hand to nested work. Cancelled when the parent is
    /// cancelled, the deadline passes, or the scope is dropped.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Non-blocking check.
    pub fn ended(&self) -> Option<ScopeEnd> {
        if self.expired.load(Ordering::Acquire) {
            Some(ScopeEnd::DeadlineElapsed)
        } else if self.token.is_cancelled() {
            Some(ScopeEnd::Cancelled)
        } else if Instant::now() >= self.deadline {
            Some(ScopeEnd::DeadlineElapsed)
        } else {
            None
        }
    }

    /// Resolves once the scope ends.
    pub async fn done(&self) -> ScopeEnd {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => self.ended().unwrap_or(ScopeEnd::Cancelled),
            _ = sleep_until(self.deadline) => ScopeEnd::DeadlineElapsed,
        }
    }

    /// Error a write interrupted by `end` reports.
    pub fn error(&self, end: ScopeEnd) -> RelayError {
        match end {
            ScopeEnd::Cancelled => RelayError::Cancelled,
            ScopeEnd::DeadlineElapsed => RelayError::WriteTimeout(self.timeout),
        }
    }
}

impl Drop for WriteScope {
    fn drop(&mut self) {
        self.timer.abort();
        self.token.cancel();
    }
}
