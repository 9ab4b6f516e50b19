//! Cooperative cancellation for traversals and constructors.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::{Result, TreeError};

/// A cancellation signal with an optional deadline.
///
/// Cloning shares the underlying signal: cancelling any clone cancels all of
/// them. Iterators and builders call [`check`](Self::check) before producing
/// each element.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// Create a token that never fires unless cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing `tokio-util` token, e.g. one owned by a host runtime.
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Attach an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attach a deadline relative to now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Create a child token: cancelling the parent cancels the child, not the
    /// other way round. The deadline is inherited.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Fire the signal.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns `true` if the token was cancelled or its deadline passed.
    pub fn is_cancelled(&self) -> bool {
        self.check().is_err()
    }

    /// Returns the cancellation condition, if any.
    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(TreeError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(TreeError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_token_passes() {
        assert!(CancelToken::new().check().is_ok());
    }

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        token.cancel();
        assert!(matches!(clone.check(), Err(TreeError::Cancelled)));
    }

    #[test]
    fn test_expired_deadline() {
        let token = CancelToken::new().with_deadline(Instant::now() - Duration::from_millis(1));
        assert!(matches!(token.check(), Err(TreeError::DeadlineExceeded)));
    }

    #[test]
    fn test_child_follows_parent() {
        let parent = CancelToken::new();
        let child = parent.child();
        child.cancel();
        assert!(parent.check().is_ok());

        let child = parent.child();
        parent.cancel();
        assert!(child.is_cancelled());
    }
}
