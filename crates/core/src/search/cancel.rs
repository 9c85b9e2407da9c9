use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{ComposeError, Result};

/// Cooperative stop signal for a decode call, checked once per step.
///
/// Clones share the flag, so a caller can keep one handle and cancel a
/// search running on another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that also expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Error if cancelled or past the deadline.
    pub fn check(&self, step: usize) -> Result<()> {
        if self.is_cancelled() {
            return Err(ComposeError::Cancelled { step });
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(ComposeError::DeadlineExceeded { step });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_passes() {
        assert!(CancelToken::new().check(0).is_ok());
        assert!(CancelToken::with_timeout(Duration::from_secs(60))
            .check(0)
            .is_ok());
    }

    #[test]
    fn cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let handle = token.clone();
        handle.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(
            token.check(2),
            Err(ComposeError::Cancelled { step: 2 })
        ));
    }

    #[test]
    fn expired_deadline_fails() {
        let token = CancelToken::with_timeout(Duration::ZERO);
        assert!(matches!(
            token.check(1),
            Err(ComposeError::DeadlineExceeded { step: 1 })
        ));
    }
}
