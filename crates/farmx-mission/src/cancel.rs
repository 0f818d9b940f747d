//! Cooperative cancellation and interruptible mechanical waits.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Cloneable cancellation flag shared between the mission loop and whoever
/// may abort it (signal handler, ground station link).
#[derive(Debug, Clone)]
pub struct CancelToken {
    state: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { state: Arc::new(tx) }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.state.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolves once [`CancelToken::cancel`] has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Returned when a wait was cut short by cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Wait out a mechanical delay (travel, hover, settle, dwell).
///
/// The full `duration` elapses unless `cancel` fires first.
pub async fn hold(duration: Duration, cancel: &CancelToken) -> Result<(), Cancelled> {
    if cancel.is_cancelled() {
        return Err(Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_hold_elapses_full_duration() {
        let cancel = CancelToken::new();
        let start = Instant::now();
        assert_eq!(hold(Duration::from_millis(400), &cancel).await, Ok(()));
        assert_eq!(start.elapsed(), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hold_returns_immediately_when_already_cancelled() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let start = Instant::now();
        assert_eq!(hold(Duration::from_secs(5), &cancel).await, Err(Cancelled));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hold_interrupted_mid_delay() {
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        assert_eq!(hold(Duration::from_secs(2), &cancel).await, Err(Cancelled));
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let cancel = CancelToken::new();
        let clone = cancel.clone();
        assert!(!clone.is_cancelled());
        cancel.cancel();
        cancel.cancel();
        assert!(clone.is_cancelled());
    }
}
