//! Timer service for the face driver loop.
//!
//! Each scheduled entry is a tokio sleep that posts a message back onto
//! the loop when it fires. The returned token aborts the timer when
//! cancelled or dropped, so a record that owns its token can never see
//! a late firing after erasure.

use std::time::Duration;
use tokio::sync::mpsc::WeakUnboundedSender;
use tokio::task::JoinHandle;

/// Schedules delayed messages onto one loop.
#[derive(Debug)]
pub struct Scheduler<M: Send + 'static> {
    tx: WeakUnboundedSender<M>,
}

impl<M: Send + 'static> Scheduler<M> {
    /// Creates a scheduler posting onto `tx`'s channel.
    ///
    /// The scheduler holds only a weak handle: pending timers do not
    /// keep the loop alive, and a timer firing after the loop is gone
    /// is silently discarded.
    pub fn new(tx: WeakUnboundedSender<M>) -> Self {
        Self { tx }
    }

    /// Posts `message` onto the loop after `delay`.
    pub fn schedule(&self, delay: Duration, message: M) -> TimerToken {
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(message);
            }
        });
        TimerToken { handle }
    }
}

/// Cancellation handle for one scheduled message.
///
/// Dropping the token cancels the timer.
#[derive(Debug)]
pub struct TimerToken {
    handle: JoinHandle<()>,
}

impl TimerToken {
    /// Cancels the timer. Idempotent; harmless after the timer fired.
    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl Drop for TimerToken {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scheduler = Scheduler::new(tx.downgrade());
        let _token = scheduler.schedule(Duration::from_millis(50), 7u32);

        tokio::time::sleep(Duration::from_millis(49)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(rx.try_recv().ok(), Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scheduler = Scheduler::new(tx.downgrade());
        let token = scheduler.schedule(Duration::from_millis(50), 7u32);
        token.cancel();
        token.cancel(); // idempotent

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_token_cancels() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scheduler = Scheduler::new(tx.downgrade());
        drop(scheduler.schedule(Duration::from_millis(50), 7u32));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
    }
}
