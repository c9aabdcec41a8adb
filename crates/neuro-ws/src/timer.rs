//! Named one-shot timers for the session actor.
//!
//! Each [`TimerKind`] has at most one pending deadline. Arming a kind that is
//! already pending replaces the previous deadline.

use std::collections::HashMap;
use std::future::poll_fn;
use std::task::Poll;
use std::time::Duration;

use tokio_util::time::{delay_queue, DelayQueue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Debounce before the first socket is opened.
    Create,
    /// Periodic PING while open.
    Heartbeat,
    /// Backoff before reopening after a close.
    Reconnect,
    /// Grace period before tearing the socket down.
    Close,
}

impl TimerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerKind::Create => "create",
            TimerKind::Heartbeat => "heartbeat",
            TimerKind::Reconnect => "reconnect",
            TimerKind::Close => "close",
        }
    }
}

#[derive(Default)]
pub struct TimerSlots {
    queue: DelayQueue<TimerKind>,
    keys: HashMap<TimerKind, delay_queue::Key>,
}

impl TimerSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `kind` to fire after `delay`, replacing any pending deadline.
    pub fn arm(&mut self, kind: TimerKind, delay: Duration) {
        if let Some(key) = self.keys.get(&kind) {
            self.queue.reset(key, delay);
            return;
        }
        let key = self.queue.insert(kind, delay);
        self.keys.insert(kind, key);
    }

    /// Arm `kind` only when it is not already pending. Returns whether it was armed.
    pub fn arm_if_idle(&mut self, kind: TimerKind, delay: Duration) -> bool {
        if self.is_armed(kind) {
            return false;
        }
        self.arm(kind, delay);
        true
    }

    /// Cancel `kind`. Returns whether a deadline was pending.
    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        match self.keys.remove(&kind) {
            Some(key) => {
                self.queue.remove(&key);
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.keys.contains_key(&kind)
    }

    pub fn cancel_all(&mut self) {
        self.queue.clear();
        self.keys.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Wait for the next deadline. Pends while nothing is armed; arming a
    /// timer wakes the waiting task.
    pub async fn next_expired(&mut self) -> TimerKind {
        let expired = poll_fn(|cx| match self.queue.poll_expired(cx) {
            Poll::Ready(Some(expired)) => Poll::Ready(expired),
            Poll::Ready(None) | Poll::Pending => Poll::Pending,
        })
        .await;
        let kind = expired.into_inner();
        self.keys.remove(&kind);
        kind
    }
}

impl std::fmt::Debug for TimerSlots {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut armed: Vec<&'static str> = self.keys.keys().map(TimerKind::as_str).collect();
        armed.sort_unstable();
        f.debug_struct("TimerSlots").field("armed", &armed).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fires_in_deadline_order() {
        let mut timers = TimerSlots::new();
        timers.arm(TimerKind::Close, Duration::from_millis(500));
        timers.arm(TimerKind::Create, Duration::from_millis(50));

        assert_eq!(timers.next_expired().await, TimerKind::Create);
        assert!(!timers.is_armed(TimerKind::Create));
        assert_eq!(timers.next_expired().await, TimerKind::Close);
        assert!(timers.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_deadline() {
        let mut timers = TimerSlots::new();
        timers.arm(TimerKind::Reconnect, Duration::from_millis(100));
        timers.arm(TimerKind::Heartbeat, Duration::from_millis(300));
        timers.arm(TimerKind::Reconnect, Duration::from_millis(1000));

        assert_eq!(timers.next_expired().await, TimerKind::Heartbeat);
        assert_eq!(timers.next_expired().await, TimerKind::Reconnect);
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_if_idle_keeps_existing() {
        let mut timers = TimerSlots::new();
        assert!(timers.arm_if_idle(TimerKind::Reconnect, Duration::from_millis(100)));
        assert!(!timers.arm_if_idle(TimerKind::Reconnect, Duration::from_millis(5000)));

        let start = tokio::time::Instant::now();
        assert_eq!(timers.next_expired().await, TimerKind::Reconnect);
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_fire() {
        let mut timers = TimerSlots::new();
        timers.arm(TimerKind::Create, Duration::from_millis(50));
        timers.arm(TimerKind::Close, Duration::from_millis(80));
        assert!(timers.cancel(TimerKind::Create));
        assert!(!timers.cancel(TimerKind::Create));

        assert_eq!(timers.next_expired().await, TimerKind::Close);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_queue_pends() {
        let mut timers = TimerSlots::new();
        timers.arm(TimerKind::Create, Duration::from_millis(10));
        timers.cancel_all();

        let waited =
            tokio::time::timeout(Duration::from_secs(5), timers.next_expired()).await;
        assert!(waited.is_err());
    }
}
