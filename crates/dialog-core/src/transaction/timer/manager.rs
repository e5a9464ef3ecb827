use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

use super::types::{TimerFired, TimerType};
use crate::transaction::TransactionKey;

struct ArmedTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Owns the sleeping tasks behind every armed transaction timer
///
/// A timer task only carries the transaction key, the timer type and a
/// generation number. When it fires, [`TimerManager::accept`] tells the
/// caller whether that arming is still current; re-armed, cancelled or
/// removed timers are rejected.
pub struct TimerManager {
    fired_tx: mpsc::UnboundedSender<TimerFired>,
    armed: HashMap<(TransactionKey, TimerType), ArmedTimer>,
    next_generation: u64,
}

impl TimerManager {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let manager = TimerManager {
            fired_tx,
            armed: HashMap::new(),
            next_generation: 0,
        };
        (manager, fired_rx)
    }

    /// Arms `timer` for `key`, replacing a previous arming of the same timer
    pub fn schedule(&mut self, key: &TransactionKey, timer: TimerType, delay: Duration) {
        self.next_generation += 1;
        let generation = self.next_generation;

        let fired = TimerFired {
            key: key.clone(),
            timer,
            generation,
        };
        let deadline = Instant::now() + delay;
        let tx = self.fired_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = tx.send(fired);
        });

        trace!(id = %key, %timer, ?delay, generation, "timer armed");
        if let Some(previous) = self
            .armed
            .insert((key.clone(), timer), ArmedTimer { generation, handle })
        {
            previous.handle.abort();
        }
    }

    pub fn cancel(&mut self, key: &TransactionKey, timer: TimerType) {
        if let Some(armed) = self.armed.remove(&(key.clone(), timer)) {
            trace!(id = %key, %timer, "timer cancelled");
            armed.handle.abort();
        }
    }

    /// Cancels every timer belonging to `key`
    pub fn cancel_all(&mut self, key: &TransactionKey) {
        self.armed.retain(|(owner, _), armed| {
            if owner == key {
                armed.handle.abort();
                false
            } else {
                true
            }
        });
    }

    /// Consumes a fired timer; false when it was cancelled or re-armed since
    pub fn accept(&mut self, fired: &TimerFired) -> bool {
        let slot = (fired.key.clone(), fired.timer);
        match self.armed.get(&slot) {
            Some(armed) if armed.generation == fired.generation => {
                self.armed.remove(&slot);
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self, key: &TransactionKey, timer: TimerType) -> bool {
        self.armed.contains_key(&(key.clone(), timer))
    }

    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }

    /// Aborts every timer task
    pub fn shutdown(&mut self) {
        for (_, armed) in self.armed.drain() {
            armed.handle.abort();
        }
    }
}

impl Drop for TimerManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sipflow_sip_core::Method;

    fn key() -> TransactionKey {
        TransactionKey::client("z9hG4bKtimer", Method::Options)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fired_timer_is_accepted_once() {
        let (mut timers, mut rx) = TimerManager::new();
        timers.schedule(&key(), TimerType::E, Duration::from_millis(500));
        assert!(timers.is_armed(&key(), TimerType::E));

        let fired = rx.recv().await.unwrap();
        assert_eq!(fired.timer, TimerType::E);
        assert!(timers.accept(&fired));
        assert!(!timers.accept(&fired));
        assert_eq!(timers.armed_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearmed_timer_rejects_stale_generation() {
        let (mut timers, mut rx) = TimerManager::new();
        timers.schedule(&key(), TimerType::E, Duration::from_millis(10));
        let stale = TimerFired {
            key: key(),
            timer: TimerType::E,
            generation: 1,
        };
        timers.schedule(&key(), TimerType::E, Duration::from_millis(20));
        assert!(!timers.accept(&stale));

        let fired = rx.recv().await.unwrap();
        assert_eq!(fired.generation, 2);
        assert!(timers.accept(&fired));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_stops_delivery() {
        let (mut timers, mut rx) = TimerManager::new();
        timers.schedule(&key(), TimerType::E, Duration::from_millis(10));
        timers.schedule(&key(), TimerType::F, Duration::from_millis(20));
        timers.cancel_all(&key());
        assert_eq!(timers.armed_count(), 0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
    }
}
