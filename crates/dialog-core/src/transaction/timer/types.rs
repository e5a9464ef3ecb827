use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::duration_ms;
use crate::transaction::TransactionKey;

/// RFC 3261 transaction timers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerType {
    /// INVITE request retransmit
    A,
    /// INVITE client timeout
    B,
    /// INVITE client linger in Completed
    D,
    /// Non-INVITE request retransmit
    E,
    /// Non-INVITE client timeout
    F,
    /// INVITE server non-2xx retransmit
    G,
    /// INVITE server wait for ACK
    H,
    /// INVITE server linger in Confirmed
    I,
    /// Non-INVITE server linger in Completed
    J,
    /// Non-INVITE client linger in Completed
    K,
    /// INVITE server linger in Accepted
    L,
    /// INVITE client linger in Accepted
    M,
}

impl fmt::Display for TimerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Base timer values; every transaction timer is derived from these
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerSettings {
    /// RTT estimate
    #[serde(with = "duration_ms")]
    pub t1: Duration,
    /// Retransmit interval cap for non-INVITE requests and INVITE responses
    #[serde(with = "duration_ms")]
    pub t2: Duration,
    /// Maximum time a message stays in the network
    #[serde(with = "duration_ms")]
    pub t4: Duration,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            t1: Duration::from_millis(500),
            t2: Duration::from_secs(4),
            t4: Duration::from_secs(5),
        }
    }
}

// Timer D lower bound on unreliable transports
const TIMER_D_MIN: Duration = Duration::from_secs(32);

impl TimerSettings {
    /// 64*T1, shared by timers B, F, H, J, L and M
    pub fn transaction_timeout(&self) -> Duration {
        self.t1 * 64
    }

    /// Initial value of `timer`; linger timers return their unreliable value
    pub fn initial(&self, timer: TimerType) -> Duration {
        match timer {
            TimerType::A | TimerType::E | TimerType::G => self.t1,
            TimerType::B
            | TimerType::F
            | TimerType::H
            | TimerType::J
            | TimerType::L
            | TimerType::M => self.transaction_timeout(),
            TimerType::D => TIMER_D_MIN.max(self.transaction_timeout()),
            TimerType::I | TimerType::K => self.t4,
        }
    }

    /// Next interval of a doubling retransmission timer, capped at T2
    pub fn backoff(&self, current: Duration) -> Duration {
        (current * 2).min(self.t2)
    }
}

/// Message posted by a timer task when it fires
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerFired {
    pub key: TransactionKey,
    pub timer: TimerType,
    /// Arming generation; stale generations are ignored
    pub generation: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_durations() {
        let settings = TimerSettings::default();
        assert_eq!(settings.initial(TimerType::A), Duration::from_millis(500));
        assert_eq!(settings.initial(TimerType::B), Duration::from_secs(32));
        assert_eq!(settings.initial(TimerType::F), Duration::from_secs(32));
        assert_eq!(settings.initial(TimerType::D), Duration::from_secs(32));
        assert_eq!(settings.initial(TimerType::K), Duration::from_secs(5));
        assert_eq!(settings.initial(TimerType::I), Duration::from_secs(5));
    }

    #[test]
    fn test_backoff_caps_at_t2() {
        let settings = TimerSettings::default();
        let mut interval = settings.t1;
        let mut seen = Vec::new();
        for _ in 0..5 {
            interval = settings.backoff(interval);
            seen.push(interval.as_millis());
        }
        assert_eq!(seen, vec![1000, 2000, 4000, 4000, 4000]);
    }

    #[test]
    fn test_timer_d_has_floor() {
        let fast = TimerSettings {
            t1: Duration::from_millis(100),
            ..TimerSettings::default()
        };
        assert_eq!(fast.initial(TimerType::D), Duration::from_secs(32));
        assert_eq!(fast.initial(TimerType::B), Duration::from_millis(6400));
    }
}
