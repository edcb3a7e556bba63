use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Delay policy for reconnect attempts.
///
/// Implement this trait to plug in a custom backoff.
pub trait ReconnectPolicy: fmt::Debug + Send + Sync {
    /// Delay before retry number `attempt` (0-indexed).
    ///
    /// # Returns
    /// * `Some(duration)` - Wait this long, then try again
    /// * `None` - Stop reconnecting
    fn next_delay(&self, attempt: usize) -> Option<Duration>;
}

/// Retry on a fixed period. The default policy: every second, forever.
#[derive(Debug, Clone)]
pub struct FixedInterval {
    interval: Duration,
    max_attempts: Option<usize>,
}

impl FixedInterval {
    pub fn new(interval: Duration, max_attempts: Option<usize>) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }
}

impl Default for FixedInterval {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), None)
    }
}

impl ReconnectPolicy for FixedInterval {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| attempt >= max) {
            return None;
        }
        Some(self.interval)
    }
}

/// Exponential backoff: `initial * 2^attempt`, capped at `max`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    max_attempts: Option<usize>,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration, max_attempts: Option<usize>) -> Self {
        Self {
            initial,
            max,
            max_attempts,
        }
    }
}

impl ReconnectPolicy for ExponentialBackoff {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| attempt >= max) {
            return None;
        }
        let factor = 1u32.checked_shl(attempt.min(31) as u32).unwrap_or(u32::MAX);
        let delay = self.initial.saturating_mul(factor);
        Some(delay.min(self.max))
    }
}

/// Never reconnect.
#[derive(Debug, Clone, Copy)]
pub struct NeverReconnect;

impl ReconnectPolicy for NeverReconnect {
    fn next_delay(&self, _attempt: usize) -> Option<Duration> {
        None
    }
}

/// Bookkeeping for reconnect attempts.
///
/// The connection task asks [`ReconnectSupervisor::deadline`] when the next
/// attempt is due and reports outcomes back. At most one attempt is in
/// flight: a due timer is ignored while an attempt runs or a transport is
/// open.
#[derive(Debug)]
pub struct ReconnectSupervisor {
    policy: Arc<dyn ReconnectPolicy>,
    attempt: usize,
    deadline: Option<Instant>,
    in_flight: bool,
}

impl ReconnectSupervisor {
    pub fn new(policy: Arc<dyn ReconnectPolicy>) -> Self {
        Self {
            policy,
            attempt: 0,
            deadline: None,
            in_flight: false,
        }
    }

    /// When the next attempt is due, if one is scheduled.
    pub fn deadline(&self) -> Option<Instant> {
        if self.in_flight { None } else { self.deadline }
    }

    /// Number of retries scheduled since the last successful session.
    pub fn attempt(&self) -> usize {
        self.attempt
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Schedule the next retry after a failure. Returns `false` when the
    /// policy gives up.
    pub fn schedule(&mut self) -> bool {
        self.in_flight = false;
        match self.policy.next_delay(self.attempt) {
            Some(delay) => {
                self.deadline = Some(Instant::now() + delay);
                true
            }
            None => {
                self.deadline = None;
                false
            }
        }
    }

    /// Claim the slot for a new attempt. Returns the attempt number, or
    /// `None` if one is already running.
    pub fn begin_attempt(&mut self) -> Option<usize> {
        if self.in_flight {
            return None;
        }
        self.in_flight = true;
        self.deadline = None;
        self.attempt += 1;
        Some(self.attempt)
    }

    /// The transport opened; no retry is pending until it fails again.
    pub fn opened(&mut self) {
        self.in_flight = false;
        self.deadline = None;
    }

    /// The session reached `Connected`: forget past failures.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.deadline = None;
        self.in_flight = false;
    }

    /// Stop all retries (explicit disconnect).
    pub fn cancel(&mut self) {
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_interval_respects_max_attempts() {
        let policy = FixedInterval::new(Duration::from_millis(250), Some(2));
        assert_eq!(policy.next_delay(0), Some(Duration::from_millis(250)));
        assert_eq!(policy.next_delay(1), Some(Duration::from_millis(250)));
        assert_eq!(policy.next_delay(2), None);
    }

    #[test]
    fn default_fixed_interval_is_one_second_forever() {
        let policy = FixedInterval::default();
        assert_eq!(policy.next_delay(0), Some(Duration::from_secs(1)));
        assert_eq!(policy.next_delay(10_000), Some(Duration::from_secs(1)));
    }

    #[test]
    fn exponential_backoff_caps() {
        let policy =
            ExponentialBackoff::new(Duration::from_millis(100), Duration::from_millis(500), None);
        let delays: Vec<u128> = (0..5)
            .map(|i| policy.next_delay(i).unwrap().as_millis())
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 500, 500]);
        assert_eq!(
            policy.next_delay(200),
            Some(Duration::from_millis(500))
        );
    }

    #[test]
    fn never_reconnect() {
        assert_eq!(NeverReconnect.next_delay(0), None);
    }

    #[tokio::test]
    async fn supervisor_suppresses_overlapping_attempts() {
        let mut sup = ReconnectSupervisor::new(Arc::new(FixedInterval::default()));
        assert!(sup.deadline().is_none());
        assert!(sup.schedule());
        assert!(sup.deadline().is_some());

        assert_eq!(sup.begin_attempt(), Some(1));
        assert!(sup.in_flight());
        assert!(sup.deadline().is_none());
        assert_eq!(sup.begin_attempt(), None);

        assert!(sup.schedule());
        assert_eq!(sup.begin_attempt(), Some(2));
        sup.opened();
        assert!(sup.deadline().is_none());
        sup.reset();
        assert_eq!(sup.attempt(), 0);
    }

    #[tokio::test]
    async fn supervisor_stops_when_policy_exhausted() {
        let mut sup = ReconnectSupervisor::new(Arc::new(FixedInterval::new(
            Duration::from_millis(10),
            Some(1),
        )));
        assert!(sup.schedule());
        sup.begin_attempt();
        assert!(!sup.schedule());
        assert!(sup.deadline().is_none());
    }
}
