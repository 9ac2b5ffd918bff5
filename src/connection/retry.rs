//! Retry policy and lifecycle states of a retryable connection.

use std::fmt;
use std::time::Duration;

/// Default delay between reconnect attempts.
pub const DEFAULT_RETRY_WAIT: Duration = Duration::from_millis(500);

/// Fixed-delay reconnect policy.
///
/// # Examples
///
/// ```rust
/// use registry_interest::connection::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::fixed(Duration::from_secs(1)).with_max_attempts(10);
/// assert!(policy.should_retry(9));
/// assert!(!policy.should_retry(10));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    delay: Duration,
    max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// Retry forever with the given delay.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    /// Give up after `max_attempts` consecutive failures.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Delay before the next attempt.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Consecutive failure limit, if any.
    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    /// Whether another attempt is allowed after `failures` consecutive failures.
    pub fn should_retry(&self, failures: u32) -> bool {
        self.max_attempts.is_none_or(|max| failures < max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_RETRY_WAIT)
    }
}

/// Lifecycle of a retryable connection, published on every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not started yet.
    Idle,
    /// Asking the factory for a channel.
    Connecting {
        /// 1-based attempt since the last successful connection
        attempt: u32,
    },
    /// A channel is live and carries the latest operand.
    Connected {
        /// 1-based generation number
        generation: u64,
    },
    /// Waiting before the next attempt.
    Backoff {
        /// Number of consecutive failures so far
        attempt: u32,
        /// Time until the next attempt
        delay: Duration,
        /// Why the last attempt or session failed
        reason: String,
    },
    /// The retry policy gave up. Terminal.
    Exhausted {
        /// Number of consecutive failures
        attempts: u32,
    },
    /// Closed by its owner. Terminal.
    Closed,
}

impl ConnectionState {
    /// Whether the state can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exhausted { .. } | Self::Closed)
    }

    /// Whether a channel is live.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Connecting { attempt } => write!(f, "connecting (attempt {})", attempt),
            Self::Connected { generation } => write!(f, "connected (generation {})", generation),
            Self::Backoff { attempt, delay, .. } => {
                write!(f, "backing off {:?} after {} failures", delay, attempt)
            }
            Self::Exhausted { attempts } => write!(f, "exhausted after {} attempts", attempts),
            Self::Closed => write!(f, "closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_retries_forever() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(), Duration::from_millis(500));
        assert_eq!(policy.max_attempts(), None);
        assert!(policy.should_retry(u32::MAX));
    }

    #[test]
    fn test_bounded_policy() {
        let policy = RetryPolicy::fixed(Duration::from_millis(10)).with_max_attempts(2);
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(1));
        assert!(!policy.should_retry(2));
    }

    #[test]
    fn test_terminal_states() {
        assert!(ConnectionState::Closed.is_terminal());
        assert!(ConnectionState::Exhausted { attempts: 1 }.is_terminal());
        assert!(!ConnectionState::Connected { generation: 1 }.is_terminal());
        assert!(ConnectionState::Connected { generation: 1 }.is_connected());
    }
}
