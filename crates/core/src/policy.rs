//! Reconnect attempt accounting and backoff.

use std::time::Duration;

use crate::config::{BackoffStrategy, ReconnectConfig};

/// Outcome of registering one more reconnect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
	/// Start attempt number `attempt` after `delay`.
	Retry { attempt: u32, delay: Duration },
	/// The attempt budget is spent.
	Exhausted { attempts: u32 },
}

/// Mutable reconnect state owned by the lifecycle manager.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
	config: ReconnectConfig,
	attempt_count: u32,
}

impl ReconnectPolicy {
	pub fn new(config: ReconnectConfig) -> Self {
		Self { config, attempt_count: 0 }
	}

	pub fn enabled(&self) -> bool {
		self.config.enabled
	}

	pub fn attempt_count(&self) -> u32 {
		self.attempt_count
	}

	pub fn max_attempts(&self) -> u32 {
		self.config.max_attempts
	}

	pub fn ready_timeout(&self) -> Option<Duration> {
		self.config.ready_timeout_ms.map(Duration::from_millis)
	}

	pub fn reset(&mut self) {
		self.attempt_count = 0;
	}

	/// Counts a new attempt and decides whether it may run.
	pub fn next_attempt(&mut self) -> ReconnectDecision {
		self.attempt_count = self.attempt_count.saturating_add(1);
		if self.attempt_count > self.config.max_attempts {
			return ReconnectDecision::Exhausted {
				attempts: self.config.max_attempts,
			};
		}
		ReconnectDecision::Retry {
			attempt: self.attempt_count,
			delay: self.delay_for(self.attempt_count),
		}
	}

	/// Wait before attempt number `attempt` (1-based).
	pub fn delay_for(&self, attempt: u32) -> Duration {
		let base = self.config.backoff_ms;
		let ms = match self.config.strategy {
			BackoffStrategy::Fixed => base,
			BackoffStrategy::Exponential => {
				let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
				base.saturating_mul(factor).min(self.config.max_backoff_ms.max(base))
			}
		};
		Duration::from_millis(ms)
	}
}
