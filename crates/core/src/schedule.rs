//! Single-slot cancellable timer.

use tokio::task::JoinHandle;

/// Holds at most one pending timer task.
///
/// Arming a new task aborts the previous one. A task that has fired calls
/// [`release`](Self::release) with its token before doing real work, so a
/// later `cancel` cannot abort it halfway.
#[derive(Debug, Default)]
pub(crate) struct TimerSlot {
	pending: Option<(u64, JoinHandle<()>)>,
	next_token: u64,
}

impl TimerSlot {
	/// Spawns the task built by `start` and makes it the pending timer.
	pub(crate) fn arm<F>(&mut self, start: F) -> u64
	where
		F: FnOnce(u64) -> JoinHandle<()>,
	{
		self.cancel();
		self.next_token += 1;
		let token = self.next_token;
		self.pending = Some((token, start(token)));
		token
	}

	/// Aborts the pending timer. Returns whether one was pending.
	pub(crate) fn cancel(&mut self) -> bool {
		match self.pending.take() {
			Some((_, handle)) => {
				let was_pending = !handle.is_finished();
				handle.abort();
				was_pending
			}
			None => false,
		}
	}

	/// Detaches the timer identified by `token`. False when it was superseded or cancelled.
	pub(crate) fn release(&mut self, token: u64) -> bool {
		match &self.pending {
			Some((current, _)) if *current == token => {
				self.pending = None;
				true
			}
			_ => false,
		}
	}

	pub(crate) fn is_pending(&self) -> bool {
		self.pending.as_ref().is_some_and(|(_, handle)| !handle.is_finished())
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::sync::atomic::{AtomicU32, Ordering};
	use std::time::Duration;

	use super::*;

	fn counting(fired: &Arc<AtomicU32>, delay_ms: u64) -> impl FnOnce(u64) -> JoinHandle<()> {
		let fired = Arc::clone(fired);
		move |_| {
			tokio::spawn(async move {
				tokio::time::sleep(Duration::from_millis(delay_ms)).await;
				fired.fetch_add(1, Ordering::SeqCst);
			})
		}
	}

	#[tokio::test(start_paused = true)]
	async fn arming_replaces_previous_timer() {
		let fired = Arc::new(AtomicU32::new(0));
		let mut slot = TimerSlot::default();

		slot.arm(counting(&fired, 100));
		slot.arm(counting(&fired, 100));
		assert!(slot.is_pending());

		tokio::time::sleep(Duration::from_millis(500)).await;
		assert_eq!(fired.load(Ordering::SeqCst), 1);
		assert!(!slot.is_pending());
	}

	#[tokio::test(start_paused = true)]
	async fn cancel_prevents_firing() {
		let fired = Arc::new(AtomicU32::new(0));
		let mut slot = TimerSlot::default();

		slot.arm(counting(&fired, 100));
		assert!(slot.cancel());
		assert!(!slot.cancel());

		tokio::time::sleep(Duration::from_millis(500)).await;
		assert_eq!(fired.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn release_only_matches_current_token() {
		let fired = Arc::new(AtomicU32::new(0));
		let mut slot = TimerSlot::default();

		let first = slot.arm(counting(&fired, 10_000));
		let second = slot.arm(counting(&fired, 10_000));
		assert!(!slot.release(first));
		assert!(slot.release(second));
		assert!(!slot.is_pending());
		assert!(!slot.release(second));
	}
}
