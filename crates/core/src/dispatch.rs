//! Outbound send retries while the session is coming up.

use std::sync::Arc;
use std::time::Duration;

use chatgate_protocol::{ChatAddress, ConnectionState, DeliveryReceipt};
use chatgate_runtime::SessionEngine;
use tracing::{debug, warn};

use crate::config::DispatchConfig;
use crate::error::{Error, Result};

/// What a readiness probe observed.
pub enum Readiness {
	Ready(Arc<dyn SessionEngine>),
	/// Not usable yet; carries the state seen.
	Pending(ConnectionState),
	/// The session was manually disconnected since the send started.
	Cancelled,
}

/// Polls readiness up to `retries` times, `retry_delay` apart.
#[derive(Debug, Clone)]
pub struct DispatchGuard {
	retries: u32,
	retry_delay: Duration,
}

impl DispatchGuard {
	pub fn new(config: &DispatchConfig) -> Self {
		Self {
			retries: config.retries,
			retry_delay: Duration::from_millis(config.retry_delay_ms),
		}
	}

	pub fn retries(&self) -> u32 {
		self.retries
	}

	/// Sends through the first engine `probe` reports ready.
	///
	/// Engine failures are returned as-is without retrying; only readiness is retried.
	pub async fn send<F>(&self, to: &ChatAddress, body: &str, mut probe: F) -> Result<DeliveryReceipt>
	where
		F: FnMut() -> Readiness,
	{
		for attempt in 1..=self.retries {
			match probe() {
				Readiness::Ready(engine) => {
					debug!(target = "chatgate.dispatch", %to, attempt, "sending message");
					return Ok(engine.send(to, body).await?);
				}
				Readiness::Pending(state) => {
					debug!(target = "chatgate.dispatch", %to, attempt, %state, "session not ready");
				}
				Readiness::Cancelled => {
					return Err(Error::NotReady("session was disconnected while the message was waiting".into()));
				}
			}
			if attempt < self.retries {
				tokio::time::sleep(self.retry_delay).await;
			}
		}

		warn!(target = "chatgate.dispatch", %to, attempts = self.retries, "giving up on send; session never became ready");
		Err(Error::SendExhausted { attempts: self.retries })
	}
}
