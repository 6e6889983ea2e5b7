//! Fake engine for exercising lifecycle logic without a real helper process.
//!
//! # Example
//!
//! ```ignore
//! let (factory, controller) = FakeEngineBuilder::new().build();
//! let manager = LifecycleManager::new(config, Arc::new(factory), store);
//!
//! manager.init().await?;
//! controller.emit_qr("ABC");
//! controller.emit_ready();
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chatgate_protocol::{ChatAddress, DeliveryReceipt};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::engine::{EngineConfig, EngineEvent, EngineFactory, EngineHandle, SessionEngine};
use crate::error::{EngineError, Result};

/// Builder for a fake factory/controller pair.
#[derive(Default)]
pub struct FakeEngineBuilder {
	on_construct: Vec<EngineEvent>,
	construct_delay: Option<Duration>,
	destroy_delay: Option<Duration>,
}

impl FakeEngineBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Events every newly constructed engine emits right away.
	pub fn on_construct(mut self, events: impl IntoIterator<Item = EngineEvent>) -> Self {
		self.on_construct = events.into_iter().collect();
		self
	}

	/// Makes `construct` suspend, to widen races with `disconnect`.
	pub fn construct_delay(mut self, delay: Duration) -> Self {
		self.construct_delay = Some(delay);
		self
	}

	/// Makes `destroy` take `delay` before the engine counts as released.
	pub fn destroy_delay(mut self, delay: Duration) -> Self {
		self.destroy_delay = Some(delay);
		self
	}

	pub fn build(self) -> (FakeEngineFactory, FakeEngineController) {
		let shared = Arc::new(Mutex::new(FakeState {
			on_construct: self.on_construct,
			construct_delay: self.construct_delay,
			destroy_delay: self.destroy_delay,
			..Default::default()
		}));
		(
			FakeEngineFactory {
				shared: Arc::clone(&shared),
			},
			FakeEngineController { shared },
		)
	}
}

#[derive(Default)]
struct FakeState {
	on_construct: Vec<EngineEvent>,
	construct_delay: Option<Duration>,
	destroy_delay: Option<Duration>,
	construct_failures: VecDeque<String>,
	send_failure: Option<String>,
	destroy_failure: Option<String>,
	configs: Vec<EngineConfig>,
	sessions: Vec<Arc<FakeSession>>,
	sent: Vec<(ChatAddress, String)>,
}

/// [`EngineFactory`] half of the fake.
pub struct FakeEngineFactory {
	shared: Arc<Mutex<FakeState>>,
}

#[async_trait]
impl EngineFactory for FakeEngineFactory {
	async fn construct(&self, config: EngineConfig) -> Result<EngineHandle> {
		let delay = self.shared.lock().construct_delay;
		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}

		let mut state = self.shared.lock();
		state.configs.push(config);
		if let Some(reason) = state.construct_failures.pop_front() {
			return Err(EngineError::Rejected(reason));
		}

		let (events_tx, events) = mpsc::unbounded_channel();
		for event in &state.on_construct {
			let _ = events_tx.send(event.clone());
		}

		let session = Arc::new(FakeSession {
			index: state.sessions.len(),
			events_tx: Mutex::new(Some(events_tx)),
			destroyed: AtomicBool::new(false),
			shared: Arc::clone(&self.shared),
		});
		state.sessions.push(Arc::clone(&session));

		Ok(EngineHandle { engine: session, events })
	}
}

struct FakeSession {
	index: usize,
	events_tx: Mutex<Option<mpsc::UnboundedSender<EngineEvent>>>,
	destroyed: AtomicBool,
	shared: Arc<Mutex<FakeState>>,
}

#[async_trait]
impl SessionEngine for FakeSession {
	async fn send(&self, to: &ChatAddress, body: &str) -> Result<DeliveryReceipt> {
		if self.destroyed.load(Ordering::SeqCst) {
			return Err(EngineError::ChannelClosed);
		}

		let mut state = self.shared.lock();
		if let Some(message) = state.send_failure.clone() {
			return Err(EngineError::Rejected(message));
		}
		state.sent.push((to.clone(), body.to_string()));
		Ok(DeliveryReceipt {
			message_id: format!("fake-{}-{}", self.index, state.sent.len()),
			to: to.clone(),
			timestamp: None,
		})
	}

	async fn destroy(&self) -> Result<()> {
		let delay = self.shared.lock().destroy_delay;
		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}
		if self.destroyed.swap(true, Ordering::SeqCst) {
			return Ok(());
		}
		match self.shared.lock().destroy_failure.clone() {
			Some(message) => Err(EngineError::Rejected(message)),
			None => Ok(()),
		}
	}
}

/// Test-side handle: injects events into the newest engine and inspects calls.
#[derive(Clone)]
pub struct FakeEngineController {
	shared: Arc<Mutex<FakeState>>,
}

impl FakeEngineController {
	/// Delivers `event` to the most recently constructed engine.
	///
	/// Events reach destroyed engines too, which is how late events are simulated.
	pub fn emit(&self, event: EngineEvent) {
		let state = self.shared.lock();
		if let Some(session) = state.sessions.last() {
			if let Some(tx) = session.events_tx.lock().as_ref() {
				let _ = tx.send(event);
			}
		}
	}

	pub fn emit_qr(&self, code: &str) {
		self.emit(EngineEvent::Qr(code.to_string()));
	}

	pub fn emit_ready(&self) {
		self.emit(EngineEvent::Ready);
	}

	pub fn emit_disconnected(&self, reason: &str) {
		self.emit(EngineEvent::Disconnected(reason.to_string()));
	}

	pub fn emit_credentials(&self, data: &[u8]) {
		self.emit(EngineEvent::Credentials(data.to_vec()));
	}

	/// Ends the newest engine's event stream, as a crashed process would.
	pub fn close_events(&self) {
		let state = self.shared.lock();
		if let Some(session) = state.sessions.last() {
			session.events_tx.lock().take();
		}
	}

	/// Queues a failure for the next `construct` call.
	pub fn fail_next_construct(&self, reason: &str) {
		self.shared.lock().construct_failures.push_back(reason.to_string());
	}

	pub fn fail_sends(&self, message: Option<&str>) {
		self.shared.lock().send_failure = message.map(str::to_string);
	}

	pub fn fail_destroy(&self, message: Option<&str>) {
		self.shared.lock().destroy_failure = message.map(str::to_string);
	}

	/// Number of `construct` calls, successful or not.
	pub fn construct_calls(&self) -> usize {
		self.shared.lock().configs.len()
	}

	/// Number of engines successfully created.
	pub fn constructed(&self) -> usize {
		self.shared.lock().sessions.len()
	}

	pub fn destroyed(&self) -> usize {
		self.shared.lock().sessions.iter().filter(|s| s.destroyed.load(Ordering::SeqCst)).count()
	}

	/// Engines created and not yet destroyed.
	pub fn live(&self) -> usize {
		self.constructed() - self.destroyed()
	}

	pub fn last_config(&self) -> Option<EngineConfig> {
		self.shared.lock().configs.last().cloned()
	}

	pub fn sent(&self) -> Vec<(ChatAddress, String)> {
		self.shared.lock().sent.clone()
	}
}
