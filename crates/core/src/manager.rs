//! Connection lifecycle manager.
//!
//! Owns the single engine session: creates it on `init`, tracks the
//! scan/ready/disconnect state machine, persists credentials the engine
//! hands out, reconnects after unsolicited disconnects and tears the engine
//! down on request.
//!
//! State lives behind a synchronous mutex that is never held across an
//! `.await`. Engine events are forwarded, tagged with the generation of the
//! session that produced them, into one queue consumed by a single task;
//! every teardown bumps the generation so events from a dead engine are
//! dropped instead of mutating the state of its successor.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chatgate_protocol::{ChatAddress, ConnectionState, DeliveryReceipt, StatusSnapshot};
use chatgate_runtime::{EngineConfig, EngineEvent, EngineFactory, SessionEngine};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::dispatch::{DispatchGuard, Readiness};
use crate::error::{Error, Result};
use crate::events::LifecycleEvent;
use crate::policy::{ReconnectDecision, ReconnectPolicy};
use crate::remote_auth::RemoteAuth;
use crate::schedule::TimerSlot;
use crate::store::SessionStore;

const EVENT_CAPACITY: usize = 64;

/// Cloneable handle to the lifecycle of one session.
///
/// Must be created inside a tokio runtime.
#[derive(Clone)]
pub struct LifecycleManager {
	inner: Arc<Inner>,
}

struct Inner {
	config: ClientConfig,
	factory: Arc<dyn EngineFactory>,
	auth: RemoteAuth,
	dispatch: DispatchGuard,
	shared: Mutex<Shared>,
	state_tx: watch::Sender<ConnectionState>,
	queue: mpsc::UnboundedSender<Envelope>,
	events: broadcast::Sender<LifecycleEvent>,
}

struct Shared {
	state: ConnectionState,
	session: Option<ActiveSession>,
	/// Bumped whenever the current engine is abandoned.
	generation: u64,
	pending_qr: Option<String>,
	last_disconnect_reason: Option<String>,
	last_store_error: Option<String>,
	policy: ReconnectPolicy,
	reconnect_exhausted: bool,
	manual_disconnect: bool,
	ever_initialized: bool,
	/// The in-flight attempt was started by the reconnect timer.
	reconnecting: bool,
	/// Bumped by every manual disconnect; waiting sends compare against it.
	disconnect_epoch: u64,
	/// Reconnect backoff or ready-window timer.
	timer: TimerSlot,
	/// Flips to `true` once the most recently lost engine is destroyed.
	retiring: Option<watch::Receiver<bool>>,
}

struct ActiveSession {
	engine: Arc<dyn SessionEngine>,
	pump: JoinHandle<()>,
}

enum Teardown {
	InProgress,
	Idle,
	Release(Option<ActiveSession>),
}

enum Envelope {
	Engine { generation: u64, event: EngineEvent },
	StreamClosed { generation: u64 },
	ReadyWindowElapsed { generation: u64 },
}

impl Envelope {
	fn generation(&self) -> u64 {
		match self {
			Self::Engine { generation, .. } | Self::StreamClosed { generation } | Self::ReadyWindowElapsed { generation } => *generation,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
	Manual,
	Reconnect,
}

impl Origin {
	fn as_str(self) -> &'static str {
		match self {
			Self::Manual => "manual",
			Self::Reconnect => "reconnect",
		}
	}
}

impl LifecycleManager {
	pub fn new(config: ClientConfig, factory: Arc<dyn EngineFactory>, store: Arc<dyn SessionStore>) -> Result<Self> {
		config.validate()?;

		let (queue, queue_rx) = mpsc::unbounded_channel();
		let (events, _) = broadcast::channel(EVENT_CAPACITY);
		let (state_tx, _) = watch::channel(ConnectionState::Uninitialized);
		let auth = RemoteAuth::new(store, &config.store.path_prefix, &config.session_id);

		let inner = Arc::new(Inner {
			dispatch: DispatchGuard::new(&config.dispatch),
			shared: Mutex::new(Shared {
				state: ConnectionState::Uninitialized,
				session: None,
				generation: 0,
				pending_qr: None,
				last_disconnect_reason: None,
				last_store_error: None,
				policy: ReconnectPolicy::new(config.reconnect.clone()),
				reconnect_exhausted: false,
				manual_disconnect: false,
				ever_initialized: false,
				reconnecting: false,
				disconnect_epoch: 0,
				timer: TimerSlot::default(),
				retiring: None,
			}),
			config,
			factory,
			auth,
			state_tx,
			queue,
			events,
		});

		tokio::spawn(run_events(Arc::downgrade(&inner), queue_rx));
		Ok(Self { inner })
	}

	pub fn config(&self) -> &ClientConfig {
		&self.inner.config
	}

	/// Object key the session credentials are stored under.
	pub fn store_key(&self) -> &str {
		self.inner.auth.key()
	}

	/// Starts a session unless one is already initializing or ready.
	///
	/// Returns once the engine is constructed; scanning and readiness are
	/// reported through [`status`](Self::status) and [`subscribe`](Self::subscribe).
	/// A failed construction leaves the manager `Disconnected` with the cause
	/// in `lastDisconnectReason`.
	pub async fn init(&self) -> StatusSnapshot {
		self.inner.start(Origin::Manual).await
	}

	pub fn status(&self) -> StatusSnapshot {
		let shared = self.inner.shared.lock();
		self.inner.snapshot(&shared)
	}

	/// Sends `body` to `recipient`, waiting for the session to become ready.
	pub async fn send_message(&self, recipient: &str, body: &str) -> Result<DeliveryReceipt> {
		let to = ChatAddress::new(recipient);
		let epoch = {
			let shared = self.inner.shared.lock();
			if !shared.ever_initialized {
				return Err(Error::NotInitialized);
			}
			if shared.state.is_idle() && shared.reconnect_exhausted {
				return Err(Error::ReconnectExhausted {
					attempts: shared.policy.max_attempts(),
				});
			}
			if shared.state.is_idle() && shared.manual_disconnect {
				return Err(Error::NotReady("session is disconnected; call init first".into()));
			}
			shared.disconnect_epoch
		};

		let inner = &self.inner;
		inner.dispatch.send(&to, body, || inner.probe(epoch)).await
	}

	/// Tears the session down and suppresses automatic reconnection.
	///
	/// Waits for engine resources to be released (bounded by the teardown
	/// timeout). A no-op when nothing is running.
	pub async fn disconnect(&self) -> StatusSnapshot {
		self.inner.teardown(true).await
	}

	/// Discards a half-open session and starts a fresh one. A no-op when ready.
	pub async fn force_reconnect(&self) -> StatusSnapshot {
		let status = self.status();
		if status.is_ready() {
			return status;
		}
		self.inner.teardown(false).await;
		self.inner.start(Origin::Manual).await
	}

	/// Disconnects and deletes the persisted credentials.
	pub async fn logout(&self) -> Result<StatusSnapshot> {
		self.disconnect().await;
		let removed = self.inner.auth.forget().await?;
		info!(target = "chatgate.lifecycle", key = self.inner.auth.key(), removed, "logged out");
		Ok(self.status())
	}

	pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
		self.inner.events.subscribe()
	}

	/// Receiver tracking every state transition.
	pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
		self.inner.state_tx.subscribe()
	}

	/// True while a reconnect backoff or ready-window timer is pending.
	pub fn reconnect_pending(&self) -> bool {
		self.inner.shared.lock().timer.is_pending()
	}
}

impl Inner {
	fn snapshot(&self, shared: &Shared) -> StatusSnapshot {
		StatusSnapshot {
			state: shared.state,
			has_session: shared.session.is_some(),
			pending_qr: shared.pending_qr.clone(),
			last_disconnect_reason: shared.last_disconnect_reason.clone(),
			attempt_count: shared.policy.attempt_count(),
			reconnect_exhausted: shared.reconnect_exhausted,
			last_store_error: shared.last_store_error.clone(),
			session_id: self.config.session_id.clone(),
		}
	}

	fn current_status(&self) -> StatusSnapshot {
		let shared = self.shared.lock();
		self.snapshot(&shared)
	}

	fn emit(&self, event: LifecycleEvent) {
		let _ = self.events.send(event);
	}

	fn transition(&self, shared: &mut Shared, next: ConnectionState) {
		let from = std::mem::replace(&mut shared.state, next);
		if from == next {
			return;
		}
		debug!(target = "chatgate.lifecycle", %from, to = %next, "state changed");
		self.state_tx.send_replace(next);
		self.emit(LifecycleEvent::StateChanged { from, to: next });
	}

	async fn wait_until_settled(&self) {
		let mut state_rx = self.state_tx.subscribe();
		let _ = state_rx.wait_for(|state| *state != ConnectionState::Disconnecting).await;
	}

	async fn start(self: &Arc<Self>, origin: Origin) -> StatusSnapshot {
		self.wait_until_settled().await;
		self.wait_for_retired_engine().await;

		let generation = {
			let mut shared = self.shared.lock();
			if shared.state.is_live() || shared.state == ConnectionState::Disconnecting {
				debug!(target = "chatgate.lifecycle", state = %shared.state, origin = origin.as_str(), "init ignored; session already active");
				return self.snapshot(&shared);
			}
			match origin {
				Origin::Manual => {
					shared.timer.cancel();
					shared.reconnect_exhausted = false;
					shared.reconnecting = false;
					shared.manual_disconnect = false;
				}
				Origin::Reconnect if shared.manual_disconnect => {
					debug!(target = "chatgate.lifecycle", "reconnect dropped; session was disconnected manually");
					shared.reconnecting = false;
					return self.snapshot(&shared);
				}
				Origin::Reconnect => shared.reconnecting = true,
			}
			shared.ever_initialized = true;
			shared.pending_qr = None;
			shared.generation += 1;
			self.transition(&mut shared, ConnectionState::Initializing);
			info!(
				target = "chatgate.lifecycle",
				session_id = %self.config.session_id,
				origin = origin.as_str(),
				attempt = shared.policy.attempt_count(),
				"initializing session"
			);
			shared.generation
		};

		let credentials = self.auth.restore().await;
		let restored = credentials.is_some();
		let result = self
			.factory
			.construct(EngineConfig {
				session_id: self.config.session_id.clone(),
				credentials,
			})
			.await;

		let orphan = {
			let mut shared = self.shared.lock();
			match result {
				Ok(handle) if shared.generation == generation => {
					let pump = tokio::spawn(pump_events(generation, handle.events, self.queue.clone()));
					shared.session = Some(ActiveSession { engine: handle.engine, pump });
					if shared.reconnecting {
						if let Some(window) = shared.policy.ready_timeout() {
							self.arm_ready_window(&mut shared, generation, window);
						}
					}
					debug!(target = "chatgate.lifecycle", generation, restored, "engine constructed");
					return self.snapshot(&shared);
				}
				Ok(handle) => handle.engine,
				Err(err) if shared.generation == generation => {
					let reconnect = shared.reconnecting;
					self.lose_session(&mut shared, format!("engine failed to start: {err}"), reconnect);
					return self.snapshot(&shared);
				}
				Err(err) => {
					debug!(target = "chatgate.lifecycle", error = %err, "engine construction failed after the session was abandoned");
					return self.snapshot(&shared);
				}
			}
		};

		info!(target = "chatgate.lifecycle", "session was disconnected while initializing; discarding new engine");
		self.destroy_engine(orphan).await;
		self.current_status()
	}

	/// Disconnects the current session. `manual` also suppresses reconnection
	/// and fails sends that are waiting for readiness.
	async fn teardown(self: &Arc<Self>, manual: bool) -> StatusSnapshot {
		let step = {
			let mut shared = self.shared.lock();
			let cancelled = shared.timer.cancel();
			shared.reconnecting = false;
			if manual {
				shared.manual_disconnect = true;
				shared.policy.reset();
				shared.reconnect_exhausted = false;
			}

			if shared.state == ConnectionState::Disconnecting {
				Teardown::InProgress
			} else if shared.state.is_idle() && shared.session.is_none() {
				if cancelled {
					info!(target = "chatgate.lifecycle", "pending reconnect cancelled");
				}
				if manual {
					self.transition(&mut shared, ConnectionState::Disconnected);
				}
				Teardown::Idle
			} else {
				shared.generation += 1;
				if manual {
					shared.disconnect_epoch += 1;
				}
				shared.pending_qr = None;
				self.transition(&mut shared, ConnectionState::Disconnecting);
				Teardown::Release(shared.session.take())
			}
		};

		match step {
			Teardown::InProgress => self.wait_until_settled().await,
			Teardown::Idle => {}
			Teardown::Release(session) => {
				if let Some(session) = session {
					session.pump.abort();
					self.destroy_engine(session.engine).await;
				}
				let mut shared = self.shared.lock();
				self.transition(&mut shared, ConnectionState::Disconnected);
				info!(target = "chatgate.lifecycle", manual, "session disconnected");
			}
		}

		// An engine lost before this call may still be shutting down.
		self.wait_for_retired_engine().await;
		self.current_status()
	}

	async fn wait_for_retired_engine(&self) {
		let retiring = self.shared.lock().retiring.clone();
		let Some(mut retiring) = retiring else {
			return;
		};
		if !*retiring.borrow() {
			debug!(target = "chatgate.lifecycle", "waiting for the previous engine to shut down");
		}
		let _ = retiring.wait_for(|done| *done).await;
	}

	async fn destroy_engine(&self, engine: Arc<dyn SessionEngine>) {
		let limit = self.config.teardown_timeout();
		let failure = match tokio::time::timeout(limit, engine.destroy()).await {
			Ok(Ok(())) => {
				debug!(target = "chatgate.lifecycle", "engine destroyed");
				return;
			}
			Ok(Err(err)) => err.to_string(),
			Err(_) => format!("engine did not shut down within {} ms", limit.as_millis()),
		};

		let err = Error::TeardownFailed(failure);
		warn!(target = "chatgate.lifecycle", error = %err, "engine resources may have leaked");
		self.emit(LifecycleEvent::TeardownFailed { error: err.to_string() });
	}

	fn probe(&self, epoch: u64) -> Readiness {
		let shared = self.shared.lock();
		if shared.disconnect_epoch != epoch {
			return Readiness::Cancelled;
		}
		match (&shared.session, shared.state) {
			(Some(session), ConnectionState::Ready) => Readiness::Ready(Arc::clone(&session.engine)),
			(_, state) => Readiness::Pending(state),
		}
	}

	fn apply(self: &Arc<Self>, envelope: Envelope) {
		let mut shared = self.shared.lock();
		if envelope.generation() != shared.generation {
			debug!(target = "chatgate.lifecycle", generation = envelope.generation(), "dropping event from abandoned engine");
			return;
		}

		match envelope {
			Envelope::Engine { event, .. } => match event {
				EngineEvent::Qr(code) => self.on_qr(&mut shared, code),
				EngineEvent::Ready => self.on_ready(&mut shared),
				EngineEvent::Disconnected(reason) => self.lose_session(&mut shared, reason, true),
				EngineEvent::Credentials(data) => self.spawn_persist(data),
			},
			Envelope::StreamClosed { .. } => self.lose_session(&mut shared, "engine event stream closed".into(), true),
			Envelope::ReadyWindowElapsed { .. } => {
				if matches!(shared.state, ConnectionState::Initializing | ConnectionState::AwaitingScan) {
					let window = shared.policy.ready_timeout().unwrap_or_default();
					let reason = format!("reconnect attempt not ready within {} ms", window.as_millis());
					self.lose_session(&mut shared, reason, true);
				}
			}
		}
	}

	fn on_qr(&self, shared: &mut Shared, code: String) {
		if !matches!(shared.state, ConnectionState::Initializing | ConnectionState::AwaitingScan) {
			debug!(target = "chatgate.lifecycle", state = %shared.state, "ignoring scan code outside authentication");
			return;
		}
		info!(target = "chatgate.lifecycle", qr = %code, "scan code issued; waiting for scan");
		shared.pending_qr = Some(code.clone());
		self.transition(shared, ConnectionState::AwaitingScan);
		self.emit(LifecycleEvent::QrIssued { code });
	}

	fn on_ready(&self, shared: &mut Shared) {
		if shared.state == ConnectionState::Ready {
			return;
		}
		shared.pending_qr = None;
		shared.policy.reset();
		shared.reconnect_exhausted = false;
		shared.reconnecting = false;
		shared.last_disconnect_reason = None;
		shared.timer.cancel();
		self.transition(shared, ConnectionState::Ready);
		info!(target = "chatgate.lifecycle", session_id = %self.config.session_id, "session ready");
		self.emit(LifecycleEvent::Ready);
	}

	/// Abandons the current session after a failure and, if allowed, schedules a reconnect.
	fn lose_session(self: &Arc<Self>, shared: &mut Shared, reason: String, may_reconnect: bool) {
		warn!(target = "chatgate.lifecycle", state = %shared.state, reason = %reason, "session lost");
		let session = shared.session.take();
		shared.generation += 1;
		shared.pending_qr = None;
		shared.last_disconnect_reason = Some(reason.clone());
		self.transition(shared, ConnectionState::Disconnected);
		self.emit(LifecycleEvent::Disconnected { reason });

		if let Some(session) = session {
			session.pump.abort();
			let (done_tx, done_rx) = watch::channel(false);
			shared.retiring = Some(done_rx);
			let inner = Arc::clone(self);
			tokio::spawn(async move {
				inner.destroy_engine(session.engine).await;
				let _ = done_tx.send(true);
			});
		}

		if may_reconnect && !shared.manual_disconnect && shared.policy.enabled() {
			self.schedule_reconnect(shared);
		} else {
			shared.reconnecting = false;
		}
	}

	fn schedule_reconnect(self: &Arc<Self>, shared: &mut Shared) {
		match shared.policy.next_attempt() {
			ReconnectDecision::Exhausted { attempts } => {
				shared.reconnect_exhausted = true;
				shared.reconnecting = false;
				let err = Error::ReconnectExhausted { attempts };
				warn!(target = "chatgate.lifecycle", error = %err, "automatic reconnection stopped");
				self.emit(LifecycleEvent::ReconnectExhausted { attempts });
			}
			ReconnectDecision::Retry { attempt, delay } => {
				let weak = Arc::downgrade(self);
				shared.timer.arm(|token| {
					tokio::spawn(async move {
						tokio::time::sleep(delay).await;
						if let Some(inner) = weak.upgrade() {
							inner.reconnect_due(token).await;
						}
					})
				});
				let delay_ms = delay.as_millis() as u64;
				info!(
					target = "chatgate.lifecycle",
					attempt,
					max_attempts = shared.policy.max_attempts(),
					delay_ms,
					"reconnect scheduled"
				);
				self.emit(LifecycleEvent::ReconnectScheduled { attempt, delay_ms });
			}
		}
	}

	async fn reconnect_due(self: Arc<Self>, token: u64) {
		{
			let mut shared = self.shared.lock();
			if !shared.timer.release(token) || shared.manual_disconnect {
				return;
			}
		}
		debug!(target = "chatgate.lifecycle", "reconnect timer fired");
		self.start(Origin::Reconnect).await;
	}

	fn arm_ready_window(&self, shared: &mut Shared, generation: u64, window: Duration) {
		let queue = self.queue.clone();
		shared.timer.arm(|_| {
			tokio::spawn(async move {
				tokio::time::sleep(window).await;
				let _ = queue.send(Envelope::ReadyWindowElapsed { generation });
			})
		});
	}

	fn spawn_persist(self: &Arc<Self>, data: Vec<u8>) {
		let inner = Arc::clone(self);
		tokio::spawn(async move {
			match inner.auth.persist(&data).await {
				Ok(()) => {
					inner.shared.lock().last_store_error = None;
					info!(target = "chatgate.lifecycle", key = inner.auth.key(), "session credentials saved");
					inner.emit(LifecycleEvent::SessionSaved {
						key: inner.auth.key().to_string(),
					});
				}
				Err(err) => {
					let err = Error::StorePersistenceFailed(err);
					warn!(target = "chatgate.lifecycle", key = inner.auth.key(), error = %err, "session stays up without persisted credentials");
					inner.shared.lock().last_store_error = Some(err.to_string());
					inner.emit(LifecycleEvent::StorePersistenceFailed { error: err.to_string() });
				}
			}
		});
	}
}

impl Drop for Inner {
	fn drop(&mut self) {
		let shared = self.shared.get_mut();
		shared.timer.cancel();
		if let Some(session) = shared.session.take() {
			session.pump.abort();
		}
	}
}

async fn run_events(inner: Weak<Inner>, mut queue: mpsc::UnboundedReceiver<Envelope>) {
	while let Some(envelope) = queue.recv().await {
		let Some(inner) = inner.upgrade() else {
			break;
		};
		inner.apply(envelope);
	}
}

async fn pump_events(generation: u64, mut events: mpsc::UnboundedReceiver<EngineEvent>, queue: mpsc::UnboundedSender<Envelope>) {
	while let Some(event) = events.recv().await {
		let terminal = matches!(event, EngineEvent::Disconnected(_));
		if queue.send(Envelope::Engine { generation, event }).is_err() || terminal {
			return;
		}
	}
	let _ = queue.send(Envelope::StreamClosed { generation });
}
