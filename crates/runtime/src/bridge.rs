//! Engine implementation backed by an external helper process.
//!
//! The helper (typically a headless-browser driver) is spawned as its own
//! process group and spoken to over newline-delimited JSON on stdin/stdout
//! (see [`chatgate_protocol::bridge`]). Requests carry sequential ids; the
//! reader task correlates `sent`/`failed` replies back to the waiting caller
//! through oneshot channels and forwards everything else as [`EngineEvent`]s.
//!
//! # Message Flow
//!
//! 1. `construct` spawns the process and writes `start`
//! 2. The reader task pushes `qr`/`ready`/`disconnected`/`credentials` events
//! 3. `send` registers a callback under a fresh id and writes `send`
//! 4. The reader task completes the callback when the reply arrives
//! 5. When stdout closes, pending callbacks fail and the event stream ends

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chatgate_protocol::{BridgeMessage, BridgeRequest, ChatAddress, DeliveryReceipt, decode_credentials, encode_credentials};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{Mutex as AsyncMutex, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::engine::{EngineConfig, EngineEvent, EngineFactory, EngineHandle, SessionEngine};
use crate::error::{EngineError, Result};
use crate::process::{GroupSignal, group_is_alive, signal_process_group};

const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(60);
const GROUP_POLL_INTERVAL: Duration = Duration::from_millis(50);
const GROUP_KILL_WAIT: Duration = Duration::from_secs(1);

type ReplyResult = std::result::Result<(String, Option<u64>), EngineError>;
type Callbacks = Arc<Mutex<HashMap<u32, oneshot::Sender<ReplyResult>>>>;

/// Spawns [`BridgeEngine`]s from a configured helper command.
#[derive(Debug, Clone)]
pub struct BridgeFactory {
	program: PathBuf,
	args: Vec<String>,
	shutdown_grace: Duration,
	send_timeout: Duration,
}

impl BridgeFactory {
	pub fn new(program: impl Into<PathBuf>) -> Self {
		Self {
			program: program.into(),
			args: Vec::new(),
			shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
			send_timeout: DEFAULT_SEND_TIMEOUT,
		}
	}

	pub fn with_args<I, S>(mut self, args: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.args = args.into_iter().map(Into::into).collect();
		self
	}

	/// How long `destroy` waits for a clean exit before killing the process.
	pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
		self.shutdown_grace = grace;
		self
	}

	pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
		self.send_timeout = timeout;
		self
	}
}

#[async_trait]
impl EngineFactory for BridgeFactory {
	async fn construct(&self, config: EngineConfig) -> Result<EngineHandle> {
		let mut cmd = Command::new(&self.program);
		cmd.args(&self.args)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true);

		#[cfg(unix)]
		cmd.process_group(0);

		let mut child = cmd.spawn().map_err(|source| EngineError::Spawn {
			program: self.program.clone(),
			source,
		})?;

		let pid = child.id().unwrap_or_default();
		let stdin = child.stdin.take().ok_or_else(|| EngineError::Protocol("engine stdin unavailable".into()))?;
		let stdout = child.stdout.take().ok_or_else(|| EngineError::Protocol("engine stdout unavailable".into()))?;
		if let Some(stderr) = child.stderr.take() {
			tokio::spawn(forward_stderr(stderr, pid));
		}

		info!(target = "chatgate.engine", pid, program = %self.program.display(), "engine process spawned");

		let (event_tx, events) = mpsc::unbounded_channel();
		let callbacks: Callbacks = Arc::new(Mutex::new(HashMap::new()));
		tokio::spawn(read_loop(stdout, pid, event_tx, Arc::clone(&callbacks)));

		let engine = BridgeEngine {
			pid,
			last_id: AtomicU32::new(0),
			callbacks,
			stdin: AsyncMutex::new(Some(stdin)),
			child: AsyncMutex::new(Some(child)),
			shutdown_grace: self.shutdown_grace,
			send_timeout: self.send_timeout,
		};

		let start = BridgeRequest::Start {
			session_id: config.session_id,
			credentials: config.credentials.as_deref().map(encode_credentials),
		};
		if let Err(err) = engine.write(&start).await {
			let _ = engine.destroy().await;
			return Err(err);
		}

		Ok(EngineHandle {
			engine: Arc::new(engine),
			events,
		})
	}
}

/// One running helper process.
pub struct BridgeEngine {
	pid: u32,
	last_id: AtomicU32,
	callbacks: Callbacks,
	stdin: AsyncMutex<Option<ChildStdin>>,
	child: AsyncMutex<Option<Child>>,
	shutdown_grace: Duration,
	send_timeout: Duration,
}

impl BridgeEngine {
	pub fn pid(&self) -> u32 {
		self.pid
	}

	async fn write(&self, request: &BridgeRequest) -> Result<()> {
		let mut line = serde_json::to_string(request)?;
		line.push('\n');

		let mut guard = self.stdin.lock().await;
		let stdin = guard.as_mut().ok_or(EngineError::ChannelClosed)?;
		stdin.write_all(line.as_bytes()).await?;
		stdin.flush().await?;
		Ok(())
	}
}

#[async_trait]
impl SessionEngine for BridgeEngine {
	async fn send(&self, to: &ChatAddress, body: &str) -> Result<DeliveryReceipt> {
		let id = self.last_id.fetch_add(1, Ordering::SeqCst);
		let (tx, rx) = oneshot::channel();
		self.callbacks.lock().insert(id, tx);

		let request = BridgeRequest::Send {
			id,
			to: to.clone(),
			body: body.to_string(),
		};
		if let Err(err) = self.write(&request).await {
			self.callbacks.lock().remove(&id);
			return Err(err);
		}

		let reply = match tokio::time::timeout(self.send_timeout, rx).await {
			Ok(reply) => reply.map_err(|_| EngineError::ChannelClosed)?,
			Err(_) => {
				self.callbacks.lock().remove(&id);
				return Err(EngineError::Timeout(self.send_timeout.as_millis() as u64));
			}
		};

		let (message_id, timestamp) = reply?;
		Ok(DeliveryReceipt {
			message_id,
			to: to.clone(),
			timestamp,
		})
	}

	async fn destroy(&self) -> Result<()> {
		if let Some(mut stdin) = self.stdin.lock().await.take() {
			if let Ok(line) = serde_json::to_string(&BridgeRequest::Shutdown) {
				let _ = stdin.write_all(format!("{line}\n").as_bytes()).await;
				let _ = stdin.flush().await;
			}
		}

		let Some(mut child) = self.child.lock().await.take() else {
			return Ok(());
		};

		match tokio::time::timeout(self.shutdown_grace, child.wait()).await {
			Ok(status) => {
				let status = status?;
				debug!(target = "chatgate.engine", pid = self.pid, %status, "engine exited");
			}
			Err(_) => {
				warn!(
					target = "chatgate.engine",
					pid = self.pid,
					grace_ms = self.shutdown_grace.as_millis() as u64,
					"engine ignored shutdown; killing"
				);
				child.start_kill()?;
				child.wait().await?;
			}
		}

		// Helpers the engine started share its process group.
		let pgid = self.pid;
		blocking(move || signal_process_group(pgid, GroupSignal::Terminate)).await?;
		if wait_for_group_exit(pgid, self.shutdown_grace).await? {
			return Ok(());
		}

		warn!(target = "chatgate.engine", pgid, "engine helpers ignored termination; killing process group");
		blocking(move || signal_process_group(pgid, GroupSignal::Kill)).await?;
		if wait_for_group_exit(pgid, GROUP_KILL_WAIT).await? {
			return Ok(());
		}
		Err(EngineError::TeardownIncomplete { pid: pgid })
	}
}

/// Runs a process-table helper off the async workers.
async fn blocking<T, F>(f: F) -> Result<T>
where
	F: FnOnce() -> T + Send + 'static,
	T: Send + 'static,
{
	tokio::task::spawn_blocking(f).await.map_err(|e| EngineError::Io(std::io::Error::other(e)))
}

/// Polls until no member of the group is left running or `limit` elapses.
async fn wait_for_group_exit(pgid: u32, limit: Duration) -> Result<bool> {
	let deadline = tokio::time::Instant::now() + limit;
	loop {
		if !blocking(move || group_is_alive(pgid)).await? {
			return Ok(true);
		}
		if tokio::time::Instant::now() >= deadline {
			return Ok(false);
		}
		tokio::time::sleep(GROUP_POLL_INTERVAL).await;
	}
}

async fn read_loop<R>(stdout: R, pid: u32, event_tx: mpsc::UnboundedSender<EngineEvent>, callbacks: Callbacks)
where
	R: AsyncRead + Unpin,
{
	let mut lines = BufReader::new(stdout).lines();
	loop {
		let line = match lines.next_line().await {
			Ok(Some(line)) => line,
			Ok(None) => break,
			Err(e) => {
				warn!(target = "chatgate.engine", pid, error = %e, "engine stdout read failed");
				break;
			}
		};
		if line.trim().is_empty() {
			continue;
		}

		let message = match serde_json::from_str::<BridgeMessage>(&line) {
			Ok(message) => message,
			Err(e) => {
				warn!(target = "chatgate.engine", pid, error = %e, %line, "unparseable engine message");
				continue;
			}
		};

		if let Some(event) = dispatch(message, &callbacks, pid) {
			let _ = event_tx.send(event);
		}
	}

	debug!(target = "chatgate.engine", pid, "engine stdout closed");
	for (_, callback) in callbacks.lock().drain() {
		let _ = callback.send(Err(EngineError::ChannelClosed));
	}
}

/// Completes reply callbacks and converts the rest into events.
fn dispatch(message: BridgeMessage, callbacks: &Callbacks, pid: u32) -> Option<EngineEvent> {
	match message {
		BridgeMessage::Qr { code } => Some(EngineEvent::Qr(code)),
		BridgeMessage::Ready => Some(EngineEvent::Ready),
		BridgeMessage::Disconnected { reason } => Some(EngineEvent::Disconnected(reason)),
		BridgeMessage::Credentials { data } => match decode_credentials(&data) {
			Ok(bytes) => Some(EngineEvent::Credentials(bytes)),
			Err(e) => {
				warn!(target = "chatgate.engine", pid, error = %e, "engine sent undecodable credentials");
				None
			}
		},
		BridgeMessage::Sent { id, message_id, timestamp } => {
			complete(callbacks, id, Ok((message_id, timestamp)), pid);
			None
		}
		BridgeMessage::Failed { id, message } => {
			complete(callbacks, id, Err(EngineError::Rejected(message)), pid);
			None
		}
	}
}

fn complete(callbacks: &Callbacks, id: u32, result: ReplyResult, pid: u32) {
	match callbacks.lock().remove(&id) {
		Some(callback) => {
			let _ = callback.send(result);
		}
		None => debug!(target = "chatgate.engine", pid, id, "reply for unknown request"),
	}
}

async fn forward_stderr<R>(stderr: R, pid: u32)
where
	R: AsyncRead + Unpin,
{
	let mut lines = BufReader::new(stderr).lines();
	while let Ok(Some(line)) = lines.next_line().await {
		debug!(target = "chatgate.engine", pid, "{line}");
	}
}
