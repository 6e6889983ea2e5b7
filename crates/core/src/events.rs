use chatgate_protocol::ConnectionState;

/// Observable lifecycle notifications, delivered through
/// [`LifecycleManager::subscribe`](crate::LifecycleManager::subscribe).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
	StateChanged { from: ConnectionState, to: ConnectionState },
	QrIssued { code: String },
	Ready,
	Disconnected { reason: String },
	SessionSaved { key: String },
	/// Credentials could not be written; the session stays up.
	StorePersistenceFailed { error: String },
	ReconnectScheduled { attempt: u32, delay_ms: u64 },
	ReconnectExhausted { attempts: u32 },
	TeardownFailed { error: String },
}
