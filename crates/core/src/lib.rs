//! Connection lifecycle management for a session-backed chat client.
//!
//! [`LifecycleManager`] owns one engine session at a time: it restores
//! persisted credentials through a [`SessionStore`](store::SessionStore),
//! follows the scan/ready/disconnect state machine, reconnects after
//! unsolicited drops and holds outbound messages until the session is ready.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod manager;
pub mod policy;
pub mod remote_auth;
mod schedule;
pub mod store;

pub use chatgate_protocol::{ChatAddress, ConnectionState, DeliveryReceipt, StatusSnapshot};
pub use config::{BackoffStrategy, ClientConfig, DispatchConfig, ReconnectConfig, StoreBackend, StoreConfig};
pub use error::{Error, Result, StoreError, StoreResult};
pub use events::LifecycleEvent;
pub use manager::LifecycleManager;
pub use remote_auth::RemoteAuth;
