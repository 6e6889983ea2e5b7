//! Session-engine capability for chatgate.
//!
//! The engine is the opaque component that performs the messaging-network
//! handshake, issues scan-codes and transports messages. This crate defines
//! the seam the lifecycle core programs against ([`EngineFactory`] and
//! [`SessionEngine`]) and ships two implementations:
//!
//! * [`bridge`] - drives an external helper process over newline-delimited JSON
//! * [`fake`] - a scriptable in-memory engine for tests

pub mod bridge;
pub mod engine;
pub mod error;
pub mod fake;
pub mod process;

pub use bridge::{BridgeEngine, BridgeFactory};
pub use engine::{EngineConfig, EngineEvent, EngineFactory, EngineHandle, SessionEngine};
pub use error::{EngineError, Result};
