//! Wire and status types for the chatgate session client.
//!
//! This crate contains the serde-serializable types shared between the
//! lifecycle core, the session-engine runtime and the HTTP surface. They
//! represent the "protocol layer": the shapes of data as they appear in status
//! responses and on the engine bridge pipe.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization and small
//!   normalization helpers
//! * Stable: Changes only when the bridge protocol or status schema changes
//!
//! Behavior (state transitions, retries, persistence) lives in `chatgate`.

pub mod address;
pub mod bridge;
pub mod receipt;
pub mod state;

pub use address::*;
pub use bridge::*;
pub use receipt::*;
pub use state::*;
