//! HTTP service exposing the chatgate lifecycle manager.

pub mod bootstrap;
pub mod cli;
pub mod error;
pub mod http;
pub mod logging;
