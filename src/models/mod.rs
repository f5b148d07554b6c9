//! Data Models
//!
//! Configuration data structures for the engine.

pub mod config;

pub use config::{ControlFlowConfig, ControlFlowConfigUpdate};
