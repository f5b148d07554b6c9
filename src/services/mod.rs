//! Services
//!
//! Engine services composed from the core and tools crates.

pub mod control_flow;

pub use control_flow::{ControlFlowManager, ProcessedResult, RepairRequest, RepairSource};
