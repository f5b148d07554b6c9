//! Control Flow
//!
//! Validation, dispatch and repair of model-issued tool calls.
//!
//! - `manager` - `ControlFlowManager`, the per-session facade
//! - `processed` - per-call results and their prompt rendering
//! - `repair` - repair messages, `RepairRequest` and the `RepairSource` seam
//! - `auto_repair` - bounded multi-round repair driver

pub mod auto_repair;
pub mod manager;
pub mod processed;
pub mod repair;

pub use manager::ControlFlowManager;
pub use processed::{format_results_for_llm, CallOutcome, ProcessedResult};
pub use repair::{
    build_detailed_repair_message, build_repair_message, format_schema_hints, RepairRequest,
    RepairSource,
};
