//! Toolgate
//!
//! Turns a model's raw, untrusted function-call requests into safely executed
//! actions. It includes:
//! - Capability registry and call data model (`toolgate-core`)
//! - Schema validation, streamed-call reassembly and parallel dispatch (`toolgate-tools`)
//! - The control-flow manager that ties them together with a bounded repair loop
//!
//! ```ignore
//! let manager = ControlFlowManager::with_defaults(Arc::new(registry));
//! let results = manager.process_tool_calls(calls, &ToolContext::new("session")).await;
//! let prompt = format_results_for_llm(&results);
//! ```

pub mod models;
pub mod services;

pub use models::{ControlFlowConfig, ControlFlowConfigUpdate};
pub use services::control_flow::{
    format_results_for_llm, CallOutcome, ControlFlowManager, ProcessedResult, RepairRequest,
    RepairSource,
};

// Re-export the workspace crates so callers need a single dependency
pub use tokio_util::sync::CancellationToken;
pub use toolgate_core::{
    args_from_json, args_to_json, ArgMap, ArgValue, Capability, CoreError, CoreResult,
    FunctionTool, ParameterSchema, PropertySchema, StreamToolCall, ToolCall, ToolCallDelta,
    ToolContext, ToolDefinition, ToolDefinitionTrait, ToolExecutable, ToolRegistry, ToolResult,
};
pub use toolgate_tools::{
    CallFailure, DispatchResult, ExecutorConfig, ParallelExecutor, StreamAccumulator,
    ValidationError, ValidationErrorCode, ValidationErrors, Validator, ValidatorConfig,
};
