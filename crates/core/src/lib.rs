//! Toolgate Core
//!
//! Foundational types for the Toolgate tool-invocation engine. This crate has
//! no dependency on validation, dispatch or control-flow code.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `context` - Per-call execution context (`ToolContext`)
//! - `value` - Dynamic argument values (`ArgValue`, `ArgMap`)
//! - `schema` - Declared parameter contracts (`ParameterSchema`, `PropertySchema`)
//! - `call` - Tool call data model (`ToolCall`)
//! - `streaming` - Streamed tool-call fragments (`ToolCallDelta`, `StreamToolCall`)
//! - `tool_trait` - Capability traits and `ToolRegistry`

pub mod error;
pub mod context;
pub mod value;
pub mod schema;
pub mod call;
pub mod streaming;
pub mod tool_trait;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Context ────────────────────────────────────────────────────────────
pub use context::ToolContext;

// ── Values & Schemas ───────────────────────────────────────────────────
pub use schema::{ParameterSchema, PropertySchema, SchemaType};
pub use value::{args_from_json, args_to_json, ArgMap, ArgValue};

// ── Calls ──────────────────────────────────────────────────────────────
pub use call::ToolCall;
pub use streaming::{StreamToolCall, ToolCallDelta};

// ── Capabilities ───────────────────────────────────────────────────────
pub use tool_trait::{
    Capability, FunctionTool, FunctionToolFuture, ToolDefinition, ToolDefinitionTrait,
    ToolExecutable, ToolRegistry, ToolResult,
};
