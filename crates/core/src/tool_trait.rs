//! Capability Traits and Registry
//!
//! Defines the tool abstraction with split definition/execution traits:
//!
//! - `ToolDefinitionTrait` - Identity and parameter schema
//! - `ToolExecutable` - Execution capability
//! - `Capability` - Combined trait (auto-implemented via blanket impl)
//! - `ToolRegistry` - Name-keyed catalog with ordered iteration
//!
//! Capabilities are opaque to the engine: it discovers them here, validates
//! arguments against `parameters_schema()`, and dispatches to `execute()`.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::ToolContext;
use crate::error::{CoreError, CoreResult};
use crate::schema::ParameterSchema;
use crate::value::ArgMap;

// ============================================================================
// Trait Definitions
// ============================================================================

/// Tool definition metadata trait.
///
/// Provides identity and schema information without requiring execution
/// capability, so schema-only consumers (prompt builders, repair messages)
/// never depend on execution infrastructure.
pub trait ToolDefinitionTrait: Send + Sync {
    /// Unique name of this capability (e.g., "web_search").
    fn name(&self) -> &str;

    /// Human-readable description of what this capability does.
    fn description(&self) -> &str;

    /// Declared argument contract.
    fn parameters_schema(&self) -> ParameterSchema;
}

/// Tool execution trait.
#[async_trait]
pub trait ToolExecutable: Send + Sync {
    /// Execute the capability.
    ///
    /// `args` has already been validated and coerced against
    /// `parameters_schema()` (unless validation is disabled). Long-running
    /// implementations should watch `ctx.cancellation_token()`.
    ///
    /// # Returns
    /// - `Ok(ToolResult)` - The capability ran; `success` says whether it
    ///   achieved what was asked
    /// - `Err(CoreError)` - The capability could not run
    async fn execute(&self, ctx: &ToolContext, args: ArgMap) -> CoreResult<ToolResult>;
}

/// Combined trait for capabilities that provide both definition and execution.
pub trait Capability: ToolDefinitionTrait + ToolExecutable {}

// Blanket implementation: anything that implements both traits is a Capability
impl<T: ToolDefinitionTrait + ToolExecutable> Capability for T {}

// ============================================================================
// ToolResult
// ============================================================================

/// Result reported by a capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the capability succeeded
    pub success: bool,
    /// Opaque payload, passed through to the caller untouched
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
    /// Error message (if failed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    /// Create a successful result
    pub fn ok(data: impl Into<Value>) -> Self {
        Self {
            success: true,
            data: data.into(),
            error: None,
        }
    }

    /// Create an error result
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Value::Null,
            error: Some(error.into()),
        }
    }
}

// ============================================================================
// ToolDefinition
// ============================================================================

/// Name/description/schema triple advertised to the calling model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: ParameterSchema,
}

impl ToolDefinition {
    /// OpenAI-style function declaration.
    pub fn to_function_json(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

// ============================================================================
// FunctionTool
// ============================================================================

/// Boxed future returned by a `FunctionTool` handler.
pub type FunctionToolFuture = Pin<Box<dyn Future<Output = CoreResult<ToolResult>> + Send + 'static>>;

/// Type alias for the async handler used by `FunctionTool`.
pub type FunctionToolHandler = Box<dyn Fn(ToolContext, ArgMap) -> FunctionToolFuture + Send + Sync>;

/// A capability created from an async closure.
///
/// Useful for small capabilities generated at runtime and for test doubles.
///
/// # Example
///
/// ```ignore
/// let tool = FunctionTool::new(
///     "echo",
///     "Echoes the input",
///     ParameterSchema::empty().with_required("message", PropertySchema::string("Text")),
///     |_ctx, args| Box::pin(async move {
///         Ok(ToolResult::ok(args_to_json(&args)))
///     }),
/// );
/// ```
pub struct FunctionTool {
    tool_name: String,
    tool_description: String,
    schema: ParameterSchema,
    handler: FunctionToolHandler,
}

impl FunctionTool {
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: ParameterSchema,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolContext, ArgMap) -> FunctionToolFuture + Send + Sync + 'static,
    {
        Self {
            tool_name: name.into(),
            tool_description: description.into(),
            schema,
            handler: Box::new(handler),
        }
    }
}

impl ToolDefinitionTrait for FunctionTool {
    fn name(&self) -> &str {
        &self.tool_name
    }

    fn description(&self) -> &str {
        &self.tool_description
    }

    fn parameters_schema(&self) -> ParameterSchema {
        self.schema.clone()
    }
}

#[async_trait]
impl ToolExecutable for FunctionTool {
    async fn execute(&self, ctx: &ToolContext, args: ArgMap) -> CoreResult<ToolResult> {
        (self.handler)(ctx.clone(), args).await
    }
}

// ============================================================================
// ToolRegistry
// ============================================================================

#[derive(Default)]
struct RegistryState {
    tools: HashMap<String, Arc<dyn Capability>>,
    /// Insertion order for deterministic iteration.
    order: Vec<String>,
}

/// Name-keyed capability catalog.
///
/// Read-mostly: lookups take a shared lock, registration an exclusive one.
/// Shared across tasks as `Arc<ToolRegistry>`.
#[derive(Default)]
pub struct ToolRegistry {
    state: RwLock<RegistryState>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a capability. Fails if the name is already taken.
    pub fn register(&self, tool: Arc<dyn Capability>) -> CoreResult<()> {
        let name = tool.name().to_string();
        let mut state = self.write();
        if state.tools.contains_key(&name) {
            return Err(CoreError::already_exists(format!(
                "tool {} already registered",
                name
            )));
        }
        state.order.push(name.clone());
        state.tools.insert(name.clone(), tool);
        tracing::debug!(tool = %name, "capability registered");
        Ok(())
    }

    /// Unregister a capability by name. Returns the removed capability, or None.
    pub fn unregister(&self, name: &str) -> Option<Arc<dyn Capability>> {
        let mut state = self.write();
        state.order.retain(|n| n != name);
        state.tools.remove(name)
    }

    /// Look up a capability by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.read().tools.get(name).cloned()
    }

    /// Look up a capability, turning absence into `CoreError::NotFound`.
    pub fn require(&self, name: &str) -> CoreResult<Arc<dyn Capability>> {
        self.get(name)
            .ok_or_else(|| CoreError::not_found(format!("tool {} not found", name)))
    }

    /// Check if a capability is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.read().tools.contains_key(name)
    }

    /// Get all capability names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.read().order.clone()
    }

    /// Number of registered capabilities.
    pub fn len(&self) -> usize {
        self.read().tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.read().tools.is_empty()
    }

    /// Definitions of every registered capability, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let state = self.read();
        state
            .order
            .iter()
            .filter_map(|name| state.tools.get(name))
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }

    /// Definitions rendered as OpenAI-style function declarations.
    pub fn function_definitions(&self) -> Vec<Value> {
        self.definitions()
            .iter()
            .map(ToolDefinition::to_function_json)
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
