//! Capability doubles shared by the integration tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use toolgate::{
    args_to_json, ArgMap, CoreResult, ParameterSchema, PropertySchema, ToolContext,
    ToolDefinitionTrait, ToolExecutable, ToolRegistry, ToolResult,
};

/// Capability that records how often it ran and echoes its arguments.
pub struct RecordingTool {
    pub name: String,
    pub schema: ParameterSchema,
    pub delay: Duration,
    pub executions: Arc<AtomicUsize>,
}

impl RecordingTool {
    pub fn new(name: &str, schema: ParameterSchema) -> Self {
        Self {
            name: name.to_string(),
            schema,
            delay: Duration::ZERO,
            executions: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn executions(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.executions)
    }
}

impl ToolDefinitionTrait for RecordingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Records invocations"
    }

    fn parameters_schema(&self) -> ParameterSchema {
        self.schema.clone()
    }
}

#[async_trait]
impl ToolExecutable for RecordingTool {
    async fn execute(&self, ctx: &ToolContext, args: ArgMap) -> CoreResult<ToolResult> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(ToolResult::ok(json!({
            "tool": self.name,
            "call_id": ctx.tool_call_id(),
            "args": args_to_json(&args),
        })))
    }
}

/// `web_search(query: string, limit?: integer, safe?: boolean, mode?: "fast"|"deep")`
pub fn search_schema() -> ParameterSchema {
    ParameterSchema::empty()
        .with_required("query", PropertySchema::string("Search query"))
        .with_property("limit", PropertySchema::integer("Maximum number of results"))
        .with_property("safe", PropertySchema::boolean("Filter explicit results"))
        .with_property(
            "mode",
            PropertySchema::string("Search depth").with_enum(["fast", "deep"]),
        )
}

/// `profile(user: {name: string, age?: integer}, tags?: [string])`
pub fn profile_schema() -> ParameterSchema {
    let mut user = BTreeMap::new();
    user.insert("name".to_string(), PropertySchema::string("Display name"));
    user.insert("age".to_string(), PropertySchema::integer("Age in years"));
    ParameterSchema::empty()
        .with_required(
            "user",
            PropertySchema::object("The user", user, vec!["name".to_string()]),
        )
        .with_property(
            "tags",
            PropertySchema::array("Labels", Some(PropertySchema::string(""))),
        )
}

/// Registry holding the given tools.
pub fn registry_with(tools: Vec<RecordingTool>) -> Arc<ToolRegistry> {
    let registry = ToolRegistry::new();
    for tool in tools {
        registry.register(Arc::new(tool)).unwrap();
    }
    Arc::new(registry)
}
