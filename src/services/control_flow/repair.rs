//! Repair Messaging
//!
//! Turns validation errors into guidance the calling model can act on, and
//! defines the seam through which corrected calls come back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use toolgate_core::call::ToolCall;
use toolgate_core::error::CoreResult;
use toolgate_core::schema::ParameterSchema;
use toolgate_core::tool_trait::ToolRegistry;
use toolgate_tools::validator::ValidationErrors;

/// A rejected call together with everything needed to correct it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairRequest {
    pub call_id: String,
    pub tool_name: String,
    pub original_call: ToolCall,
    pub errors: ValidationErrors,
    pub repair_message: String,
}

/// Supplier of corrected calls, typically the calling model.
///
/// Returned calls are matched to requests by id; calls with an id that was
/// not requested are ignored.
#[async_trait]
pub trait RepairSource: Send + Sync {
    async fn repair(&self, requests: Vec<RepairRequest>) -> CoreResult<Vec<ToolCall>>;
}

fn numbered_errors(errors: &ValidationErrors) -> String {
    errors
        .iter()
        .enumerate()
        .map(|(i, e)| format!("{}. {}\n", i + 1, e.to_llm_message()))
        .collect()
}

/// Numbered error list with a generic instruction to resubmit.
pub fn build_repair_message(tool_name: &str, errors: &ValidationErrors) -> String {
    if errors.is_empty() {
        return String::new();
    }
    format!(
        "The tool call '{}' has validation errors that need to be fixed:\n\n{}\nPlease correct the parameters and try again.",
        tool_name,
        numbered_errors(errors)
    )
}

/// Error list plus the capability's live parameter contract.
///
/// Falls back to [`build_repair_message`] when the capability is no longer
/// registered.
pub fn build_detailed_repair_message(
    tool_name: &str,
    errors: &ValidationErrors,
    registry: &ToolRegistry,
) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let Some(tool) = registry.get(tool_name) else {
        tracing::debug!(tool = %tool_name, "capability gone, using terse repair message");
        return build_repair_message(tool_name, errors);
    };

    format!(
        "The tool call '{}' has validation errors:\n\n{}\nExpected parameters:\n{}\nPlease fix these errors and provide corrected parameters.",
        tool_name,
        numbered_errors(errors),
        format_schema_hints(&tool.parameters_schema())
    )
}

/// Required fields, then one line per property in name order.
pub fn format_schema_hints(schema: &ParameterSchema) -> String {
    let mut out = String::new();
    if !schema.required.is_empty() {
        out.push_str(&format!("Required fields: {}\n", schema.required.join(", ")));
    }
    for (name, prop) in &schema.properties {
        out.push_str(&format!("- {} ({})", name, prop.type_label()));
        if !prop.description.is_empty() {
            out.push_str(&format!(": {}", prop.description));
        }
        if !prop.enum_values.is_empty() {
            out.push_str(&format!(" [allowed values: {}]", prop.enum_values.join(", ")));
        }
        out.push('\n');
    }
    out
}
