//! Streaming Tool-Call Fragment Types
//!
//! Providers that stream function calls deliver them as a sequence of deltas
//! keyed by a positional index. The id and name may themselves arrive late or
//! be repeated; the argument text arrives in arbitrary slices. These types are
//! shared by provider adapters (producers) and the accumulator (consumer).

use serde::{Deserialize, Serialize};

use crate::call::ToolCall;
use crate::error::CoreResult;

/// One partial tool-call fragment from a stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    /// Position of the call within the streamed response.
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Argument text slice; concatenated in arrival order.
    #[serde(default)]
    pub arguments: String,
}

impl ToolCallDelta {
    /// A fragment carrying only argument text.
    pub fn arguments(index: usize, arguments: impl Into<String>) -> Self {
        Self {
            index,
            arguments: arguments.into(),
            ..Self::default()
        }
    }

    /// A fragment that opens a call with its id and name.
    pub fn start(index: usize, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            index,
            id: Some(id.into()),
            name: Some(name.into()),
            arguments: String::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_arguments(mut self, arguments: impl Into<String>) -> Self {
        self.arguments = arguments.into();
        self
    }
}

/// A fully assembled call whose argument text has not been parsed yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamToolCall {
    pub id: String,
    pub name: String,
    /// Complete JSON string of tool arguments
    pub arguments: String,
}

impl StreamToolCall {
    /// Parse the assembled argument text into a `ToolCall`.
    pub fn into_tool_call(self) -> CoreResult<ToolCall> {
        ToolCall::from_json_arguments(self.id, self.name, &self.arguments)
    }
}
