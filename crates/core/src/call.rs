//! Tool Call Data Model
//!
//! A `ToolCall` is one function-call request from the calling model: a
//! caller-assigned id (unique within a batch only), the capability name and
//! the raw argument mapping.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};
use crate::value::{args_from_json, ArgMap, ArgValue};

/// A single requested capability invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: ArgMap,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: ArgMap) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Build a call from a JSON object of arguments.
    ///
    /// Any non-object JSON is rejected.
    pub fn from_json(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> CoreResult<Self> {
        let name = name.into();
        let arguments = args_from_json(arguments).ok_or_else(|| {
            CoreError::parse(format!("arguments for {} must be a JSON object", name))
        })?;
        Ok(Self::new(id, name, arguments))
    }

    /// Build a call from the raw argument text a model produced.
    ///
    /// Empty (or whitespace-only) text yields an empty argument mapping; JSON
    /// `null` is treated the same way.
    pub fn from_json_arguments(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments_json: &str,
    ) -> CoreResult<Self> {
        let name = name.into();
        if arguments_json.trim().is_empty() {
            return Ok(Self::new(id, name, ArgMap::new()));
        }
        let value: Value = serde_json::from_str(arguments_json)
            .map_err(|e| CoreError::parse(format!("parse arguments for {}: {}", name, e)))?;
        if value.is_null() {
            return Ok(Self::new(id, name, ArgMap::new()));
        }
        Self::from_json(id, name, value)
    }

    /// Parse a `{"name": ..., "parameters": {...}}` envelope, as emitted by
    /// models that describe calls in plain JSON rather than native function
    /// calling. Such envelopes carry no id, so one is generated.
    pub fn parse_envelope(data: &[u8]) -> CoreResult<Self> {
        #[derive(Deserialize)]
        struct Envelope {
            name: String,
            #[serde(default)]
            parameters: Option<Value>,
        }

        let envelope: Envelope = serde_json::from_slice(data)
            .map_err(|e| CoreError::parse(format!("parse tool call: {}", e)))?;
        if envelope.name.is_empty() {
            return Err(CoreError::parse("tool call envelope has an empty name"));
        }
        let id = format!("call_{}", uuid::Uuid::new_v4().simple());
        match envelope.parameters {
            None | Some(Value::Null) => Ok(Self::new(id, envelope.name, ArgMap::new())),
            Some(params) => Self::from_json(id, envelope.name, params),
        }
    }

    pub fn argument(&self, name: &str) -> Option<&ArgValue> {
        self.arguments.get(name)
    }
}
