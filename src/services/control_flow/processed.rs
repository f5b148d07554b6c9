//! Processed Results
//!
//! The per-call output of a processing round. A call ends a round in exactly
//! one of three states: executed successfully, awaiting repair, or failed.

use serde_json::Value;

use toolgate_core::call::ToolCall;
use toolgate_core::tool_trait::ToolResult;
use toolgate_core::value::ArgMap;
use toolgate_tools::executor::CallFailure;
use toolgate_tools::validator::ValidationErrors;

/// Terminal or pending state of one call.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    /// Executed; the capability reported success
    Succeeded(ToolResult),
    /// Rejected by validation; the caller may resubmit a corrected call
    NeedsRepair,
    /// Terminal for this round
    Failed(CallFailure),
}

/// Result of processing one tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedResult {
    pub id: String,
    pub name: String,
    /// Arguments exactly as submitted
    pub arguments: ArgMap,
    /// Coerced arguments that were handed to the capability
    pub validated_args: Option<ArgMap>,
    /// Validation errors; still populated after a needs-repair result is
    /// converted into a terminal failure
    pub validation_errors: ValidationErrors,
    /// Repair attempts recorded for this call id after this round
    pub repair_attempts: u32,
    /// Guidance for the calling model when repair is needed
    pub repair_message: Option<String>,
    pub outcome: CallOutcome,
}

impl ProcessedResult {
    pub(crate) fn new(call: &ToolCall, repair_attempts: u32, outcome: CallOutcome) -> Self {
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
            validated_args: None,
            validation_errors: ValidationErrors::new(),
            repair_attempts,
            repair_message: None,
            outcome,
        }
    }

    pub fn success(&self) -> bool {
        matches!(self.outcome, CallOutcome::Succeeded(_))
    }

    pub fn needs_repair(&self) -> bool {
        matches!(self.outcome, CallOutcome::NeedsRepair)
    }

    pub fn failure(&self) -> Option<&CallFailure> {
        match &self.outcome {
            CallOutcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn tool_result(&self) -> Option<&ToolResult> {
        match &self.outcome {
            CallOutcome::Succeeded(result) => Some(result),
            _ => None,
        }
    }

    /// The raw capability payload on success.
    pub fn payload(&self) -> Option<&Value> {
        self.tool_result().map(|r| &r.data)
    }

    /// The call as originally submitted.
    pub fn original_call(&self) -> ToolCall {
        ToolCall::new(self.id.clone(), self.name.clone(), self.arguments.clone())
    }

    /// Convert a pending repair into a terminal failure, keeping the
    /// validation errors for display. Settled results are left alone.
    pub(crate) fn give_up(&mut self, failure: CallFailure) {
        if self.needs_repair() {
            self.outcome = CallOutcome::Failed(failure);
        }
    }

    /// English summary suitable for a follow-up model prompt.
    pub fn to_llm_message(&self) -> String {
        let mut out = format!("Tool: {} (ID: {})\n", self.name, self.id);

        match &self.outcome {
            CallOutcome::NeedsRepair => {
                out.push_str("Status: Validation Failed - Repair Required\n");
                match &self.repair_message {
                    Some(message) => {
                        out.push_str(message);
                        out.push('\n');
                    }
                    None => {
                        out.push_str("Errors:\n");
                        out.push_str(&self.validation_errors.to_llm_message());
                        out.push('\n');
                    }
                }
            }
            CallOutcome::Failed(CallFailure::Reported(message)) => {
                out.push_str("Status: Failed\n");
                out.push_str(&format!("Error: {}\n", message));
            }
            CallOutcome::Failed(failure) => {
                out.push_str(&format!("Status: Execution Failed\nError: {}\n", failure));
                if !self.validation_errors.is_empty() {
                    out.push_str("Unresolved validation errors:\n");
                    out.push_str(&self.validation_errors.to_llm_message());
                    out.push('\n');
                }
            }
            CallOutcome::Succeeded(result) => {
                out.push_str("Status: Success\n");
                match &result.data {
                    Value::Null => {}
                    Value::String(s) => out.push_str(&format!("Result: {}\n", s)),
                    other => out.push_str(&format!("Result: {}\n", other)),
                }
            }
        }

        out
    }
}

/// Render a whole batch for a follow-up prompt, one block per call in input order.
pub fn format_results_for_llm(results: &[ProcessedResult]) -> String {
    results
        .iter()
        .map(ProcessedResult::to_llm_message)
        .collect::<Vec<_>>()
        .join("\n")
}
