//! Control-Flow Manager
//!
//! Facade composing the validator, the parallel dispatcher and per-call
//! repair bookkeeping. Each processing round takes every call through:
//!
//! 1. repair-ceiling check (terminal once the ceiling is reached)
//! 2. validation against the live schema (failures need repair, never execute)
//! 3. execution of the coerced arguments (failures are terminal, never retried)
//!
//! Repair counters are scoped to one manager instance, so one manager per
//! conversation keeps sessions from bleeding into each other.

use std::sync::Arc;

use dashmap::DashMap;

use toolgate_core::call::ToolCall;
use toolgate_core::context::ToolContext;
use toolgate_core::tool_trait::ToolRegistry;
use toolgate_core::value::ArgMap;
use toolgate_tools::executor::{CallFailure, DispatchResult, ParallelExecutor};
use toolgate_tools::validator::{ValidationError, ValidationErrorCode, ValidationErrors, Validator};

use super::processed::{CallOutcome, ProcessedResult};
use super::repair::{build_detailed_repair_message, build_repair_message, RepairRequest};
use crate::models::config::ControlFlowConfig;

/// Where a call stands after the validation phase of a round.
enum Stage {
    Settled(ProcessedResult),
    Execute {
        original: ToolCall,
        validated: ToolCall,
        attempts: u32,
    },
}

pub struct ControlFlowManager {
    config: ControlFlowConfig,
    registry: Arc<ToolRegistry>,
    validator: Validator,
    executor: ParallelExecutor,
    repair_attempts: DashMap<String, u32>,
}

impl ControlFlowManager {
    /// Create a manager. Zero limits in `config` fall back to the defaults.
    pub fn new(registry: Arc<ToolRegistry>, config: ControlFlowConfig) -> Self {
        let config = config.normalized();
        Self {
            validator: Validator::new(config.validator),
            executor: ParallelExecutor::new(Arc::clone(&registry), config.executor_config()),
            registry,
            config,
            repair_attempts: DashMap::new(),
        }
    }

    pub fn with_defaults(registry: Arc<ToolRegistry>) -> Self {
        Self::new(registry, ControlFlowConfig::default())
    }

    pub fn config(&self) -> &ControlFlowConfig {
        &self.config
    }

    /// Replace the configuration, rebuilding the validator and resizing the
    /// dispatcher. Repair counters are kept.
    pub fn set_config(&mut self, config: ControlFlowConfig) {
        let config = config.normalized();
        let exec = config.executor_config();
        self.executor.set_max_concurrency(exec.max_concurrency);
        self.executor.set_timeout(exec.timeout);
        self.validator = Validator::new(config.validator);
        self.config = config;
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn executor(&self) -> &ParallelExecutor {
        &self.executor
    }

    // ── Repair bookkeeping ─────────────────────────────────────────────

    /// Validation failures recorded for a call id.
    pub fn repair_attempts(&self, call_id: &str) -> u32 {
        self.repair_attempts.get(call_id).map(|v| *v).unwrap_or(0)
    }

    fn increment_repair_attempts(&self, call_id: &str) -> u32 {
        let mut entry = self.repair_attempts.entry(call_id.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    pub fn reset_repair_attempts(&self, call_id: &str) {
        self.repair_attempts.remove(call_id);
    }

    pub fn reset_all_repair_attempts(&self) {
        self.repair_attempts.clear();
    }

    /// Whether another validation failure would still be accepted for `call_id`.
    pub fn can_retry(&self, call_id: &str) -> bool {
        self.repair_attempts(call_id) < self.config.max_repair_attempts
    }

    // ── Validation ─────────────────────────────────────────────────────

    /// Validate a call against its capability's schema.
    ///
    /// Returns the call with coerced arguments and every error found. An
    /// unknown capability yields a single `tool_not_found` error. With
    /// validation disabled the call is returned untouched.
    pub fn validate_tool_call(&self, call: &ToolCall) -> (ToolCall, ValidationErrors) {
        if !self.config.enable_validation {
            return (call.clone(), ValidationErrors::new());
        }

        let Some(tool) = self.registry.get(&call.name) else {
            let error = ValidationError::new(
                "name",
                ValidationErrorCode::ToolNotFound,
                format!("tool '{}' not found in registry", call.name),
            )
            .with_value(call.name.as_str().into());
            return (call.clone(), vec![error].into());
        };

        let outcome = self.validator.validate(&tool.parameters_schema(), &call.arguments);
        let validated = ToolCall::new(call.id.clone(), call.name.clone(), outcome.arguments);
        (validated, outcome.errors)
    }

    /// Repair message in the configured style.
    pub fn build_repair_message(&self, tool_name: &str, errors: &ValidationErrors) -> String {
        if self.config.detailed_repair_messages {
            build_detailed_repair_message(tool_name, errors, &self.registry)
        } else {
            build_repair_message(tool_name, errors)
        }
    }

    /// Repair request for a result awaiting repair; `None` otherwise.
    pub fn create_repair_request(&self, result: &ProcessedResult) -> Option<RepairRequest> {
        if !result.needs_repair() {
            return None;
        }
        let repair_message = result
            .repair_message
            .clone()
            .unwrap_or_else(|| self.build_repair_message(&result.name, &result.validation_errors));
        Some(RepairRequest {
            call_id: result.id.clone(),
            tool_name: result.name.clone(),
            original_call: result.original_call(),
            errors: result.validation_errors.clone(),
            repair_message,
        })
    }

    // ── Processing ─────────────────────────────────────────────────────

    fn prepare(&self, call: ToolCall) -> Stage {
        let attempts = self.repair_attempts(&call.id);
        if attempts >= self.config.max_repair_attempts {
            tracing::warn!(
                tool = %call.name,
                call_id = %call.id,
                attempts,
                "repair ceiling reached, rejecting call"
            );
            let failure = CallFailure::MaxRepairAttempts {
                max: self.config.max_repair_attempts,
                call_id: call.id.clone(),
            };
            return Stage::Settled(ProcessedResult::new(&call, attempts, CallOutcome::Failed(failure)));
        }

        let (validated, errors) = self.validate_tool_call(&call);
        if !errors.is_empty() {
            let attempts = self.increment_repair_attempts(&call.id);
            tracing::info!(
                tool = %call.name,
                call_id = %call.id,
                attempts,
                errors = errors.len(),
                "tool call failed validation: {}",
                errors
            );
            let mut result = ProcessedResult::new(&call, attempts, CallOutcome::NeedsRepair);
            result.repair_message = Some(self.build_repair_message(&call.name, &errors));
            result.validation_errors = errors;
            return Stage::Settled(result);
        }

        Stage::Execute {
            original: call,
            validated,
            attempts,
        }
    }

    fn settle(original: &ToolCall, validated_args: ArgMap, attempts: u32, dispatched: DispatchResult) -> ProcessedResult {
        let outcome = match dispatched.result {
            Ok(tool_result) => CallOutcome::Succeeded(tool_result),
            Err(failure) => {
                tracing::debug!(
                    tool = %original.name,
                    call_id = %original.id,
                    kind = failure.kind(),
                    "tool call failed: {}",
                    failure
                );
                CallOutcome::Failed(failure)
            }
        };
        let mut result = ProcessedResult::new(original, attempts, outcome);
        result.validated_args = Some(validated_args);
        result
    }

    /// Process one round of calls. `results[i]` always corresponds to `calls[i]`.
    pub async fn process_tool_calls(&self, calls: Vec<ToolCall>, ctx: &ToolContext) -> Vec<ProcessedResult> {
        if calls.is_empty() {
            return Vec::new();
        }

        let mut slots: Vec<Option<ProcessedResult>> = Vec::with_capacity(calls.len());
        let mut pending: Vec<(usize, ToolCall, ArgMap, u32)> = Vec::new();
        let mut to_execute: Vec<ToolCall> = Vec::new();

        for (index, call) in calls.into_iter().enumerate() {
            match self.prepare(call) {
                Stage::Settled(result) => slots.push(Some(result)),
                Stage::Execute {
                    original,
                    validated,
                    attempts,
                } => {
                    slots.push(None);
                    pending.push((index, original, validated.arguments.clone(), attempts));
                    to_execute.push(validated);
                }
            }
        }

        if !to_execute.is_empty() {
            let dispatched = if self.config.enable_parallel_execution && to_execute.len() > 1 {
                self.executor.execute_batch(to_execute, ctx).await
            } else {
                let mut out = Vec::with_capacity(to_execute.len());
                for call in to_execute {
                    out.push(self.executor.execute_one(call, ctx).await);
                }
                out
            };

            for ((index, original, validated_args, attempts), dispatched) in pending.into_iter().zip(dispatched) {
                slots[index] = Some(Self::settle(&original, validated_args, attempts, dispatched));
            }
        }

        slots.into_iter().flatten().collect()
    }

    /// Process a single call.
    pub async fn process_tool_call(&self, call: ToolCall, ctx: &ToolContext) -> ProcessedResult {
        match self.prepare(call) {
            Stage::Settled(result) => result,
            Stage::Execute {
                original,
                validated,
                attempts,
            } => {
                let validated_args = validated.arguments.clone();
                let dispatched = self.executor.execute_one(validated, ctx).await;
                Self::settle(&original, validated_args, attempts, dispatched)
            }
        }
    }
}

impl std::fmt::Debug for ControlFlowManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlFlowManager")
            .field("config", &self.config)
            .field("tracked_calls", &self.repair_attempts.len())
            .finish()
    }
}
