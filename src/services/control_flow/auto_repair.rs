//! Auto-Repair Driver
//!
//! Runs the repair loop against a [`RepairSource`]: process a batch, hand
//! every call that still needs repair back to the source, resubmit what comes
//! back, and repeat until nothing needs repair or the round budget runs out.

use std::collections::{HashMap, VecDeque};

use toolgate_core::call::ToolCall;
use toolgate_core::context::ToolContext;
use toolgate_core::error::CoreResult;
use toolgate_tools::executor::CallFailure;

use super::manager::ControlFlowManager;
use super::processed::ProcessedResult;
use super::repair::{RepairRequest, RepairSource};

impl ControlFlowManager {
    /// Process `calls`, feeding validation failures to `source` for correction.
    ///
    /// `max_rounds` counts processing passes, the first included; `None` or
    /// zero uses `max_tool_iterations`. The returned list mirrors the input
    /// positions, each slot holding the latest result for that call. Calls
    /// still awaiting repair when the loop stops become terminal failures with
    /// their validation errors attached: `MaxRepairAttempts` when the call hit
    /// its ceiling, `RepairRoundsExhausted` otherwise.
    pub async fn process_with_repair(
        &self,
        calls: Vec<ToolCall>,
        ctx: &ToolContext,
        source: &dyn RepairSource,
        max_rounds: Option<u32>,
    ) -> CoreResult<Vec<ProcessedResult>> {
        let rounds = max_rounds
            .filter(|r| *r > 0)
            .unwrap_or(self.config().max_tool_iterations);

        let mut results = self.process_tool_calls(calls, ctx).await;
        let mut passes = 1;

        for round in 1..rounds {
            let pending: Vec<usize> = results
                .iter()
                .enumerate()
                .filter(|(_, r)| r.needs_repair() && self.can_retry(&r.id))
                .map(|(i, _)| i)
                .collect();
            if pending.is_empty() {
                break;
            }

            let requests: Vec<RepairRequest> = pending
                .iter()
                .filter_map(|&i| self.create_repair_request(&results[i]))
                .collect();
            tracing::info!(round, calls = requests.len(), "requesting tool call repairs");

            let corrected = source.repair(requests).await?;
            let (slots, resubmit) = match_corrections(&results, &pending, corrected);
            if resubmit.is_empty() {
                tracing::debug!(round, "repair source returned no usable corrections");
                break;
            }

            let round_results = self.process_tool_calls(resubmit, ctx).await;
            for (slot, result) in slots.into_iter().zip(round_results) {
                results[slot] = result;
            }
            passes += 1;
        }

        let max = self.config().max_repair_attempts;
        for result in results.iter_mut().filter(|r| r.needs_repair()) {
            let call_id = result.id.clone();
            let failure = if self.can_retry(&call_id) {
                CallFailure::RepairRoundsExhausted { rounds: passes, call_id }
            } else {
                CallFailure::MaxRepairAttempts { max, call_id }
            };
            tracing::warn!(
                tool = %result.name,
                call_id = %result.id,
                attempts = result.repair_attempts,
                reason = failure.kind(),
                "giving up on tool call repair"
            );
            result.give_up(failure);
        }

        Ok(results)
    }
}

/// Pair corrected calls with the slots they repair, by call id. Each pending
/// slot is filled at most once; unrequested ids are dropped.
fn match_corrections(
    results: &[ProcessedResult],
    pending: &[usize],
    corrected: Vec<ToolCall>,
) -> (Vec<usize>, Vec<ToolCall>) {
    let mut open: HashMap<&str, VecDeque<usize>> = HashMap::new();
    for &i in pending {
        open.entry(results[i].id.as_str()).or_default().push_back(i);
    }

    let mut slots = Vec::with_capacity(corrected.len());
    let mut calls = Vec::with_capacity(corrected.len());
    for call in corrected {
        match open.get_mut(call.id.as_str()).and_then(VecDeque::pop_front) {
            Some(slot) => {
                slots.push(slot);
                calls.push(call);
            }
            None => tracing::warn!(call_id = %call.id, "ignoring correction for a call that was not pending"),
        }
    }
    (slots, calls)
}
