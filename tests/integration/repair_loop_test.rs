//! Repair Loop Integration Tests
//!
//! Runs `process_with_repair` against a scripted model that fixes calls
//! over successive rounds.

use std::sync::atomic::Ordering;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use toolgate::{
    args_from_json, CallFailure, ControlFlowConfig, ControlFlowManager, CoreResult,
    RepairRequest, RepairSource, ToolCall, ToolContext, ValidationErrorCode,
};

use crate::common::{registry_with, search_schema, RecordingTool};

/// Model double that replays one scripted answer per round.
struct ScriptedModel {
    rounds: Mutex<Vec<Vec<(String, serde_json::Value)>>>,
    requests: Mutex<Vec<RepairRequest>>,
}

impl ScriptedModel {
    fn new(mut rounds: Vec<Vec<(&str, serde_json::Value)>>) -> Self {
        rounds.reverse();
        Self {
            rounds: Mutex::new(
                rounds
                    .into_iter()
                    .map(|r| r.into_iter().map(|(id, v)| (id.to_string(), v)).collect())
                    .collect(),
            ),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RepairSource for ScriptedModel {
    async fn repair(&self, requests: Vec<RepairRequest>) -> CoreResult<Vec<ToolCall>> {
        let names: std::collections::HashMap<_, _> = requests
            .iter()
            .map(|r| (r.call_id.clone(), r.tool_name.clone()))
            .collect();
        self.requests.lock().unwrap().extend(requests);

        let answer = self.rounds.lock().unwrap().pop().unwrap_or_default();
        Ok(answer
            .into_iter()
            .map(|(id, args)| {
                let name = names.get(&id).cloned().unwrap_or_else(|| "web_search".to_string());
                ToolCall::new(id, name, args_from_json(args).unwrap())
            })
            .collect())
    }
}

fn call(id: &str, args: serde_json::Value) -> ToolCall {
    ToolCall::new(id, "web_search", args_from_json(args).unwrap())
}

#[tokio::test]
async fn test_multi_round_repair_converges() {
    let config = ControlFlowConfig {
        max_repair_attempts: 3,
        ..Default::default()
    };
    let search = RecordingTool::new("web_search", search_schema());
    let executions = search.executions();
    let manager = ControlFlowManager::new(registry_with(vec![search]), config);

    let model = ScriptedModel::new(vec![
        // round 1: fixes the enum but forgets the query
        vec![("c1", json!({"mode": "fast"}))],
        // round 2: fully correct
        vec![("c1", json!({"query": "rust", "mode": "fast"}))],
    ]);

    let results = manager
        .process_with_repair(
            vec![call("c1", json!({"mode": "turbo"}))],
            &ToolContext::default(),
            &model,
            None,
        )
        .await
        .unwrap();

    assert!(results[0].success(), "{}", results[0].to_llm_message());
    assert_eq!(executions.load(Ordering::SeqCst), 1);
    assert_eq!(manager.repair_attempts("c1"), 2);

    let requests = model.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].errors.has_code(ValidationErrorCode::EnumViolation));
    assert!(requests[0].repair_message.contains("allowed values: fast, deep"));
    assert_eq!(requests[1].errors.len(), 1);
    assert_eq!(requests[1].original_call.arguments.len(), 1);
}

#[tokio::test]
async fn test_repair_keeps_positions_and_successes() {
    let manager = ControlFlowManager::with_defaults(registry_with(vec![RecordingTool::new(
        "web_search",
        search_schema(),
    )]));
    let model = ScriptedModel::new(vec![vec![("bad", json!({"query": "fixed"}))]]);

    let results = manager
        .process_with_repair(
            vec![
                call("good", json!({"query": "one"})),
                call("bad", json!({"limit": 3})),
                call("also_good", json!({"query": "three"})),
            ],
            &ToolContext::default(),
            &model,
            Some(3),
        )
        .await
        .unwrap();

    let ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["good", "bad", "also_good"]);
    assert!(results.iter().all(|r| r.success()));
    assert_eq!(results[1].payload().unwrap()["args"]["query"], "fixed");
}

#[tokio::test]
async fn test_stubborn_model_ends_in_terminal_failure() {
    let search = RecordingTool::new("web_search", search_schema());
    let executions = search.executions();
    let manager = ControlFlowManager::with_defaults(registry_with(vec![search]));
    let model = ScriptedModel::new(vec![
        vec![("c1", json!({"limit": "x"}))],
        vec![("c1", json!({"limit": "y"}))],
        vec![("c1", json!({"limit": "z"}))],
    ]);

    let results = manager
        .process_with_repair(vec![call("c1", json!({}))], &ToolContext::default(), &model, None)
        .await
        .unwrap();

    assert!(!results[0].needs_repair());
    assert!(matches!(
        results[0].failure(),
        Some(CallFailure::MaxRepairAttempts { max: 2, .. })
    ));
    assert!(!results[0].validation_errors.is_empty());
    assert_eq!(executions.load(Ordering::SeqCst), 0);
    // ceiling of 2 allows exactly one repair round
    assert_eq!(model.requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_execution_failures_are_not_sent_for_repair() {
    let manager = ControlFlowManager::with_defaults(registry_with(vec![]));
    let model = ScriptedModel::new(vec![]);

    let config = ControlFlowConfig {
        enable_validation: false,
        ..Default::default()
    };
    let mut manager = manager;
    manager.set_config(config);

    let results = manager
        .process_with_repair(vec![call("c1", json!({}))], &ToolContext::default(), &model, None)
        .await
        .unwrap();

    assert_eq!(
        results[0].failure(),
        Some(&CallFailure::ToolNotFound("web_search".to_string()))
    );
    assert!(model.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unrequested_corrections_are_ignored() {
    let manager = ControlFlowManager::with_defaults(registry_with(vec![RecordingTool::new(
        "web_search",
        search_schema(),
    )]));
    let model = ScriptedModel::new(vec![vec![("someone_else", json!({"query": "q"}))]]);

    let results = manager
        .process_with_repair(vec![call("c1", json!({}))], &ToolContext::default(), &model, None)
        .await
        .unwrap();

    // the loop stops early with the call still under its ceiling
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "c1");
    assert_eq!(manager.repair_attempts("c1"), 1);
    assert_eq!(
        results[0].failure(),
        Some(&CallFailure::RepairRoundsExhausted {
            rounds: 1,
            call_id: "c1".to_string()
        })
    );
    assert!(!results[0].to_llm_message().contains("max repair attempts"));
}
