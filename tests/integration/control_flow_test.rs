//! Control-Flow Integration Tests
//!
//! Drives `ControlFlowManager` through the public crate surface:
//! - coercion and multi-error reporting against realistic schemas
//! - repair ceiling and counter scoping per manager
//! - batch ordering across mixed outcomes
//! - prompt rendering of a whole batch

use std::sync::atomic::Ordering;

use serde_json::json;
use toolgate::{
    args_from_json, format_results_for_llm, ArgValue, CallFailure, ControlFlowConfig,
    ControlFlowManager, ToolCall, ToolContext, ValidationErrorCode,
};

use crate::common::{profile_schema, registry_with, search_schema, RecordingTool};

fn call(id: &str, name: &str, args: serde_json::Value) -> ToolCall {
    ToolCall::new(id, name, args_from_json(args).unwrap())
}

// ============================================================================
// Validation through the manager
// ============================================================================

#[tokio::test]
async fn test_coerced_arguments_reach_the_capability() {
    let search = RecordingTool::new("web_search", search_schema());
    let manager = ControlFlowManager::with_defaults(registry_with(vec![search]));

    let result = manager
        .process_tool_call(
            call("c1", "web_search", json!({"query": 42, "limit": "5", "safe": "yes"})),
            &ToolContext::new("session-1"),
        )
        .await;

    assert!(result.success(), "{}", result.to_llm_message());
    let args = &result.payload().unwrap()["args"];
    assert_eq!(args["query"], "42");
    assert_eq!(args["limit"], 5);
    assert_eq!(args["safe"], true);
}

#[tokio::test]
async fn test_every_violation_reported_in_one_round() {
    let search = RecordingTool::new("web_search", search_schema());
    let executions = search.executions();
    let manager = ControlFlowManager::with_defaults(registry_with(vec![search]));

    let result = manager
        .process_tool_call(
            call("c1", "web_search", json!({"limit": 2.5, "safe": "maybe", "mode": "slow"})),
            &ToolContext::default(),
        )
        .await;

    assert!(result.needs_repair());
    let codes: Vec<_> = result.validation_errors.iter().map(|e| e.code).collect();
    assert_eq!(
        codes,
        vec![
            ValidationErrorCode::Required,
            ValidationErrorCode::TypeMismatch,
            ValidationErrorCode::EnumViolation,
            ValidationErrorCode::CoercionFailed,
        ]
    );
    assert_eq!(executions.load(Ordering::SeqCst), 0);

    let message = result.repair_message.unwrap();
    assert!(message.contains("1. Field 'query': required field is missing"));
    assert!(message.contains("Required fields: query"));
    assert!(message.contains("- mode (string): Search depth [allowed values: fast, deep]"));
}

#[tokio::test]
async fn test_nested_required_field() {
    let profile = RecordingTool::new("profile", profile_schema());
    let manager = ControlFlowManager::with_defaults(registry_with(vec![profile]));

    let result = manager
        .process_tool_call(call("c1", "profile", json!({"user": {}})), &ToolContext::default())
        .await;

    assert_eq!(result.validation_errors.len(), 1);
    assert_eq!(result.validation_errors[0].field, "user.name");
    assert_eq!(result.validation_errors[0].code, ValidationErrorCode::Required);
}

#[tokio::test]
async fn test_nested_coercion_replaces_values() {
    let profile = RecordingTool::new("profile", profile_schema());
    let manager = ControlFlowManager::with_defaults(registry_with(vec![profile]));

    let result = manager
        .process_tool_call(
            call("c1", "profile", json!({"user": {"name": "Ann", "age": "41"}, "tags": [1, "a"]})),
            &ToolContext::default(),
        )
        .await;

    assert!(result.success());
    let validated = result.validated_args.as_ref().unwrap();
    let user = validated["user"].as_object().unwrap();
    assert_eq!(user["age"], ArgValue::Integer(41));
    assert_eq!(
        validated["tags"],
        ArgValue::Array(vec![ArgValue::from("1"), ArgValue::from("a")])
    );
}

#[tokio::test]
async fn test_reject_unknown_fields_mode() {
    let mut config = ControlFlowConfig::default();
    config.validator.reject_unknown_fields = true;
    let search = RecordingTool::new("web_search", search_schema());
    let manager = ControlFlowManager::new(registry_with(vec![search]), config);

    let result = manager
        .process_tool_call(
            call("c1", "web_search", json!({"query": "q", "page": 2})),
            &ToolContext::default(),
        )
        .await;

    assert!(result.needs_repair());
    assert_eq!(result.validation_errors[0].code, ValidationErrorCode::UnknownField);
    assert_eq!(result.validation_errors[0].field, "page");
}

// ============================================================================
// Repair ceiling
// ============================================================================

#[tokio::test]
async fn test_ceiling_reached_before_processing_never_executes() {
    let search = RecordingTool::new("web_search", search_schema());
    let executions = search.executions();
    let manager = ControlFlowManager::with_defaults(registry_with(vec![search]));
    let ctx = ToolContext::default();

    // two validation failures exhaust the default ceiling of 2
    for expected in 1..=2 {
        let r = manager.process_tool_call(call("c1", "web_search", json!({})), &ctx).await;
        assert_eq!(r.repair_attempts, expected);
    }

    let results = manager
        .process_tool_calls(vec![call("c1", "web_search", json!({"query": "valid now"}))], &ctx)
        .await;

    assert_eq!(results.len(), 1);
    let failure = results[0].failure().unwrap();
    assert!(matches!(failure, CallFailure::MaxRepairAttempts { max: 2, .. }));
    assert!(failure.to_string().contains("max repair attempts"));
    assert_eq!(executions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_counters_are_scoped_per_manager() {
    let registry = registry_with(vec![RecordingTool::new("web_search", search_schema())]);
    let first = ControlFlowManager::with_defaults(registry.clone());
    let second = ControlFlowManager::with_defaults(registry);
    let ctx = ToolContext::default();

    for _ in 0..2 {
        first.process_tool_call(call("c1", "web_search", json!({})), &ctx).await;
    }
    assert!(!first.can_retry("c1"));
    assert!(second.can_retry("c1"));

    let r = second
        .process_tool_call(call("c1", "web_search", json!({"query": "q"})), &ctx)
        .await;
    assert!(r.success());
}

#[tokio::test]
async fn test_bulk_reset_reopens_all_calls() {
    let manager = ControlFlowManager::with_defaults(registry_with(vec![RecordingTool::new(
        "web_search",
        search_schema(),
    )]));
    let ctx = ToolContext::default();
    for id in ["a", "b"] {
        for _ in 0..2 {
            manager.process_tool_call(call(id, "web_search", json!({})), &ctx).await;
        }
    }
    assert!(!manager.can_retry("a") && !manager.can_retry("b"));

    manager.reset_all_repair_attempts();
    assert_eq!(manager.repair_attempts("a"), 0);
    assert!(manager.can_retry("b"));
}

#[tokio::test]
async fn test_configured_ceiling() {
    let config = ControlFlowConfig {
        max_repair_attempts: 1,
        ..Default::default()
    };
    let manager = ControlFlowManager::new(
        registry_with(vec![RecordingTool::new("web_search", search_schema())]),
        config,
    );
    let ctx = ToolContext::default();

    let first = manager.process_tool_call(call("c1", "web_search", json!({})), &ctx).await;
    assert!(first.needs_repair());
    let second = manager.process_tool_call(call("c1", "web_search", json!({})), &ctx).await;
    assert!(matches!(second.failure(), Some(CallFailure::MaxRepairAttempts { max: 1, .. })));
}

// ============================================================================
// Batches
// ============================================================================

#[tokio::test]
async fn test_empty_batch_returns_empty() {
    let search = RecordingTool::new("web_search", search_schema());
    let executions = search.executions();
    let manager = ControlFlowManager::with_defaults(registry_with(vec![search]));

    let results = manager.process_tool_calls(Vec::new(), &ToolContext::default()).await;
    assert!(results.is_empty());
    assert_eq!(executions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_mixed_batch_positions_and_rendering() {
    let manager = ControlFlowManager::with_defaults(registry_with(vec![
        RecordingTool::new("web_search", search_schema()),
        RecordingTool::new("profile", profile_schema()),
    ]));

    let calls = vec![
        call("1", "profile", json!({"user": {"name": "Ann"}})),
        call("2", "web_search", json!({"query": "rust"})),
        call("3", "image_gen", json!({"prompt": "cat"})),
        call("4", "web_search", json!({"limit": "ten"})),
    ];
    let names: Vec<_> = calls.iter().map(|c| c.name.clone()).collect();
    let results = manager.process_tool_calls(calls, &ToolContext::default()).await;

    for (i, result) in results.iter().enumerate() {
        assert_eq!(result.name, names[i]);
    }
    assert!(results[0].success());
    assert!(results[1].success());
    assert_eq!(results[2].validation_errors[0].code, ValidationErrorCode::ToolNotFound);
    assert!(results[3].needs_repair());

    let text = format_results_for_llm(&results);
    assert!(text.contains("Tool: profile (ID: 1)\nStatus: Success"));
    assert!(text.contains("Tool: image_gen (ID: 3)\nStatus: Validation Failed - Repair Required"));
    assert!(text.contains("tool 'image_gen' not found in registry"));
}

#[tokio::test]
async fn test_parallel_disabled_runs_sequentially() {
    let config = ControlFlowConfig {
        enable_parallel_execution: false,
        ..Default::default()
    };
    let search = RecordingTool::new("web_search", search_schema());
    let executions = search.executions();
    let manager = ControlFlowManager::new(registry_with(vec![search]), config);

    let calls = (0..4)
        .map(|i| call(&format!("c{}", i), "web_search", json!({"query": i.to_string()})))
        .collect();
    let results = manager.process_tool_calls(calls, &ToolContext::default()).await;

    assert_eq!(executions.load(Ordering::SeqCst), 4);
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result.payload().unwrap()["args"]["query"], json!(i.to_string()));
    }
}

#[tokio::test]
async fn test_config_from_toml_drives_manager() {
    let config = ControlFlowConfig::from_toml_str(
        r#"
        max_repair_attempts = 3
        detailed_repair_messages = false

        [validator]
        coerce_types = false
        "#,
    )
    .unwrap();
    let manager = ControlFlowManager::new(
        registry_with(vec![RecordingTool::new("web_search", search_schema())]),
        config,
    );

    let result = manager
        .process_tool_call(
            call("c1", "web_search", json!({"query": "q", "limit": "5"})),
            &ToolContext::default(),
        )
        .await;

    assert!(result.needs_repair());
    assert_eq!(result.validation_errors[0].code, ValidationErrorCode::TypeMismatch);
    assert!(!result.repair_message.unwrap().contains("Expected parameters"));
    assert!(manager.can_retry("c1"));
}
