//! Parallel Dispatcher Integration Tests
//!
//! Verifies index-stable results under bounded concurrency, panic
//! containment alongside healthy calls, and cancellation of queued work.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use toolgate::{
    ArgMap, CallFailure, CancellationToken, ControlFlowConfig, ControlFlowManager, ExecutorConfig,
    FunctionTool, ParallelExecutor, ParameterSchema, ToolCall, ToolContext, ToolRegistry,
    ToolResult,
};

use crate::common::{registry_with, RecordingTool};

fn empty_call(id: &str, name: &str) -> ToolCall {
    ToolCall::new(id, name, ArgMap::new())
}

#[tokio::test]
async fn test_five_calls_under_concurrency_three() {
    // Later calls finish first so completion order is the reverse of input order
    let tools: Vec<_> = (0..5)
        .map(|i| {
            RecordingTool::new(&format!("tool_{}", i), ParameterSchema::empty())
                .with_delay(Duration::from_millis(10 * (5 - i as u64)))
        })
        .collect();
    let config = ControlFlowConfig {
        max_concurrency: 3,
        ..Default::default()
    };
    let manager = ControlFlowManager::new(registry_with(tools), config);

    let calls: Vec<_> = (0..5)
        .map(|i| empty_call(&format!("call_{}", i), &format!("tool_{}", i)))
        .collect();
    let results = manager.process_tool_calls(calls.clone(), &ToolContext::default()).await;

    assert_eq!(results.len(), 5);
    for (call, result) in calls.iter().zip(&results) {
        assert!(result.success(), "{}", result.to_llm_message());
        assert_eq!(result.name, call.name);
        assert_eq!(result.id, call.id);
        assert_eq!(result.payload().unwrap()["call_id"], json!(call.id));
    }
}

#[tokio::test]
async fn test_peak_concurrency_respects_permit_pool() {
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (r, p) = (Arc::clone(&running), Arc::clone(&peak));
    let tool = FunctionTool::new("work", "busy work", ParameterSchema::empty(), move |_ctx, _args| {
        let running = Arc::clone(&r);
        let peak = Arc::clone(&p);
        Box::pin(async move {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            running.fetch_sub(1, Ordering::SeqCst);
            Ok(ToolResult::ok("done"))
        })
    });
    let registry = ToolRegistry::new();
    registry.register(Arc::new(tool)).unwrap();

    let executor = ParallelExecutor::new(
        Arc::new(registry),
        ExecutorConfig {
            max_concurrency: 2,
            timeout: Duration::from_secs(5),
        },
    );
    let calls = (0..8).map(|i| empty_call(&i.to_string(), "work")).collect();
    let results = executor.execute_batch(calls, &ToolContext::default()).await;

    assert!(results.iter().all(|r| r.is_success()));
    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert!(peak.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn test_panicking_capability_does_not_poison_batch() {
    let registry = ToolRegistry::new();
    registry
        .register(Arc::new(FunctionTool::new(
            "explode",
            "panics",
            ParameterSchema::empty(),
            |_ctx, args| {
                Box::pin(async move {
                    if args.is_empty() {
                        panic!("capability received no arguments");
                    }
                    Ok(ToolResult::ok(args.len()))
                })
            },
        )))
        .unwrap();
    registry
        .register(Arc::new(RecordingTool::new("steady", ParameterSchema::empty())))
        .unwrap();
    let manager = ControlFlowManager::with_defaults(Arc::new(registry));

    let results = manager
        .process_tool_calls(
            vec![empty_call("a", "steady"), empty_call("b", "explode"), empty_call("c", "steady")],
            &ToolContext::default(),
        )
        .await;

    assert!(results[0].success());
    assert_eq!(
        results[1].failure(),
        Some(&CallFailure::Panicked("capability received no arguments".to_string()))
    );
    assert!(!results[1].needs_repair());
    assert!(results[2].success());
    assert!(results[1].to_llm_message().contains("Status: Execution Failed"));
}

#[tokio::test]
async fn test_cancelled_context_resolves_queued_calls() {
    let tool = RecordingTool::new("slow", ParameterSchema::empty());
    let executions = tool.executions();
    let manager = ControlFlowManager::with_defaults(registry_with(vec![tool]));

    let token = CancellationToken::new();
    token.cancel();
    let ctx = ToolContext::new("session").with_cancellation_token(token);

    let results = manager
        .process_tool_calls(vec![empty_call("a", "slow"), empty_call("b", "slow")], &ctx)
        .await;

    assert!(results.iter().all(|r| r.failure() == Some(&CallFailure::Cancelled)));
    assert_eq!(executions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_timeout_is_terminal_not_repair() {
    let registry = ToolRegistry::new();
    registry
        .register(Arc::new(FunctionTool::new(
            "hang",
            "waits for cancellation",
            ParameterSchema::empty(),
            |ctx, _args| {
                Box::pin(async move {
                    ctx.cancellation_token().cancelled().await;
                    Err::<ToolResult, _>(toolgate::CoreError::execution("stopped"))
                })
            },
        )))
        .unwrap();
    let mut manager = ControlFlowManager::with_defaults(Arc::new(registry));
    let mut config = manager.config().clone();
    config.tool_timeout_secs = 1;
    manager.set_config(config);

    let result = manager
        .process_tool_call(empty_call("a", "hang"), &ToolContext::default())
        .await;

    assert_eq!(result.failure(), Some(&CallFailure::Timeout(Duration::from_secs(1))));
    assert_eq!(manager.repair_attempts("a"), 0);
    assert!(result
        .to_llm_message()
        .contains("tool execution timed out after 1s"));
}

#[tokio::test]
async fn test_huge_configured_timeout_does_not_fail_calls() {
    let config = ControlFlowConfig::from_toml_str("tool_timeout_secs = 9223372036854775807").unwrap();
    let manager = ControlFlowManager::new(
        registry_with(vec![RecordingTool::new("steady", ParameterSchema::empty())]),
        config,
    );
    let ctx = ToolContext::default();

    let single = manager.process_tool_call(empty_call("a", "steady"), &ctx).await;
    assert!(single.success(), "{}", single.to_llm_message());

    let results = manager
        .process_tool_calls(vec![empty_call("b", "steady"), empty_call("c", "steady")], &ctx)
        .await;
    assert!(results.iter().all(|r| r.success()));
}
