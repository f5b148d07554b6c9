//! Parallel Dispatcher
//!
//! Executes a batch of tool calls against the registry with a fixed-size
//! permit pool, a per-call timeout-derived context and panic containment.
//!
//! Results are index-stable: `results[i]` always belongs to `calls[i]`,
//! whatever order the calls finish in.
//!
//! Timeouts and cancellation are cooperative. When a call's timeout elapses,
//! its derived context is cancelled and the dispatcher keeps waiting for the
//! capability to return; a capability that ignores its context runs to
//! completion. Only calls still queued for a permit are resolved immediately
//! when the parent context is cancelled.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use toolgate_core::call::ToolCall;
use toolgate_core::context::ToolContext;
use toolgate_core::tool_trait::{ToolRegistry, ToolResult};

/// Default number of calls allowed to execute at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Default per-call timeout.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Configuration
// ============================================================================

/// Dispatcher limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Size of the permit pool
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Per-call timeout
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_timeout() -> Duration {
    DEFAULT_TOOL_TIMEOUT
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }
}

impl ExecutorConfig {
    /// Replace zero limits with the defaults.
    pub fn normalized(self) -> Self {
        Self {
            max_concurrency: if self.max_concurrency == 0 {
                DEFAULT_MAX_CONCURRENCY
            } else {
                self.max_concurrency
            },
            timeout: if self.timeout.is_zero() {
                DEFAULT_TOOL_TIMEOUT
            } else {
                self.timeout
            },
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Why a call did not produce a successful result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CallFailure {
    #[error("tool {0} not found")]
    ToolNotFound(String),

    /// The capability returned an error.
    #[error("{0}")]
    Execution(String),

    /// The capability returned a result flagged as unsuccessful.
    #[error("tool reported failure: {0}")]
    Reported(String),

    #[error("panic recovered: {0}")]
    Panicked(String),

    #[error("tool execution timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("cancelled before execution started")]
    Cancelled,

    #[error("max repair attempts ({max}) exceeded for tool call {call_id}")]
    MaxRepairAttempts { max: u32, call_id: String },

    /// The repair loop stopped while the call was still under its ceiling.
    /// `rounds` counts the processing passes that ran.
    #[error("tool call {call_id} still failed validation after {rounds} processing round(s)")]
    RepairRoundsExhausted { rounds: u32, call_id: String },
}

impl CallFailure {
    /// Short machine-friendly label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ToolNotFound(_) => "tool_not_found",
            Self::Execution(_) => "execution",
            Self::Reported(_) => "reported",
            Self::Panicked(_) => "panicked",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
            Self::MaxRepairAttempts { .. } => "max_repair_attempts",
            Self::RepairRoundsExhausted { .. } => "repair_rounds_exhausted",
        }
    }
}

/// Outcome of dispatching one call.
#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub id: String,
    pub name: String,
    pub result: Result<ToolResult, CallFailure>,
    /// Wall time from dispatch to settlement, permit wait included
    pub duration: Duration,
}

impl DispatchResult {
    fn failed(call: &ToolCall, failure: CallFailure, started: Instant) -> Self {
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            result: Err(failure),
            duration: started.elapsed(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// The capability payload on success.
    pub fn payload(&self) -> Option<&Value> {
        self.result.as_ref().ok().map(|r| &r.data)
    }

    pub fn failure(&self) -> Option<&CallFailure> {
        self.result.as_ref().err()
    }
}

// ============================================================================
// Executor
// ============================================================================

/// Bounded-concurrency dispatcher bound to a registry.
pub struct ParallelExecutor {
    registry: Arc<ToolRegistry>,
    config: ExecutorConfig,
    permits: Arc<Semaphore>,
}

impl ParallelExecutor {
    pub fn new(registry: Arc<ToolRegistry>, config: ExecutorConfig) -> Self {
        let config = config.normalized();
        Self {
            registry,
            permits: Arc::new(Semaphore::new(config.max_concurrency)),
            config,
        }
    }

    pub fn with_defaults(registry: Arc<ToolRegistry>) -> Self {
        Self::new(registry, ExecutorConfig::default())
    }

    pub fn config(&self) -> ExecutorConfig {
        self.config
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        if !timeout.is_zero() {
            self.config.timeout = timeout;
        }
    }

    /// Resize the permit pool. Calls already holding a permit from the old
    /// pool keep it until they finish.
    pub fn set_max_concurrency(&mut self, max: usize) {
        if max == 0 {
            return;
        }
        self.config.max_concurrency = max;
        self.permits = Arc::new(Semaphore::new(max));
    }

    /// Execute every call concurrently, bounded by the permit pool.
    pub async fn execute_batch(&self, calls: Vec<ToolCall>, ctx: &ToolContext) -> Vec<DispatchResult> {
        self.execute_batch_with_timeout(calls, ctx, self.config.timeout).await
    }

    /// As [`execute_batch`](Self::execute_batch) with a one-off per-call timeout.
    pub async fn execute_batch_with_timeout(
        &self,
        calls: Vec<ToolCall>,
        ctx: &ToolContext,
        timeout: Duration,
    ) -> Vec<DispatchResult> {
        if calls.is_empty() {
            return Vec::new();
        }

        tracing::debug!(
            calls = calls.len(),
            max_concurrency = self.config.max_concurrency,
            "dispatching tool batch"
        );

        let mut handles = Vec::with_capacity(calls.len());
        for call in calls {
            let registry = Arc::clone(&self.registry);
            let permits = Arc::clone(&self.permits);
            let ctx = ctx.clone();
            let id = call.id.clone();
            let name = call.name.clone();
            let handle = tokio::spawn(async move {
                dispatch(&registry, &permits, call, &ctx, timeout).await
            });
            handles.push((id, name, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (id, name, handle) in handles {
            let started = Instant::now();
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    let message = if e.is_panic() {
                        panic_message(e.into_panic())
                    } else {
                        "dispatch task aborted".to_string()
                    };
                    tracing::error!(tool = %name, call_id = %id, "dispatch task failed: {}", message);
                    DispatchResult {
                        id,
                        name,
                        result: Err(CallFailure::Panicked(message)),
                        duration: started.elapsed(),
                    }
                }
            };
            results.push(result);
        }
        results
    }

    /// Execute a single call in the current task, under the same permit pool.
    pub async fn execute_one(&self, call: ToolCall, ctx: &ToolContext) -> DispatchResult {
        dispatch(&self.registry, &self.permits, call, ctx, self.config.timeout).await
    }
}

impl std::fmt::Debug for ParallelExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelExecutor")
            .field("config", &self.config)
            .field("available_permits", &self.permits.available_permits())
            .finish()
    }
}

// ============================================================================
// Per-call dispatch
// ============================================================================

async fn acquire(permits: &Arc<Semaphore>, ctx: &ToolContext) -> Option<OwnedSemaphorePermit> {
    let token = ctx.cancellation_token();
    if token.is_cancelled() {
        return None;
    }
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        permit = Arc::clone(permits).acquire_owned() => permit.ok(),
    }
}

async fn dispatch(
    registry: &ToolRegistry,
    permits: &Arc<Semaphore>,
    call: ToolCall,
    ctx: &ToolContext,
    timeout: Duration,
) -> DispatchResult {
    let started = Instant::now();

    let _permit = match acquire(permits, ctx).await {
        Some(permit) => permit,
        None => {
            tracing::debug!(tool = %call.name, call_id = %call.id, "cancelled while waiting for a permit");
            return DispatchResult::failed(&call, CallFailure::Cancelled, started);
        }
    };

    let tool = match registry.get(&call.name) {
        Some(tool) => tool,
        None => {
            let name = call.name.clone();
            return DispatchResult::failed(&call, CallFailure::ToolNotFound(name), started);
        }
    };

    let call_ctx = ctx.derive_for_call(call.id.clone(), timeout);
    let token = call_ctx.cancellation_token().clone();
    let ToolCall { id, name, arguments } = call;

    let execution = AssertUnwindSafe(tool.execute(&call_ctx, arguments)).catch_unwind();
    tokio::pin!(execution);
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    let mut timed_out = false;
    let outcome = loop {
        tokio::select! {
            outcome = &mut execution => break outcome,
            _ = &mut deadline, if !timed_out => {
                timed_out = true;
                tracing::warn!(tool = %name, call_id = %id, ?timeout, "tool call timed out, signalling cancellation");
                token.cancel();
            }
        }
    };

    let result = match outcome {
        Ok(Ok(result)) if result.success => Ok(result),
        Ok(Ok(result)) => Err(CallFailure::Reported(
            result
                .error
                .unwrap_or_else(|| "tool returned an unsuccessful result".to_string()),
        )),
        Ok(Err(_)) if timed_out => Err(CallFailure::Timeout(timeout)),
        Ok(Err(e)) => Err(CallFailure::Execution(e.to_string())),
        Err(payload) => {
            let message = panic_message(payload);
            tracing::error!(tool = %name, call_id = %id, "tool panicked: {}", message);
            Err(CallFailure::Panicked(message))
        }
    };

    DispatchResult {
        id,
        name,
        result,
        duration: started.elapsed(),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
