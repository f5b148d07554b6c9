//! Execution Context
//!
//! `ToolContext` carries caller-scoped metadata (session, user, guild,
//! message, free-form key/value pairs, start timestamp) through a tool call
//! without the engine interpreting it.
//!
//! The engine only touches two things on the context:
//! - the cancellation token, from which a child token is derived per call
//! - the deadline, set on the derived per-call context
//!
//! Capabilities observe cancellation cooperatively through
//! `cancellation_token()` / `is_cancelled()`; nothing interrupts them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Context handed to a capability's `execute`.
///
/// Cheap to clone: metadata is shared behind an `Arc` and the cancellation
/// token is reference-counted.
#[derive(Debug, Clone)]
pub struct ToolContext {
    session_id: String,
    user_id: Option<String>,
    guild_id: Option<String>,
    message_id: Option<String>,
    metadata: Arc<HashMap<String, Value>>,
    started_at: DateTime<Utc>,
    /// Identifier of the call this context was derived for, if any.
    tool_call_id: Option<String>,
    cancellation_token: CancellationToken,
    deadline: Option<Instant>,
}

impl ToolContext {
    /// Create a new ToolContext for a session, stamped with the current time.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: None,
            guild_id: None,
            message_id: None,
            metadata: Arc::new(HashMap::new()),
            started_at: Utc::now(),
            tool_call_id: None,
            cancellation_token: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_guild_id(mut self, guild_id: impl Into<String>) -> Self {
        self.guild_id = Some(guild_id.into());
        self
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    /// Insert a metadata entry (copy-on-write if the map is shared).
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        Arc::make_mut(&mut self.metadata).insert(key.into(), value);
        self
    }

    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self
    }

    /// Use an externally owned cancellation token as the parent of all calls.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn guild_id(&self) -> Option<&str> {
        self.guild_id.as_deref()
    }

    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    pub fn metadata(&self) -> &HashMap<String, Value> {
        &self.metadata
    }

    pub fn get_metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn tool_call_id(&self) -> Option<&str> {
        self.tool_call_id.as_deref()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation_token
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` when no deadline is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Derive the per-call sub-context.
    ///
    /// The child token is cancelled whenever this context's token is, and can
    /// additionally be cancelled on its own (e.g. on timeout) without
    /// affecting siblings. The deadline never extends an existing one; a
    /// timeout too large to represent as an `Instant` sets no deadline of its
    /// own.
    pub fn derive_for_call(&self, tool_call_id: impl Into<String>, timeout: Duration) -> Self {
        let deadline = match (self.deadline, Instant::now().checked_add(timeout)) {
            (Some(parent), Some(own)) => Some(parent.min(own)),
            (parent, own) => parent.or(own),
        };
        Self {
            tool_call_id: Some(tool_call_id.into()),
            cancellation_token: self.cancellation_token.child_token(),
            deadline,
            ..self.clone()
        }
    }
}

impl Default for ToolContext {
    fn default() -> Self {
        Self::new("")
    }
}
