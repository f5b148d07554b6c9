//! Toolgate Tools
//!
//! The engine pieces that sit between a model's raw function-call output and
//! the capabilities in the registry:
//! - `validator` - recursive schema checking and type coercion
//! - `stream_accumulator` - reassembly of streamed call fragments
//! - `executor` - bounded-concurrency dispatcher with timeouts and panic containment

pub mod executor;
pub mod stream_accumulator;
pub mod validator;

pub use executor::{
    CallFailure, DispatchResult, ExecutorConfig, ParallelExecutor, DEFAULT_MAX_CONCURRENCY,
    DEFAULT_TOOL_TIMEOUT,
};
pub use stream_accumulator::{PartialToolCall, StreamAccumulator};
pub use validator::{
    ValidationError, ValidationErrorCode, ValidationErrors, ValidationOutcome, Validator,
    ValidatorConfig,
};
