//! Integration Tests Module
//!
//! End-to-end tests across the core, tools and control-flow layers:
//! streamed fragments through validation, dispatch and the repair loop.

// Shared capability doubles
mod common;

// Control-flow manager: validation, repair ceiling, batch processing
mod control_flow_test;

// Parallel dispatcher ordering, bounds and failure containment
mod dispatcher_test;


// Auto-repair loop against a scripted model
mod repair_loop_test;
