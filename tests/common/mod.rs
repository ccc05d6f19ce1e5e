//! Shared helpers for the integration tests.

#![allow(dead_code)]

use lantern::{CompilerOptions, LanternError, Node, Script, Value, VmOptions};
use tracing_subscriber::EnvFilter;

/// Install a subscriber honouring `RUST_LOG`, once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn run(nodes: Vec<Node>) -> Result<Value, LanternError> {
    init_tracing();
    Script::new(nodes).execute()
}

pub fn run_with(nodes: Vec<Node>, options: CompilerOptions) -> Result<Value, LanternError> {
    init_tracing();
    Script::with_options(nodes, options, VmOptions::default()).execute()
}

/// Run a script that must succeed.
#[track_caller]
pub fn eval(nodes: Vec<Node>) -> Value {
    match run(nodes) {
        Ok(value) => value,
        Err(err) => panic!("script failed: {err}"),
    }
}

/// Run with constant unrolling disabled, so every operator executes on the VM.
#[track_caller]
pub fn eval_unfolded(nodes: Vec<Node>) -> Value {
    match run_with(nodes, CompilerOptions::default().with_unroll_constants(false)) {
        Ok(value) => value,
        Err(err) => panic!("script failed: {err}"),
    }
}
