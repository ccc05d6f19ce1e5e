//! Call frames.

use lantern_core::Value;

/// Activation of one bytecode function.
#[derive(Debug, Clone)]
pub struct CallFrame {
    /// Function index in the compiled unit.
    pub function: u32,
    /// Offset of the next instruction.
    pub ip: usize,
    /// Arguments, the closure receiver first.
    pub args: Vec<Value>,
    pub locals: Vec<Value>,
}

impl CallFrame {
    pub fn new(function: u32, args: Vec<Value>, frame_size: u16) -> Self {
        Self {
            function,
            ip: 0,
            args,
            locals: vec![Value::Unit; frame_size as usize],
        }
    }
}
