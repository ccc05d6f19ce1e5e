//! Bytecode types produced by code generation.
//!
//! - [`OpCode`] - the instruction set of the VM
//! - [`BytecodeChunk`] - compiled instructions of one function
//! - [`ConstantPool`] - unit-wide literal storage

mod chunk;
mod constant;
mod opcode;

pub use chunk::BytecodeChunk;
pub use constant::ConstantPool;
pub use opcode::OpCode;
