//! Bytecode emitter: the instruction sink code generation writes into.
//!
//! The [`BytecodeEmitter`] turns high-level requests (push this literal,
//! branch to that label, call this function) into encoded instructions for
//! one function, interning literals in the unit-wide constant pool.
//!
//! # Example
//!
//! ```
//! use lantern_compiler::bytecode::{ConstantPool, OpCode};
//! use lantern_compiler::emit::BytecodeEmitter;
//!
//! let mut constants = ConstantPool::new();
//! let mut emitter = BytecodeEmitter::new(&mut constants);
//! emitter.emit_int(40)?;
//! emitter.emit_int(2)?;
//! emitter.emit(OpCode::Add);
//! emitter.emit(OpCode::Return);
//! let chunk = emitter.finish()?;
//! chunk.assert_opcodes(&[OpCode::Constant, OpCode::Constant, OpCode::Add, OpCode::Return]);
//! # Ok::<(), lantern_core::CompilationError>(())
//! ```

mod labels;

use lantern_core::{CompilationError, PrimitiveKind, Value};

use crate::bytecode::{BytecodeChunk, ConstantPool, OpCode};

pub use labels::Label;
use labels::LabelTable;

/// Emits bytecode for a single function.
pub struct BytecodeEmitter<'pool> {
    chunk: BytecodeChunk,
    /// Shared unit-level constant pool (deduplicated).
    constants: &'pool mut ConstantPool,
    labels: LabelTable,
    current_line: u32,
}

impl<'pool> BytecodeEmitter<'pool> {
    pub fn new(constants: &'pool mut ConstantPool) -> Self {
        Self {
            chunk: BytecodeChunk::new(),
            constants,
            labels: LabelTable::new(),
            current_line: 1,
        }
    }

    /// Set the source line attached to subsequent instructions.
    pub fn set_line(&mut self, line: u32) {
        self.current_line = line;
    }

    pub fn current_line(&self) -> u32 {
        self.current_line
    }

    // ==========================================================================
    // Basic Emission
    // ==========================================================================

    pub fn emit(&mut self, op: OpCode) {
        self.chunk.write_op(op, self.current_line);
    }

    pub fn emit_byte(&mut self, op: OpCode, byte: u8) {
        self.chunk.write_op(op, self.current_line);
        self.chunk.write_byte(byte, self.current_line);
    }

    pub fn emit_u16(&mut self, op: OpCode, value: u16) {
        self.chunk.write_op(op, self.current_line);
        self.chunk.write_u16(value, self.current_line);
    }

    // ==========================================================================
    // Constants
    // ==========================================================================

    /// Intern `value` and return its pool index as an instruction operand.
    fn constant_index(&mut self, value: Value) -> Result<u16, CompilationError> {
        let type_name = value.type_name();
        let index = self
            .constants
            .add(value)
            .ok_or_else(|| CompilationError::invalid_state(format!("{type_name} value cannot be a constant")))?;
        u16::try_from(index).map_err(|_| CompilationError::invalid_state("too many constants"))
    }

    /// Push any constant-representable value from the pool.
    pub fn emit_constant(&mut self, value: Value) -> Result<(), CompilationError> {
        let index = self.constant_index(value)?;
        match u8::try_from(index) {
            Ok(short) => self.emit_byte(OpCode::Constant, short),
            Err(_) => self.emit_u16(OpCode::ConstantWide, index),
        }
        Ok(())
    }

    /// Emit a literal of one of the directly encodable kinds: `bool`, `int`,
    /// `long`, `double` and `string`.
    ///
    /// Returns `Ok(false)` without emitting anything for any other value.
    pub fn emit_literal(&mut self, value: &Value) -> Result<bool, CompilationError> {
        match value {
            Value::Bool(b) => self.emit_bool(*b),
            Value::Int32(i) => self.emit_int(*i)?,
            Value::Int64(_) | Value::Double(_) | Value::Str(_) => self.emit_constant(value.clone())?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Push an `int`, using the short forms for 0 and 1.
    pub fn emit_int(&mut self, value: i32) -> Result<(), CompilationError> {
        match value {
            0 => self.emit(OpCode::PushZero),
            1 => self.emit(OpCode::PushOne),
            _ => self.emit_constant(Value::Int32(value))?,
        }
        Ok(())
    }

    pub fn emit_bool(&mut self, value: bool) {
        self.emit(if value { OpCode::PushTrue } else { OpCode::PushFalse });
    }

    pub fn emit_null(&mut self) {
        self.emit(OpCode::PushNull);
    }

    pub fn emit_unit(&mut self) {
        self.emit(OpCode::PushUnit);
    }

    // ==========================================================================
    // Locals, arguments and fields
    // ==========================================================================

    pub fn emit_get_local(&mut self, slot: u16) {
        match u8::try_from(slot) {
            Ok(short) => self.emit_byte(OpCode::GetLocal, short),
            Err(_) => self.emit_u16(OpCode::GetLocalWide, slot),
        }
    }

    pub fn emit_set_local(&mut self, slot: u16) {
        match u8::try_from(slot) {
            Ok(short) => self.emit_byte(OpCode::SetLocal, short),
            Err(_) => self.emit_u16(OpCode::SetLocalWide, slot),
        }
    }

    pub fn emit_get_arg(&mut self, index: u8) {
        self.emit_byte(OpCode::GetArg, index);
    }

    pub fn emit_get_field(&mut self, index: u16) {
        self.emit_u16(OpCode::GetField, index);
    }

    pub fn emit_set_field(&mut self, index: u16) {
        self.emit_u16(OpCode::SetField, index);
    }

    /// Construct an instance of a type from `arg_count` field values.
    pub fn emit_new(&mut self, type_index: u16, arg_count: u8) {
        self.emit_u16(OpCode::New, type_index);
        self.chunk.write_byte(arg_count, self.current_line);
    }

    // ==========================================================================
    // Calls
    // ==========================================================================

    pub fn emit_call(&mut self, function: u16, arg_count: u8) {
        self.emit_u16(OpCode::Call, function);
        self.chunk.write_byte(arg_count, self.current_line);
    }

    pub fn emit_call_value(&mut self, arg_count: u8) {
        self.emit_byte(OpCode::CallValue, arg_count);
    }

    pub fn emit_make_closure(&mut self, function: u16) {
        self.emit_u16(OpCode::MakeClosure, function);
    }

    pub fn emit_return(&mut self) {
        self.emit(OpCode::Return);
    }

    // ==========================================================================
    // Conversions
    // ==========================================================================

    pub fn emit_convert(&mut self, kind: PrimitiveKind) {
        self.emit_byte(OpCode::Convert, kind.tag());
    }

    pub fn emit_check_cast(&mut self, test: u16) {
        self.emit_u16(OpCode::CheckCast, test);
    }

    pub fn emit_is_instance(&mut self, test: u16) {
        self.emit_u16(OpCode::IsInstance, test);
    }

    /// Replace an optional value by its value or `default`.
    pub fn emit_value_or_default(&mut self, default: Value) -> Result<(), CompilationError> {
        let index = self.constant_index(default)?;
        self.emit_u16(OpCode::ValueOrDefault, index);
        Ok(())
    }

    // ==========================================================================
    // Labels and branches
    // ==========================================================================

    pub fn define_label(&mut self) -> Label {
        self.labels.define()
    }

    /// Mark `label` at the current offset and patch branches waiting on it.
    pub fn mark_label(&mut self, label: Label) -> Result<(), CompilationError> {
        let offset = self.chunk.current_offset();
        let operands = self
            .labels
            .mark(label, offset)
            .ok_or_else(|| CompilationError::invalid_state("label marked twice"))?;
        for operand in operands {
            self.chunk.patch_jump(operand, offset);
        }
        Ok(())
    }

    /// Emit `Jump`, `JumpIfFalse` or `JumpIfTrue` to `label`.
    pub fn emit_branch(&mut self, op: OpCode, label: Label) {
        let operand = self.chunk.emit_jump(op, self.current_line);
        match self.labels.target(label) {
            Some(target) => self.chunk.patch_jump(operand, target),
            None => self.labels.add_pending(label, operand),
        }
    }

    // ==========================================================================
    // Stack
    // ==========================================================================

    pub fn emit_pop(&mut self) {
        self.emit(OpCode::Pop);
    }

    pub fn emit_dup(&mut self) {
        self.emit(OpCode::Dup);
    }

    // ==========================================================================
    // Finalization
    // ==========================================================================

    /// Finish the function, failing if a branch targets an unmarked label.
    pub fn finish(self) -> Result<BytecodeChunk, CompilationError> {
        if !self.labels.is_resolved() {
            return Err(CompilationError::invalid_state("branch to a label that was never marked"));
        }
        Ok(self.chunk)
    }

    pub fn offset(&self) -> usize {
        self.chunk.current_offset()
    }

    /// Instructions emitted so far.
    pub fn chunk(&self) -> &BytecodeChunk {
        &self.chunk
    }
}

/// Whether [`BytecodeEmitter::emit_literal`] can encode `value`.
///
/// Constant bindings holding such a value are inlined at every read and
/// never get storage of their own.
pub fn is_inline_literal(value: &Value) -> bool {
    matches!(
        value,
        Value::Bool(_) | Value::Int32(_) | Value::Int64(_) | Value::Double(_) | Value::Str(_)
    )
}
