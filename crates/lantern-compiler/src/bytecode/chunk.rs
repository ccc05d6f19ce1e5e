//! Bytecode chunk for compiled functions.
//!
//! A `BytecodeChunk` holds the instructions of one function plus a parallel
//! table of source lines for runtime diagnostics.

use super::OpCode;

/// Compiled instructions of a single function.
///
/// Constants live in the unit-wide `ConstantPool`, not here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BytecodeChunk {
    code: Vec<u8>,
    /// Source line per byte of `code`.
    lines: Vec<u32>,
}

impl BytecodeChunk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_op(&mut self, op: OpCode, line: u32) {
        self.code.push(op.into());
        self.lines.push(line);
    }

    pub fn write_byte(&mut self, byte: u8, line: u32) {
        self.code.push(byte);
        self.lines.push(line);
    }

    /// Write a 16-bit operand (big-endian).
    pub fn write_u16(&mut self, value: u16, line: u32) {
        self.write_byte((value >> 8) as u8, line);
        self.write_byte(value as u8, line);
    }

    /// Offset the next instruction will be written at.
    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    /// Emit a jump with a placeholder target and return the operand offset.
    pub fn emit_jump(&mut self, op: OpCode, line: u32) -> usize {
        self.write_op(op, line);
        let offset = self.code.len();
        self.write_u16(0xFFFF, line);
        offset
    }

    /// Point the jump operand at `operand` to the absolute offset `target`.
    ///
    /// # Panics
    ///
    /// Panics if `target` does not fit in 16 bits.
    pub fn patch_jump(&mut self, operand: usize, target: usize) {
        assert!(target <= u16::MAX as usize, "jump target {} exceeds u16::MAX", target);
        self.code[operand] = (target >> 8) as u8;
        self.code[operand + 1] = target as u8;
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn line_at(&self, offset: usize) -> Option<u32> {
        self.lines.get(offset).copied()
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn read_byte(&self, offset: usize) -> Option<u8> {
        self.code.get(offset).copied()
    }

    /// Read a u16 at the given offset (big-endian).
    pub fn read_u16(&self, offset: usize) -> Option<u16> {
        let hi = *self.code.get(offset)? as u16;
        let lo = *self.code.get(offset + 1)? as u16;
        Some((hi << 8) | lo)
    }

    pub fn read_op(&self, offset: usize) -> Option<OpCode> {
        self.code.get(offset).and_then(|&b| OpCode::from_u8(b))
    }

    /// All opcodes of the chunk in order, skipping operands.
    pub fn opcodes(&self) -> Vec<OpCode> {
        let mut ops = Vec::new();
        let mut offset = 0;
        while offset < self.code.len() {
            match self.read_op(offset) {
                Some(op) => {
                    ops.push(op);
                    offset += 1 + op.operand_size();
                }
                None => offset += 1,
            }
        }
        ops
    }

    /// Assert the chunk holds exactly this opcode sequence, ignoring operands.
    #[track_caller]
    pub fn assert_opcodes(&self, expected: &[OpCode]) {
        let actual = self.opcodes();
        assert_eq!(
            actual,
            expected,
            "Bytecode mismatch.\nExpected: {:?}\nActual:   {:?}",
            expected.iter().map(|op| op.name()).collect::<Vec<_>>(),
            actual.iter().map(|op| op.name()).collect::<Vec<_>>(),
        );
    }

    /// Assert the opcodes appear in this order, not necessarily contiguously.
    #[track_caller]
    pub fn assert_contains_opcodes(&self, expected: &[OpCode]) {
        let actual = self.opcodes();
        let mut expected_iter = expected.iter().peekable();
        for op in &actual {
            if expected_iter.peek() == Some(&op) {
                expected_iter.next();
            }
        }
        if expected_iter.peek().is_some() {
            let remaining: Vec<_> = expected_iter.map(|op| op.name()).collect();
            panic!(
                "Missing opcodes in sequence.\nExpected to find: {:?}\nActual bytecode:  {:?}",
                remaining,
                actual.iter().map(|op| op.name()).collect::<Vec<_>>(),
            );
        }
    }
}
