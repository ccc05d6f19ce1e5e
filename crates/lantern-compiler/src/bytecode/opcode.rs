//! Bytecode operation codes.
//!
//! Each opcode is a single byte, with operands following inline
//! (16-bit operands are big-endian).

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Instruction set of the lantern VM.
///
/// The VM is a stack machine: operations pop their operands and push their
/// result. Jump operands are absolute offsets into the function's chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum OpCode {
    // =========================================================================
    // Constants
    // =========================================================================
    /// Push constant from pool (8-bit index).
    Constant = 0,
    /// Push constant from pool (16-bit index).
    ConstantWide,
    PushNull,
    PushTrue,
    PushFalse,
    /// Push `int` 0.
    PushZero,
    /// Push `int` 1.
    PushOne,
    /// Push the unit value.
    PushUnit,

    // =========================================================================
    // Stack
    // =========================================================================
    Pop,
    Dup,

    // =========================================================================
    // Locals and arguments
    // =========================================================================
    /// Load local (u8 slot).
    GetLocal,
    /// Pop into local (u8 slot).
    SetLocal,
    /// Load local (u16 slot).
    GetLocalWide,
    /// Pop into local (u16 slot).
    SetLocalWide,
    /// Load argument by index (u8). Argument 0 of a closure is its carrier.
    GetArg,

    // =========================================================================
    // Objects
    // =========================================================================
    /// Construct an object. Operands: u16 type index, u8 argument count.
    /// Missing trailing fields receive their default values.
    New,
    /// Pop object, push field (u16 index).
    GetField,
    /// Pop value and object, store field (u16 index).
    SetField,

    // =========================================================================
    // Arithmetic (operands already converted to a common kind)
    // =========================================================================
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Neg,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,

    // =========================================================================
    // Comparison and logic
    // =========================================================================
    Not,
    Eq,
    Lt,
    Gt,

    // =========================================================================
    // Conversions
    // =========================================================================
    /// Numeric conversion. Operand: u8 primitive kind tag.
    Convert,
    /// Unwrap an optional value, failing on null.
    Unwrap,
    /// Checked cast, failing when the value does not pass the type test (u16).
    CheckCast,
    /// Replace the value with the result of a type test (u16).
    IsInstance,

    // =========================================================================
    // Optional values
    // =========================================================================
    /// Replace an optional value with whether it holds a value.
    HasValue,
    /// Replace null with the default constant (u16 pool index).
    ValueOrDefault,

    // =========================================================================
    // Control flow
    // =========================================================================
    /// Unconditional jump (u16 absolute target).
    Jump,
    /// Pop condition, jump when false.
    JumpIfFalse,
    /// Pop condition, jump when true.
    JumpIfTrue,

    // =========================================================================
    // Functions
    // =========================================================================
    /// Call a function of the unit. Operands: u16 function index, u8 argc.
    Call,
    /// Call a function value sitting below its arguments. Operand: u8 argc.
    CallValue,
    /// Pop a receiver (or null), push a function value (u16 function index).
    MakeClosure,
    /// Return the top of the stack to the caller.
    Return,

    // =========================================================================
    // Collections
    // =========================================================================
    /// Pop N items, push a list. Operand: u16 count.
    NewList,
    /// Pop N key/value pairs, push a dictionary. Operand: u16 count.
    NewDict,
    /// Pop index and collection, push item.
    GetIndex,
    /// Pop value, index and collection, store item.
    SetIndex,
    /// Pop list, dictionary or string, push its length as `int`.
    Length,
}

impl OpCode {
    /// Convert from u8, returning None for invalid values.
    pub fn from_u8(value: u8) -> Option<Self> {
        OpCode::try_from(value).ok()
    }

    /// Size of the inline operands in bytes, not counting the opcode itself.
    pub fn operand_size(&self) -> usize {
        match self {
            OpCode::Constant
            | OpCode::GetLocal
            | OpCode::SetLocal
            | OpCode::GetArg
            | OpCode::Convert
            | OpCode::CallValue => 1,

            OpCode::ConstantWide
            | OpCode::GetLocalWide
            | OpCode::SetLocalWide
            | OpCode::GetField
            | OpCode::SetField
            | OpCode::CheckCast
            | OpCode::IsInstance
            | OpCode::ValueOrDefault
            | OpCode::Jump
            | OpCode::JumpIfFalse
            | OpCode::JumpIfTrue
            | OpCode::MakeClosure
            | OpCode::NewList
            | OpCode::NewDict => 2,

            OpCode::New | OpCode::Call => 3,

            _ => 0,
        }
    }

    /// Human-readable mnemonic.
    pub fn name(&self) -> &'static str {
        match self {
            OpCode::Constant => "CONSTANT",
            OpCode::ConstantWide => "CONSTANT_WIDE",
            OpCode::PushNull => "PUSH_NULL",
            OpCode::PushTrue => "PUSH_TRUE",
            OpCode::PushFalse => "PUSH_FALSE",
            OpCode::PushZero => "PUSH_ZERO",
            OpCode::PushOne => "PUSH_ONE",
            OpCode::PushUnit => "PUSH_UNIT",
            OpCode::Pop => "POP",
            OpCode::Dup => "DUP",
            OpCode::GetLocal => "GET_LOCAL",
            OpCode::SetLocal => "SET_LOCAL",
            OpCode::GetLocalWide => "GET_LOCAL_WIDE",
            OpCode::SetLocalWide => "SET_LOCAL_WIDE",
            OpCode::GetArg => "GET_ARG",
            OpCode::New => "NEW",
            OpCode::GetField => "GET_FIELD",
            OpCode::SetField => "SET_FIELD",
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Div => "DIV",
            OpCode::Rem => "REM",
            OpCode::Pow => "POW",
            OpCode::Neg => "NEG",
            OpCode::Shl => "SHL",
            OpCode::Shr => "SHR",
            OpCode::BitAnd => "BIT_AND",
            OpCode::BitOr => "BIT_OR",
            OpCode::BitXor => "BIT_XOR",
            OpCode::Not => "NOT",
            OpCode::Eq => "EQ",
            OpCode::Lt => "LT",
            OpCode::Gt => "GT",
            OpCode::Convert => "CONVERT",
            OpCode::Unwrap => "UNWRAP",
            OpCode::CheckCast => "CHECK_CAST",
            OpCode::IsInstance => "IS_INSTANCE",
            OpCode::HasValue => "HAS_VALUE",
            OpCode::ValueOrDefault => "VALUE_OR_DEFAULT",
            OpCode::Jump => "JUMP",
            OpCode::JumpIfFalse => "JUMP_IF_FALSE",
            OpCode::JumpIfTrue => "JUMP_IF_TRUE",
            OpCode::Call => "CALL",
            OpCode::CallValue => "CALL_VALUE",
            OpCode::MakeClosure => "MAKE_CLOSURE",
            OpCode::Return => "RETURN",
            OpCode::NewList => "NEW_LIST",
            OpCode::NewDict => "NEW_DICT",
            OpCode::GetIndex => "GET_INDEX",
            OpCode::SetIndex => "SET_INDEX",
            OpCode::Length => "LENGTH",
        }
    }
}
