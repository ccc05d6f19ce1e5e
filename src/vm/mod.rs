//! Stack virtual machine executing a [`CompiledUnit`].
//!
//! Every function returns exactly one value. Bytecode functions run in a
//! [`CallFrame`] holding their arguments and local slots; intrinsic
//! functions run directly on their arguments. Calls do not recurse on the
//! native stack, so the call depth is bounded only by
//! [`VmOptions::max_call_depth`].

mod frame;
mod handlers;
mod stack;

use std::cmp::Ordering;
use std::rc::Rc;

use lantern_compiler::{BytecodeChunk, CompiledFunction, CompiledUnit, FunctionBody, OpCode, TypeTest};
use lantern_core::{BinaryOp, FunctionValue, RuntimeError, UnaryOp, Value, fold};

pub use frame::CallFrame;
pub use stack::ValueStack;

use handlers::{call_intrinsic, mismatch, null_value};

type Result<T> = std::result::Result<T, RuntimeError>;

/// Limits of a VM run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmOptions {
    /// Deepest allowed nesting of bytecode calls.
    pub max_call_depth: usize,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self { max_call_depth: 1024 }
    }
}

impl VmOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }
}

/// Executes the functions of one compiled unit.
#[derive(Debug)]
pub struct Machine<'u> {
    unit: &'u CompiledUnit,
    options: VmOptions,
    stack: ValueStack,
    frames: Vec<CallFrame>,
}

/// Inline operands of the instruction at `offset`.
struct Operands<'c> {
    chunk: &'c BytecodeChunk,
    offset: usize,
}

impl Operands<'_> {
    fn byte(&self) -> Result<u8> {
        self.chunk
            .read_byte(self.offset + 1)
            .ok_or_else(|| truncated(self.offset))
    }

    fn short(&self) -> Result<u16> {
        self.chunk
            .read_u16(self.offset + 1)
            .ok_or_else(|| truncated(self.offset))
    }

    /// A u16 followed by a u8, as used by `NEW` and `CALL`.
    fn short_and_byte(&self) -> Result<(u16, u8)> {
        let byte = self
            .chunk
            .read_byte(self.offset + 3)
            .ok_or_else(|| truncated(self.offset))?;
        Ok((self.short()?, byte))
    }
}

impl<'u> Machine<'u> {
    pub fn new(unit: &'u CompiledUnit, options: VmOptions) -> Self {
        Self {
            unit,
            options,
            stack: ValueStack::new(),
            frames: Vec::new(),
        }
    }

    /// Run the entry point of the unit.
    #[tracing::instrument(skip_all)]
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(&mut self) -> Result<Value> {
        if self.unit.entry_function().is_none() {
            return Err(RuntimeError::MissingEntryPoint);
        }
        self.call_function(self.unit.entry, Vec::new())
    }

    /// Call any function of the unit and run it to completion.
    pub fn call_function(&mut self, index: u32, args: Vec<Value>) -> Result<Value> {
        self.stack.clear();
        self.frames.clear();
        match self.invoke(index, args)? {
            Some(result) => Ok(result),
            None => self.run_loop(),
        }
    }

    /// Start a call. Intrinsics complete immediately and return their
    /// result; bytecode functions push a frame and return `None`.
    fn invoke(&mut self, index: u32, args: Vec<Value>) -> Result<Option<Value>> {
        let function = self.function(index)?;
        if args.len() != function.arity {
            return Err(mismatch(format!(
                "'{}' expects {} arguments, got {}",
                function.name,
                function.arity,
                args.len()
            )));
        }
        match &function.body {
            FunctionBody::Intrinsic(intrinsic) => call_intrinsic(*intrinsic, &args).map(Some),
            FunctionBody::Bytecode { frame_size, .. } => {
                if self.frames.len() >= self.options.max_call_depth {
                    return Err(RuntimeError::StackOverflow {
                        limit: self.options.max_call_depth,
                    });
                }
                tracing::trace!(function = %function.name, depth = self.frames.len(), "call");
                self.frames.push(CallFrame::new(index, args, *frame_size));
                Ok(None)
            }
        }
    }

    fn run_loop(&mut self) -> Result<Value> {
        loop {
            let unit = self.unit;
            let frame = self.frames.last_mut().ok_or(RuntimeError::StackUnderflow)?;
            let chunk = unit
                .function(frame.function)
                .and_then(CompiledFunction::chunk)
                .ok_or_else(|| invalid(frame.ip, "frame of a function without bytecode"))?;
            let offset = frame.ip;
            let op = chunk
                .read_op(offset)
                .ok_or_else(|| invalid(offset, "unknown opcode or end of code"))?;
            frame.ip = offset + 1 + op.operand_size();
            let operands = Operands { chunk, offset };

            match op {
                OpCode::Constant => self.push_constant(u16::from(operands.byte()?))?,
                OpCode::ConstantWide => self.push_constant(operands.short()?)?,
                OpCode::PushNull => self.stack.push(Value::Null),
                OpCode::PushTrue => self.stack.push(Value::Bool(true)),
                OpCode::PushFalse => self.stack.push(Value::Bool(false)),
                OpCode::PushZero => self.stack.push(Value::Int32(0)),
                OpCode::PushOne => self.stack.push(Value::Int32(1)),
                OpCode::PushUnit => self.stack.push(Value::Unit),

                OpCode::Pop => {
                    self.stack.pop()?;
                }
                OpCode::Dup => {
                    let top = self.stack.peek(0)?.clone();
                    self.stack.push(top);
                }

                OpCode::GetLocal => self.get_local(u16::from(operands.byte()?), offset)?,
                OpCode::GetLocalWide => self.get_local(operands.short()?, offset)?,
                OpCode::SetLocal => self.set_local(u16::from(operands.byte()?), offset)?,
                OpCode::SetLocalWide => self.set_local(operands.short()?, offset)?,
                OpCode::GetArg => {
                    let index = operands.byte()? as usize;
                    let value = self
                        .frame()?
                        .args
                        .get(index)
                        .cloned()
                        .ok_or_else(|| invalid(offset, format!("argument {index} out of range")))?;
                    self.stack.push(value);
                }

                OpCode::New => {
                    let (ty, argc) = operands.short_and_byte()?;
                    self.execute_new(ty, argc)?;
                }
                OpCode::GetField => self.execute_get_field(operands.short()?)?,
                OpCode::SetField => self.execute_set_field(operands.short()?)?,

                OpCode::Add => self.binary(BinaryOp::Add)?,
                OpCode::Sub => self.binary(BinaryOp::Sub)?,
                OpCode::Mul => self.binary(BinaryOp::Mul)?,
                OpCode::Div => self.binary(BinaryOp::Div)?,
                OpCode::Rem => self.binary(BinaryOp::Rem)?,
                OpCode::Pow => self.binary(BinaryOp::Pow)?,
                OpCode::Shl => self.binary(BinaryOp::Shl)?,
                OpCode::Shr => self.binary(BinaryOp::Shr)?,
                OpCode::BitAnd => self.binary(BinaryOp::BitAnd)?,
                OpCode::BitOr => self.binary(BinaryOp::BitOr)?,
                OpCode::BitXor => self.binary(BinaryOp::BitXor)?,
                OpCode::Neg => self.unary(UnaryOp::Negate)?,
                OpCode::Not => self.unary(UnaryOp::Not)?,

                OpCode::Eq => {
                    let right = self.stack.pop()?;
                    let left = self.stack.pop()?;
                    self.stack.push(Value::Bool(fold::equals(&left, &right)?));
                }
                OpCode::Lt => self.ordering(Ordering::Less)?,
                OpCode::Gt => self.ordering(Ordering::Greater)?,

                OpCode::Convert => self.execute_convert(operands.byte()?)?,
                OpCode::Unwrap => {
                    let value = self.stack.pop()?;
                    if value.is_null() {
                        return Err(null_value("a value"));
                    }
                    self.stack.push(value);
                }
                OpCode::CheckCast => self.execute_check_cast(operands.short()?)?,
                OpCode::IsInstance => self.execute_is_instance(operands.short()?)?,

                OpCode::HasValue => {
                    let value = self.stack.pop()?;
                    self.stack.push(Value::Bool(!value.is_null()));
                }
                OpCode::ValueOrDefault => {
                    let index = operands.short()?;
                    if self.stack.peek(0)?.is_null() {
                        self.stack.pop()?;
                        self.push_constant(index)?;
                    }
                }

                OpCode::Jump => self.jump(operands.short()?)?,
                OpCode::JumpIfFalse | OpCode::JumpIfTrue => {
                    let target = operands.short()?;
                    let condition = self.stack.pop()?;
                    let condition = condition
                        .as_bool()
                        .ok_or_else(|| mismatch(format!("condition must be bool, got {}", condition.type_name())))?;
                    if condition == (op == OpCode::JumpIfTrue) {
                        self.jump(target)?;
                    }
                }

                OpCode::Call => {
                    let (function, argc) = operands.short_and_byte()?;
                    let args = self.stack.pop_n(argc as usize)?;
                    if let Some(result) = self.invoke(u32::from(function), args)? {
                        self.stack.push(result);
                    }
                }
                OpCode::CallValue => {
                    let argc = operands.byte()? as usize;
                    let args = self.stack.pop_n(argc)?;
                    let callee = self.stack.pop()?;
                    self.call_value(callee, args)?;
                }
                OpCode::MakeClosure => {
                    let function = u32::from(operands.short()?);
                    let receiver = self.stack.pop()?;
                    let receiver = (!receiver.is_null()).then_some(receiver);
                    self.stack
                        .push(Value::Function(Rc::new(FunctionValue { function, receiver })));
                }
                OpCode::Return => {
                    let result = self.stack.pop()?;
                    self.frames.pop();
                    if self.frames.is_empty() {
                        return Ok(result);
                    }
                    self.stack.push(result);
                }

                OpCode::NewList => self.execute_new_list(operands.short()?)?,
                OpCode::NewDict => self.execute_new_dict(operands.short()?)?,
                OpCode::GetIndex => self.execute_get_index()?,
                OpCode::SetIndex => self.execute_set_index()?,
                OpCode::Length => self.execute_length()?,
            }
        }
    }

    /// Call a function value. A closure receives its carrier as argument 0.
    fn call_value(&mut self, callee: Value, mut args: Vec<Value>) -> Result<()> {
        let func = match callee {
            Value::Function(func) => func,
            Value::Null => return Err(null_value("a function")),
            other => return Err(mismatch(format!("{} is not callable", other.type_name()))),
        };
        if self.function(func.function)?.has_receiver {
            args.insert(0, func.receiver.clone().unwrap_or(Value::Null));
        }
        if let Some(result) = self.invoke(func.function, args)? {
            self.stack.push(result);
        }
        Ok(())
    }

    fn binary(&mut self, op: BinaryOp) -> Result<()> {
        let right = self.stack.pop()?;
        let left = self.stack.pop()?;
        self.stack.push(fold::binary(op, &left, &right)?);
        Ok(())
    }

    fn unary(&mut self, op: UnaryOp) -> Result<()> {
        let operand = self.stack.pop()?;
        self.stack.push(fold::unary(op, &operand)?);
        Ok(())
    }

    fn ordering(&mut self, ord: Ordering) -> Result<()> {
        let right = self.stack.pop()?;
        let left = self.stack.pop()?;
        self.stack.push(Value::Bool(fold::strictly(ord, &left, &right)?));
        Ok(())
    }

    fn push_constant(&mut self, index: u16) -> Result<()> {
        let value = self
            .unit
            .constants
            .get(u32::from(index))
            .cloned()
            .ok_or_else(|| mismatch(format!("constant {index} out of range")))?;
        self.stack.push(value);
        Ok(())
    }

    fn get_local(&mut self, slot: u16, offset: usize) -> Result<()> {
        let value = self
            .frame()?
            .locals
            .get(slot as usize)
            .cloned()
            .ok_or_else(|| invalid(offset, format!("local slot {slot} out of range")))?;
        self.stack.push(value);
        Ok(())
    }

    fn set_local(&mut self, slot: u16, offset: usize) -> Result<()> {
        let value = self.stack.pop()?;
        let local = self
            .frame_mut()?
            .locals
            .get_mut(slot as usize)
            .ok_or_else(|| invalid(offset, format!("local slot {slot} out of range")))?;
        *local = value;
        Ok(())
    }

    fn jump(&mut self, target: u16) -> Result<()> {
        self.frame_mut()?.ip = target as usize;
        Ok(())
    }

    fn frame(&self) -> Result<&CallFrame> {
        self.frames.last().ok_or(RuntimeError::StackUnderflow)
    }

    fn frame_mut(&mut self) -> Result<&mut CallFrame> {
        self.frames.last_mut().ok_or(RuntimeError::StackUnderflow)
    }

    fn function(&self, index: u32) -> Result<&'u CompiledFunction> {
        self.unit
            .function(index)
            .ok_or_else(|| mismatch(format!("unknown function index {index}")))
    }

    fn type_test(&self, index: u16) -> Result<&'u TypeTest> {
        self.unit
            .type_tests
            .get(index as usize)
            .ok_or_else(|| mismatch(format!("unknown type test {index}")))
    }
}

fn invalid(offset: usize, message: impl Into<String>) -> RuntimeError {
    RuntimeError::InvalidBytecode {
        offset,
        message: message.into(),
    }
}

fn truncated(offset: usize) -> RuntimeError {
    invalid(offset, "instruction operands run past the end of the chunk")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lantern_compiler::{CompilerOptions, Context, Expr, Node, Param};

    fn run_with(nodes: Vec<Node>, compiler: CompilerOptions, vm: VmOptions) -> Result<Value> {
        let mut ctx = Context::new(nodes, compiler);
        let unit = ctx.compile().unwrap();
        Machine::new(unit, vm).run()
    }

    fn run(nodes: Vec<Node>) -> Result<Value> {
        run_with(nodes, CompilerOptions::default(), VmOptions::default())
    }

    #[test]
    fn entry_point_returns_its_last_value() {
        assert_eq!(run(vec![Expr::add(Expr::int(1), Expr::int(2))]), Ok(Value::Int32(3)));
        assert_eq!(run(vec![]), Ok(Value::Unit));
    }

    #[test]
    fn loops_update_locals() {
        let result = run(vec![
            Expr::var("i", Expr::int(0)),
            Expr::var("sum", Expr::long(0)),
            Expr::while_loop(
                Expr::less(Expr::get("i"), Expr::int(5)),
                Expr::block(vec![
                    Expr::set("sum", Expr::add(Expr::get("sum"), Expr::get("i"))),
                    Expr::set("i", Expr::add(Expr::get("i"), Expr::int(1))),
                ]),
            ),
            Expr::get("sum"),
        ]);
        assert_eq!(result, Ok(Value::Int64(10)));
    }

    #[test]
    fn integer_division_by_zero_fails_at_run_time() {
        let result = run(vec![Expr::var("zero", Expr::int(0)), Expr::div(Expr::int(1), Expr::get("zero"))]);
        assert_eq!(result, Err(RuntimeError::DivisionByZero));
    }

    #[test]
    fn runaway_recursion_hits_the_depth_limit() {
        let nodes = vec![
            Expr::fun(
                "down",
                vec![Param::new("n", "int")],
                Some("int"),
                Expr::call("down", vec![Expr::add(Expr::arg(0), Expr::int(1))]),
            ),
            Expr::call("down", vec![Expr::int(0)]),
        ];
        let result = run_with(nodes, CompilerOptions::default(), VmOptions::new().with_max_call_depth(64));
        assert_eq!(result, Err(RuntimeError::StackOverflow { limit: 64 }));
    }

    #[test]
    fn calling_a_null_function_value_fails() {
        let result = run(vec![Expr::var_typed("f", "Func<int>"), Expr::call("f", vec![])]);
        assert!(matches!(result, Err(RuntimeError::NullValue { .. })));
    }

    #[test]
    fn unwrapping_null_fails() {
        let result = run(vec![Expr::var_typed("n", "int?"), Expr::cast(Expr::get("n"), "int")]);
        assert!(matches!(result, Err(RuntimeError::NullValue { .. })));
    }

    #[test]
    fn missing_entry_point_is_reported() {
        let mut ctx = Context::new(vec![Expr::int(1)], CompilerOptions::default());
        let mut unit = ctx.compile().unwrap().clone();
        unit.entry = u32::MAX;
        assert_eq!(Machine::new(&unit, VmOptions::default()).run(), Err(RuntimeError::MissingEntryPoint));
    }
}
