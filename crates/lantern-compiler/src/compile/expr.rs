//! Emission of each node kind.
//!
//! [`BodyCompiler::emit_node`] pushes exactly one value for a node of
//! non-unit type and nothing for a unit-typed node. Popping unused values
//! and replacing constants is left to [`BodyCompiler::emit`].

use lantern_core::{BinaryOp, CompilationError, LogicalOp, PrimitiveKind, TypeDesc, UnaryOp, Value};
use rustc_hash::FxHashSet;

use super::{BodyCompiler, Result, arg_count, type_index};
use crate::ast::typing::{
    Callee, Construct, MemberAccess, binary_resolution, index_types, resolve_callee, resolve_member, resolve_new,
    resolve_signature,
};
use crate::ast::{Node, NodeKind, Target, VarInit};
use crate::bytecode::OpCode;
use crate::context::Env;
use crate::conversion::find_cast;
use crate::emit::is_inline_literal;
use crate::operators::BinaryRule;

impl BodyCompiler<'_> {
    pub(super) fn emit_node(&mut self, node: &Node, ty: &TypeDesc, env: Env) -> Result<()> {
        let span = node.span;
        match &node.kind {
            NodeKind::Unit | NodeKind::Literal(Value::Unit) => {}
            NodeKind::Null | NodeKind::Literal(Value::Null) => self.emitter.emit_null(),
            NodeKind::Literal(value) => {
                if !self.emitter.emit_literal(value)? {
                    self.emitter.emit_constant(value.clone())?;
                }
            }

            NodeKind::Get { target, name } => match target {
                Some(Target::Binding(id)) => self.emit_load(*id, env)?,
                Some(Target::Function(id)) => {
                    self.emitter.emit_null();
                    self.emitter.emit_make_closure(function_index(id.index())?);
                }
                None => return Err(CompilationError::invalid_state(format!("'{name}' was never resolved"))),
            },
            NodeKind::Set { name, value, binding } => {
                let id = binding.ok_or_else(|| CompilationError::invalid_state(format!("'{name}' was never resolved")))?;
                self.emit_store(id, value, env)?;
            }
            NodeKind::GetArgument(index) => {
                let index = u8::try_from(*index)
                    .ok()
                    .and_then(|index| index.checked_add(u8::from(self.has_receiver())))
                    .ok_or_else(|| CompilationError::invalid_state("argument index out of range"))?;
                self.emitter.emit_get_arg(index);
            }

            NodeKind::GetMember { target, name } => {
                let target_ty = target.expression_type(self.ctx, env)?;
                let access = resolve_member(&self.ctx.registry, &target_ty, name, span)?;
                self.emit(target, env, true)?;
                match access {
                    MemberAccess::Field { index, .. } => self.emitter.emit_get_field(index),
                    MemberAccess::Length => self.emitter.emit(OpCode::Length),
                }
            }
            NodeKind::SetMember { target, name, value } => {
                let target_ty = target.expression_type(self.ctx, env)?;
                let MemberAccess::Field { index, ty: field_ty } = resolve_member(&self.ctx.registry, &target_ty, name, span)?
                else {
                    return Err(CompilationError::invalid_state(format!("'{name}' is not a field")));
                };
                self.emit(target, env, true)?;
                self.emit_converted(value, env, &field_ty)?;
                self.emitter.emit_set_field(index);
            }
            NodeKind::GetIndex { target, index } => {
                let (key, _) = index_types(&target.expression_type(self.ctx, env)?, span)?;
                self.emit(target, env, true)?;
                self.emit_converted(index, env, &key)?;
                self.emitter.emit(OpCode::GetIndex);
            }
            NodeKind::SetIndex { target, index, value } => {
                let (key, item) = index_types(&target.expression_type(self.ctx, env)?, span)?;
                self.emit(target, env, true)?;
                self.emit_converted(index, env, &key)?;
                self.emit_converted(value, env, &item)?;
                self.emitter.emit(OpCode::SetIndex);
            }

            NodeKind::Binary { op, left, right } => {
                let rule = binary_resolution(self.ctx, env, *op, left, right, span)?.rule;
                self.emit_binary(*op, rule, left, right, env)?;
            }
            NodeKind::Compare { op, left, right } => self.emit_compare(*op, left, right, env, span)?,
            NodeKind::Logical { op, left, right } => self.emit_logical(*op, left, right, env)?,
            NodeKind::Unary { op, operand } => {
                self.emit(operand, env, true)?;
                self.emitter.emit(match op {
                    UnaryOp::Not => OpCode::Not,
                    UnaryOp::Negate => OpCode::Neg,
                });
            }
            NodeKind::Cast { value, ty: sig } => {
                let from = value.expression_type(self.ctx, env)?;
                let to = resolve_signature(self.ctx, sig, span)?;
                let conversion = find_cast(&from, &to, &self.ctx.registry).ok_or_else(|| CompilationError::InvalidCast {
                    from: from.to_string(),
                    to: to.to_string(),
                    span,
                })?;
                self.emit(value, env, true)?;
                self.emit_conversion(&conversion)?;
            }
            NodeKind::Is { value, ty: sig } => {
                let from = value.expression_type(self.ctx, env)?;
                let to = resolve_signature(self.ctx, sig, span)?;
                self.emit_is(value, &from, &to, env)?;
            }
            NodeKind::Default(_) => self.emit_default(ty)?,

            NodeKind::New { args, .. } => {
                let arg_types = args
                    .iter()
                    .map(|arg| arg.expression_type(self.ctx, env))
                    .collect::<Result<Vec<_>>>()?;
                match resolve_new(&self.ctx.registry, ty, &arg_types, span)? {
                    Construct::Object { ty: id, fields } => {
                        for (arg, field) in args.iter().zip(&fields) {
                            self.emit_converted(arg, env, field)?;
                        }
                        self.emitter.emit_new(type_index(id.index())?, arg_count(args.len())?);
                    }
                    Construct::List => self.emitter.emit_u16(OpCode::NewList, 0),
                    Construct::Dict => self.emitter.emit_u16(OpCode::NewDict, 0),
                }
            }
            NodeKind::NewList(items) => {
                let TypeDesc::List(item) = ty else {
                    return Err(CompilationError::invalid_state("list literal without list type"));
                };
                for value in items {
                    self.emit_converted(value, env, item)?;
                }
                self.emitter.emit_u16(OpCode::NewList, collection_len(items.len())?);
            }
            NodeKind::NewDictionary(pairs) => {
                let TypeDesc::Dict(key, item) = ty else {
                    return Err(CompilationError::invalid_state("dictionary literal without dictionary type"));
                };
                self.reject_duplicate_keys(pairs, env)?;
                for (k, v) in pairs {
                    self.emit_converted(k, env, key)?;
                    self.emit_converted(v, env, item)?;
                }
                self.emitter.emit_u16(OpCode::NewDict, collection_len(pairs.len())?);
            }

            NodeKind::Block { body, scope } => {
                let scope = scope.ok_or_else(|| CompilationError::invalid_state("block scope was never created"))?;
                let inner = env.with_scope(scope);
                let saved = self.next_slot;
                self.enter_scope(scope, inner)?;
                if let Some((last, rest)) = body.split_last() {
                    for statement in rest {
                        self.emit(statement, inner, false)?;
                    }
                    self.emit(last, inner, !ty.is_unit())?;
                }
                self.next_slot = saved;
            }
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let has_value = !ty.is_unit();
                let otherwise = self.emitter.define_label();
                let end = self.emitter.define_label();
                self.emit(condition, env, true)?;
                self.emitter.emit_branch(OpCode::JumpIfFalse, otherwise);
                self.emit(then_branch, env, has_value)?;
                self.emitter.emit_branch(OpCode::Jump, end);
                self.emitter.mark_label(otherwise)?;
                if let Some(else_branch) = else_branch {
                    self.emit(else_branch, env, has_value)?;
                }
                self.emitter.mark_label(end)?;
            }
            NodeKind::While { condition, body } => {
                let start = self.emitter.define_label();
                let end = self.emitter.define_label();
                self.emitter.mark_label(start)?;
                self.emit(condition, env, true)?;
                self.emitter.emit_branch(OpCode::JumpIfFalse, end);
                self.emit(body, env, false)?;
                self.emitter.emit_branch(OpCode::Jump, start);
                self.emitter.mark_label(end)?;
            }

            NodeKind::Let { name, value, binding } => {
                let id = binding.ok_or_else(|| CompilationError::invalid_state(format!("'{name}' was never declared")))?;
                let inlined = self.ctx.scopes.binding(id).constant.as_ref().is_some_and(is_inline_literal);
                if !inlined {
                    self.emit_store(id, value, env)?;
                }
            }
            NodeKind::Var { name, init, binding } => {
                let id = binding.ok_or_else(|| CompilationError::invalid_state(format!("'{name}' was never declared")))?;
                match init {
                    VarInit::Value(value) => self.emit_store(id, value, env)?,
                    VarInit::Type(_) => {
                        let ty = self.ctx.scopes.binding(id).ty.clone();
                        self.emit_store_with(id, env, |this| this.emit_default(&ty))?;
                    }
                }
            }

            NodeKind::Lambda { method, .. } => {
                let id = method.ok_or_else(|| CompilationError::invalid_state("lambda was never converted"))?;
                self.emit_nearest_carrier(Some(env.scope))?;
                self.emitter.emit_make_closure(function_index(id.index())?);
            }
            NodeKind::Invoke { target, args } => match resolve_callee(self.ctx, env, target, args, span)? {
                Callee::Function(found) => {
                    for (arg, conversion) in args.iter().zip(&found.conversions) {
                        self.emit(arg, env, true)?;
                        self.emit_conversion(conversion)?;
                    }
                    self.emit_call(found.method, args.len())?;
                }
                Callee::Value(callee) => {
                    let func = callee
                        .as_function()
                        .ok_or_else(|| CompilationError::invalid_state("callee is not a function value"))?;
                    let (params, unit_result) = (func.params.clone(), func.ret.is_unit());
                    self.emit(target, env, true)?;
                    for (arg, param) in args.iter().zip(&params) {
                        self.emit_converted(arg, env, param)?;
                    }
                    self.emitter.emit_call_value(arg_count(args.len())?);
                    if unit_result {
                        self.emitter.emit_pop();
                    }
                }
            },

            NodeKind::TypeDefinition(_)
            | NodeKind::RecordDefinition(_)
            | NodeKind::FunctionDefinition(_)
            | NodeKind::Using(_) => {
                return Err(CompilationError::invalid_state("definition left in a function body"));
            }
        }
        Ok(())
    }

    fn emit_binary(&mut self, op: BinaryOp, rule: BinaryRule, left: &Node, right: &Node, env: Env) -> Result<()> {
        match rule {
            BinaryRule::Numeric { kind } => {
                self.emit_numeric_operand(left, env, kind)?;
                self.emit_numeric_operand(right, env, kind)?;
                self.emitter.emit(arithmetic_opcode(op)?);
            }
            BinaryRule::Shift { .. } => {
                self.emit(left, env, true)?;
                self.emit(right, env, true)?;
                self.emitter.emit(arithmetic_opcode(op)?);
            }
            BinaryRule::Pow => {
                self.emit_numeric_operand(left, env, PrimitiveKind::Double)?;
                self.emit_numeric_operand(right, env, PrimitiveKind::Double)?;
                self.emitter.emit(OpCode::Pow);
            }
            BinaryRule::Concat => {
                self.emit(left, env, true)?;
                self.emit(right, env, true)?;
                self.emitter.emit(OpCode::Add);
            }
            BinaryRule::Overload(method) => self.emit_overload_call(method, left, right, env)?,
        }
        Ok(())
    }

    /// Emit a numeric operand converted to `kind`, narrowing included.
    pub(super) fn emit_numeric_operand(&mut self, node: &Node, env: Env, kind: PrimitiveKind) -> Result<()> {
        self.emit(node, env, true)?;
        if node.expression_type(self.ctx, env)?.as_primitive() != Some(kind) {
            self.emitter.emit_convert(kind);
        }
        Ok(())
    }

    /// Call a static operator method with both operands.
    pub(super) fn emit_overload_call(
        &mut self,
        method: crate::entities::MethodId,
        left: &Node,
        right: &Node,
        env: Env,
    ) -> Result<()> {
        let params = self
            .ctx
            .registry
            .method(method)
            .param_types()
            .ok_or_else(|| CompilationError::invalid_state("operator method was never declared"))?;
        let [l, r] = params.as_slice() else {
            return Err(CompilationError::invalid_state("operator method must take two parameters"));
        };
        let (l, r) = (l.clone(), r.clone());
        self.emit_converted(left, env, &l)?;
        self.emit_converted(right, env, &r)?;
        self.emit_call(method, 2)
    }

    fn emit_logical(&mut self, op: LogicalOp, left: &Node, right: &Node, env: Env) -> Result<()> {
        match op {
            LogicalOp::And | LogicalOp::Or => {
                let end = self.emitter.define_label();
                self.emit(left, env, true)?;
                self.emitter.emit_dup();
                let branch = if op == LogicalOp::And { OpCode::JumpIfFalse } else { OpCode::JumpIfTrue };
                self.emitter.emit_branch(branch, end);
                self.emitter.emit_pop();
                self.emit(right, env, true)?;
                self.emitter.mark_label(end)?;
            }
            LogicalOp::Xor => {
                self.emit(left, env, true)?;
                self.emit(right, env, true)?;
                self.emitter.emit(OpCode::Eq);
                self.emitter.emit(OpCode::Not);
            }
        }
        Ok(())
    }

    /// `value is T`. The operand is evaluated exactly once.
    fn emit_is(&mut self, value: &Node, from: &TypeDesc, to: &TypeDesc, env: Env) -> Result<()> {
        if from == to {
            self.emit(value, env, false)?;
            self.emitter.emit_bool(true);
            return Ok(());
        }
        if from.is_value_type() {
            // A value type is statically known; only its own optional and `object` admit it.
            self.emit(value, env, false)?;
            let admits = *to == TypeDesc::Object || to.nullable_base() == Some(from);
            self.emitter.emit_bool(admits);
            return Ok(());
        }
        match self.type_test(to)? {
            Some(test) => {
                self.emit(value, env, true)?;
                self.emitter.emit_is_instance(test);
            }
            None => {
                self.emit(value, env, false)?;
                self.emitter.emit_bool(false);
            }
        }
        Ok(())
    }
}

impl BodyCompiler<'_> {
    /// Fail on two dictionary keys known at compile time to be equal.
    ///
    /// Literal keys are checked even with unrolling off. Keys only known at
    /// run time are checked by `NewDict`.
    fn reject_duplicate_keys(&mut self, pairs: &[(Node, Node)], env: Env) -> Result<()> {
        let mut seen = FxHashSet::default();
        for (key, _) in pairs {
            let value = match &key.kind {
                NodeKind::Literal(value) => Some(value.clone()),
                _ => key.constant(self.ctx, env)?,
            };
            if let Some(value) = value
                && !seen.insert(value.key())
            {
                return Err(CompilationError::DuplicateKey {
                    key: value.to_string(),
                    span: key.span,
                });
            }
        }
        Ok(())
    }
}

fn arithmetic_opcode(op: BinaryOp) -> Result<OpCode> {
    Ok(match op {
        BinaryOp::Add => OpCode::Add,
        BinaryOp::Sub => OpCode::Sub,
        BinaryOp::Mul => OpCode::Mul,
        BinaryOp::Div => OpCode::Div,
        BinaryOp::Rem => OpCode::Rem,
        BinaryOp::Shl => OpCode::Shl,
        BinaryOp::Shr => OpCode::Shr,
        BinaryOp::BitAnd => OpCode::BitAnd,
        BinaryOp::BitOr => OpCode::BitOr,
        BinaryOp::BitXor => OpCode::BitXor,
        BinaryOp::Pow => return Err(CompilationError::invalid_state("'**' has no numeric instruction")),
    })
}

pub(super) fn function_index(index: usize) -> Result<u16> {
    u16::try_from(index).map_err(|_| CompilationError::invalid_state("too many functions"))
}

fn collection_len(len: usize) -> Result<u16> {
    u16::try_from(len).map_err(|_| CompilationError::invalid_state("collection literal is too large"))
}
