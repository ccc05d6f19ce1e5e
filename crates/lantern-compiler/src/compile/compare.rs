//! Emission of comparison operators.
//!
//! Optional values are the plain value or null at run time. Comparing two
//! optionals compares their values with null replaced by the zero of the
//! base kind, then their has-value flags:
//!
//! ```text
//! a == b  <=>  value(a) == value(b) && has(a) == has(b)
//! ```

use lantern_core::{CompareOp, CompilationError, PrimitiveKind, Span, TypeDesc, Value};

use super::{BodyCompiler, Result};
use crate::ast::Node;
use crate::ast::typing::compare_resolution;
use crate::bytecode::OpCode;
use crate::context::Env;
use crate::operators::CompareRule;
use crate::scope::Storage;

impl BodyCompiler<'_> {
    pub(super) fn emit_compare(&mut self, op: CompareOp, left: &Node, right: &Node, env: Env, span: Span) -> Result<()> {
        let rule = compare_resolution(self.ctx, env, op, left, right, span)?.rule;
        let negate_equality = op == CompareOp::NotEqual;
        match rule {
            CompareRule::TextEquality => {
                self.emit(left, env, true)?;
                self.emit(right, env, true)?;
                let helper = self.ctx.intrinsics().string_equals;
                self.emit_call(helper, 2)?;
                self.emit_not_if(negate_equality);
            }
            CompareRule::TextOrdering => {
                self.emit(left, env, true)?;
                self.emit(right, env, true)?;
                let helper = self.ctx.intrinsics().string_compare;
                self.emit_call(helper, 2)?;
                // `<=` is "not greater", `>=` is "not less".
                let (expected, negate) = match op {
                    CompareOp::Less => (-1, false),
                    CompareOp::Greater => (1, false),
                    CompareOp::LessEqual => (1, true),
                    _ => (-1, true),
                };
                self.emitter.emit_int(expected)?;
                self.emitter.emit(OpCode::Eq);
                self.emit_not_if(negate);
            }
            CompareRule::Numeric { kind } => {
                self.emit_numeric_operand(left, env, kind)?;
                self.emit_numeric_operand(right, env, kind)?;
                let (instruction, negate) = match op {
                    CompareOp::Equal => (OpCode::Eq, false),
                    CompareOp::NotEqual => (OpCode::Eq, true),
                    CompareOp::Less => (OpCode::Lt, false),
                    CompareOp::Greater => (OpCode::Gt, false),
                    CompareOp::LessEqual => (OpCode::Gt, true),
                    CompareOp::GreaterEqual => (OpCode::Lt, true),
                };
                self.emitter.emit(instruction);
                self.emit_not_if(negate);
            }
            CompareRule::BoolEquality | CompareRule::ReferenceNull => {
                self.emit(left, env, true)?;
                self.emit(right, env, true)?;
                self.emitter.emit(OpCode::Eq);
                self.emit_not_if(negate_equality);
            }
            CompareRule::NullableBoth { base } => self.emit_nullable_both(op, base, left, right, env)?,
            CompareRule::NullableValue { base, nullable_left } => {
                self.emit_nullable_value(op, base, nullable_left, left, right, env)?
            }
            CompareRule::NullableNull { nullable_left } => {
                let (nullable, null) = if nullable_left { (left, right) } else { (right, left) };
                if !null.is_null_literal() {
                    self.emit(null, env, false)?;
                }
                self.emit(nullable, env, true)?;
                self.emitter.emit(OpCode::HasValue);
                // `x == null` holds when x has no value.
                self.emit_not_if(op == CompareOp::Equal);
            }
            CompareRule::RecordEquals(method) => {
                self.emit_overload_call(method, left, right, env)?;
                self.emit_not_if(negate_equality);
            }
            CompareRule::Overload(method) => self.emit_overload_call(method, left, right, env)?,
        }
        Ok(())
    }

    /// `T? == T?`: both operands go to temporaries so each is evaluated once.
    fn emit_nullable_both(&mut self, op: CompareOp, base: PrimitiveKind, left: &Node, right: &Node, env: Env) -> Result<()> {
        let ty = TypeDesc::nullable(TypeDesc::Primitive(base));
        let a = self.stash(left, &ty, env)?;
        let b = self.stash(right, &ty, env)?;

        let unequal = self.emitter.define_label();
        let end = self.emitter.define_label();
        self.emit_value_or_zero(a, base)?;
        self.emit_value_or_zero(b, base)?;
        self.emitter.emit(OpCode::Eq);
        self.emitter.emit_branch(OpCode::JumpIfFalse, unequal);

        self.emitter.emit_get_local(a);
        self.emitter.emit(OpCode::HasValue);
        self.emitter.emit_get_local(b);
        self.emitter.emit(OpCode::HasValue);
        self.emitter.emit(OpCode::Eq);
        self.emit_not_if(op == CompareOp::NotEqual);
        self.emitter.emit_branch(OpCode::Jump, end);

        self.emitter.mark_label(unequal)?;
        self.emitter.emit_bool(op == CompareOp::NotEqual);
        self.emitter.mark_label(end)
    }

    /// `T? == T` or `T == T?`: only the optional side needs a temporary.
    fn emit_nullable_value(
        &mut self,
        op: CompareOp,
        base: PrimitiveKind,
        nullable_left: bool,
        left: &Node,
        right: &Node,
        env: Env,
    ) -> Result<()> {
        let ty = TypeDesc::nullable(TypeDesc::Primitive(base));
        let slot = if nullable_left {
            let slot = self.stash(left, &ty, env)?;
            self.emit(right, env, true)?;
            slot
        } else {
            self.emit(left, env, true)?;
            self.stash(right, &ty, env)?
        };

        let unequal = self.emitter.define_label();
        let end = self.emitter.define_label();
        self.emit_value_or_zero(slot, base)?;
        self.emitter.emit(OpCode::Eq);
        self.emitter.emit_branch(OpCode::JumpIfFalse, unequal);

        // Equal values: the result depends on whether the optional has one.
        self.emitter.emit_get_local(slot);
        self.emitter.emit(OpCode::HasValue);
        self.emit_not_if(op == CompareOp::NotEqual);
        self.emitter.emit_branch(OpCode::Jump, end);

        self.emitter.mark_label(unequal)?;
        self.emitter.emit_bool(op == CompareOp::NotEqual);
        self.emitter.mark_label(end)
    }

    /// Evaluate `node` into a fresh implicit temporary, returning its slot.
    fn stash(&mut self, node: &Node, ty: &TypeDesc, env: Env) -> Result<u16> {
        let temp = self.ctx.scopes.declare_implicit(env.scope, ty.clone(), true);
        self.emit_store(temp, node, env)?;
        match self.ctx.scopes.binding(temp).storage {
            Storage::Local(slot) => Ok(slot),
            _ => Err(CompilationError::invalid_state("temporary has no slot")),
        }
    }

    fn emit_value_or_zero(&mut self, slot: u16, base: PrimitiveKind) -> Result<()> {
        self.emitter.emit_get_local(slot);
        self.emitter.emit_value_or_default(Value::zero(base))
    }

    fn emit_not_if(&mut self, negate: bool) {
        if negate {
            self.emitter.emit(OpCode::Not);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{Expr, Node};
    use crate::bytecode::{BytecodeChunk, OpCode};
    use crate::context::Context;
    use crate::options::CompilerOptions;

    fn compiled(nodes: Vec<Node>) -> Context {
        let mut ctx = Context::new(nodes, CompilerOptions::default());
        ctx.compile().unwrap();
        ctx
    }

    fn entry(ctx: &Context) -> &BytecodeChunk {
        ctx.unit().unwrap().entry_function().unwrap().chunk().unwrap()
    }

    #[test]
    fn constant_comparisons_fold() {
        let ctx = compiled(vec![Expr::less(Expr::int(1), Expr::long(2))]);
        entry(&ctx).assert_opcodes(&[OpCode::PushTrue, OpCode::Return]);
    }

    #[test]
    fn less_equal_is_not_greater() {
        let ctx = compiled(vec![
            Expr::var("a", Expr::int(1)),
            Expr::less_equal(Expr::get("a"), Expr::int(2)),
        ]);
        entry(&ctx).assert_contains_opcodes(&[OpCode::GetLocal, OpCode::Constant, OpCode::Gt, OpCode::Not]);
    }

    #[test]
    fn string_ordering_goes_through_the_compare_helper() {
        let ctx = compiled(vec![
            Expr::var("s", Expr::string("a")),
            Expr::greater_equal(Expr::get("s"), Expr::string("b")),
        ]);
        entry(&ctx).assert_contains_opcodes(&[
            OpCode::GetLocal,
            OpCode::Constant,
            OpCode::Call,
            OpCode::Constant,
            OpCode::Eq,
            OpCode::Not,
        ]);
    }

    #[test]
    fn string_inequality_negates_the_equality_helper() {
        let ctx = compiled(vec![
            Expr::var("s", Expr::string("a")),
            Expr::not_equal(Expr::get("s"), Expr::string("b")),
        ]);
        entry(&ctx).assert_contains_opcodes(&[OpCode::Call, OpCode::Not, OpCode::Return]);
    }

    #[test]
    fn optional_comparison_checks_values_then_flags() {
        let ctx = compiled(vec![
            Expr::var_typed("a", "int?"),
            Expr::var_typed("b", "int?"),
            Expr::equal(Expr::get("a"), Expr::get("b")),
        ]);
        entry(&ctx).assert_contains_opcodes(&[
            OpCode::ValueOrDefault,
            OpCode::ValueOrDefault,
            OpCode::Eq,
            OpCode::JumpIfFalse,
            OpCode::HasValue,
            OpCode::HasValue,
            OpCode::Eq,
            OpCode::Jump,
            OpCode::PushFalse,
        ]);
    }

    #[test]
    fn optional_against_null_tests_the_flag() {
        let ctx = compiled(vec![Expr::var_typed("a", "int?"), Expr::equal(Expr::get("a"), Expr::null())]);
        entry(&ctx).assert_opcodes(&[
            OpCode::PushNull,
            OpCode::SetLocal,
            OpCode::GetLocal,
            OpCode::HasValue,
            OpCode::Not,
            OpCode::Return,
        ]);
    }

    #[test]
    fn reference_against_null_uses_identity() {
        let ctx = compiled(vec![Expr::var_typed("s", "string"), Expr::not_equal(Expr::null(), Expr::get("s"))]);
        entry(&ctx).assert_opcodes(&[
            OpCode::PushNull,
            OpCode::SetLocal,
            OpCode::PushNull,
            OpCode::GetLocal,
            OpCode::Eq,
            OpCode::Not,
            OpCode::Return,
        ]);
    }
}
