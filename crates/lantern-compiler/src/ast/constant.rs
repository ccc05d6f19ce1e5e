//! Constant folding.
//!
//! A node is constant when every operand feeding it is constant and its
//! operator folds. Folding uses the same combinators the VM evaluates with,
//! so an unrolled constant always equals the value the unfolded expression
//! would produce at run time. Optional values never fold.

use lantern_core::{CompilationError, FoldError, Span, Value, fold};

use super::{Node, NodeKind, Target};
use crate::context::{Context, Env};
use crate::conversion::{Conversion, find_cast};
use crate::operators::{BinaryRule, CompareRule};

use super::typing::{binary_resolution, compare_resolution, resolve_signature};

type Result<T> = std::result::Result<T, CompilationError>;

impl Node {
    /// Folded value of this node, `None` when it is not constant.
    ///
    /// Always `None` when constant unrolling is disabled.
    pub fn constant(&self, ctx: &Context, env: Env) -> Result<Option<Value>> {
        if !ctx.options().unroll_constants() {
            return Ok(None);
        }
        if let Some(value) = self.constant.get() {
            return Ok(value.clone());
        }
        let value = self.fold(ctx, env)?;
        Ok(self.constant.get_or_init(|| value).clone())
    }

    pub fn is_constant(&self, ctx: &Context, env: Env) -> Result<bool> {
        Ok(self.constant(ctx, env)?.is_some())
    }

    /// Folded value, failing with `NotConstant` when there is none.
    pub fn constant_value(&self, ctx: &Context, env: Env) -> Result<Value> {
        self.constant(ctx, env)?
            .ok_or(CompilationError::NotConstant { span: self.span })
    }

    fn fold(&self, ctx: &Context, env: Env) -> Result<Option<Value>> {
        // Type errors take precedence over folding errors.
        self.expression_type(ctx, env)?;
        let span = self.span;
        let value = match &self.kind {
            NodeKind::Literal(Value::Unit | Value::Null) => None,
            NodeKind::Literal(value) => Some(value.clone()),
            NodeKind::Get {
                target: Some(Target::Binding(id)),
                ..
            } => ctx.scopes().binding(*id).constant.clone(),

            NodeKind::Binary { op, left, right } => {
                let rule = binary_resolution(ctx, env, *op, left, right, span)?.rule;
                if matches!(rule, BinaryRule::Overload(_)) {
                    return Ok(None);
                }
                match operands(ctx, env, left, right)? {
                    Some((l, r)) => Some(fold::binary(*op, &l, &r).map_err(|err| fold_error(err, span))?),
                    None => None,
                }
            }
            NodeKind::Compare { op, left, right } => {
                let rule = compare_resolution(ctx, env, *op, left, right, span)?.rule;
                let folds = matches!(
                    rule,
                    CompareRule::TextEquality
                        | CompareRule::TextOrdering
                        | CompareRule::Numeric { .. }
                        | CompareRule::BoolEquality
                );
                match operands(ctx, env, left, right)? {
                    Some((l, r)) if folds => Some(fold::compare(*op, &l, &r).map_err(|err| fold_error(err, span))?),
                    _ => None,
                }
            }
            NodeKind::Logical { op, left, right } => match operands(ctx, env, left, right)? {
                Some((l, r)) => Some(fold::logical(*op, &l, &r).map_err(|err| fold_error(err, span))?),
                None => None,
            },
            NodeKind::Unary { op, operand } => match operand.constant(ctx, env)? {
                Some(value) => Some(fold::unary(*op, &value).map_err(|err| fold_error(err, span))?),
                None => None,
            },
            NodeKind::Cast { value, ty } => {
                let from = value.expression_type(ctx, env)?;
                let to = resolve_signature(ctx, ty, span)?;
                match (find_cast(&from, &to, ctx.registry()), value.constant(ctx, env)?) {
                    (Some(Conversion::Identity), Some(value)) => Some(value),
                    (Some(Conversion::Numeric(kind)), Some(value)) => value.convert(kind),
                    _ => None,
                }
            }
            _ => None,
        };
        Ok(value)
    }
}

fn operands(ctx: &Context, env: Env, left: &Node, right: &Node) -> Result<Option<(Value, Value)>> {
    let Some(l) = left.constant(ctx, env)? else {
        return Ok(None);
    };
    Ok(right.constant(ctx, env)?.map(|r| (l, r)))
}

fn fold_error(source: FoldError, span: Span) -> CompilationError {
    CompilationError::ConstantFold { source, span }
}
