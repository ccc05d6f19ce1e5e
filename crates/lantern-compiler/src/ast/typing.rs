//! Expression type resolution.
//!
//! [`Node::expression_type`] computes the static type of a node once and
//! memoizes it. Resolution is independent of how the value is later used:
//! whether a value is required only matters to emission.
//!
//! The helpers at the bottom (`resolve_callee`, `resolve_member`, ...) are
//! shared with code generation so both agree on what a node means.

use lantern_core::{CompilationError, Span, TypeDesc, Value};

use super::{Node, NodeKind, Target, TypeSignature, VarInit};
use crate::context::{Context, Env};
use crate::conversion::{common_type, find_cast, find_conversion};
use crate::entities::{MethodId, Registry, TypeId, TypeKind};
use crate::operators::{
    BinaryRule, CompareRule, OperatorResolution, resolve_binary, resolve_compare, resolve_logical,
    resolve_unary,
};
use crate::overload::{OverloadMatch, resolve_overload};

type Result<T> = std::result::Result<T, CompilationError>;

impl Node {
    /// Static type of this node, computed at most once.
    ///
    /// Fails with `DisallowedType` when the restricted-type mode forbids the
    /// resolved type.
    pub fn expression_type(&self, ctx: &Context, env: Env) -> Result<TypeDesc> {
        if let Some(ty) = self.ty.get() {
            return Ok(ty.clone());
        }
        let ty = self.resolve_type(ctx, env)?;
        ctx.resolver().check_allowed(&ty, self.span)?;
        Ok(self.ty.get_or_init(|| ty).clone())
    }

    fn resolve_type(&self, ctx: &Context, env: Env) -> Result<TypeDesc> {
        let span = self.span;
        let registry = ctx.registry();
        let ty = match &self.kind {
            NodeKind::Unit => TypeDesc::Unit,
            NodeKind::Null => TypeDesc::Null,
            NodeKind::Literal(value) => literal_type(value, span)?,

            NodeKind::Get { name, target } => match target {
                Some(Target::Binding(id)) => ctx.scopes().binding(*id).ty.clone(),
                Some(Target::Function(id)) => registry.method(*id).function_type(span)?,
                None => return Err(unresolved(name)),
            },
            NodeKind::Set { name, value, binding } => {
                let id = binding.ok_or_else(|| unresolved(name))?;
                let binding = ctx.scopes().binding(id);
                if !binding.mutable {
                    return Err(CompilationError::ImmutableAssignment { name: name.clone(), span });
                }
                let value_ty = value.expression_type(ctx, env)?;
                expect_convertible(&value_ty, &binding.ty, registry, value.span)?;
                TypeDesc::Unit
            }
            NodeKind::GetArgument(index) => registry
                .method(env.method)
                .params
                .get(*index as usize)
                .and_then(|param| param.ty.clone())
                .ok_or_else(|| {
                    CompilationError::fail(format!("function has no argument {index}"), Some(span))
                })?,

            NodeKind::GetMember { target, name } => {
                let target_ty = target.expression_type(ctx, env)?;
                resolve_member(registry, &target_ty, name, span)?.ty()
            }
            NodeKind::SetMember { target, name, value } => {
                let target_ty = target.expression_type(ctx, env)?;
                let field_ty = match resolve_member(registry, &target_ty, name, span)? {
                    MemberAccess::Field { ty, .. } => ty,
                    MemberAccess::Length => {
                        return Err(CompilationError::fail(format!("'{name}' is read-only"), Some(span)));
                    }
                };
                let value_ty = value.expression_type(ctx, env)?;
                expect_convertible(&value_ty, &field_ty, registry, value.span)?;
                TypeDesc::Unit
            }
            NodeKind::GetIndex { target, index } => {
                let (key, item) = index_types(&target.expression_type(ctx, env)?, span)?;
                expect_convertible(&index.expression_type(ctx, env)?, &key, registry, index.span)?;
                item
            }
            NodeKind::SetIndex { target, index, value } => {
                let (key, item) = index_types(&target.expression_type(ctx, env)?, span)?;
                expect_convertible(&index.expression_type(ctx, env)?, &key, registry, index.span)?;
                expect_convertible(&value.expression_type(ctx, env)?, &item, registry, value.span)?;
                TypeDesc::Unit
            }

            NodeKind::Binary { op, left, right } => {
                binary_resolution(ctx, env, *op, left, right, span)?.result
            }
            NodeKind::Compare { op, left, right } => {
                compare_resolution(ctx, env, *op, left, right, span)?.result
            }
            NodeKind::Logical { op, left, right } => {
                let l = left.expression_type(ctx, env)?;
                let r = right.expression_type(ctx, env)?;
                resolve_logical(*op, &l, &r, span)?.result
            }
            NodeKind::Unary { op, operand } => resolve_unary(*op, &operand.expression_type(ctx, env)?, span)?.result,
            NodeKind::Cast { value, ty } => {
                let from = value.expression_type(ctx, env)?;
                let to = resolve_signature(ctx, ty, span)?;
                if find_cast(&from, &to, registry).is_none() {
                    return Err(CompilationError::InvalidCast {
                        from: from.to_string(),
                        to: to.to_string(),
                        span,
                    });
                }
                to
            }
            NodeKind::Is { value, ty } => {
                value.expression_type(ctx, env)?;
                resolve_signature(ctx, ty, span)?;
                TypeDesc::BOOL
            }
            NodeKind::Default(sig) => resolve_signature(ctx, sig, span)?,

            NodeKind::New { ty, args } => {
                let ty = resolve_signature(ctx, ty, span)?;
                let arg_types = types_of(args, ctx, env)?;
                resolve_new(registry, &ty, &arg_types, span)?;
                ty
            }
            NodeKind::NewList(items) => {
                if items.is_empty() {
                    return Err(CompilationError::EmptyCollection { kind: "list", span });
                }
                let item_types = types_of(items, ctx, env)?;
                TypeDesc::list(infer_common(&item_types, registry, "list items", span)?)
            }
            NodeKind::NewDictionary(pairs) => {
                let Some((first, _)) = pairs.first() else {
                    return Err(CompilationError::EmptyCollection { kind: "dictionary", span });
                };
                let key = first.expression_type(ctx, env)?;
                if key == TypeDesc::Null {
                    return Err(CompilationError::TypeMismatch {
                        message: "dictionary keys cannot be null".into(),
                        span: first.span,
                    });
                }
                let mut value_types = Vec::with_capacity(pairs.len());
                for (k, v) in pairs {
                    let key_ty = k.expression_type(ctx, env)?;
                    if key_ty != key {
                        return Err(CompilationError::TypeMismatch {
                            message: format!("dictionary key of type '{key_ty}' where '{key}' was expected"),
                            span: k.span,
                        });
                    }
                    value_types.push(v.expression_type(ctx, env)?);
                }
                if value_types.iter().all(|ty| *ty == TypeDesc::Null) {
                    return Err(CompilationError::UninferableValueType { span });
                }
                TypeDesc::dict(key, infer_common(&value_types, registry, "dictionary values", span)?)
            }

            NodeKind::Block { body, scope } => {
                let inner = scope.map_or(env, |id| env.with_scope(id));
                let mut last = TypeDesc::Unit;
                for statement in body {
                    last = statement.expression_type(ctx, inner)?;
                }
                last
            }
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                expect_condition(condition, ctx, env)?;
                let then_ty = then_branch.expression_type(ctx, env)?;
                match else_branch {
                    Some(else_branch) if else_branch.expression_type(ctx, env)? == then_ty => then_ty,
                    _ => TypeDesc::Unit,
                }
            }
            NodeKind::While { condition, body } => {
                expect_condition(condition, ctx, env)?;
                body.expression_type(ctx, env)?;
                TypeDesc::Unit
            }
            NodeKind::Let { value, .. } => {
                value.expression_type(ctx, env)?;
                TypeDesc::Unit
            }
            NodeKind::Var { init, .. } => {
                if let VarInit::Value(value) = init {
                    value.expression_type(ctx, env)?;
                }
                TypeDesc::Unit
            }

            NodeKind::Lambda { method, .. } => {
                let id = method.ok_or_else(|| CompilationError::invalid_state("lambda was not converted"))?;
                registry.method(id).function_type(span)?
            }
            NodeKind::Invoke { target, args } => match resolve_callee(ctx, env, target, args, span)? {
                Callee::Function(found) => registry.method(found.method).require_return_type(span)?.clone(),
                Callee::Value(ty) => ty.as_function().map(|func| func.ret.clone()).unwrap_or(TypeDesc::Unit),
            },

            NodeKind::TypeDefinition(_)
            | NodeKind::RecordDefinition(_)
            | NodeKind::FunctionDefinition(_)
            | NodeKind::Using(_) => TypeDesc::Unit,
        };
        Ok(ty)
    }
}

fn literal_type(value: &Value, span: Span) -> Result<TypeDesc> {
    Ok(match value {
        Value::Unit => TypeDesc::Unit,
        Value::Null => TypeDesc::Null,
        Value::Str(_) => TypeDesc::String,
        other => match other.kind() {
            Some(kind) => TypeDesc::Primitive(kind),
            None => {
                return Err(CompilationError::fail(
                    format!("{} value cannot be a literal", other.type_name()),
                    Some(span),
                ));
            }
        },
    })
}

fn unresolved(name: &str) -> CompilationError {
    CompilationError::invalid_state(format!("name '{name}' was not resolved"))
}

fn types_of(nodes: &[Node], ctx: &Context, env: Env) -> Result<Vec<TypeDesc>> {
    nodes.iter().map(|node| node.expression_type(ctx, env)).collect()
}

fn expect_condition(condition: &Node, ctx: &Context, env: Env) -> Result<()> {
    let ty = condition.expression_type(ctx, env)?;
    if ty != TypeDesc::BOOL {
        return Err(CompilationError::TypeMismatch {
            message: format!("condition must be of type 'bool', found '{ty}'"),
            span: condition.span,
        });
    }
    Ok(())
}

/// Fail unless `from` converts implicitly to `to`.
pub(crate) fn expect_convertible(from: &TypeDesc, to: &TypeDesc, registry: &Registry, span: Span) -> Result<()> {
    match find_conversion(from, to, registry) {
        Some(_) => Ok(()),
        None => Err(CompilationError::TypeMismatch {
            message: format!("cannot convert '{from}' to '{to}'"),
            span,
        }),
    }
}

fn infer_common(types: &[TypeDesc], registry: &Registry, what: &str, span: Span) -> Result<TypeDesc> {
    common_type(types, registry).ok_or_else(|| CompilationError::TypeMismatch {
        message: format!("{what} have no common type"),
        span,
    })
}

pub(crate) fn resolve_signature(ctx: &Context, sig: &TypeSignature, span: Span) -> Result<TypeDesc> {
    ctx.resolver().resolve(sig, ctx.registry(), span)
}

pub(crate) fn binary_resolution(
    ctx: &Context,
    env: Env,
    op: lantern_core::BinaryOp,
    left: &Node,
    right: &Node,
    span: Span,
) -> Result<OperatorResolution<BinaryRule>> {
    let l = left.expression_type(ctx, env)?;
    let r = right.expression_type(ctx, env)?;
    resolve_binary(op, &l, &r, ctx.registry(), span)
}

pub(crate) fn compare_resolution(
    ctx: &Context,
    env: Env,
    op: lantern_core::CompareOp,
    left: &Node,
    right: &Node,
    span: Span,
) -> Result<OperatorResolution<CompareRule>> {
    let l = left.expression_type(ctx, env)?;
    let r = right.expression_type(ctx, env)?;
    resolve_compare(op, &l, &r, ctx.registry(), span)
}

// ============================================================================
// Members and indexers
// ============================================================================

/// What a member access reads.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MemberAccess {
    Field { index: u16, ty: TypeDesc },
    /// `Count` of a collection or `Length` of a string.
    Length,
}

impl MemberAccess {
    fn ty(self) -> TypeDesc {
        match self {
            MemberAccess::Field { ty, .. } => ty,
            MemberAccess::Length => TypeDesc::INT,
        }
    }
}

pub(crate) fn resolve_member(registry: &Registry, target: &TypeDesc, name: &str, span: Span) -> Result<MemberAccess> {
    let unknown = || CompilationError::UnknownMember {
        ty: target.to_string(),
        name: name.to_string(),
        span,
    };
    match (target, name) {
        (TypeDesc::List(_) | TypeDesc::Dict(..), "Count") | (TypeDesc::String, "Length") => Ok(MemberAccess::Length),
        (TypeDesc::User(_), _) => {
            let id = registry.entity_of(target).ok_or_else(unknown)?;
            let (index, field) = registry.type_entity(id).field(name).ok_or_else(unknown)?;
            let ty = field
                .ty
                .clone()
                .ok_or_else(|| CompilationError::invalid_state(format!("field '{name}' has no type yet")))?;
            Ok(MemberAccess::Field { index, ty })
        }
        _ => Err(unknown()),
    }
}

/// Index and item type of an indexable type.
pub(crate) fn index_types(target: &TypeDesc, span: Span) -> Result<(TypeDesc, TypeDesc)> {
    match target {
        TypeDesc::List(item) => Ok((TypeDesc::INT, item.as_ref().clone())),
        TypeDesc::Dict(key, value) => Ok((key.as_ref().clone(), value.as_ref().clone())),
        other => Err(CompilationError::TypeMismatch {
            message: format!("type '{other}' cannot be indexed"),
            span,
        }),
    }
}

// ============================================================================
// Construction
// ============================================================================

/// What a `New` node creates.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Construct {
    /// An instance; `fields` are the types the arguments convert to.
    Object { ty: TypeId, fields: Vec<TypeDesc> },
    List,
    Dict,
}

pub(crate) fn resolve_new(registry: &Registry, ty: &TypeDesc, args: &[TypeDesc], span: Span) -> Result<Construct> {
    let construct = match ty {
        TypeDesc::List(_) | TypeDesc::Dict(..) => {
            if !args.is_empty() {
                return Err(CompilationError::fail(
                    format!("constructor of '{ty}' takes no arguments"),
                    Some(span),
                ));
            }
            if matches!(ty, TypeDesc::List(_)) { Construct::List } else { Construct::Dict }
        }
        TypeDesc::User(_) => {
            let id = registry
                .entity_of(ty)
                .ok_or_else(|| CompilationError::TypeNotFound { name: ty.to_string(), span })?;
            let entity = registry.type_entity(id);
            if entity.kind == TypeKind::Algebraic {
                return Err(CompilationError::fail(
                    format!("algebraic type '{ty}' cannot be created directly, create one of its labels"),
                    Some(span),
                ));
            }
            let fields: Vec<TypeDesc> = entity.fields.iter().filter_map(|field| field.ty.clone()).collect();
            if !args.is_empty() && args.len() != fields.len() {
                return Err(CompilationError::fail(
                    format!("'{ty}' takes {} arguments, got {}", fields.len(), args.len()),
                    Some(span),
                ));
            }
            for (arg, field) in args.iter().zip(&fields) {
                expect_convertible(arg, field, registry, span)?;
            }
            Construct::Object { ty: id, fields }
        }
        other => {
            return Err(CompilationError::TypeMismatch {
                message: format!("values of type '{other}' cannot be constructed"),
                span,
            });
        }
    };
    Ok(construct)
}

// ============================================================================
// Calls
// ============================================================================

/// What an `Invoke` calls.
#[derive(Debug, Clone)]
pub(crate) enum Callee {
    /// A named function or static method, chosen by overload resolution.
    Function(OverloadMatch),
    /// A function value; the payload is its `Func<..>` type.
    Value(TypeDesc),
}

/// The static owner named by the target of a static call, `Owner.method(..)`.
///
/// A name bound in scope always wins over a type of the same name.
pub(crate) fn static_owner(target: &Node, ctx: &Context, env: Env) -> Option<TypeId> {
    match &target.kind {
        NodeKind::Get { name, target: None } if ctx.scopes().lookup(env.scope, name).is_none() => {
            ctx.registry().nameable_type(name)
        }
        _ => None,
    }
}

pub(crate) fn resolve_callee(ctx: &Context, env: Env, target: &Node, args: &[Node], span: Span) -> Result<Callee> {
    let registry = ctx.registry();
    let named = match &target.kind {
        NodeKind::Get { name, target: None } => Some((Registry::ROOT, name.as_str())),
        NodeKind::GetMember { target: owner, name } => static_owner(owner, ctx, env).map(|id| (id, name.as_str())),
        _ => None,
    };

    let arg_types = types_of(args, ctx, env)?;
    if let Some((owner, name)) = named {
        let candidates: Vec<MethodId> = registry.methods_named(owner, name);
        if candidates.is_empty() {
            return Err(if owner == Registry::ROOT {
                CompilationError::NameResolution { name: name.to_string(), span }
            } else {
                CompilationError::UnknownMember {
                    ty: registry.type_entity(owner).name.clone(),
                    name: name.to_string(),
                    span,
                }
            });
        }
        return resolve_overload(registry, &candidates, &arg_types, name, span).map(Callee::Function);
    }

    let ty = target.expression_type(ctx, env)?;
    let Some(func) = ty.as_function() else {
        return Err(CompilationError::TypeMismatch {
            message: format!("value of type '{ty}' cannot be called"),
            span,
        });
    };
    let accepts = func.params.len() == arg_types.len()
        && arg_types
            .iter()
            .zip(&func.params)
            .all(|(arg, param)| find_conversion(arg, param, registry).is_some());
    if !accepts {
        return Err(CompilationError::NoMatchingOverload {
            name: ty.to_string(),
            args: arg_types.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "),
            span,
        });
    }
    Ok(Callee::Value(ty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;
    use crate::options::CompilerOptions;

    /// Declare the nodes and run closure conversion, so entry statements are typed.
    fn converted(nodes: Vec<Node>) -> Context {
        let mut ctx = Context::new(nodes, CompilerOptions::default());
        ctx.declare_entities().unwrap();
        ctx.convert_closures().unwrap();
        ctx
    }

    fn entry_type(nodes: Vec<Node>) -> TypeDesc {
        let ctx = converted(nodes);
        ctx.registry().method(ctx.entry()).return_type.clone().unwrap()
    }

    fn entry_error(nodes: Vec<Node>) -> CompilationError {
        let mut ctx = Context::new(nodes, CompilerOptions::default());
        ctx.declare_entities().unwrap();
        ctx.convert_closures().unwrap_err()
    }

    #[test]
    fn literal_and_arithmetic_types() {
        assert_eq!(entry_type(vec![Expr::add(Expr::int(1), Expr::long(2))]), TypeDesc::LONG);
        assert_eq!(entry_type(vec![Expr::add(Expr::int(1), Expr::double(2.0))]), TypeDesc::DOUBLE);
        assert_eq!(entry_type(vec![Expr::string("a")]), TypeDesc::String);
        assert_eq!(entry_type(vec![]), TypeDesc::Unit);
    }

    #[test]
    fn type_is_memoized_per_node() {
        let ctx = converted(vec![Expr::int(1)]);
        let node = Expr::add(Expr::int(1), Expr::int(2));
        let env = Env::new(ctx.root(), ctx.entry(), ctx.registry().method(ctx.entry()).scope.unwrap());
        let first = node.expression_type(&ctx, env).unwrap();
        assert_eq!(node.cached_type(), Some(&first));
        assert_eq!(node.expression_type(&ctx, env).unwrap(), first);
    }

    #[test]
    fn if_without_matching_branches_is_unit() {
        let both = Expr::if_else(Expr::bool(true), Expr::int(1), Expr::int(2));
        assert_eq!(entry_type(vec![both]), TypeDesc::INT);
        let mixed = Expr::if_else(Expr::bool(true), Expr::int(1), Expr::string("x"));
        assert_eq!(entry_type(vec![mixed]), TypeDesc::Unit);
        assert_eq!(entry_type(vec![Expr::if_then(Expr::bool(true), Expr::int(1))]), TypeDesc::Unit);
    }

    #[test]
    fn condition_must_be_bool() {
        let err = entry_error(vec![Expr::while_loop(Expr::int(1), Expr::unit())]);
        assert!(matches!(err, CompilationError::TypeMismatch { .. }));
    }

    #[test]
    fn list_literal_infers_common_type() {
        let list = Expr::list(vec![Expr::int(1), Expr::long(2)]);
        assert_eq!(entry_type(vec![list]), TypeDesc::list(TypeDesc::LONG));
        let optional = Expr::list(vec![Expr::int(1), Expr::null()]);
        assert_eq!(entry_type(vec![optional]), TypeDesc::list(TypeDesc::nullable(TypeDesc::INT)));
    }

    #[test]
    fn empty_collection_literals_are_rejected() {
        let err = entry_error(vec![Expr::list(vec![])]);
        assert_eq!(err.to_string(), "at 0:0: Use explicit constructor to create an empty list!");
        let err = entry_error(vec![Expr::dict(vec![])]);
        assert!(matches!(err, CompilationError::EmptyCollection { kind: "dictionary", .. }));
    }

    #[test]
    fn dictionary_keys_share_the_first_type() {
        let ok = Expr::dict(vec![(Expr::string("a"), Expr::int(1)), (Expr::string("b"), Expr::long(2))]);
        assert_eq!(entry_type(vec![ok]), TypeDesc::dict(TypeDesc::String, TypeDesc::LONG));

        let bad = Expr::dict(vec![(Expr::string("a"), Expr::int(1)), (Expr::int(2), Expr::int(2))]);
        assert!(matches!(entry_error(vec![bad]), CompilationError::TypeMismatch { .. }));
    }

    #[test]
    fn dictionary_of_null_values_cannot_be_inferred() {
        let nulls = Expr::dict(vec![(Expr::int(1), Expr::null()), (Expr::int(2), Expr::null())]);
        assert!(matches!(entry_error(vec![nulls]), CompilationError::UninferableValueType { .. }));
    }

    #[test]
    fn members_of_records_and_collections() {
        let nodes = vec![
            Expr::using("Collections"),
            Expr::record("Point", &[("X", "int"), ("Y", "double")]),
            Expr::let_("p", Expr::new_instance("Point", vec![Expr::int(1), Expr::int(2)])),
            Expr::member(Expr::get("p"), "Y"),
        ];
        assert_eq!(entry_type(nodes), TypeDesc::DOUBLE);

        let count = vec![Expr::member(Expr::list(vec![Expr::int(1)]), "Count")];
        assert_eq!(entry_type(count), TypeDesc::INT);

        let err = entry_error(vec![Expr::member(Expr::int(1), "Foo")]);
        assert!(matches!(err, CompilationError::UnknownMember { ref ty, .. } if ty == "int"));
    }

    #[test]
    fn record_construction_checks_arguments() {
        let nodes = vec![
            Expr::record("Point", &[("X", "int"), ("Y", "int")]),
            Expr::new_instance("Point", vec![Expr::int(1)]),
        ];
        assert!(matches!(entry_error(nodes), CompilationError::Failed { .. }));

        let nodes = vec![
            Expr::record("Point", &[("X", "int"), ("Y", "int")]),
            Expr::new_instance("Point", vec![Expr::string("a"), Expr::int(1)]),
        ];
        assert!(matches!(entry_error(nodes), CompilationError::TypeMismatch { .. }));
    }

    #[test]
    fn casts_must_be_defined() {
        assert_eq!(entry_type(vec![Expr::cast(Expr::double(1.5), "int")]), TypeDesc::INT);
        let err = entry_error(vec![Expr::cast(Expr::string("a"), "int")]);
        assert!(matches!(err, CompilationError::InvalidCast { .. }));
    }

    #[test]
    fn disallowed_node_type_fails() {
        let options = CompilerOptions::default().with_safe_mode(crate::options::SafeMode::blacklist(["double"]));
        let mut ctx = Context::new(vec![Expr::add(Expr::int(1), Expr::double(2.0))], options);
        ctx.declare_entities().unwrap();
        assert!(matches!(ctx.convert_closures(), Err(CompilationError::DisallowedType { ref name, .. }) if name == "double"));
    }

    #[test]
    fn unit_functions_can_be_called() {
        let nodes = vec![
            Expr::fun("noop", vec![], Some("unit"), Expr::int(1)),
            Expr::call("noop", vec![]),
        ];
        assert_eq!(entry_type(nodes), TypeDesc::Unit);
    }
}
