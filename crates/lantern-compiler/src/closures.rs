//! Closure conversion.
//!
//! Runs over every function body after entities are declared and before
//! code generation. The pass:
//!
//! - creates the scope of every block, function and lambda, and declares
//!   `let`/`var` bindings and parameters in them
//! - resolves every name to its binding or function
//! - moves lambda bodies into their own method entities
//! - marks a binding captured when it is referenced from a function other
//!   than the one declaring it
//! - gives every scope with captured bindings a synthesized carrier type
//!   `<Closure_N>` whose field 0 links to the enclosing carrier
//!
//! Constant bindings with an inlinable value are never captured, every read
//! of them is replaced by the literal.

use lantern_core::{CompilationError, Span, TypeDesc};

use crate::ast::{Node, NodeKind, Target, VarInit};
use crate::context::{Context, ContextState, Env};
use crate::conversion::find_conversion;
use crate::emit::is_inline_literal;
use crate::entities::{FieldEntity, MethodEntity, MethodId, MethodKind, ParamEntity, Registry, TypeEntity, TypeKind};
use crate::scope::{BindingId, ScopeId, Storage};

type Result<T> = std::result::Result<T, CompilationError>;

impl Context {
    /// Convert the closures of every function, the entry point last.
    #[tracing::instrument(skip_all)]
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn convert_closures(&mut self) -> Result<()> {
        self.run_pass(&[ContextState::EntitiesDeclared], |ctx| {
            let functions: Vec<MethodId> = ctx
                .registry
                .method_ids()
                .filter(|id| ctx.registry.method(*id).kind == MethodKind::Function)
                .collect();
            for id in functions {
                ctx.convert_method(id)?;
            }
            ctx.convert_method(ctx.entry())?;
            Ok(ContextState::ClosuresConverted)
        })
    }

    fn convert_method(&mut self, id: MethodId) -> Result<()> {
        tracing::trace!(method = %self.registry.method(id).name, "converting closures");
        let root = self.scopes.create(None, id);
        let params: Vec<(String, Option<TypeDesc>, Span)> = self
            .registry
            .method(id)
            .params
            .iter()
            .map(|param| (param.name.clone(), param.ty.clone(), param.span))
            .collect();
        for (i, (name, ty, span)) in params.into_iter().enumerate() {
            let ty = ty.ok_or_else(|| CompilationError::invalid_state(format!("parameter '{name}' has no type")))?;
            self.declare_parameter(root, &name, ty, argument_index(i)?, span)?;
        }
        self.registry.method_mut(id).scope = Some(root);

        let mut body = self
            .registry
            .method_mut(id)
            .body
            .take()
            .ok_or_else(|| CompilationError::invalid_state("function body was already taken"))?;
        let env = Env::new(self.registry.method(id).owner, id, root);
        let result = self.convert_body(id, &mut body, env);
        self.registry.method_mut(id).body = Some(body);
        result?;

        self.finish_scope(root)?;
        self.registry.method_mut(id).processed = true;
        Ok(())
    }

    /// Process a function body and infer or check its return type.
    fn convert_body(&mut self, id: MethodId, body: &mut Node, env: Env) -> Result<()> {
        body.process_closures(self, env)?;
        let ty = body.expression_type(self, env)?;
        let method = self.registry.method(id);
        match &method.return_type {
            None => self.registry.method_mut(id).return_type = Some(ty),
            // A unit function discards the value of its body.
            Some(declared) if declared.is_unit() => {}
            Some(declared) => {
                if find_conversion(&ty, declared, &self.registry).is_none() {
                    return Err(CompilationError::TypeMismatch {
                        message: format!(
                            "function '{}' must return '{declared}' but its body has type '{ty}'",
                            method.name
                        ),
                        span: body.span.or(method.span),
                    });
                }
            }
        }
        Ok(())
    }

    fn declare_parameter(&mut self, scope: ScopeId, name: &str, ty: TypeDesc, index: u8, span: Span) -> Result<BindingId> {
        let id = self.scopes.declare(scope, name, ty, false, span)?;
        let binding = self.scopes.binding_mut(id);
        binding.storage = Storage::Argument(index);
        binding.argument = Some(index);
        Ok(id)
    }

    /// Synthesize the carrier of `scope` if anything in it was captured.
    pub(crate) fn finish_scope(&mut self, scope: ScopeId) -> Result<()> {
        let captured = self.scopes.scope(scope).captured().to_vec();
        if captured.is_empty() {
            return Ok(());
        }
        let name = format!("<Closure_{}>", self.next_closure_id());
        let mut fields = vec![FieldEntity::typed("<parent>", TypeDesc::Object)];
        fields.extend(captured.iter().map(|id| {
            let binding = self.scopes.binding(*id);
            FieldEntity::typed(binding.name.clone(), binding.ty.clone())
        }));
        let carrier = self.registry.add_type(TypeEntity::new(name.as_str(), TypeKind::Closure).with_fields(fields))?;
        self.scopes.attach_carrier(scope, carrier)?;
        tracing::debug!(carrier = %name, captured = captured.len(), "closure carrier synthesized");
        Ok(())
    }

    /// Mark `id` captured when it is used from a function other than its own.
    fn note_use(&mut self, id: BindingId, env: Env) {
        let binding = self.scopes.binding(id);
        if self.scopes.scope(binding.scope).method == env.method {
            return;
        }
        if binding.constant.as_ref().is_some_and(is_inline_literal) {
            return;
        }
        tracing::trace!(name = %binding.name, "binding captured");
        self.scopes.capture(id);
    }

    /// Resolve a function name used as a value.
    fn function_value(&self, name: &str, span: Span) -> Result<MethodId> {
        match self.registry.methods_named(Registry::ROOT, name).as_slice() {
            [id] => Ok(*id),
            [] => Err(CompilationError::NameResolution {
                name: name.to_string(),
                span,
            }),
            _ => Err(CompilationError::AmbiguousOverload {
                name: name.to_string(),
                args: "function value".to_string(),
                span,
            }),
        }
    }
}

fn argument_index(i: usize) -> Result<u8> {
    u8::try_from(i).map_err(|_| CompilationError::invalid_state("too many parameters"))
}

/// How the target of an `Invoke` is treated.
enum CallShape {
    /// `name(..)`: a binding holding a function value, or a named function.
    Named,
    /// `Owner.name(..)`: a static method, the target is not an expression.
    Static,
    Value,
}

impl Node {
    /// Run closure conversion over this node and its children.
    pub(crate) fn process_closures(&mut self, ctx: &mut Context, env: Env) -> Result<()> {
        let span = self.span;
        let call_shape = match &self.kind {
            NodeKind::Invoke { target, .. } => Some(call_shape(target, ctx, env)),
            _ => None,
        };

        match &mut self.kind {
            NodeKind::Block { body, scope } => {
                let id = ctx.scopes.create(Some(env.scope), env.method);
                *scope = Some(id);
                let inner = env.with_scope(id);
                for statement in body.iter_mut() {
                    statement.process_closures(ctx, inner)?;
                }
                ctx.finish_scope(id)?;
            }

            NodeKind::Let { name, value, binding } => {
                value.process_closures(ctx, env)?;
                let ty = value.expression_type(ctx, env)?;
                check_bindable(name, &ty, span)?;
                let constant = value.constant(ctx, env)?;
                let id = ctx.scopes.declare(env.scope, name, ty, false, span)?;
                if let Some(constant) = constant {
                    ctx.scopes.make_constant(id, constant)?;
                }
                *binding = Some(id);
            }
            NodeKind::Var { name, init, binding } => {
                let ty = match init {
                    VarInit::Value(value) => {
                        value.process_closures(ctx, env)?;
                        value.expression_type(ctx, env)?
                    }
                    VarInit::Type(sig) => ctx.resolver.resolve(sig, &ctx.registry, span)?,
                };
                check_bindable(name, &ty, span)?;
                *binding = Some(ctx.scopes.declare(env.scope, name, ty, true, span)?);
            }

            NodeKind::Get { name, target } => {
                let resolved = match ctx.scopes.lookup(env.scope, name) {
                    Some(id) => {
                        ctx.note_use(id, env);
                        Target::Binding(id)
                    }
                    None => Target::Function(ctx.function_value(name, span)?),
                };
                *target = Some(resolved);
            }
            NodeKind::Set { name, value, binding } => {
                value.process_closures(ctx, env)?;
                let id = ctx.scopes.find(env.scope, name, span)?;
                ctx.note_use(id, env);
                *binding = Some(id);
            }

            NodeKind::Lambda { params, body, method } => {
                let mut entity = MethodEntity::new(
                    format!("<lambda_{}>", ctx.registry.method_count()),
                    env.owner,
                    MethodKind::Lambda,
                );
                entity.params = params
                    .iter()
                    .map(|param| ParamEntity {
                        name: param.name.clone(),
                        signature: Some(param.signature.clone()),
                        ty: None,
                        by_ref: param.by_ref,
                        span: param.span.or(span),
                    })
                    .collect();
                entity.span = span;
                let id = ctx.registry.add_method(entity);
                ctx.prepare_method(id)?;

                let root = ctx.scopes.create(Some(env.scope), id);
                let typed: Vec<(String, Option<TypeDesc>, Span)> = ctx
                    .registry
                    .method(id)
                    .params
                    .iter()
                    .map(|param| (param.name.clone(), param.ty.clone(), param.span))
                    .collect();
                for (i, (name, ty, param_span)) in typed.into_iter().enumerate() {
                    let ty = ty.ok_or_else(|| CompilationError::invalid_state("lambda parameter has no type"))?;
                    // Argument 0 is the carrier of the defining scope.
                    ctx.declare_parameter(root, &name, ty, argument_index(i + 1)?, param_span)?;
                }
                ctx.registry.method_mut(id).scope = Some(root);

                let mut lambda_body = body
                    .take()
                    .ok_or_else(|| CompilationError::invalid_state("lambda body was already converted"))?;
                let inner = Env::new(env.owner, id, root);
                lambda_body.process_closures(ctx, inner)?;
                let ret = lambda_body.expression_type(ctx, inner)?;
                ctx.finish_scope(root)?;

                let entity = ctx.registry.method_mut(id);
                entity.return_type = Some(ret);
                entity.body = Some(*lambda_body);
                entity.processed = true;
                *method = Some(id);
                tracing::trace!(lambda = id.index(), "lambda converted");
            }

            NodeKind::Invoke { target, args } => {
                match call_shape {
                    Some(CallShape::Named) => {
                        let target_span = target.span.or(span);
                        if let NodeKind::Get { name, target: slot } = &mut target.kind {
                            match ctx.scopes.lookup(env.scope, name) {
                                Some(id) => {
                                    ctx.note_use(id, env);
                                    *slot = Some(Target::Binding(id));
                                }
                                None if ctx.registry.methods_named(Registry::ROOT, name).is_empty() => {
                                    return Err(CompilationError::NameResolution {
                                        name: name.clone(),
                                        span: target_span,
                                    });
                                }
                                None => {}
                            }
                        }
                    }
                    Some(CallShape::Static) => {}
                    _ => target.process_closures(ctx, env)?,
                }
                for arg in args.iter_mut() {
                    arg.process_closures(ctx, env)?;
                }
            }

            NodeKind::TypeDefinition(_)
            | NodeKind::RecordDefinition(_)
            | NodeKind::FunctionDefinition(_)
            | NodeKind::Using(_) => {
                return Err(CompilationError::fail(
                    "type, record and function definitions and 'using' are only allowed at the top level",
                    Some(span),
                ));
            }

            _ => {
                for child in self.children_mut() {
                    child.process_closures(ctx, env)?;
                }
            }
        }
        Ok(())
    }
}

fn call_shape(target: &Node, ctx: &Context, env: Env) -> CallShape {
    match &target.kind {
        NodeKind::Get { .. } => CallShape::Named,
        NodeKind::GetMember { target: owner, .. }
            if crate::ast::typing::static_owner(owner, ctx, env).is_some() =>
        {
            CallShape::Static
        }
        _ => CallShape::Value,
    }
}

fn check_bindable(name: &str, ty: &TypeDesc, span: Span) -> Result<()> {
    let problem = match ty {
        TypeDesc::Unit => "a unit value",
        TypeDesc::Null => "'null' without a type",
        _ => return Ok(()),
    };
    Err(CompilationError::TypeMismatch {
        message: format!("'{name}' cannot be bound to {problem}"),
        span,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, Param};
    use crate::options::CompilerOptions;

    fn converted(nodes: Vec<Node>) -> Context {
        let mut ctx = Context::new(nodes, CompilerOptions::default());
        ctx.declare_entities().unwrap();
        ctx.convert_closures().unwrap();
        ctx
    }

    fn carriers(ctx: &Context) -> Vec<String> {
        ctx.registry()
            .type_ids()
            .map(|id| ctx.registry().type_entity(id))
            .filter(|ty| ty.kind == TypeKind::Closure)
            .map(|ty| ty.name.clone())
            .collect()
    }

    /// Scope of the block holding the script statements.
    fn entry_block(ctx: &Context) -> ScopeId {
        match &ctx.registry().method(ctx.entry()).body.as_ref().unwrap().kind {
            NodeKind::Block { scope, .. } => scope.unwrap(),
            other => panic!("unexpected entry body {other:?}"),
        }
    }

    fn counter_script() -> Vec<Node> {
        vec![
            Expr::var("x", Expr::int(0)),
            Expr::let_("inc", Expr::lambda(vec![], Expr::set("x", Expr::add(Expr::get("x"), Expr::int(1))))),
            Expr::call("inc", vec![]),
            Expr::call("inc", vec![]),
            Expr::get("x"),
        ]
    }

    #[test]
    fn captured_local_moves_into_carrier() {
        let ctx = converted(counter_script());
        assert_eq!(carriers(&ctx), vec!["<Closure_1>".to_string()]);

        let carrier = ctx.registry().find_type("<Closure_1>").unwrap();
        let entity = ctx.registry().type_entity(carrier);
        assert_eq!(entity.fields[0].name, "<parent>");
        assert_eq!(entity.fields[1].name, "x");
        assert_eq!(entity.fields[1].ty, Some(TypeDesc::INT));

        let x = ctx.scopes().lookup(entry_block(&ctx), "x").unwrap();
        assert!(ctx.scopes().binding(x).captured);
        assert_eq!(ctx.scopes().binding(x).storage, Storage::Field { carrier, index: 1 });
        assert_eq!(ctx.scopes().scope(entry_block(&ctx)).carrier().unwrap().ty, carrier);
    }

    #[test]
    fn uncaptured_locals_need_no_carrier() {
        let ctx = converted(vec![Expr::var("x", Expr::int(0)), Expr::set("x", Expr::int(2)), Expr::get("x")]);
        assert!(carriers(&ctx).is_empty());
    }

    #[test]
    fn lambda_infers_return_type() {
        let ctx = converted(vec![Expr::lambda(vec![Param::new("a", "int")], Expr::mul(Expr::get("a"), Expr::long(2)))]);
        let lambda = ctx
            .registry()
            .method_ids()
            .find(|id| ctx.registry().method(*id).kind == MethodKind::Lambda)
            .unwrap();
        let method = ctx.registry().method(lambda);
        assert_eq!(method.return_type, Some(TypeDesc::LONG));
        assert!(method.processed);
        assert!(method.has_receiver());
        let entry = ctx.registry().method(ctx.entry()).return_type.clone().unwrap();
        assert_eq!(entry, TypeDesc::function(vec![TypeDesc::INT], TypeDesc::LONG));
    }

    #[test]
    fn constant_bindings_are_inlined_not_captured() {
        let ctx = converted(vec![
            Expr::let_("k", Expr::int(10)),
            Expr::let_("f", Expr::lambda(vec![], Expr::get("k"))),
            Expr::invoke(Expr::get("f"), vec![]),
        ]);
        assert!(carriers(&ctx).is_empty());
    }

    #[test]
    fn each_capturing_scope_gets_a_unique_carrier() {
        let ctx = converted(vec![
            Expr::var("a", Expr::int(0)),
            Expr::block(vec![
                Expr::var("b", Expr::int(0)),
                Expr::lambda(vec![], Expr::add(Expr::get("a"), Expr::get("b"))),
            ]),
        ]);
        let names = carriers(&ctx);
        assert_eq!(names.len(), 2);
        assert_ne!(names[0], names[1]);
    }

    #[test]
    fn captured_parameters_are_copied_into_the_carrier() {
        let ctx = converted(vec![Expr::fun(
            "adder",
            vec![Param::new("n", "int")],
            None,
            Expr::lambda(vec![Param::new("x", "int")], Expr::add(Expr::get("x"), Expr::get("n"))),
        )]);
        let adder = ctx.registry().methods_named(Registry::ROOT, "adder")[0];
        let root = ctx.registry().method(adder).scope.unwrap();
        let n = ctx.scopes().lookup(root, "n").unwrap();
        assert_eq!(ctx.scopes().binding(n).argument, Some(0));
        assert!(matches!(ctx.scopes().binding(n).storage, Storage::Field { index: 1, .. }));
        assert!(ctx.scopes().scope(root).carrier().is_some());
    }

    #[test]
    fn script_locals_are_not_visible_in_functions() {
        let mut ctx = Context::new(
            vec![Expr::var("x", Expr::int(1)), Expr::fun("f", vec![], Some("int"), Expr::get("x"))],
            CompilerOptions::default(),
        );
        ctx.declare_entities().unwrap();
        assert!(matches!(ctx.convert_closures(), Err(CompilationError::NameResolution { ref name, .. }) if name == "x"));
    }

    #[test]
    fn redeclaration_in_one_scope_fails_but_shadowing_works() {
        let mut ctx = Context::new(
            vec![Expr::let_("x", Expr::int(1)), Expr::let_("x", Expr::int(2))],
            CompilerOptions::default(),
        );
        ctx.declare_entities().unwrap();
        assert!(matches!(ctx.convert_closures(), Err(CompilationError::Redeclaration { .. })));

        let ctx = converted(vec![
            Expr::let_("x", Expr::int(1)),
            Expr::block(vec![Expr::let_("x", Expr::string("inner")), Expr::get("x")]),
        ]);
        let entry = ctx.registry().method(ctx.entry()).return_type.clone();
        assert_eq!(entry, Some(TypeDesc::String));
    }

    #[test]
    fn immutable_bindings_reject_assignment() {
        let mut ctx = Context::new(
            vec![Expr::let_("x", Expr::int(1)), Expr::set("x", Expr::int(2))],
            CompilerOptions::default(),
        );
        ctx.declare_entities().unwrap();
        assert!(matches!(ctx.convert_closures(), Err(CompilationError::ImmutableAssignment { .. })));
    }

    #[test]
    fn nested_definitions_are_rejected() {
        let mut ctx = Context::new(
            vec![Expr::block(vec![Expr::record("Inner", &[("X", "int")])])],
            CompilerOptions::default(),
        );
        ctx.declare_entities().unwrap();
        assert!(matches!(ctx.convert_closures(), Err(CompilationError::Failed { .. })));
    }

    #[test]
    fn calling_a_function_before_its_return_type_is_known_fails() {
        let mut ctx = Context::new(
            vec![
                Expr::fun("first", vec![], None, Expr::call("second", vec![])),
                Expr::fun("second", vec![], None, Expr::int(1)),
            ],
            CompilerOptions::default(),
        );
        ctx.declare_entities().unwrap();
        assert!(matches!(
            ctx.convert_closures(),
            Err(CompilationError::UndeclaredReturnType { ref name, .. }) if name == "second"
        ));
    }

    #[test]
    fn declared_return_type_allows_forward_calls() {
        let ctx = converted(vec![
            Expr::fun("first", vec![], None, Expr::call("second", vec![])),
            Expr::fun("second", vec![], Some("long"), Expr::int(1)),
        ]);
        let first = ctx.registry().methods_named(Registry::ROOT, "first")[0];
        assert_eq!(ctx.registry().method(first).return_type, Some(TypeDesc::LONG));
    }
}
