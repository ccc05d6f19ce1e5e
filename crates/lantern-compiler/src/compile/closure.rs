//! Closure carriers and binding storage.
//!
//! A scope with captured bindings creates an instance of its carrier type
//! when it is entered. Field 0 of the instance links to the nearest
//! enclosing carrier, so a lambda reaches any captured binding by starting
//! from its receiver (argument 0) and following parent links.

use lantern_core::CompilationError;

use super::{BodyCompiler, Result, type_index};
use crate::ast::Node;
use crate::context::Env;
use crate::scope::{BindingId, ScopeId, Storage};

impl BodyCompiler<'_> {
    /// Enter `scope`, creating its carrier instance if it has one.
    pub(super) fn enter_scope(&mut self, scope: ScopeId, env: Env) -> Result<()> {
        let Some(carrier) = self.ctx.scopes.scope(scope).carrier() else {
            return Ok(());
        };
        let slot = self.alloc_slot()?;
        self.ctx.scopes.binding_mut(carrier.instance).storage = Storage::Local(slot);

        self.emitter.emit_new(type_index(carrier.ty.index())?, 0);
        self.emitter.emit_dup();
        let parent = self.ctx.scopes.scope(scope).parent;
        self.emit_nearest_carrier(parent)?;
        self.emitter.emit_set_field(0);
        self.emitter.emit_set_local(slot);

        // Captured parameters start out in their argument.
        let captured = self.ctx.scopes.scope(scope).captured().to_vec();
        for id in captured {
            let binding = self.ctx.scopes.binding(id);
            if let (Some(argument), Storage::Field { index, .. }) = (binding.argument, binding.storage) {
                self.emitter.emit_get_local(slot);
                self.emitter.emit_get_arg(argument);
                self.emitter.emit_set_field(index);
            }
        }
        tracing::trace!(scope = ?scope, method = env.method.index(), "carrier created");
        Ok(())
    }

    /// Push the innermost carrier instance visible from `start`, or null.
    ///
    /// Crossing into an enclosing function means the carrier is the receiver
    /// of the current one.
    pub(super) fn emit_nearest_carrier(&mut self, start: Option<ScopeId>) -> Result<()> {
        let mut current = start;
        while let Some(id) = current {
            let scope = self.ctx.scopes.scope(id);
            if scope.method != self.method {
                if self.has_receiver() {
                    self.emitter.emit_get_arg(0);
                } else {
                    self.emitter.emit_null();
                }
                return Ok(());
            }
            if let Some(carrier) = scope.carrier() {
                let slot = self.local_slot(carrier.instance)?;
                self.emitter.emit_get_local(slot);
                return Ok(());
            }
            current = scope.parent;
        }
        self.emitter.emit_null();
        Ok(())
    }

    /// Push the carrier instance of `target`, seen from `env.scope`.
    fn emit_carrier_of(&mut self, target: ScopeId, env: Env) -> Result<()> {
        let scopes = &self.ctx.scopes;
        if scopes.scope(target).method == self.method {
            let carrier = scopes
                .scope(target)
                .carrier()
                .ok_or_else(|| CompilationError::invalid_state("captured binding in a scope without carrier"))?;
            let slot = self.local_slot(carrier.instance)?;
            self.emitter.emit_get_local(slot);
            return Ok(());
        }

        // Walk outwards through the carrier chain, starting at the receiver.
        let chain: Vec<ScopeId> = scopes
            .ancestors(env.scope)
            .filter(|id| scopes.scope(*id).method != self.method && scopes.scope(*id).carrier().is_some())
            .collect();
        let hops = chain
            .iter()
            .position(|id| *id == target)
            .ok_or_else(|| CompilationError::invalid_state("captured binding is not in an enclosing scope"))?;
        if !self.has_receiver() {
            return Err(CompilationError::invalid_state("captured binding used outside a closure"));
        }
        self.emitter.emit_get_arg(0);
        for _ in 0..hops {
            self.emitter.emit_get_field(0);
        }
        Ok(())
    }

    /// Push the value of a binding.
    pub(super) fn emit_load(&mut self, id: BindingId, env: Env) -> Result<()> {
        let binding = self.ctx.scopes.binding(id);
        match binding.storage {
            Storage::Local(slot) => self.emitter.emit_get_local(slot),
            Storage::Argument(index) => self.emitter.emit_get_arg(index),
            Storage::Field { index, .. } => {
                let scope = binding.scope;
                self.emit_carrier_of(scope, env)?;
                self.emitter.emit_get_field(index);
            }
            Storage::Unassigned => {
                return Err(CompilationError::invalid_state(format!(
                    "'{}' is read before it has storage",
                    binding.name
                )));
            }
        }
        Ok(())
    }

    /// Store the value of `value`, converted to the binding's type.
    pub(super) fn emit_store(&mut self, id: BindingId, value: &Node, env: Env) -> Result<()> {
        let ty = self.ctx.scopes.binding(id).ty.clone();
        self.emit_store_with(id, env, |this| this.emit_converted(value, env, &ty))
    }

    /// Store whatever `push` leaves on the stack. A local without storage
    /// gets its slot here.
    pub(super) fn emit_store_with(
        &mut self,
        id: BindingId,
        env: Env,
        push: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        let binding = self.ctx.scopes.binding(id);
        match binding.storage {
            Storage::Field { index, .. } => {
                let scope = binding.scope;
                self.emit_carrier_of(scope, env)?;
                push(self)?;
                self.emitter.emit_set_field(index);
            }
            Storage::Local(slot) => {
                push(self)?;
                self.emitter.emit_set_local(slot);
            }
            Storage::Unassigned => {
                let slot = self.alloc_slot()?;
                self.ctx.scopes.binding_mut(id).storage = Storage::Local(slot);
                push(self)?;
                self.emitter.emit_set_local(slot);
            }
            Storage::Argument(_) => {
                return Err(CompilationError::invalid_state(format!(
                    "parameter '{}' cannot be assigned",
                    binding.name
                )));
            }
        }
        Ok(())
    }

    fn local_slot(&self, id: BindingId) -> Result<u16> {
        match self.ctx.scopes.binding(id).storage {
            Storage::Local(slot) => Ok(slot),
            _ => Err(CompilationError::invalid_state("carrier instance has no slot")),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{Expr, Node, Param};
    use crate::bytecode::OpCode;
    use crate::context::Context;
    use crate::options::CompilerOptions;
    use crate::unit::CompiledFunction;

    fn compiled(nodes: Vec<Node>) -> Context {
        let mut ctx = Context::new(nodes, CompilerOptions::default());
        ctx.compile().unwrap();
        ctx
    }

    fn lambda(ctx: &Context) -> &CompiledFunction {
        ctx.unit()
            .unwrap()
            .functions
            .iter()
            .find(|f| f.name.starts_with("<lambda_"))
            .unwrap()
    }

    #[test]
    fn captured_locals_live_in_the_carrier() {
        let ctx = compiled(vec![
            Expr::var("x", Expr::int(0)),
            Expr::let_("inc", Expr::lambda(vec![], Expr::set("x", Expr::add(Expr::get("x"), Expr::int(1))))),
            Expr::call("inc", vec![]),
            Expr::get("x"),
        ]);
        let unit = ctx.unit().unwrap();
        unit.entry_function().unwrap().chunk().unwrap().assert_opcodes(&[
            // carrier
            OpCode::New,
            OpCode::Dup,
            OpCode::PushNull,
            OpCode::SetField,
            OpCode::SetLocal,
            // var x = 0
            OpCode::GetLocal,
            OpCode::PushZero,
            OpCode::SetField,
            // let inc = lambda
            OpCode::GetLocal,
            OpCode::MakeClosure,
            OpCode::SetLocal,
            // inc()
            OpCode::GetLocal,
            OpCode::CallValue,
            OpCode::Pop,
            // x
            OpCode::GetLocal,
            OpCode::GetField,
            OpCode::Return,
        ]);

        let inc = lambda(&ctx);
        assert!(inc.has_receiver);
        assert_eq!(inc.arity, 1);
        inc.chunk().unwrap().assert_opcodes(&[
            OpCode::GetArg,
            OpCode::GetArg,
            OpCode::GetField,
            OpCode::PushOne,
            OpCode::Add,
            OpCode::SetField,
            OpCode::PushUnit,
            OpCode::Return,
        ]);
    }

    #[test]
    fn captured_parameters_are_copied_on_entry() {
        let ctx = compiled(vec![Expr::fun(
            "adder",
            vec![Param::new("n", "int")],
            None,
            Expr::lambda(vec![Param::new("x", "int")], Expr::add(Expr::get("x"), Expr::get("n"))),
        )]);
        let adder = ctx.unit().unwrap().function_named("adder").unwrap();
        adder.chunk().unwrap().assert_opcodes(&[
            OpCode::New,
            OpCode::Dup,
            OpCode::PushNull,
            OpCode::SetField,
            OpCode::SetLocal,
            OpCode::GetLocal,
            OpCode::GetArg,
            OpCode::SetField,
            OpCode::GetLocal,
            OpCode::MakeClosure,
            OpCode::Return,
        ]);
        lambda(&ctx).chunk().unwrap().assert_opcodes(&[
            OpCode::GetArg,
            OpCode::GetArg,
            OpCode::GetField,
            OpCode::Add,
            OpCode::Return,
        ]);
    }

    #[test]
    fn nested_lambdas_follow_parent_links() {
        let ctx = compiled(vec![
            Expr::var("a", Expr::int(1)),
            Expr::lambda(
                vec![],
                Expr::block(vec![
                    Expr::var("b", Expr::int(2)),
                    Expr::lambda(vec![], Expr::add(Expr::get("a"), Expr::get("b"))),
                ]),
            ),
        ]);
        let unit = ctx.unit().unwrap();
        let inner = unit
            .functions
            .iter()
            .filter(|f| f.name.starts_with("<lambda_"))
            .max_by_key(|f| f.name.clone())
            .unwrap();
        // a: receiver, parent link, field; b: receiver, field
        inner.chunk().unwrap().assert_opcodes(&[
            OpCode::GetArg,
            OpCode::GetField,
            OpCode::GetField,
            OpCode::GetArg,
            OpCode::GetField,
            OpCode::Add,
            OpCode::Return,
        ]);
    }
}
