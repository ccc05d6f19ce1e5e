//! Code generation.
//!
//! Compiles every function body into a [`BytecodeChunk`]. Each node is
//! emitted through [`BodyCompiler::emit`], which applies the uniform rules:
//!
//! - a constant node is replaced by its literal
//! - a value nobody consumes is popped
//! - a unit-typed node whose value is consumed pushes the unit value
//!
//! Per-kind emission lives in [`expr`], comparisons in [`compare`] and
//! closure carriers and binding storage in [`closure`].
//!
//! [`BytecodeChunk`]: crate::bytecode::BytecodeChunk

mod closure;
mod compare;
mod expr;

use lantern_core::{CompilationError, TypeDesc, Value};

use crate::ast::Node;
use crate::bytecode::{ConstantPool, OpCode};
use crate::context::{Context, ContextState, Env};
use crate::conversion::{Conversion, find_conversion, type_test};
use crate::emit::BytecodeEmitter;
use crate::entities::{MethodId, MethodKind};
use crate::unit::{CompiledFunction, FunctionBody, TypeTest};

type Result<T> = std::result::Result<T, CompilationError>;

impl Context {
    /// Compile every function body of the registry.
    #[tracing::instrument(skip_all)]
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn compile_bodies(&mut self) -> Result<()> {
        self.run_pass(&[ContextState::EntitiesRedeclared], |ctx| {
            let mut constants = std::mem::take(&mut ctx.constants);
            let result = ctx.compile_all(&mut constants);
            ctx.constants = constants;
            result?;
            Ok(ContextState::BodiesCompiled)
        })
    }

    fn compile_all(&mut self, constants: &mut ConstantPool) -> Result<()> {
        for id in self.registry.method_ids() {
            let method = self.registry.method(id);
            let (name, arity, has_receiver, kind) =
                (method.name.clone(), method.arity(), method.has_receiver(), method.kind);

            let body = match kind {
                MethodKind::Intrinsic(intrinsic) => FunctionBody::Intrinsic(intrinsic),
                _ => {
                    let node = self
                        .registry
                        .method_mut(id)
                        .body
                        .take()
                        .ok_or_else(|| CompilationError::invalid_state(format!("function '{name}' has no body")))?;
                    let compiled = BodyCompiler::new(self, constants, id).compile_function(&node);
                    self.registry.method_mut(id).body = Some(node);
                    compiled?
                }
            };
            tracing::trace!(function = %name, "function compiled");
            self.functions.push(CompiledFunction {
                name,
                arity,
                has_receiver,
                body,
            });
        }
        Ok(())
    }
}

/// Emits the body of one function.
pub(crate) struct BodyCompiler<'a> {
    ctx: &'a mut Context,
    emitter: BytecodeEmitter<'a>,
    method: MethodId,
    /// Next free local slot.
    next_slot: u16,
    /// Slots the frame needs.
    frame_size: u16,
}

impl<'a> BodyCompiler<'a> {
    fn new(ctx: &'a mut Context, constants: &'a mut ConstantPool, method: MethodId) -> Self {
        Self {
            ctx,
            emitter: BytecodeEmitter::new(constants),
            method,
            next_slot: 0,
            frame_size: 0,
        }
    }

    fn compile_function(mut self, body: &Node) -> Result<FunctionBody> {
        let method = self.ctx.registry.method(self.method);
        let root = method
            .scope
            .ok_or_else(|| CompilationError::invalid_state(format!("function '{}' was never converted", method.name)))?;
        let ret = method.require_return_type(method.span)?.clone();
        let env = Env::new(method.owner, self.method, root);

        self.enter_scope(root, env)?;
        if ret.is_unit() {
            self.emit(body, env, false)?;
            self.emitter.emit_unit();
        } else {
            self.emit_converted(body, env, &ret)?;
        }
        self.emitter.emit_return();

        let chunk = self.emitter.finish()?;
        Ok(FunctionBody::Bytecode {
            chunk,
            frame_size: self.frame_size,
        })
    }

    /// Emit `node`, leaving its value on the stack iff `must_return`.
    pub(crate) fn emit(&mut self, node: &Node, env: Env, must_return: bool) -> Result<()> {
        let ty = node.expression_type(self.ctx, env)?;
        if node.span.is_known() {
            self.emitter.set_line(node.span.line);
        }
        if let Some(value) = node.constant(self.ctx, env)? {
            if !must_return {
                return Ok(());
            }
            if self.emitter.emit_literal(&value)? {
                return Ok(());
            }
        }

        self.emit_node(node, &ty, env)?;

        match (must_return, ty.is_unit()) {
            (false, false) => self.emitter.emit_pop(),
            (true, true) => self.emitter.emit_unit(),
            _ => {}
        }
        Ok(())
    }

    /// Emit `node` and convert its value to `to`.
    pub(crate) fn emit_converted(&mut self, node: &Node, env: Env, to: &TypeDesc) -> Result<()> {
        self.emit(node, env, true)?;
        let from = node.expression_type(self.ctx, env)?;
        let conversion = find_conversion(&from, to, &self.ctx.registry)
            .ok_or_else(|| CompilationError::invalid_state(format!("no conversion from '{from}' to '{to}'")))?;
        self.emit_conversion(&conversion)
    }

    pub(crate) fn emit_conversion(&mut self, conversion: &Conversion) -> Result<()> {
        match conversion {
            Conversion::Identity | Conversion::Null | Conversion::Upcast | Conversion::Wrap(None) => {}
            Conversion::Numeric(kind) | Conversion::Wrap(Some(kind)) => self.emitter.emit_convert(*kind),
            Conversion::Unwrap(kind) => {
                self.emitter.emit(OpCode::Unwrap);
                if let Some(kind) = kind {
                    self.emitter.emit_convert(*kind);
                }
            }
            Conversion::Checked(test) => {
                let index = self.ctx.type_test_index(test.clone())?;
                self.emitter.emit_check_cast(index);
            }
        }
        Ok(())
    }

    /// Push the value a fresh variable of `ty` holds. Nothing for unit.
    pub(crate) fn emit_default(&mut self, ty: &TypeDesc) -> Result<()> {
        match ty.default_value() {
            Value::Unit => {}
            Value::Null => self.emitter.emit_null(),
            value => {
                if !self.emitter.emit_literal(&value)? {
                    self.emitter.emit_constant(value)?;
                }
            }
        }
        Ok(())
    }

    /// Call a function of the unit, dropping the result of a unit function.
    pub(crate) fn emit_call(&mut self, method: MethodId, argc: usize) -> Result<()> {
        let index = u16::try_from(method.index()).map_err(|_| CompilationError::invalid_state("too many functions"))?;
        self.emitter.emit_call(index, arg_count(argc)?);
        self.drop_unit_result(method)
    }

    pub(crate) fn drop_unit_result(&mut self, method: MethodId) -> Result<()> {
        let ret = self.ctx.registry.method(method).require_return_type(Default::default())?;
        if ret.is_unit() {
            self.emitter.emit_pop();
        }
        Ok(())
    }

    pub(crate) fn type_test(&mut self, ty: &TypeDesc) -> Result<Option<u16>> {
        let test: Option<TypeTest> = type_test(ty, &self.ctx.registry);
        test.map(|test| self.ctx.type_test_index(test)).transpose()
    }

    /// Reserve a local slot in the current frame.
    pub(crate) fn alloc_slot(&mut self) -> Result<u16> {
        let slot = self.next_slot;
        self.next_slot = slot
            .checked_add(1)
            .ok_or_else(|| CompilationError::invalid_state("too many locals in one function"))?;
        self.frame_size = self.frame_size.max(self.next_slot);
        Ok(slot)
    }

    pub(crate) fn has_receiver(&self) -> bool {
        self.ctx.registry.method(self.method).has_receiver()
    }
}

pub(crate) fn arg_count(argc: usize) -> Result<u8> {
    u8::try_from(argc).map_err(|_| CompilationError::invalid_state("too many arguments in one call"))
}

pub(crate) fn type_index(index: usize) -> Result<u16> {
    u16::try_from(index).map_err(|_| CompilationError::invalid_state("too many types"))
}
