//! Lantern Compiler
//!
//! Compiles a host-built expression tree into a [`CompiledUnit`] of
//! bytecode functions for the lantern virtual machine.
//!
//! ## Pipeline
//!
//! Every stage runs through [`Context`] and moves it to the next
//! [`ContextState`]:
//!
//! 1. **Entity declaration**: types, records, function signatures and the
//!    synthetic script root
//! 2. **Closure conversion**: scopes, name binding, captured variables and
//!    their carrier types
//! 3. **Finalization**: carrier fields and lambdas join the registry
//! 4. **Code generation**: one bytecode chunk per function
//!
//! ## Modules
//!
//! - [`ast`]: Input tree, builder, memoized typing and constant folding
//! - [`bytecode`]: OpCode, BytecodeChunk and ConstantPool
//! - [`context`]: Compilation context and pass sequencing
//! - [`conversion`]: Implicit conversions and casts
//! - [`emit`]: Low-level bytecode emitter with label patching
//! - [`entities`]: Registry of types and methods
//! - [`operators`]: Operator resolution rules
//! - [`overload`]: Overload resolution for calls
//! - [`scope`]: Scope tree, bindings and closure carriers
//! - [`type_resolver`]: Type names to [`TypeDesc`]s

pub mod ast;
pub mod bytecode;
mod closures;
mod compile;
pub mod context;
pub mod conversion;
pub mod emit;
pub mod entities;
pub mod operators;
pub mod options;
pub mod overload;
pub mod scope;
pub mod type_resolver;
pub mod unit;

pub use ast::{
    Expr, FieldDefinition, FunctionDefinition, LabelDefinition, Node, NodeKind, Param, RecordDefinition, Target,
    TypeDefinition, TypeSignature, VarInit,
};
pub use bytecode::{BytecodeChunk, ConstantPool, OpCode};
pub use context::{Context, ContextState, ENTRY_NAME, Env, ROOT_TYPE_NAME};
pub use conversion::{Conversion, find_cast, find_conversion};
pub use emit::BytecodeEmitter;
pub use entities::{Intrinsic, MethodId, MethodKind, Registry, TypeId, TypeKind};
pub use options::{CompilerOptions, SafeMode};
pub use overload::{OverloadMatch, resolve_overload};
pub use type_resolver::TypeResolver;
pub use unit::{CompiledFunction, CompiledUnit, FunctionBody, TypeTest, UnitType};

// Re-export from core for convenience
pub use lantern_core::{CompilationError, TypeDesc};
