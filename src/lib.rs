//! Lantern
//!
//! A statically typed expression language compiled to bytecode and run on
//! a small stack machine.
//!
//! Hosts build input trees with [`Expr`], wrap them in a [`Script`] and
//! call [`Script::execute`]:
//!
//! ```ignore
//! use lantern::{Expr, Script, Value};
//!
//! let mut script = Script::new(vec![
//!     Expr::var("x", Expr::int(40)),
//!     Expr::add(Expr::get("x"), Expr::int(2)),
//! ]);
//! assert_eq!(script.execute()?, Value::Int32(42));
//! ```
//!
//! - [`lantern_core`]: values, types and errors
//! - [`lantern_compiler`]: the compilation pipeline
//! - [`vm`]: the virtual machine

mod script;
pub mod vm;

pub use script::Script;
pub use vm::{Machine, VmOptions};

pub use lantern_compiler::{
    CompiledFunction, CompiledUnit, CompilerOptions, Context, ContextState, Expr, Node, NodeKind, Param, SafeMode,
};
pub use lantern_core::{CompilationError, LanternError, RuntimeError, Span, TypeDesc, Value};

pub use lantern_compiler;
pub use lantern_core;
