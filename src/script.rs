//! Compile-and-run facade.

use lantern_compiler::{CompiledUnit, CompilerOptions, Context, Node};
use lantern_core::{CompilationError, LanternError, Value};

use crate::vm::{Machine, VmOptions};

/// A script: its compilation context plus the limits it runs under.
///
/// ```ignore
/// let mut script = Script::new(vec![Expr::add(Expr::int(1), Expr::int(2))]);
/// assert_eq!(script.execute()?, Value::Int32(3));
/// ```
#[derive(Debug)]
pub struct Script {
    context: Context,
    vm_options: VmOptions,
}

impl Script {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self::with_options(nodes, CompilerOptions::default(), VmOptions::default())
    }

    pub fn with_options(nodes: Vec<Node>, compiler: CompilerOptions, vm: VmOptions) -> Self {
        Self {
            context: Context::new(nodes, compiler),
            vm_options: vm,
        }
    }

    /// Compile the script. Compiling again returns the same unit.
    pub fn compile(&mut self) -> Result<&CompiledUnit, CompilationError> {
        self.context.compile()
    }

    /// Run the entry point, compiling first when needed. Nothing runs when
    /// compilation fails.
    #[tracing::instrument(skip_all)]
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn execute(&mut self) -> Result<Value, LanternError> {
        let options = self.vm_options;
        let unit = self.context.compile()?;
        let value = Machine::new(unit, options).run()?;
        tracing::debug!(result = %value, "script executed");
        Ok(value)
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn unit(&self) -> Option<&CompiledUnit> {
        self.context.unit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lantern_compiler::{ContextState, Expr};
    use lantern_core::RuntimeError;

    #[test]
    fn execute_compiles_on_demand() {
        let mut script = Script::new(vec![Expr::int(7)]);
        assert!(script.unit().is_none());
        assert_eq!(script.execute().unwrap(), Value::Int32(7));
        assert_eq!(script.context().state(), ContextState::Finalized);
    }

    #[test]
    fn compile_is_idempotent() {
        let mut script = Script::new(vec![Expr::add(Expr::int(1), Expr::int(2))]);
        let functions = script.compile().unwrap().functions.len();
        assert_eq!(script.compile().unwrap().functions.len(), functions);
        assert_eq!(script.execute().unwrap(), Value::Int32(3));
        assert_eq!(script.execute().unwrap(), Value::Int32(3));
    }

    #[test]
    fn runtime_errors_are_wrapped() {
        let mut script = Script::new(vec![Expr::var("z", Expr::int(0)), Expr::rem(Expr::int(5), Expr::get("z"))]);
        let err = script.execute().unwrap_err();
        assert!(err.is_runtime());
        assert_eq!(err, LanternError::Runtime(RuntimeError::DivisionByZero));
    }
}
