//! The loadable unit produced by a compilation.

use lantern_core::{PrimitiveKind, Value};

use crate::bytecode::{BytecodeChunk, ConstantPool};
use crate::entities::Intrinsic;

/// A finished compilation: everything the VM needs to run the script.
#[derive(Debug, Clone)]
pub struct CompiledUnit {
    pub constants: ConstantPool,
    /// Indexed by function index.
    pub functions: Vec<CompiledFunction>,
    /// Indexed by type index.
    pub types: Vec<UnitType>,
    /// Operands of `CHECK_CAST` and `IS_INSTANCE`.
    pub type_tests: Vec<TypeTest>,
    /// Function index of the zero-parameter entry point.
    pub entry: u32,
}

impl CompiledUnit {
    pub fn function(&self, index: u32) -> Option<&CompiledFunction> {
        self.functions.get(index as usize)
    }

    pub fn entry_function(&self) -> Option<&CompiledFunction> {
        self.function(self.entry)
    }

    /// Find a function by name, for inspection and tests.
    pub fn function_named(&self, name: &str) -> Option<&CompiledFunction> {
        self.functions.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct CompiledFunction {
    pub name: String,
    /// Arguments, the closure receiver included.
    pub arity: usize,
    /// Argument 0 is the closure carrier of the defining scope.
    pub has_receiver: bool,
    pub body: FunctionBody,
}

#[derive(Debug, Clone)]
pub enum FunctionBody {
    Bytecode {
        chunk: BytecodeChunk,
        /// Local slots the frame needs.
        frame_size: u16,
    },
    Intrinsic(Intrinsic),
}

impl CompiledFunction {
    pub fn chunk(&self) -> Option<&BytecodeChunk> {
        match &self.body {
            FunctionBody::Bytecode { chunk, .. } => Some(chunk),
            FunctionBody::Intrinsic(_) => None,
        }
    }
}

/// Run-time shape of a user or synthesized type.
#[derive(Debug, Clone)]
pub struct UnitType {
    pub name: String,
    /// Default value per field, used by `NEW` for fields it is not given.
    pub field_defaults: Vec<Value>,
}

/// Instance test of `CHECK_CAST` / `IS_INSTANCE`. `null` never passes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeTest {
    /// Any non-null value.
    Any,
    Primitive(PrimitiveKind),
    String,
    List,
    Dict,
    Function,
    /// An object whose type index is in the list.
    Types(Vec<u32>),
}

impl TypeTest {
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => false,
            (TypeTest::Any, _) => true,
            (TypeTest::Primitive(kind), value) => value.kind() == Some(*kind),
            (TypeTest::String, Value::Str(_)) => true,
            (TypeTest::List, Value::List(_)) => true,
            (TypeTest::Dict, Value::Dict(_)) => true,
            (TypeTest::Function, Value::Function(_)) => true,
            (TypeTest::Types(types), Value::Object(obj)) => types.contains(&obj.borrow().type_index),
            _ => false,
        }
    }
}
