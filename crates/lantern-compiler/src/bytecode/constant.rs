//! Unit-wide constant pool.
//!
//! Literal values referenced by `CONSTANT` and `VALUE_OR_DEFAULT`
//! instructions. Identical constants are stored once.

use std::rc::Rc;

use lantern_core::{PrimitiveKind, Value};
use rustc_hash::FxHashMap;

/// Constant pool shared by every function of a compiled unit.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    constants: Vec<Value>,
    index: FxHashMap<ConstantKey, u32>,
}

/// Exact identity of a constant: kind plus bit pattern.
///
/// Floats are keyed by their bits so `0.0` and `-0.0` stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstantKey {
    Unit,
    Null,
    Int(PrimitiveKind, i128),
    Float32(u32),
    Float64(u64),
    Str(Rc<str>),
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or find a constant and return its index.
    ///
    /// Returns `None` for values that cannot be constants (heap values).
    pub fn add(&mut self, value: Value) -> Option<u32> {
        let key = Self::to_key(&value)?;
        if let Some(&idx) = self.index.get(&key) {
            return Some(idx);
        }
        let idx = self.constants.len() as u32;
        self.constants.push(value);
        self.index.insert(key, idx);
        Some(idx)
    }

    pub fn get(&self, index: u32) -> Option<&Value> {
        self.constants.get(index as usize)
    }

    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    fn to_key(value: &Value) -> Option<ConstantKey> {
        let key = match value {
            Value::Unit => ConstantKey::Unit,
            Value::Null => ConstantKey::Null,
            Value::Bool(b) => ConstantKey::Int(PrimitiveKind::Bool, *b as i128),
            Value::Float(f) => ConstantKey::Float32(f.to_bits()),
            Value::Double(f) => ConstantKey::Float64(f.to_bits()),
            Value::Str(s) => ConstantKey::Str(s.clone()),
            other => ConstantKey::Int(other.kind()?, other.as_integer()?),
        };
        Some(key)
    }
}
